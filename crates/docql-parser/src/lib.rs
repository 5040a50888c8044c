//! Lexer and parser for the DocQL dialect.
//!
//! [`tokenize`] turns source text into a finite stream of positioned
//! tokens via a table-driven DFA; [`parse`] climbs precedences over that
//! stream and produces a [`docql_ast::Expr`].

mod expr;
mod lexer;
mod parser;
mod token;

pub use lexer::tokenize;
pub use parser::{parse, Parser};
pub use token::{Token, TokenType, KEYWORDS, OPERATOR_WORDS};
