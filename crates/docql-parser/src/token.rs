//! Token types produced by the lexer.
//!
//! Every token carries a document-model payload: the identifier text, the
//! lower-cased keyword text, the canonical operator text (after alias
//! resolution), or a literal value.

use docql_ast::SourcePosition;
use docql_types::DocValue;

/// Token discriminant. Punctuation marks get distinct types; `*` and `.`
/// are their own types because paths and projections treat them specially.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenType {
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    LeftCurly,
    RightCurly,
    Colon,
    Comma,
    Star,
    Dot,
    Identifier,
    Keyword,
    Operator,
    Literal,
    /// A backtick-quoted embedded document literal.
    EmbeddedLiteral,
    Eof,
}

impl TokenType {
    /// The canonical upper-snake name, as used in error properties.
    pub const fn name(self) -> &'static str {
        match self {
            Self::LeftParen => "LEFT_PAREN",
            Self::RightParen => "RIGHT_PAREN",
            Self::LeftBracket => "LEFT_BRACKET",
            Self::RightBracket => "RIGHT_BRACKET",
            Self::LeftCurly => "LEFT_CURLY",
            Self::RightCurly => "RIGHT_CURLY",
            Self::Colon => "COLON",
            Self::Comma => "COMMA",
            Self::Star => "STAR",
            Self::Dot => "DOT",
            Self::Identifier => "IDENTIFIER",
            Self::Keyword => "KEYWORD",
            Self::Operator => "OPERATOR",
            Self::Literal => "LITERAL",
            Self::EmbeddedLiteral => "EMBEDDED_LITERAL",
            Self::Eof => "EOF",
        }
    }
}

impl std::fmt::Display for TokenType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Reserved words that lex as KEYWORD.
pub const KEYWORDS: &[&str] = &[
    "all", "as", "asc", "at", "both", "by", "case", "cast", "desc", "distinct", "else", "end",
    "escape", "for", "from", "group", "having", "leading", "limit", "missing", "null", "order",
    "select", "substring", "then", "trailing", "trim", "unpivot", "values", "when", "where",
];

/// Words that lex as OPERATOR rather than KEYWORD.
pub const OPERATOR_WORDS: &[&str] = &[
    "and", "between", "except", "in", "intersect", "is", "like", "not", "or", "union",
];

/// A single positioned token.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub token_type: TokenType,
    /// Payload: identifier/keyword/operator text as a symbol, or a
    /// literal value. EOF carries a plain null.
    pub value: DocValue,
    /// Raw source text of the token (quotes and all).
    pub text: String,
    /// Position of the token's first code point.
    pub position: SourcePosition,
}

impl Token {
    /// The payload text, for symbol-carrying tokens.
    pub fn symbol_text(&self) -> Option<&str> {
        match &self.value {
            DocValue::Symbol(s) => Some(s),
            _ => None,
        }
    }

    /// True if this token is the given keyword.
    pub fn is_keyword(&self, word: &str) -> bool {
        self.token_type == TokenType::Keyword && self.symbol_text() == Some(word)
    }

    /// True if this token is the given operator (canonical text).
    pub fn is_operator(&self, text: &str) -> bool {
        self.token_type == TokenType::Operator && self.symbol_text() == Some(text)
    }
}
