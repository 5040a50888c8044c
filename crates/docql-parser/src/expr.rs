//! Precedence-climbing expression parser.
//!
//! Precedence ladder, loosest to tightest:
//!   OR < AND < NOT (prefix) < comparison < BETWEEN/LIKE/IN/IS
//!      < `+ -` < `* / %` < unary < `||`
//! Path steps (`.name`, `[expr]`, `.*`, `[*]`) bind tighter than every
//! operator and are handled as postfix.

use docql_ast::{BinaryOp, Expr, PathComponent, UnaryOp};
use docql_error::{ParseErrorCode, ParserError};
use docql_types::DocValue;

use crate::parser::Parser;
use crate::token::TokenType;

// Precedence levels; higher binds tighter.
mod prec {
    pub const OR: u8 = 1;
    pub const AND: u8 = 2;
    pub const NOT: u8 = 3;
    pub const COMPARISON: u8 = 4;
    /// BETWEEN / LIKE / IN / IS and their negations.
    pub const RANGE: u8 = 5;
    pub const ADD: u8 = 6;
    pub const MUL: u8 = 7;
    pub const UNARY: u8 = 8;
    pub const CONCAT: u8 = 9;
}

/// An infix operation spotted at the current token.
enum Infix {
    Bin(BinaryOp),
    Between { not: bool },
    Like { not: bool },
    In { not: bool },
    Is,
}

impl Parser {
    /// Parse a complete expression.
    pub(crate) fn parse_expression(&mut self) -> Result<Expr, ParserError> {
        self.parse_expr_prec(0)
    }

    fn parse_expr_prec(&mut self, min_prec: u8) -> Result<Expr, ParserError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let Some((op, op_prec)) = self.peek_infix() else {
                break;
            };
            if op_prec < min_prec {
                break;
            }
            lhs = self.parse_infix(lhs, op, op_prec)?;
        }
        Ok(lhs)
    }

    // ── Infix ───────────────────────────────────────────────────────────

    fn peek_infix(&self) -> Option<(Infix, u8)> {
        let token = self.current();
        if token.token_type == TokenType::Star {
            return Some((Infix::Bin(BinaryOp::Mul), prec::MUL));
        }
        if token.token_type != TokenType::Operator {
            return None;
        }
        Some(match token.symbol_text()? {
            "or" => (Infix::Bin(BinaryOp::Or), prec::OR),
            "and" => (Infix::Bin(BinaryOp::And), prec::AND),
            "=" => (Infix::Bin(BinaryOp::Eq), prec::COMPARISON),
            "<>" => (Infix::Bin(BinaryOp::Ne), prec::COMPARISON),
            "<" => (Infix::Bin(BinaryOp::Lt), prec::COMPARISON),
            "<=" => (Infix::Bin(BinaryOp::Le), prec::COMPARISON),
            ">" => (Infix::Bin(BinaryOp::Gt), prec::COMPARISON),
            ">=" => (Infix::Bin(BinaryOp::Ge), prec::COMPARISON),
            "+" => (Infix::Bin(BinaryOp::Add), prec::ADD),
            "-" => (Infix::Bin(BinaryOp::Sub), prec::ADD),
            "/" => (Infix::Bin(BinaryOp::Div), prec::MUL),
            "%" => (Infix::Bin(BinaryOp::Mod), prec::MUL),
            "||" => (Infix::Bin(BinaryOp::Concat), prec::CONCAT),
            "between" => (Infix::Between { not: false }, prec::RANGE),
            "like" => (Infix::Like { not: false }, prec::RANGE),
            "in" => (Infix::In { not: false }, prec::RANGE),
            "is" => (Infix::Is, prec::RANGE),
            "not" => {
                let next = self.peek_at(1);
                if next.is_some_and(|t| t.is_operator("between")) {
                    (Infix::Between { not: true }, prec::RANGE)
                } else if next.is_some_and(|t| t.is_operator("like")) {
                    (Infix::Like { not: true }, prec::RANGE)
                } else if next.is_some_and(|t| t.is_operator("in")) {
                    (Infix::In { not: true }, prec::RANGE)
                } else {
                    return None;
                }
            }
            _ => return None,
        })
    }

    fn parse_infix(&mut self, lhs: Expr, op: Infix, op_prec: u8) -> Result<Expr, ParserError> {
        match op {
            Infix::Bin(bin) => {
                self.advance();
                let rhs = self.parse_expr_prec(op_prec + 1)?;
                Ok(Expr::Binary(bin, lhs.boxed(), rhs.boxed()))
            }
            Infix::Between { not } => {
                if not {
                    self.advance(); // NOT
                }
                self.advance(); // BETWEEN
                let lower = self.parse_expr_prec(prec::RANGE + 1)?;
                // Here AND is a keyword separating the bounds, not the
                // boolean operator.
                if !self.current().is_operator("and") {
                    return Err(self.expected_keyword_error("AND"));
                }
                self.advance();
                let upper = self.parse_expr_prec(prec::RANGE + 1)?;
                Ok(Expr::Between {
                    value: lhs.boxed(),
                    lower: lower.boxed(),
                    upper: upper.boxed(),
                    not,
                })
            }
            Infix::Like { not } => {
                if not {
                    self.advance();
                }
                self.advance(); // LIKE
                let pattern = self.parse_expr_prec(prec::RANGE + 1)?;
                let escape = if self.eat_keyword("escape") {
                    Some(self.parse_expr_prec(prec::RANGE + 1)?.boxed())
                } else {
                    None
                };
                Ok(Expr::Like {
                    value: lhs.boxed(),
                    pattern: pattern.boxed(),
                    escape,
                    not,
                })
            }
            Infix::In { not } => {
                if not {
                    self.advance();
                }
                self.advance(); // IN
                self.expect_token(TokenType::LeftParen)?;
                let mut candidates = vec![self.parse_expression()?];
                while self.eat_token(TokenType::Comma) {
                    candidates.push(self.parse_expression()?);
                }
                self.expect_token(TokenType::RightParen)?;
                Ok(Expr::InList {
                    value: lhs.boxed(),
                    candidates,
                    not,
                })
            }
            Infix::Is => {
                self.advance(); // IS
                let not = self.eat_operator("not");
                let target = self.parse_type_spec()?;
                Ok(Expr::IsType {
                    value: lhs.boxed(),
                    target,
                    not,
                })
            }
        }
    }

    // ── Prefix / unary ──────────────────────────────────────────────────

    fn parse_unary(&mut self) -> Result<Expr, ParserError> {
        let token = self.current();
        if token.token_type == TokenType::Operator {
            match token.symbol_text() {
                Some("+") => {
                    self.advance();
                    let operand = self.parse_expr_prec(prec::UNARY)?;
                    return Ok(Expr::Unary(UnaryOp::Plus, operand.boxed()));
                }
                Some("-") => {
                    self.advance();
                    let operand = self.parse_expr_prec(prec::UNARY)?;
                    return Ok(Expr::Unary(UnaryOp::Minus, operand.boxed()));
                }
                Some("not") => {
                    self.advance();
                    let operand = self.parse_expr_prec(prec::NOT)?;
                    return Ok(Expr::Unary(UnaryOp::Not, operand.boxed()));
                }
                Some("@") => {
                    self.advance();
                    let token = self.current().clone();
                    if token.token_type != TokenType::Identifier {
                        return Err(self.error(
                            ParseErrorCode::MissingIdentAfterAt,
                            "expected an identifier after '@'",
                        ));
                    }
                    self.advance();
                    let name = token.symbol_text().unwrap_or_default().to_owned();
                    return self.parse_postfix_of(Expr::LocalId(name));
                }
                _ => {}
            }
        }
        self.parse_postfix()
    }

    // ── Postfix paths ───────────────────────────────────────────────────

    fn parse_postfix(&mut self) -> Result<Expr, ParserError> {
        let base = self.parse_primary()?;
        self.parse_postfix_of(base)
    }

    fn parse_postfix_of(&mut self, base: Expr) -> Result<Expr, ParserError> {
        let mut components = Vec::new();
        loop {
            if self.eat_token(TokenType::Dot) {
                let token = self.current().clone();
                match token.token_type {
                    TokenType::Identifier => {
                        self.advance();
                        let name = token.symbol_text().unwrap_or_default().to_owned();
                        components.push(PathComponent::Index(Expr::Lit(DocValue::String(name))));
                    }
                    TokenType::Star => {
                        self.advance();
                        components.push(PathComponent::UnpivotWildcard);
                    }
                    TokenType::Dot => {
                        return Err(self.error(
                            ParseErrorCode::InvalidPathComponent,
                            "consecutive dots in path",
                        ));
                    }
                    _ => {
                        return Err(self.error(
                            ParseErrorCode::InvalidPathComponent,
                            "invalid path component after '.'",
                        ));
                    }
                }
            } else if self.eat_token(TokenType::LeftBracket) {
                if self.current().token_type == TokenType::Star
                    && self.peek_at(1).is_some_and(|t| t.token_type == TokenType::RightBracket)
                {
                    self.advance();
                    self.advance();
                    components.push(PathComponent::Wildcard);
                } else {
                    let index = self.parse_expression()?;
                    self.expect_token(TokenType::RightBracket)?;
                    components.push(PathComponent::Index(index));
                }
            } else {
                break;
            }
        }
        if components.is_empty() {
            Ok(base)
        } else {
            Ok(Expr::Path(base.boxed(), components))
        }
    }

    // ── Primary ─────────────────────────────────────────────────────────

    fn parse_primary(&mut self) -> Result<Expr, ParserError> {
        let token = self.current().clone();
        match token.token_type {
            TokenType::Literal | TokenType::EmbeddedLiteral => {
                self.advance();
                Ok(Expr::Lit(token.value))
            }
            TokenType::Identifier => {
                self.advance();
                let name = token.symbol_text().unwrap_or_default().to_owned();
                if self.current().token_type == TokenType::LeftParen {
                    self.parse_call(name)
                } else {
                    Ok(Expr::Id(name))
                }
            }
            TokenType::Keyword => match token.symbol_text().unwrap_or_default() {
                "null" => {
                    self.advance();
                    Ok(Expr::Lit(DocValue::Null(docql_types::DocType::Null)))
                }
                "missing" => {
                    self.advance();
                    Ok(Expr::Lit(DocValue::Missing))
                }
                "select" => {
                    self.advance();
                    self.parse_select()
                }
                "case" => {
                    self.advance();
                    self.parse_case()
                }
                "cast" => {
                    let pos = token.position;
                    self.advance();
                    self.parse_cast(pos)
                }
                "substring" => {
                    self.advance();
                    self.parse_substring()
                }
                "trim" => {
                    self.advance();
                    self.parse_trim()
                }
                "unpivot" => {
                    self.advance();
                    self.parse_unpivot()
                }
                "values" => {
                    self.advance();
                    self.parse_values()
                }
                other => Err(self.error(
                    ParseErrorCode::UnexpectedKeyword,
                    format!("unexpected keyword '{other}'"),
                )),
            },
            TokenType::LeftParen => {
                self.advance();
                let inner = self.parse_expression()?;
                self.expect_token(TokenType::RightParen)?;
                Ok(inner)
            }
            TokenType::LeftBracket => {
                self.advance();
                self.parse_list_ctor()
            }
            TokenType::LeftCurly => {
                self.advance();
                self.parse_struct_ctor()
            }
            TokenType::Operator => Err(self.error(
                ParseErrorCode::UnexpectedOperator,
                format!(
                    "operator '{}' cannot start an expression",
                    token.symbol_text().unwrap_or_default()
                ),
            )),
            TokenType::Eof => Err(self.error(
                ParseErrorCode::ExpectedExpression,
                "expected an expression, found end of input",
            )),
            _ => Err(self.error(
                ParseErrorCode::UnexpectedToken,
                format!("unexpected token '{}'", token.text),
            )),
        }
    }

    fn parse_call(&mut self, name: String) -> Result<Expr, ParserError> {
        self.expect_token(TokenType::LeftParen)?;
        let mut args = Vec::new();
        if self.current().token_type != TokenType::RightParen {
            args.push(self.parse_expression()?);
            while self.eat_token(TokenType::Comma) {
                args.push(self.parse_expression()?);
            }
        }
        self.expect_token(TokenType::RightParen)?;
        Ok(Expr::Call { name, args })
    }

    fn parse_list_ctor(&mut self) -> Result<Expr, ParserError> {
        let mut items = Vec::new();
        if self.eat_token(TokenType::RightBracket) {
            return Ok(Expr::ListCtor(items));
        }
        loop {
            items.push(self.parse_expression()?);
            if self.eat_token(TokenType::Comma) {
                continue;
            }
            if self.eat_token(TokenType::RightBracket) {
                return Ok(Expr::ListCtor(items));
            }
            return Err(self.expected_two_tokens_error(TokenType::Comma, TokenType::RightBracket));
        }
    }

    fn parse_struct_ctor(&mut self) -> Result<Expr, ParserError> {
        let mut fields = Vec::new();
        if self.eat_token(TokenType::RightCurly) {
            return Ok(Expr::StructCtor(fields));
        }
        loop {
            let name = self.parse_expression()?;
            self.expect_token(TokenType::Colon)?;
            let value = self.parse_expression()?;
            fields.push((name, value));
            if self.eat_token(TokenType::Comma) {
                continue;
            }
            if self.eat_token(TokenType::RightCurly) {
                return Ok(Expr::StructCtor(fields));
            }
            return Err(self.expected_two_tokens_error(TokenType::Comma, TokenType::RightCurly));
        }
    }
}
