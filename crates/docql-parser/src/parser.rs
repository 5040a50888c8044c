//! Recursive-descent parser for the statement forms.
//!
//! Expression parsing (precedence climbing) lives in `expr.rs`; this
//! module owns the token cursor, the error constructors, and the keyword
//! forms: `SELECT`, `CAST`, `CASE`, `SUBSTRING`, `TRIM`, `UNPIVOT`, and
//! `VALUES`.

use docql_ast::{
    Expr, FromSource, OrderingTerm, ProjectItem, Projection, SelectExpr, SortDirection,
    SourcePosition, TypeName, TypeSpec,
};
use docql_error::{ParseErrorCode, ParserError, Property, PropertyBag, PropertyValue};
use docql_types::DocValue;
use tracing::debug;

use crate::lexer::tokenize;
use crate::token::{Token, TokenType};

/// Parse a source string into a single expression.
pub fn parse(source: &str) -> Result<Expr, ParserError> {
    let tokens = tokenize(source)?;
    debug!(tokens = tokens.len(), "parsing statement");
    let mut parser = Parser::new(tokens);
    let expr = parser.parse_expression()?;
    parser.expect_end()?;
    Ok(expr)
}

/// Token cursor shared by the statement and expression parsers.
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    /// The token list must end with an EOF token, as `tokenize` produces.
    pub fn new(tokens: Vec<Token>) -> Self {
        debug_assert!(matches!(
            tokens.last(),
            Some(Token {
                token_type: TokenType::Eof,
                ..
            })
        ));
        Self { tokens, pos: 0 }
    }

    // ── Cursor helpers ──────────────────────────────────────────────────

    pub(crate) fn current(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    pub(crate) fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset)
    }

    pub(crate) fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if token.token_type != TokenType::Eof {
            self.pos += 1;
        }
        token
    }

    pub(crate) fn eat_token(&mut self, token_type: TokenType) -> bool {
        if self.current().token_type == token_type {
            self.advance();
            true
        } else {
            false
        }
    }

    pub(crate) fn eat_keyword(&mut self, word: &str) -> bool {
        if self.current().is_keyword(word) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub(crate) fn eat_operator(&mut self, text: &str) -> bool {
        if self.current().is_operator(text) {
            self.advance();
            true
        } else {
            false
        }
    }

    // ── Error constructors ──────────────────────────────────────────────

    /// Properties describing the current token: position, type, payload.
    fn current_properties(&self) -> PropertyBag {
        let token = self.current();
        PropertyBag::new()
            .at(token.position.line, token.position.column)
            .with(
                Property::TokenType,
                PropertyValue::Text(token.token_type.name().to_owned()),
            )
            .with(Property::TokenValue, PropertyValue::Doc(token.value.clone()))
    }

    pub(crate) fn error(
        &self,
        code: ParseErrorCode,
        message: impl Into<String>,
    ) -> ParserError {
        ParserError::new(code, message, self.current_properties())
    }

    /// `PARSE_EXPECTED_KEYWORD` with the `KEYWORD` property set.
    pub(crate) fn expected_keyword_error(&self, keyword: &str) -> ParserError {
        ParserError::new(
            ParseErrorCode::ExpectedKeyword,
            format!("expected keyword {keyword}"),
            self.current_properties()
                .with(Property::Keyword, PropertyValue::Text(keyword.to_owned())),
        )
    }

    pub(crate) fn expected_two_tokens_error(
        &self,
        first: TokenType,
        second: TokenType,
    ) -> ParserError {
        ParserError::new(
            ParseErrorCode::Expected2TokenTypes,
            format!("expected {} or {}", first.name(), second.name()),
            self.current_properties()
                .with(
                    Property::ExpectedTokenType1Of2,
                    PropertyValue::Text(first.name().to_owned()),
                )
                .with(
                    Property::ExpectedTokenType2Of2,
                    PropertyValue::Text(second.name().to_owned()),
                ),
        )
    }

    /// Consume a keyword or fail with `PARSE_EXPECTED_KEYWORD`.
    pub(crate) fn expect_keyword(&mut self, word: &str) -> Result<(), ParserError> {
        if self.eat_keyword(word) {
            Ok(())
        } else {
            Err(self.expected_keyword_error(&word.to_uppercase()))
        }
    }

    /// Consume a token of the given type or fail with
    /// `PARSE_EXPECTED_TOKEN_TYPE`.
    pub(crate) fn expect_token(&mut self, token_type: TokenType) -> Result<Token, ParserError> {
        if self.current().token_type == token_type {
            Ok(self.advance())
        } else {
            Err(ParserError::new(
                ParseErrorCode::ExpectedTokenType,
                format!("expected {}", token_type.name()),
                self.current_properties().with(
                    Property::ExpectedTokenType,
                    PropertyValue::Text(token_type.name().to_owned()),
                ),
            ))
        }
    }

    /// The whole input must have been consumed.
    fn expect_end(&mut self) -> Result<(), ParserError> {
        match self.current().token_type {
            TokenType::Eof => Ok(()),
            TokenType::Operator => Err(self.error(
                ParseErrorCode::UnexpectedOperator,
                format!(
                    "unsupported operator '{}'",
                    self.current().symbol_text().unwrap_or_default()
                ),
            )),
            TokenType::Keyword => Err(self.error(
                ParseErrorCode::UnexpectedKeyword,
                format!(
                    "unexpected keyword '{}'",
                    self.current().symbol_text().unwrap_or_default()
                ),
            )),
            _ => Err(self.error(
                ParseErrorCode::UnexpectedTerm,
                "unexpected input after expression",
            )),
        }
    }

    // ── SELECT ──────────────────────────────────────────────────────────

    /// `select` has already been consumed.
    pub(crate) fn parse_select(&mut self) -> Result<Expr, ParserError> {
        let projection = if self.eat_token(TokenType::Star) {
            Projection::Star
        } else {
            let mut items = Vec::new();
            loop {
                let expr = self.parse_expression()?;
                let alias = self.parse_optional_alias(ParseErrorCode::ExpectedIdentForAlias)?;
                items.push(ProjectItem { expr, alias });
                if !self.eat_token(TokenType::Comma) {
                    break;
                }
            }
            Projection::Items(items)
        };

        if !self.eat_keyword("from") {
            return Err(self.error(
                ParseErrorCode::SelectMissingFrom,
                "SELECT requires a FROM clause",
            ));
        }

        let mut from = Vec::new();
        loop {
            let expr = self.parse_expression()?;
            let as_alias = self.parse_optional_alias(ParseErrorCode::ExpectedIdentForAlias)?;
            let at_alias = if self.eat_keyword("at") {
                Some(self.expect_identifier(ParseErrorCode::ExpectedIdentForAt)?)
            } else {
                None
            };
            from.push(FromSource {
                expr,
                as_alias,
                at_alias,
            });
            if !self.eat_token(TokenType::Comma) {
                break;
            }
        }

        let where_clause = if self.eat_keyword("where") {
            Some(self.parse_expression()?)
        } else {
            None
        };

        let mut group_by = Vec::new();
        if self.eat_keyword("group") {
            self.expect_keyword("by")?;
            loop {
                if self.current().token_type == TokenType::Literal {
                    return Err(self.error(
                        ParseErrorCode::UnsupportedLiteralsGroupBy,
                        "GROUP BY keys must be expressions, not literals",
                    ));
                }
                group_by.push(self.parse_expression()?);
                if !self.eat_token(TokenType::Comma) {
                    break;
                }
            }
        }

        let having = if self.eat_keyword("having") {
            Some(self.parse_expression()?)
        } else {
            None
        };

        let mut order_by = Vec::new();
        if self.eat_keyword("order") {
            self.expect_keyword("by")?;
            loop {
                let expr = self.parse_expression()?;
                let direction = if self.eat_keyword("desc") {
                    SortDirection::Descending
                } else {
                    self.eat_keyword("asc");
                    SortDirection::Ascending
                };
                order_by.push(OrderingTerm { expr, direction });
                if !self.eat_token(TokenType::Comma) {
                    break;
                }
            }
        }

        let limit = if self.eat_keyword("limit") {
            Some(self.parse_expression()?)
        } else {
            None
        };

        Ok(Expr::Select(Box::new(SelectExpr {
            projection,
            from,
            where_clause,
            group_by,
            having,
            order_by,
            limit,
        })))
    }

    /// `[AS] identifier`, or an implicit bare identifier alias.
    fn parse_optional_alias(
        &mut self,
        code: ParseErrorCode,
    ) -> Result<Option<String>, ParserError> {
        if self.eat_keyword("as") {
            return Ok(Some(self.expect_identifier(code)?));
        }
        if self.current().token_type == TokenType::Identifier {
            let token = self.advance();
            return Ok(Some(token.symbol_text().unwrap_or_default().to_owned()));
        }
        Ok(None)
    }

    fn expect_identifier(&mut self, code: ParseErrorCode) -> Result<String, ParserError> {
        if self.current().token_type == TokenType::Identifier {
            let token = self.advance();
            Ok(token.symbol_text().unwrap_or_default().to_owned())
        } else {
            Err(self.error(code, "expected an identifier"))
        }
    }

    // ── CASE ────────────────────────────────────────────────────────────

    /// `case` has already been consumed. Handles both the simple and the
    /// searched form.
    pub(crate) fn parse_case(&mut self) -> Result<Expr, ParserError> {
        let operand = if self.current().is_keyword("when") {
            None
        } else {
            Some(self.parse_expression()?.boxed())
        };

        let mut whens = Vec::new();
        while self.eat_keyword("when") {
            let test = self.parse_expression()?;
            self.expect_keyword("then")?;
            let result = self.parse_expression()?;
            whens.push((test, result));
        }
        if whens.is_empty() {
            return Err(self.error(
                ParseErrorCode::ExpectedWhenClause,
                "CASE requires at least one WHEN clause",
            ));
        }

        let else_clause = if self.eat_keyword("else") {
            Some(self.parse_expression()?.boxed())
        } else {
            None
        };
        self.expect_keyword("end")?;

        Ok(Expr::Case {
            operand,
            whens,
            else_clause,
        })
    }

    // ── CAST ────────────────────────────────────────────────────────────

    /// `cast` has already been consumed; `pos` is its position.
    pub(crate) fn parse_cast(&mut self, pos: SourcePosition) -> Result<Expr, ParserError> {
        if !self.eat_token(TokenType::LeftParen) {
            return Err(ParserError::new(
                ParseErrorCode::ExpectedLeftParenAfterCast,
                "expected '(' after CAST",
                self.current_properties().with(
                    Property::ExpectedTokenType,
                    PropertyValue::Text(TokenType::LeftParen.name().to_owned()),
                ),
            ));
        }
        let value = self.parse_expression()?;
        self.expect_keyword("as")?;
        let target = self.parse_type_spec()?;
        self.expect_token(TokenType::RightParen)?;
        Ok(Expr::Cast {
            value: value.boxed(),
            target,
            pos: Some(pos),
        })
    }

    // ── Type names ──────────────────────────────────────────────────────

    /// A type name with optional parameters, e.g. `varchar(10)`,
    /// `double precision`, `null`, `missing`.
    pub(crate) fn parse_type_spec(&mut self) -> Result<TypeSpec, ParserError> {
        let name_properties = self.current_properties();

        let name = match self.current().token_type {
            TokenType::Keyword if self.current().is_keyword("null") => {
                self.advance();
                TypeName::Null
            }
            TokenType::Keyword if self.current().is_keyword("missing") => {
                self.advance();
                TypeName::Missing
            }
            TokenType::Identifier => {
                let first = self.advance().symbol_text().unwrap_or_default().to_lowercase();
                // Two-word names.
                let second = match first.as_str() {
                    "double" | "character" => self
                        .current()
                        .symbol_text()
                        .map(str::to_lowercase)
                        .filter(|w| {
                            self.current().token_type == TokenType::Identifier
                                && matches!(
                                    (first.as_str(), w.as_str()),
                                    ("double", "precision") | ("character", "varying")
                                )
                        }),
                    _ => None,
                };
                let words: Vec<&str> = match &second {
                    Some(second) => {
                        self.advance();
                        vec![first.as_str(), second.as_str()]
                    }
                    None => vec![first.as_str()],
                };
                TypeName::lookup(&words).ok_or_else(|| {
                    ParserError::new(
                        ParseErrorCode::ExpectedTypeName,
                        format!("unknown type name '{}'", words.join(" ")),
                        name_properties.clone(),
                    )
                })?
            }
            _ => {
                return Err(ParserError::new(
                    ParseErrorCode::ExpectedTypeName,
                    "expected a type name",
                    name_properties,
                ));
            }
        };

        let mut params = Vec::new();
        if self.eat_token(TokenType::LeftParen) {
            loop {
                match &self.current().value {
                    DocValue::Int(i) if self.current().token_type == TokenType::Literal
                        && *i >= 0 =>
                    {
                        params.push(*i);
                        self.advance();
                    }
                    _ => {
                        return Err(self.error(
                            ParseErrorCode::InvalidTypeParam,
                            format!(
                                "type parameters for {} must be non-negative integers",
                                name.text()
                            ),
                        ));
                    }
                }
                if self.eat_token(TokenType::Comma) {
                    continue;
                }
                self.expect_token(TokenType::RightParen)?;
                break;
            }
        }

        let (min, max) = name.param_arity();
        if params.len() < min || params.len() > max {
            return Err(ParserError::new(
                ParseErrorCode::CastArity,
                format!(
                    "{} takes between {min} and {max} type parameters, got {}",
                    name.text(),
                    params.len()
                ),
                name_properties
                    .with(
                        Property::ExpectedArityMin,
                        PropertyValue::Integer(min as i64),
                    )
                    .with(
                        Property::ExpectedArityMax,
                        PropertyValue::Integer(max as i64),
                    )
                    .with(Property::CastTo, PropertyValue::Text(name.text().to_owned())),
            ));
        }

        Ok(TypeSpec { name, params })
    }

    // ── Built-in function forms ─────────────────────────────────────────

    fn expect_builtin_lparen(&mut self, name: &str) -> Result<(), ParserError> {
        if self.eat_token(TokenType::LeftParen) {
            Ok(())
        } else {
            Err(self.error(
                ParseErrorCode::ExpectedLeftParenBuiltinFunctionCall,
                format!("expected '(' after {name}"),
            ))
        }
    }

    fn expect_builtin_rparen(&mut self, name: &str) -> Result<(), ParserError> {
        if self.eat_token(TokenType::RightParen) {
            Ok(())
        } else {
            Err(self.error(
                ParseErrorCode::ExpectedRightParenBuiltinFunctionCall,
                format!("expected ')' to close {name}"),
            ))
        }
    }

    /// `SUBSTRING(e FROM n [FOR m])` or `SUBSTRING(e, n [, m])`.
    pub(crate) fn parse_substring(&mut self) -> Result<Expr, ParserError> {
        self.expect_builtin_lparen("SUBSTRING")?;
        let target = self.parse_expression()?;

        let sql_style = if self.eat_keyword("from") {
            true
        } else if self.eat_token(TokenType::Comma) {
            false
        } else {
            return Err(self.error(
                ParseErrorCode::ExpectedArgumentDelimiter,
                "expected FROM or ',' in SUBSTRING",
            ));
        };

        let start = self.parse_expression()?;
        let length = if sql_style {
            if self.eat_keyword("for") {
                Some(self.parse_expression()?)
            } else {
                None
            }
        } else if self.eat_token(TokenType::Comma) {
            Some(self.parse_expression()?)
        } else {
            None
        };
        self.expect_builtin_rparen("SUBSTRING")?;

        let mut args = vec![target, start];
        args.extend(length);
        Ok(Expr::Call {
            name: "substring".to_owned(),
            args,
        })
    }

    /// `TRIM([[LEADING|TRAILING|BOTH] [chars] FROM] s)`.
    ///
    /// Encoded as `call trim` with the mode symbol first, the optional
    /// trim characters second, and the target last.
    pub(crate) fn parse_trim(&mut self) -> Result<Expr, ParserError> {
        self.expect_builtin_lparen("TRIM")?;

        let mut mode = "both";
        let mut explicit_mode = false;
        for candidate in ["leading", "trailing", "both"] {
            if self.eat_keyword(candidate) {
                mode = candidate;
                explicit_mode = true;
                break;
            }
        }

        let (chars, target) = if explicit_mode && self.eat_keyword("from") {
            (None, self.parse_expression()?)
        } else {
            let first = self.parse_expression()?;
            if self.eat_keyword("from") {
                (Some(first), self.parse_expression()?)
            } else if explicit_mode {
                return Err(self.expected_keyword_error("FROM"));
            } else {
                (None, first)
            }
        };
        self.expect_builtin_rparen("TRIM")?;

        let mut args = vec![Expr::Lit(DocValue::Symbol(mode.to_owned()))];
        args.extend(chars);
        args.push(target);
        Ok(Expr::Call {
            name: "trim".to_owned(),
            args,
        })
    }

    /// `UNPIVOT(e)`.
    pub(crate) fn parse_unpivot(&mut self) -> Result<Expr, ParserError> {
        self.expect_builtin_lparen("UNPIVOT")?;
        let operand = self.parse_expression()?;
        self.expect_builtin_rparen("UNPIVOT")?;
        Ok(Expr::Unpivot(operand.boxed()))
    }

    // ── VALUES ──────────────────────────────────────────────────────────

    /// `VALUES (e, ...), (e, ...)` — every row must be parenthesized.
    pub(crate) fn parse_values(&mut self) -> Result<Expr, ParserError> {
        let mut rows = Vec::new();
        loop {
            if !self.eat_token(TokenType::LeftParen) {
                return Err(self.error(
                    ParseErrorCode::ExpectedLeftParenValueConstructor,
                    "VALUES rows must be parenthesized",
                ));
            }
            let mut row = vec![self.parse_expression()?];
            loop {
                if self.eat_token(TokenType::Comma) {
                    row.push(self.parse_expression()?);
                    continue;
                }
                if self.eat_token(TokenType::RightParen) {
                    break;
                }
                return Err(
                    self.expected_two_tokens_error(TokenType::Comma, TokenType::RightParen)
                );
            }
            rows.push(row);
            if !self.eat_token(TokenType::Comma) {
                break;
            }
        }
        Ok(Expr::Values(rows))
    }
}
