//! Table-driven DFA lexer.
//!
//! The machine is a once-built table of nodes over Unicode code points.
//! Each node carries a state kind, an optional lexeme classification, and
//! a replacement policy for the consumed code point; unknown transitions
//! fall through to an attached delegate node, which keeps "any character
//! in this class" branches compact. Only token-beginning states start a
//! new token and only token-ending states permit flushing one.
//!
//! Whitespace and comments lex as ordinary tokens of a whitespace
//! classification and are suppressed from the output stream. Backtick
//! embedded literals use a separate permissive sub-scanner because their
//! interior grammar (nested strings and comments) is not regular enough
//! for the table.

use std::sync::LazyLock;

use bigdecimal::BigDecimal;
use docql_ast::SourcePosition;
use docql_error::{ParseErrorCode, ParserError, PropertyBag, Property, PropertyValue};
use docql_types::{parse_doc, DocValue};
use tracing::trace;

use crate::token::{Token, TokenType, KEYWORDS, OPERATOR_WORDS};

// ---------------------------------------------------------------------------
// DFA table
// ---------------------------------------------------------------------------

/// State kinds. `begins_token` holds for Start and StartAndTerminal;
/// `ends_token` for StartAndTerminal and Terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StateKind {
    Initial,
    Start,
    StartAndTerminal,
    Incomplete,
    Terminal,
    Error,
}

impl StateKind {
    const fn ends_token(self) -> bool {
        matches!(self, Self::StartAndTerminal | Self::Terminal)
    }
}

/// What kind of token a terminal node flushes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LexType {
    /// A single punctuation mark with its dedicated token type.
    Punct(TokenType),
    /// An operator spelled with operator characters.
    Operator,
    /// A bare identifier (subject to keyword/operator reclassification).
    Identifier,
    /// A double-quoted identifier (case preserved, never reclassified).
    QuotedIdentifier,
    /// A single-quoted string literal.
    StringLit,
    /// An integer literal.
    Integer,
    /// A decimal literal (point or exponent form).
    Decimal,
    /// Whitespace or a comment; suppressed from the stream.
    Whitespace,
}

/// How the consumed code point is accumulated into the token value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Replacement {
    /// Append the code point as-is.
    Keep,
    /// Append nothing (enclosing quotes).
    Nothing,
}

/// An edge predicate.
enum Edge {
    /// Any of these exact characters.
    Chars(&'static str),
    /// A character class.
    Pred(fn(char) -> bool),
}

impl Edge {
    fn matches(&self, c: char) -> bool {
        match self {
            Self::Chars(set) => set.contains(c),
            Self::Pred(pred) => pred(c),
        }
    }
}

struct Node {
    kind: StateKind,
    lex_type: Option<LexType>,
    replacement: Replacement,
    delegate: Option<usize>,
    edges: Vec<(Edge, usize)>,
}

struct DfaTable {
    nodes: Vec<Node>,
    initial: usize,
}

impl DfaTable {
    /// Resolve a transition, following the delegate chain on a miss.
    fn transition(&self, from: usize, c: char) -> Option<usize> {
        let mut node = from;
        loop {
            for (edge, target) in &self.nodes[node].edges {
                if edge.matches(c) {
                    return Some(*target);
                }
            }
            node = self.nodes[node].delegate?;
        }
    }
}

struct Builder {
    nodes: Vec<Node>,
}

impl Builder {
    fn node(&mut self, kind: StateKind, lex_type: Option<LexType>, replacement: Replacement) -> usize {
        self.nodes.push(Node {
            kind,
            lex_type,
            replacement,
            delegate: None,
            edges: Vec::new(),
        });
        self.nodes.len() - 1
    }

    fn chars(&mut self, from: usize, set: &'static str, to: usize) {
        self.nodes[from].edges.push((Edge::Chars(set), to));
    }

    fn pred(&mut self, from: usize, pred: fn(char) -> bool, to: usize) {
        self.nodes[from].edges.push((Edge::Pred(pred), to));
    }

    fn delegate(&mut self, from: usize, to: usize) {
        self.nodes[from].delegate = Some(to);
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$'
}

fn is_ident_part(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

fn is_digit(c: char) -> bool {
    c.is_ascii_digit()
}

fn any(_: char) -> bool {
    true
}

fn not_newline(c: char) -> bool {
    c != '\n' && c != '\r'
}

/// Build the machine. Pure; runs once at first use.
#[allow(clippy::too_many_lines)]
fn build_table() -> DfaTable {
    use LexType as L;
    use Replacement::{Keep, Nothing};
    use StateKind as S;

    let mut b = Builder { nodes: Vec::new() };

    let initial = b.node(S::Initial, None, Nothing);
    let error = b.node(S::Error, None, Nothing);

    // Whitespace and comments.
    let ws = b.node(S::Terminal, Some(L::Whitespace), Keep);
    let line_comment = b.node(S::Terminal, Some(L::Whitespace), Keep);
    let block_comment = b.node(S::Incomplete, Some(L::Whitespace), Keep);
    let block_star = b.node(S::Incomplete, Some(L::Whitespace), Keep);
    let comment_end = b.node(S::Terminal, Some(L::Whitespace), Keep);

    // Punctuation.
    let lparen = b.node(S::StartAndTerminal, Some(L::Punct(TokenType::LeftParen)), Keep);
    let rparen = b.node(S::StartAndTerminal, Some(L::Punct(TokenType::RightParen)), Keep);
    let lbracket = b.node(S::StartAndTerminal, Some(L::Punct(TokenType::LeftBracket)), Keep);
    let rbracket = b.node(S::StartAndTerminal, Some(L::Punct(TokenType::RightBracket)), Keep);
    let lcurly = b.node(S::StartAndTerminal, Some(L::Punct(TokenType::LeftCurly)), Keep);
    let rcurly = b.node(S::StartAndTerminal, Some(L::Punct(TokenType::RightCurly)), Keep);
    let colon = b.node(S::StartAndTerminal, Some(L::Punct(TokenType::Colon)), Keep);
    let comma = b.node(S::StartAndTerminal, Some(L::Punct(TokenType::Comma)), Keep);
    let star = b.node(S::StartAndTerminal, Some(L::Punct(TokenType::Star)), Keep);
    let dot = b.node(S::StartAndTerminal, Some(L::Punct(TokenType::Dot)), Keep);

    // Operators.
    let op_single = b.node(S::StartAndTerminal, Some(L::Operator), Keep);
    let op_two = b.node(S::Terminal, Some(L::Operator), Keep);
    let op_lt = b.node(S::StartAndTerminal, Some(L::Operator), Keep);
    let op_gt = b.node(S::StartAndTerminal, Some(L::Operator), Keep);
    let op_bang = b.node(S::Start, Some(L::Operator), Keep);
    let op_pipe = b.node(S::Start, Some(L::Operator), Keep);
    let op_plus = b.node(S::StartAndTerminal, Some(L::Operator), Keep);
    let op_minus = b.node(S::StartAndTerminal, Some(L::Operator), Keep);
    let op_slash = b.node(S::StartAndTerminal, Some(L::Operator), Keep);

    // Numbers.
    let int = b.node(S::Terminal, Some(L::Integer), Keep);
    let int_dot = b.node(S::Terminal, Some(L::Decimal), Keep);
    let frac = b.node(S::Terminal, Some(L::Decimal), Keep);
    let exp_start = b.node(S::Incomplete, Some(L::Decimal), Keep);
    let exp_sign = b.node(S::Incomplete, Some(L::Decimal), Keep);
    let exp_digits = b.node(S::Terminal, Some(L::Decimal), Keep);

    // Identifiers.
    let ident = b.node(S::Terminal, Some(L::Identifier), Keep);

    // Double-quoted identifiers.
    let qid_open = b.node(S::Start, Some(L::QuotedIdentifier), Nothing);
    let qid_body = b.node(S::Incomplete, Some(L::QuotedIdentifier), Keep);
    let qid_close = b.node(S::Terminal, Some(L::QuotedIdentifier), Nothing);

    // Single-quoted strings. A quote inside the closed state re-enters the
    // body keeping the code point, which is exactly the `''` escape.
    let str_open = b.node(S::Start, Some(L::StringLit), Nothing);
    let str_body = b.node(S::Incomplete, Some(L::StringLit), Keep);
    let str_close = b.node(S::Terminal, Some(L::StringLit), Nothing);

    // -- wiring -------------------------------------------------------------

    b.pred(initial, char::is_whitespace, ws);
    b.chars(initial, "(", lparen);
    b.chars(initial, ")", rparen);
    b.chars(initial, "[", lbracket);
    b.chars(initial, "]", rbracket);
    b.chars(initial, "{", lcurly);
    b.chars(initial, "}", rcurly);
    b.chars(initial, ":", colon);
    b.chars(initial, ",", comma);
    b.chars(initial, "*", star);
    b.chars(initial, ".", dot);
    b.chars(initial, "=@%", op_single);
    b.chars(initial, "<", op_lt);
    b.chars(initial, ">", op_gt);
    b.chars(initial, "!", op_bang);
    b.chars(initial, "|", op_pipe);
    b.chars(initial, "+", op_plus);
    b.chars(initial, "-", op_minus);
    b.chars(initial, "/", op_slash);
    b.pred(initial, is_digit, int);
    b.pred(initial, is_ident_start, ident);
    b.chars(initial, "\"", qid_open);
    b.chars(initial, "'", str_open);

    b.pred(ws, char::is_whitespace, ws);

    b.pred(line_comment, not_newline, line_comment);
    b.pred(line_comment, any, ws);
    b.chars(block_comment, "*", block_star);
    b.pred(block_comment, any, block_comment);
    b.chars(block_star, "/", comment_end);
    b.chars(block_star, "*", block_star);
    b.delegate(block_star, block_comment);

    b.chars(op_lt, "=>", op_two);
    b.chars(op_gt, "=", op_two);
    b.chars(op_bang, "=", op_two);
    b.delegate(op_bang, error);
    b.chars(op_pipe, "|", op_two);
    b.pred(op_plus, is_digit, int);
    b.pred(op_minus, is_digit, int);
    b.chars(op_minus, "-", line_comment);
    b.chars(op_slash, "*", block_comment);

    b.pred(dot, is_digit, frac);

    b.pred(int, is_digit, int);
    b.chars(int, ".", int_dot);
    b.chars(int, "eE", exp_start);
    b.pred(int_dot, is_digit, frac);
    b.chars(int_dot, "eE", exp_start);
    b.pred(frac, is_digit, frac);
    b.chars(frac, "eE", exp_start);
    b.chars(exp_start, "+-", exp_sign);
    b.pred(exp_start, is_digit, exp_digits);
    b.pred(exp_sign, is_digit, exp_digits);
    b.pred(exp_digits, is_digit, exp_digits);

    b.pred(ident, is_ident_part, ident);

    b.chars(qid_open, "\"", qid_close);
    b.delegate(qid_open, qid_body);
    b.chars(qid_body, "\"", qid_close);
    b.pred(qid_body, any, qid_body);

    b.chars(str_open, "'", str_close);
    b.delegate(str_open, str_body);
    b.chars(str_body, "'", str_close);
    b.pred(str_body, any, str_body);
    b.chars(str_close, "'", str_body);

    DfaTable {
        nodes: b.nodes,
        initial,
    }
}

static DFA: LazyLock<DfaTable> = LazyLock::new(build_table);

// ---------------------------------------------------------------------------
// Scanner (code points + positions)
// ---------------------------------------------------------------------------

/// Advances one code point at a time. `CR`, `LF`, and `CR LF` all count
/// as one newline.
struct Scanner {
    chars: Vec<char>,
    idx: usize,
    line: u32,
    col: u32,
    prev_cr: bool,
}

impl Scanner {
    fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            idx: 0,
            line: 1,
            col: 1,
            prev_cr: false,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.idx).copied()
    }

    /// Position of the next (unconsumed) code point.
    fn position(&self) -> SourcePosition {
        SourcePosition::new(self.line, self.col)
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.idx += 1;
        match c {
            '\r' => {
                self.line += 1;
                self.col = 1;
                self.prev_cr = true;
            }
            '\n' if self.prev_cr => {
                self.prev_cr = false;
            }
            '\n' => {
                self.line += 1;
                self.col = 1;
            }
            _ => {
                self.col += 1;
                self.prev_cr = false;
            }
        }
        Some(c)
    }
}

// ---------------------------------------------------------------------------
// Lexer driver
// ---------------------------------------------------------------------------

/// Tokenize the whole source into a finite stream ending in EOF.
/// Whitespace and comment tokens are produced internally and suppressed.
pub fn tokenize(source: &str) -> Result<Vec<Token>, ParserError> {
    let table = &*DFA;
    let mut scanner = Scanner::new(source);
    let mut tokens = Vec::new();

    let mut state = table.initial;
    let mut value = String::new();
    let mut raw = String::new();
    let mut token_pos = scanner.position();

    loop {
        // Backtick embedded literals only begin at a token boundary.
        if state == table.initial && scanner.peek() == Some('`') {
            let pos = scanner.position();
            let token = scan_embedded_literal(&mut scanner, pos)?;
            tokens.push(token);
            token_pos = scanner.position();
            continue;
        }

        let Some(c) = scanner.peek() else {
            // EOF: a token in flight must be flushable.
            if state != table.initial {
                if table.nodes[state].kind.ends_token() {
                    flush(&table.nodes[state], &value, &raw, token_pos, &mut tokens)?;
                } else {
                    return Err(invalid_character(None, scanner.position()));
                }
            }
            tokens.push(Token {
                token_type: TokenType::Eof,
                value: DocValue::Null(docql_types::DocType::Null),
                text: String::new(),
                position: scanner.position(),
            });
            trace!(tokens = tokens.len(), "tokenized source");
            return Ok(tokens);
        };

        match table.transition(state, c) {
            Some(next) if table.nodes[next].kind == StateKind::Error => {
                return Err(invalid_character(Some(c), scanner.position()));
            }
            Some(next) => {
                let pos = scanner.position();
                scanner.advance();
                if state == table.initial {
                    token_pos = pos;
                    value.clear();
                    raw.clear();
                }
                raw.push(c);
                if table.nodes[next].replacement == Replacement::Keep {
                    value.push(c);
                }
                state = next;
            }
            None => {
                if table.nodes[state].kind.ends_token() {
                    flush(&table.nodes[state], &value, &raw, token_pos, &mut tokens)?;
                    value.clear();
                    raw.clear();
                    state = table.initial;
                    // Re-dispatch the same code point from the initial state.
                } else {
                    return Err(invalid_character(Some(c), scanner.position()));
                }
            }
        }
    }
}

fn invalid_character(c: Option<char>, pos: SourcePosition) -> ParserError {
    let repr = c.map_or_else(|| "<EOF>".to_owned(), |c| format!("'{c}'"));
    ParserError::new(
        ParseErrorCode::UnexpectedToken,
        format!("invalid character {repr}"),
        PropertyBag::new()
            .at(pos.line, pos.column)
            .with(Property::TokenValue, PropertyValue::Text(repr)),
    )
}

/// Turn a finished lexeme into a token (or drop it, for whitespace).
fn flush(
    node: &Node,
    value: &str,
    raw: &str,
    pos: SourcePosition,
    tokens: &mut Vec<Token>,
) -> Result<(), ParserError> {
    let lex_type = node
        .lex_type
        .expect("token-ending states always carry a lex type");
    let (token_type, payload) = match lex_type {
        LexType::Whitespace => return Ok(()),
        LexType::Punct(tt) => (tt, DocValue::Symbol(value.to_owned())),
        LexType::Operator => {
            // Alias normalization: `!=` is spelled `<>` canonically.
            let canonical = if value == "!=" { "<>" } else { value };
            (TokenType::Operator, DocValue::Symbol(canonical.to_owned()))
        }
        LexType::Identifier => classify_word(value),
        LexType::QuotedIdentifier => (TokenType::Identifier, DocValue::Symbol(value.to_owned())),
        LexType::StringLit => (TokenType::Literal, DocValue::String(value.to_owned())),
        LexType::Integer => {
            let parsed = value.parse::<i64>().map_err(|_| {
                ParserError::new(
                    ParseErrorCode::UnexpectedToken,
                    format!("integer literal '{value}' out of range"),
                    PropertyBag::new()
                        .at(pos.line, pos.column)
                        .with(Property::TokenValue, PropertyValue::Text(value.to_owned())),
                )
            })?;
            (TokenType::Literal, DocValue::Int(parsed))
        }
        LexType::Decimal => {
            let normalized = normalize_decimal_text(value);
            let parsed = normalized.parse::<BigDecimal>().map_err(|_| {
                ParserError::new(
                    ParseErrorCode::UnexpectedToken,
                    format!("invalid numeric literal '{value}'"),
                    PropertyBag::new()
                        .at(pos.line, pos.column)
                        .with(Property::TokenValue, PropertyValue::Text(value.to_owned())),
                )
            })?;
            (TokenType::Literal, DocValue::Decimal(parsed))
        }
    };
    tokens.push(Token {
        token_type,
        value: payload,
        text: raw.to_owned(),
        position: pos,
    });
    Ok(())
}

/// `.5` and `1.` are legal lexemes; the numeric parser wants `0.5` / `1`.
fn normalize_decimal_text(value: &str) -> String {
    let mut text = value.strip_prefix('+').unwrap_or(value).to_owned();
    if let Some(rest) = text.strip_prefix('.') {
        text = format!("0.{rest}");
    } else if let Some(rest) = text.strip_prefix("-.") {
        text = format!("-0.{rest}");
    }
    if let Some(trimmed) = text.strip_suffix('.') {
        text = trimmed.to_owned();
    }
    text
}

/// Reclassify a bare identifier: keyword, word operator, or boolean literal.
fn classify_word(text: &str) -> (TokenType, DocValue) {
    let lower = text.to_lowercase();
    if lower == "true" || lower == "false" {
        return (TokenType::Literal, DocValue::Bool(lower == "true"));
    }
    if KEYWORDS.contains(&lower.as_str()) {
        return (TokenType::Keyword, DocValue::Symbol(lower));
    }
    if OPERATOR_WORDS.contains(&lower.as_str()) {
        return (TokenType::Operator, DocValue::Symbol(lower));
    }
    (TokenType::Identifier, DocValue::Symbol(text.to_owned()))
}

// ---------------------------------------------------------------------------
// Backtick embedded literals
// ---------------------------------------------------------------------------

/// Scan a backtick-quoted embedded literal.
///
/// Permissive: the interior is the embedding data syntax, so nested
/// single- and triple-quoted strings, double-quoted strings with
/// backslash escapes, and both comment forms are honored — any of them
/// may contain a backtick that must not terminate the token.
fn scan_embedded_literal(
    scanner: &mut Scanner,
    pos: SourcePosition,
) -> Result<Token, ParserError> {
    scanner.advance(); // opening backtick
    let mut inner = String::new();

    loop {
        let Some(c) = scanner.advance() else {
            return Err(invalid_character(None, scanner.position()));
        };
        match c {
            '`' => break,
            '"' => {
                inner.push(c);
                scan_quoted(scanner, &mut inner, '"', true)?;
            }
            '\'' => {
                inner.push(c);
                if scanner.peek() == Some('\'') {
                    inner.push('\'');
                    scanner.advance();
                    if scanner.peek() == Some('\'') {
                        // Triple-quoted long string.
                        inner.push('\'');
                        scanner.advance();
                        scan_long_quoted(scanner, &mut inner)?;
                    }
                    // Otherwise an empty symbol; already consumed.
                } else {
                    scan_quoted(scanner, &mut inner, '\'', true)?;
                }
            }
            '/' if scanner.peek() == Some('/') => {
                inner.push(c);
                while let Some(c) = scanner.peek() {
                    if c == '\n' || c == '\r' {
                        break;
                    }
                    inner.push(c);
                    scanner.advance();
                }
            }
            '/' if scanner.peek() == Some('*') => {
                inner.push(c);
                inner.push('*');
                scanner.advance();
                loop {
                    let Some(c) = scanner.advance() else {
                        return Err(invalid_character(None, scanner.position()));
                    };
                    inner.push(c);
                    if c == '*' && scanner.peek() == Some('/') {
                        inner.push('/');
                        scanner.advance();
                        break;
                    }
                }
            }
            other => inner.push(other),
        }
    }

    let value = parse_doc(&inner).map_err(|e| {
        ParserError::new(
            ParseErrorCode::UnexpectedToken,
            format!("invalid embedded literal: {e}"),
            PropertyBag::new().at(pos.line, pos.column),
        )
    })?;
    Ok(Token {
        token_type: TokenType::EmbeddedLiteral,
        value,
        text: format!("`{inner}`"),
        position: pos,
    })
}

/// Copy a quoted span (including the closing quote), honoring backslash
/// escapes when `escapes` is set.
fn scan_quoted(
    scanner: &mut Scanner,
    out: &mut String,
    quote: char,
    escapes: bool,
) -> Result<(), ParserError> {
    loop {
        let Some(c) = scanner.advance() else {
            return Err(invalid_character(None, scanner.position()));
        };
        out.push(c);
        if escapes && c == '\\' {
            let Some(next) = scanner.advance() else {
                return Err(invalid_character(None, scanner.position()));
            };
            out.push(next);
        } else if c == quote {
            return Ok(());
        }
    }
}

/// Copy a `'''...'''` span including the closing quotes.
fn scan_long_quoted(scanner: &mut Scanner, out: &mut String) -> Result<(), ParserError> {
    let mut run = 0;
    loop {
        let Some(c) = scanner.advance() else {
            return Err(invalid_character(None, scanner.position()));
        };
        if c == '\\' {
            out.push(c);
            let Some(next) = scanner.advance() else {
                return Err(invalid_character(None, scanner.position()));
            };
            out.push(next);
            run = 0;
            continue;
        }
        out.push(c);
        if c == '\'' {
            run += 1;
            if run == 3 {
                return Ok(());
            }
        } else {
            run = 0;
        }
    }
}
