//! Reader and writer for the document text form.
//!
//! The reader parses exactly one top-level value; a second value where one
//! is expected (a datagram) is rejected. The writer produces canonical
//! text that the reader round-trips, which is what the conformance wire
//! and the AST parity tests rely on.

use std::error::Error;
use std::fmt;
use std::fmt::Write as _;

use bigdecimal::BigDecimal;

use crate::timestamp::{format_timestamp, parse_timestamp};
use crate::value::{DocType, DocValue};

/// Error raised by [`parse_doc`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocTextError {
    /// What went wrong.
    pub message: String,
    /// Code-point offset into the input.
    pub offset: usize,
}

impl DocTextError {
    fn new(message: impl Into<String>, offset: usize) -> Self {
        Self {
            message: message.into(),
            offset,
        }
    }
}

impl fmt::Display for DocTextError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at offset {}", self.message, self.offset)
    }
}

impl Error for DocTextError {}

/// Parse a single document value from text.
pub fn parse_doc(text: &str) -> Result<DocValue, DocTextError> {
    let mut reader = Reader::new(text);
    reader.skip_trivia()?;
    let value = reader.parse_value()?;
    reader.skip_trivia()?;
    if reader.peek().is_some() {
        return Err(reader.error("expected a single top-level value"));
    }
    Ok(value)
}

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

struct Reader {
    chars: Vec<char>,
    pos: usize,
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$'
}

fn is_ident_part(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

fn is_operator_char(c: char) -> bool {
    "+-*/<>=!|%&?@^~.".contains(c)
}

impl Reader {
    fn new(text: &str) -> Self {
        Self {
            chars: text.chars().collect(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_str(&mut self, s: &str) -> bool {
        let mut offset = 0;
        for c in s.chars() {
            if self.peek_at(offset) != Some(c) {
                return false;
            }
            offset += 1;
        }
        self.pos += offset;
        true
    }

    fn error(&self, message: impl Into<String>) -> DocTextError {
        DocTextError::new(message, self.pos)
    }

    fn expect(&mut self, c: char) -> Result<(), DocTextError> {
        if self.eat(c) {
            Ok(())
        } else {
            Err(self.error(format!("expected '{c}'")))
        }
    }

    /// Skip whitespace and `//` / `/* */` comments.
    fn skip_trivia(&mut self) -> Result<(), DocTextError> {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.pos += 1;
                }
                Some('/') if self.peek_at(1) == Some('/') => {
                    while let Some(c) = self.bump() {
                        if c == '\n' {
                            break;
                        }
                    }
                }
                Some('/') if self.peek_at(1) == Some('*') => {
                    self.pos += 2;
                    loop {
                        match self.bump() {
                            Some('*') if self.peek() == Some('/') => {
                                self.pos += 1;
                                break;
                            }
                            Some(_) => {}
                            None => return Err(self.error("unterminated block comment")),
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    // -- values -------------------------------------------------------------

    fn parse_value(&mut self) -> Result<DocValue, DocTextError> {
        let annotations = self.parse_annotations()?;
        let value = self.parse_core_value()?;

        // The annotated typed null `missing::null.symbol` encodes MISSING.
        // Every other annotation is accepted and discarded.
        if annotations.len() == 1
            && annotations[0] == "missing"
            && value == DocValue::Null(DocType::Symbol)
        {
            return Ok(DocValue::Missing);
        }
        Ok(value)
    }

    fn parse_annotations(&mut self) -> Result<Vec<String>, DocTextError> {
        let mut annotations = Vec::new();
        loop {
            self.skip_trivia()?;
            let mark = self.pos;
            let text = match self.peek() {
                Some('\'') if self.peek_at(1) != Some('\'') => {
                    match self.parse_quoted_symbol_text() {
                        Ok(t) => t,
                        Err(_) => {
                            self.pos = mark;
                            break;
                        }
                    }
                }
                Some(c) if is_ident_start(c) => self.parse_bare_ident(),
                _ => break,
            };
            self.skip_trivia()?;
            if self.eat_str("::") {
                annotations.push(text);
            } else {
                self.pos = mark;
                break;
            }
        }
        Ok(annotations)
    }

    fn parse_core_value(&mut self) -> Result<DocValue, DocTextError> {
        self.skip_trivia()?;
        match self.peek() {
            None => Err(self.error("unexpected end of input")),
            Some('[') => self.parse_list(),
            Some('(') => self.parse_sexp(),
            Some('{') if self.peek_at(1) == Some('{') => self.parse_lob(),
            Some('{') => self.parse_struct(),
            Some('"') => Ok(DocValue::String(self.parse_quoted_string()?)),
            Some('\'') if self.peek_at(1) == Some('\'') && self.peek_at(2) == Some('\'') => {
                Ok(DocValue::String(self.parse_long_string()?))
            }
            Some('\'') => Ok(DocValue::Symbol(self.parse_quoted_symbol_text()?)),
            Some(c) if c.is_ascii_digit() => self.parse_number_or_timestamp(),
            Some(c) if (c == '-' || c == '+')
                && (self.peek_at(1).is_some_and(|d| d.is_ascii_digit())
                    || (self.peek_at(1) == Some('i')
                        && self.peek_at(2) == Some('n')
                        && self.peek_at(3) == Some('f'))) =>
            {
                self.parse_number_or_timestamp()
            }
            Some(c) if is_ident_start(c) => self.parse_bare_token(),
            Some(c) if is_operator_char(c) => {
                let mut text = String::new();
                while let Some(c) = self.peek() {
                    if is_operator_char(c) {
                        text.push(c);
                        self.pos += 1;
                    } else {
                        break;
                    }
                }
                Ok(DocValue::Symbol(text))
            }
            Some(c) => Err(self.error(format!("unexpected character '{c}'"))),
        }
    }

    fn parse_bare_ident(&mut self) -> String {
        let mut text = String::new();
        while let Some(c) = self.peek() {
            if is_ident_part(c) {
                text.push(c);
                self.pos += 1;
            } else {
                break;
            }
        }
        text
    }

    fn parse_bare_token(&mut self) -> Result<DocValue, DocTextError> {
        let text = self.parse_bare_ident();
        match text.as_str() {
            "true" => Ok(DocValue::Bool(true)),
            "false" => Ok(DocValue::Bool(false)),
            "nan" => Ok(DocValue::Float(f64::NAN)),
            "null" => {
                if self.eat('.') {
                    let suffix = self.parse_bare_ident();
                    DocType::from_null_suffix(&suffix)
                        .map(DocValue::Null)
                        .ok_or_else(|| self.error(format!("unknown null type 'null.{suffix}'")))
                } else {
                    Ok(DocValue::Null(DocType::Null))
                }
            }
            _ => Ok(DocValue::Symbol(text)),
        }
    }

    // -- numbers and timestamps ---------------------------------------------

    fn parse_number_or_timestamp(&mut self) -> Result<DocValue, DocTextError> {
        // Timestamps start with exactly four digits followed by `-` or `T`.
        if self.looks_like_timestamp() {
            return self.parse_timestamp_text();
        }

        let negative = match self.peek() {
            Some('-') => {
                self.pos += 1;
                true
            }
            Some('+') => {
                self.pos += 1;
                false
            }
            _ => false,
        };

        // `+inf` / `-inf` special floats (the sign is mandatory; a bare
        // `inf` reads as a symbol).
        if self.eat_str("inf") {
            return Ok(DocValue::Float(if negative {
                f64::NEG_INFINITY
            } else {
                f64::INFINITY
            }));
        }

        // Radix-prefixed integers.
        if self.peek() == Some('0') && matches!(self.peek_at(1), Some('x' | 'X')) {
            self.pos += 2;
            return self.parse_radix_digits(16, negative, |c: char| c.is_ascii_hexdigit());
        }
        if self.peek() == Some('0') && matches!(self.peek_at(1), Some('b' | 'B')) {
            self.pos += 2;
            return self.parse_radix_digits(2, negative, |c: char| c == '0' || c == '1');
        }

        let mut digits = String::new();
        if negative {
            digits.push('-');
        }
        self.scan_digits(&mut digits)?;

        let mut is_decimal = false;
        let mut is_float = false;

        if self.peek() == Some('.') {
            is_decimal = true;
            self.pos += 1;
            // A trailing dot (`10.`) is a valid scale-zero decimal.
            if self.peek().is_some_and(|c| c.is_ascii_digit()) {
                digits.push('.');
                self.scan_digits(&mut digits)?;
            }
        }

        match self.peek() {
            Some('e' | 'E') => {
                is_float = true;
                digits.push('e');
                self.pos += 1;
                self.scan_exponent(&mut digits)?;
            }
            Some('d' | 'D') => {
                is_decimal = true;
                digits.push('e');
                self.pos += 1;
                self.scan_exponent(&mut digits)?;
            }
            _ => {}
        }

        if is_float {
            digits
                .parse::<f64>()
                .map(DocValue::Float)
                .map_err(|_| self.error(format!("invalid float '{digits}'")))
        } else if is_decimal {
            digits
                .parse::<BigDecimal>()
                .map(DocValue::Decimal)
                .map_err(|_| self.error(format!("invalid decimal '{digits}'")))
        } else {
            digits
                .parse::<i64>()
                .map(DocValue::Int)
                .map_err(|_| self.error(format!("integer '{digits}' out of range")))
        }
    }

    fn scan_digits(&mut self, out: &mut String) -> Result<(), DocTextError> {
        let mut any = false;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                out.push(c);
                self.pos += 1;
                any = true;
            } else if c == '_' {
                self.pos += 1;
            } else {
                break;
            }
        }
        if any {
            Ok(())
        } else {
            Err(self.error("expected digits"))
        }
    }

    fn scan_exponent(&mut self, out: &mut String) -> Result<(), DocTextError> {
        if let Some(c @ ('+' | '-')) = self.peek() {
            out.push(c);
            self.pos += 1;
        }
        self.scan_digits(out)
    }

    fn parse_radix_digits(
        &mut self,
        radix: u32,
        negative: bool,
        valid: impl Fn(char) -> bool,
    ) -> Result<DocValue, DocTextError> {
        let mut digits = String::new();
        while let Some(c) = self.peek() {
            if valid(c) {
                digits.push(c);
                self.pos += 1;
            } else if c == '_' {
                self.pos += 1;
            } else {
                break;
            }
        }
        if digits.is_empty() {
            return Err(self.error("expected digits after radix prefix"));
        }
        let magnitude = i64::from_str_radix(&digits, radix)
            .map_err(|_| self.error(format!("integer '{digits}' out of range")))?;
        Ok(DocValue::Int(if negative { -magnitude } else { magnitude }))
    }

    fn looks_like_timestamp(&self) -> bool {
        (0..4).all(|i| self.peek_at(i).is_some_and(|c| c.is_ascii_digit()))
            && matches!(self.peek_at(4), Some('-' | 'T'))
    }

    fn parse_timestamp_text(&mut self) -> Result<DocValue, DocTextError> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() || "-T:.Zz+".contains(c) {
                self.pos += 1;
            } else {
                break;
            }
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        parse_timestamp(&text)
            .map(DocValue::Timestamp)
            .ok_or_else(|| self.error(format!("invalid timestamp '{text}'")))
    }

    // -- text scalars --------------------------------------------------------

    fn parse_quoted_string(&mut self) -> Result<String, DocTextError> {
        self.expect('"')?;
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err(self.error("unterminated string")),
                Some('"') => return Ok(out),
                Some('\\') => out.push_str(&self.parse_escape()?),
                Some(c) => out.push(c),
            }
        }
    }

    fn parse_quoted_symbol_text(&mut self) -> Result<String, DocTextError> {
        self.expect('\'')?;
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err(self.error("unterminated symbol")),
                Some('\'') => return Ok(out),
                Some('\\') => out.push_str(&self.parse_escape()?),
                Some(c) => out.push(c),
            }
        }
    }

    /// One or more adjacent `'''…'''` segments, concatenated.
    fn parse_long_string(&mut self) -> Result<String, DocTextError> {
        let mut out = String::new();
        loop {
            self.expect('\'')?;
            self.expect('\'')?;
            self.expect('\'')?;
            loop {
                match self.bump() {
                    None => return Err(self.error("unterminated long string")),
                    Some('\'') if self.peek() == Some('\'') && self.peek_at(1) == Some('\'') => {
                        self.pos += 2;
                        break;
                    }
                    Some('\\') => out.push_str(&self.parse_escape()?),
                    Some(c) => out.push(c),
                }
            }
            let mark = self.pos;
            self.skip_trivia()?;
            if !(self.peek() == Some('\'')
                && self.peek_at(1) == Some('\'')
                && self.peek_at(2) == Some('\''))
            {
                self.pos = mark;
                return Ok(out);
            }
        }
    }

    fn parse_escape(&mut self) -> Result<String, DocTextError> {
        let c = self
            .bump()
            .ok_or_else(|| self.error("unterminated escape"))?;
        Ok(match c {
            'n' => "\n".to_owned(),
            't' => "\t".to_owned(),
            'r' => "\r".to_owned(),
            '0' => "\0".to_owned(),
            '\\' | '"' | '\'' | '/' => c.to_string(),
            // An escaped newline is a line continuation.
            '\n' => String::new(),
            'x' => self.parse_hex_escape(2)?,
            'u' => self.parse_hex_escape(4)?,
            other => return Err(self.error(format!("invalid escape '\\{other}'"))),
        })
    }

    fn parse_hex_escape(&mut self, len: usize) -> Result<String, DocTextError> {
        let mut code = 0u32;
        for _ in 0..len {
            let c = self
                .bump()
                .ok_or_else(|| self.error("unterminated escape"))?;
            let digit = c
                .to_digit(16)
                .ok_or_else(|| self.error(format!("invalid hex digit '{c}'")))?;
            code = code * 16 + digit;
        }
        char::from_u32(code)
            .map(|c| c.to_string())
            .ok_or_else(|| self.error("invalid character escape"))
    }

    // -- containers ----------------------------------------------------------

    fn parse_list(&mut self) -> Result<DocValue, DocTextError> {
        self.expect('[')?;
        let mut items = Vec::new();
        loop {
            self.skip_trivia()?;
            if self.eat(']') {
                return Ok(DocValue::List(items));
            }
            items.push(self.parse_value()?);
            self.skip_trivia()?;
            if !self.eat(',') && self.peek() != Some(']') {
                return Err(self.error("expected ',' or ']'"));
            }
        }
    }

    fn parse_sexp(&mut self) -> Result<DocValue, DocTextError> {
        self.expect('(')?;
        let mut items = Vec::new();
        loop {
            self.skip_trivia()?;
            if self.eat(')') {
                return Ok(DocValue::Sexp(items));
            }
            items.push(self.parse_value()?);
        }
    }

    fn parse_struct(&mut self) -> Result<DocValue, DocTextError> {
        self.expect('{')?;
        let mut fields = Vec::new();
        loop {
            self.skip_trivia()?;
            if self.eat('}') {
                return Ok(DocValue::Struct(fields));
            }
            let name = match self.peek() {
                Some('"') => self.parse_quoted_string()?,
                Some('\'') => self.parse_quoted_symbol_text()?,
                Some(c) if is_ident_start(c) => self.parse_bare_ident(),
                _ => return Err(self.error("expected a field name")),
            };
            self.skip_trivia()?;
            self.expect(':')?;
            let value = self.parse_value()?;
            fields.push((name, value));
            self.skip_trivia()?;
            if !self.eat(',') && self.peek() != Some('}') {
                return Err(self.error("expected ',' or '}'"));
            }
        }
    }

    /// `{{base64}}` blobs and `{{"text"}}` clobs.
    fn parse_lob(&mut self) -> Result<DocValue, DocTextError> {
        self.expect('{')?;
        self.expect('{')?;
        self.skip_trivia()?;
        if self.peek() == Some('"') {
            let text = self.parse_quoted_string()?;
            self.skip_trivia()?;
            self.expect('}')?;
            self.expect('}')?;
            return Ok(DocValue::Clob(text.into_bytes()));
        }
        let mut encoded = String::new();
        while let Some(c) = self.peek() {
            if c == '}' {
                break;
            }
            if !c.is_whitespace() {
                encoded.push(c);
            }
            self.pos += 1;
        }
        self.expect('}')?;
        self.expect('}')?;
        base64_decode(&encoded)
            .map(DocValue::Blob)
            .ok_or_else(|| self.error("invalid base64 in blob"))
    }
}

// ---------------------------------------------------------------------------
// Base64 (standard alphabet, padded)
// ---------------------------------------------------------------------------

const BASE64_ALPHABET: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

fn base64_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len().div_ceil(3) * 4);
    for chunk in bytes.chunks(3) {
        let b = [chunk[0], *chunk.get(1).unwrap_or(&0), *chunk.get(2).unwrap_or(&0)];
        let n = (u32::from(b[0]) << 16) | (u32::from(b[1]) << 8) | u32::from(b[2]);
        let chars = [
            BASE64_ALPHABET[(n >> 18) as usize & 0x3f],
            BASE64_ALPHABET[(n >> 12) as usize & 0x3f],
            BASE64_ALPHABET[(n >> 6) as usize & 0x3f],
            BASE64_ALPHABET[n as usize & 0x3f],
        ];
        let keep = chunk.len() + 1;
        for (i, c) in chars.into_iter().enumerate() {
            out.push(if i < keep { char::from(c) } else { '=' });
        }
    }
    out
}

fn base64_decode(text: &str) -> Option<Vec<u8>> {
    let trimmed = text.trim_end_matches('=');
    if text.len() % 4 != 0 && !text.is_empty() {
        return None;
    }
    let mut out = Vec::with_capacity(trimmed.len() * 3 / 4);
    let mut buffer = 0u32;
    let mut bits = 0u32;
    for c in trimmed.bytes() {
        let sextet = BASE64_ALPHABET.iter().position(|&a| a == c)? as u32;
        buffer = (buffer << 6) | sextet;
        bits += 6;
        if bits >= 8 {
            bits -= 8;
            out.push((buffer >> bits) as u8);
        }
    }
    Some(out)
}

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

impl fmt::Display for DocValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing => f.write_str("missing::null.symbol"),
            Self::Null(DocType::Null) => f.write_str("null"),
            Self::Null(t) => write!(f, "null.{}", t.null_suffix()),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(v) => f.write_str(&format_float(*v)),
            Self::Decimal(d) => f.write_str(&format_decimal(d)),
            Self::Timestamp(ts) => f.write_str(&format_timestamp(ts)),
            Self::Symbol(s) => write_symbol(f, s),
            Self::String(s) => write_quoted(f, s, '"'),
            Self::Clob(bytes) => write_clob(f, bytes),
            Self::Blob(bytes) => write!(f, "{{{{{}}}}}", base64_encode(bytes)),
            Self::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Self::Sexp(items) => {
                f.write_str("(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str(")")
            }
            Self::Struct(fields) => {
                f.write_str("{")?;
                for (i, (name, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    if is_bare_symbol(name) {
                        f.write_str(name)?;
                    } else {
                        write_quoted(f, name, '"')?;
                    }
                    write!(f, ": {value}")?;
                }
                f.write_str("}")
            }
        }
    }
}

/// Floats always carry an `e` exponent so they never read back as decimals.
fn format_float(v: f64) -> String {
    if v.is_nan() {
        "nan".to_owned()
    } else if v == f64::INFINITY {
        "+inf".to_owned()
    } else if v == f64::NEG_INFINITY {
        "-inf".to_owned()
    } else {
        format!("{v:e}")
    }
}

/// Decimals keep their scale: point notation for positive scales, a `d`
/// exponent (or trailing dot) otherwise, so the type and scale round-trip.
fn format_decimal(d: &BigDecimal) -> String {
    let (digits, scale) = d.as_bigint_and_exponent();
    let mut text = digits.to_string();
    let negative = text.starts_with('-');
    if negative {
        text.remove(0);
    }
    let mut out = String::new();
    if negative {
        out.push('-');
    }
    if scale > 0 {
        #[allow(clippy::cast_possible_truncation)]
        let scale = scale as usize;
        if text.len() <= scale {
            out.push_str("0.");
            for _ in 0..(scale - text.len()) {
                out.push('0');
            }
            out.push_str(&text);
        } else {
            let point = text.len() - scale;
            out.push_str(&text[..point]);
            out.push('.');
            out.push_str(&text[point..]);
        }
    } else if scale == 0 {
        out.push_str(&text);
        out.push('.');
    } else {
        let _ = write!(out, "{text}d{}", -scale);
    }
    out
}

fn is_bare_symbol(s: &str) -> bool {
    let mut chars = s.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if !is_ident_start(first) {
        return false;
    }
    chars.all(is_ident_part) && !matches!(s, "null" | "true" | "false" | "nan")
}

fn write_symbol(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    if is_bare_symbol(s) || (!s.is_empty() && s.chars().all(is_operator_char)) {
        f.write_str(s)
    } else {
        write_quoted(f, s, '\'')
    }
}

fn write_quoted(f: &mut fmt::Formatter<'_>, s: &str, quote: char) -> fmt::Result {
    f.write_char(quote)?;
    for c in s.chars() {
        match c {
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\t' => f.write_str("\\t")?,
            '\r' => f.write_str("\\r")?,
            '\0' => f.write_str("\\0")?,
            c if c == quote => write!(f, "\\{c}")?,
            c if (c as u32) < 0x20 => write!(f, "\\x{:02x}", c as u32)?,
            c => f.write_char(c)?,
        }
    }
    f.write_char(quote)
}

fn write_clob(f: &mut fmt::Formatter<'_>, bytes: &[u8]) -> fmt::Result {
    f.write_str("{{\"")?;
    for &b in bytes {
        match b {
            b'\\' => f.write_str("\\\\")?,
            b'"' => f.write_str("\\\"")?,
            b'\n' => f.write_str("\\n")?,
            b'\t' => f.write_str("\\t")?,
            b'\r' => f.write_str("\\r")?,
            0x20..=0x7e => f.write_char(char::from(b))?,
            _ => write!(f, "\\x{b:02x}")?,
        }
    }
    f.write_str("\"}}")
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    fn parse(text: &str) -> DocValue {
        parse_doc(text).expect("input should parse")
    }

    #[test]
    fn parses_scalars() {
        assert_eq!(parse("null"), DocValue::Null(DocType::Null));
        assert_eq!(parse("null.int"), DocValue::Null(DocType::Int));
        assert_eq!(parse("true"), DocValue::Bool(true));
        assert_eq!(parse("42"), DocValue::Int(42));
        assert_eq!(parse("-7"), DocValue::Int(-7));
        assert_eq!(parse("0x2A"), DocValue::Int(42));
        assert_eq!(parse("-0b101"), DocValue::Int(-5));
        assert_eq!(parse("a_symbol"), DocValue::Symbol("a_symbol".to_owned()));
        assert_eq!(parse("'hi there'"), DocValue::Symbol("hi there".to_owned()));
        assert_eq!(parse("\"hello\""), DocValue::String("hello".to_owned()));
    }

    #[test]
    fn parses_missing_encoding() {
        assert_eq!(parse("missing::null.symbol"), DocValue::Missing);
        // Any other annotated typed null is not MISSING.
        assert_eq!(parse("missing::null.string"), DocValue::Null(DocType::String));
        assert_eq!(parse("other::null.symbol"), DocValue::Null(DocType::Symbol));
    }

    #[test]
    fn number_classification() {
        assert_eq!(parse("1"), DocValue::Int(1));
        assert_eq!(
            parse("1.0"),
            DocValue::Decimal(BigDecimal::from_str("1.0").expect("decimal"))
        );
        assert_eq!(
            parse("10."),
            DocValue::Decimal(BigDecimal::from_str("10").expect("decimal"))
        );
        assert_eq!(
            parse("15d-1"),
            DocValue::Decimal(BigDecimal::from_str("1.5").expect("decimal"))
        );
        assert_eq!(parse("1e0"), DocValue::Float(1.0));
        assert_eq!(parse("1.5e-2"), DocValue::Float(0.015));
        assert_eq!(parse("+inf"), DocValue::Float(f64::INFINITY));
    }

    #[test]
    fn parses_timestamps() {
        let ts = parse("2007-02-23T12:14Z");
        assert_eq!(ts.doc_type(), DocType::Timestamp);
        assert_eq!(ts, parse("2007-02-23T12:14:00Z"));
    }

    #[test]
    fn parses_containers() {
        assert_eq!(
            parse("[1, 2, 3]"),
            DocValue::List(vec![DocValue::Int(1), DocValue::Int(2), DocValue::Int(3)])
        );
        assert_eq!(
            parse("(bag 1 2)"),
            DocValue::Sexp(vec![
                DocValue::Symbol("bag".to_owned()),
                DocValue::Int(1),
                DocValue::Int(2),
            ])
        );
        assert_eq!(
            parse("{name: \"Kumo\", 'age': 7}"),
            DocValue::Struct(vec![
                ("name".to_owned(), DocValue::String("Kumo".to_owned())),
                ("age".to_owned(), DocValue::Int(7)),
            ])
        );
    }

    #[test]
    fn sexp_accepts_operator_symbols() {
        assert_eq!(
            parse("(+ 1 2)"),
            DocValue::Sexp(vec![
                DocValue::Symbol("+".to_owned()),
                DocValue::Int(1),
                DocValue::Int(2),
            ])
        );
    }

    #[test]
    fn parses_lobs() {
        assert_eq!(parse("{{aGk=}}"), DocValue::Blob(b"hi".to_vec()));
        assert_eq!(parse("{{\"hi\"}}"), DocValue::Clob(b"hi".to_vec()));
        assert_eq!(parse("{{}}"), DocValue::Blob(vec![]));
    }

    #[test]
    fn parses_long_strings() {
        assert_eq!(parse("'''hello'''"), DocValue::String("hello".to_owned()));
        assert_eq!(
            parse("'''one ''' '''two'''"),
            DocValue::String("one two".to_owned())
        );
        assert_eq!(
            parse("'''has ` and ''' '''/* not a comment */'''"),
            DocValue::String("has ` and /* not a comment */".to_owned())
        );
    }

    #[test]
    fn skips_comments() {
        assert_eq!(parse("// leading\n[1, /* mid */ 2]"), parse("[1, 2]"));
    }

    #[test]
    fn rejects_datagrams() {
        let err = parse_doc("1 2").expect_err("two values must be rejected");
        assert!(err.message.contains("single top-level value"));
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_doc("").is_err());
        assert!(parse_doc("[1,").is_err());
        assert!(parse_doc("{a}").is_err());
        assert!(parse_doc("null.bogus").is_err());
        assert!(parse_doc("'unterminated").is_err());
    }

    #[test]
    fn base64_round_trip() {
        for bytes in [&b""[..], b"a", b"ab", b"abc", b"\x00\xff\x10"] {
            let encoded = base64_encode(bytes);
            assert_eq!(base64_decode(&encoded).as_deref(), Some(bytes));
        }
        assert_eq!(base64_encode(b"hi"), "aGk=");
    }

    #[test]
    fn writer_round_trips() {
        let cases = [
            "missing::null.symbol",
            "null",
            "null.int",
            "true",
            "-42",
            "1.50",
            "10.",
            "1e0",
            "2007-02-23T12:14:00Z",
            "hello",
            "'quoted sym'",
            "\"a \\\"string\\\"\"",
            "{{aGk=}}",
            "[1, [2], {a: 3}]",
            "(bag 1 1 2)",
            "{name: \"Kumo\", 'odd key': 1}",
        ];
        for case in cases {
            let value = parse(case);
            let printed = value.to_string();
            assert_eq!(parse(&printed), value, "round-trip failed for {case}: {printed}");
        }
    }

    #[test]
    fn decimal_formatting_keeps_scale() {
        assert_eq!(parse("1.50").to_string(), "1.50");
        assert_eq!(parse("0.005").to_string(), "0.005");
        assert_eq!(parse("10.").to_string(), "10.");
        assert_eq!(parse("15d1").to_string(), "15d1");
        assert_eq!(parse("-1.5").to_string(), "-1.5");
    }
}
