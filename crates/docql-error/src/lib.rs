//! Error taxonomy for the DocQL pipeline.
//!
//! Two families: parse errors and evaluation errors. Each carries a
//! machine-readable code plus a typed property map (line/column, offending
//! token, expected-token details, cast endpoints). Errors are never
//! recovered internally; they propagate to the embedder. The `internal`
//! flag distinguishes user-facing errors from bugs in the engine.

use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;

use docql_types::DocValue;

// ---------------------------------------------------------------------------
// Property map
// ---------------------------------------------------------------------------

/// Keys of the error property map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Property {
    LineNumber,
    ColumnNumber,
    TokenType,
    TokenValue,
    Keyword,
    ExpectedTokenType,
    ExpectedTokenType1Of2,
    ExpectedTokenType2Of2,
    ExpectedArityMin,
    ExpectedArityMax,
    CastFrom,
    CastTo,
}

impl Property {
    /// The canonical upper-snake name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::LineNumber => "LINE_NUMBER",
            Self::ColumnNumber => "COLUMN_NUMBER",
            Self::TokenType => "TOKEN_TYPE",
            Self::TokenValue => "TOKEN_VALUE",
            Self::Keyword => "KEYWORD",
            Self::ExpectedTokenType => "EXPECTED_TOKEN_TYPE",
            Self::ExpectedTokenType1Of2 => "EXPECTED_TOKEN_TYPE_1_OF_2",
            Self::ExpectedTokenType2Of2 => "EXPECTED_TOKEN_TYPE_2_OF_2",
            Self::ExpectedArityMin => "EXPECTED_ARITY_MIN",
            Self::ExpectedArityMax => "EXPECTED_ARITY_MAX",
            Self::CastFrom => "CAST_FROM",
            Self::CastTo => "CAST_TO",
        }
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A property value: an integer, a piece of text (keyword names, token
/// type names, type names), or a document value (offending token payloads).
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Integer(i64),
    Text(String),
    Doc(DocValue),
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(i) => write!(f, "{i}"),
            Self::Text(s) => f.write_str(s),
            Self::Doc(v) => write!(f, "{v}"),
        }
    }
}

/// An ordered property map attached to every engine error.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PropertyBag(BTreeMap<Property, PropertyValue>);

impl PropertyBag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a property, replacing any previous value.
    #[must_use]
    pub fn with(mut self, key: Property, value: PropertyValue) -> Self {
        self.0.insert(key, value);
        self
    }

    /// Shorthand for the line/column pair.
    #[must_use]
    pub fn at(self, line: u32, column: u32) -> Self {
        self.with(Property::LineNumber, PropertyValue::Integer(i64::from(line)))
            .with(
                Property::ColumnNumber,
                PropertyValue::Integer(i64::from(column)),
            )
    }

    pub fn get(&self, key: Property) -> Option<&PropertyValue> {
        self.0.get(&key)
    }

    /// The line/column pair, when present.
    pub fn position(&self) -> Option<(i64, i64)> {
        match (self.get(Property::LineNumber), self.get(Property::ColumnNumber)) {
            (Some(PropertyValue::Integer(line)), Some(PropertyValue::Integer(col))) => {
                Some((*line, *col))
            }
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Property, &PropertyValue)> {
        self.0.iter()
    }
}

impl fmt::Display for PropertyBag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (key, value)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{key}: {value}")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Parse errors
// ---------------------------------------------------------------------------

/// Machine-readable parse error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParseErrorCode {
    ExpectedKeyword,
    ExpectedTypeName,
    MissingIdentAfterAt,
    UnexpectedToken,
    UnexpectedKeyword,
    InvalidPathComponent,
    CastArity,
    InvalidTypeParam,
    ExpectedWhenClause,
    UnexpectedOperator,
    ExpectedExpression,
    ExpectedTokenType,
    Expected2TokenTypes,
    ExpectedLeftParenAfterCast,
    ExpectedLeftParenValueConstructor,
    UnexpectedTerm,
    SelectMissingFrom,
    UnsupportedLiteralsGroupBy,
    ExpectedIdentForAlias,
    ExpectedIdentForAt,
    ExpectedLeftParenBuiltinFunctionCall,
    ExpectedRightParenBuiltinFunctionCall,
    ExpectedArgumentDelimiter,
}

impl ParseErrorCode {
    /// The canonical `PARSE_*` name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::ExpectedKeyword => "PARSE_EXPECTED_KEYWORD",
            Self::ExpectedTypeName => "PARSE_EXPECTED_TYPE_NAME",
            Self::MissingIdentAfterAt => "PARSE_MISSING_IDENT_AFTER_AT",
            Self::UnexpectedToken => "PARSE_UNEXPECTED_TOKEN",
            Self::UnexpectedKeyword => "PARSE_UNEXPECTED_KEYWORD",
            Self::InvalidPathComponent => "PARSE_INVALID_PATH_COMPONENT",
            Self::CastArity => "PARSE_CAST_ARITY",
            Self::InvalidTypeParam => "PARSE_INVALID_TYPE_PARAM",
            Self::ExpectedWhenClause => "PARSE_EXPECTED_WHEN_CLAUSE",
            Self::UnexpectedOperator => "PARSE_UNEXPECTED_OPERATOR",
            Self::ExpectedExpression => "PARSE_EXPECTED_EXPRESSION",
            Self::ExpectedTokenType => "PARSE_EXPECTED_TOKEN_TYPE",
            Self::Expected2TokenTypes => "PARSE_EXPECTED_2_TOKEN_TYPES",
            Self::ExpectedLeftParenAfterCast => "PARSE_EXPECTED_LEFT_PAREN_AFTER_CAST",
            Self::ExpectedLeftParenValueConstructor => {
                "PARSE_EXPECTED_LEFT_PAREN_VALUE_CONSTRUCTOR"
            }
            Self::UnexpectedTerm => "PARSE_UNEXPECTED_TERM",
            Self::SelectMissingFrom => "PARSE_SELECT_MISSING_FROM",
            Self::UnsupportedLiteralsGroupBy => "PARSE_UNSUPPORTED_LITERALS_GROUPBY",
            Self::ExpectedIdentForAlias => "PARSE_EXPECTED_IDENT_FOR_ALIAS",
            Self::ExpectedIdentForAt => "PARSE_EXPECTED_IDENT_FOR_AT",
            Self::ExpectedLeftParenBuiltinFunctionCall => {
                "PARSE_EXPECTED_LEFT_PAREN_BUILTIN_FUNCTION_CALL"
            }
            Self::ExpectedRightParenBuiltinFunctionCall => {
                "PARSE_EXPECTED_RIGHT_PAREN_BUILTIN_FUNCTION_CALL"
            }
            Self::ExpectedArgumentDelimiter => "PARSE_EXPECTED_ARGUMENT_DELIMITER",
        }
    }
}

impl fmt::Display for ParseErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A parse (or lex) failure.
#[derive(Debug, Clone, PartialEq)]
pub struct ParserError {
    pub code: ParseErrorCode,
    /// Free-text detail complementing the code.
    pub message: String,
    pub properties: PropertyBag,
    /// True when the error indicates a bug in the engine rather than in
    /// the query.
    pub internal: bool,
}

impl ParserError {
    pub fn new(code: ParseErrorCode, message: impl Into<String>, properties: PropertyBag) -> Self {
        Self {
            code,
            message: message.into(),
            properties,
            internal: false,
        }
    }

    /// Mark this error as engine-internal.
    #[must_use]
    pub fn internal(mut self) -> Self {
        self.internal = true;
        self
    }
}

impl fmt::Display for ParserError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)?;
        if let Some((line, col)) = self.properties.position() {
            write!(f, " at {line}:{col}")?;
        }
        Ok(())
    }
}

impl Error for ParserError {}

// ---------------------------------------------------------------------------
// Evaluation errors
// ---------------------------------------------------------------------------

/// Machine-readable evaluation error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EvalErrorCode {
    CastFailed,
    CastFailedNoLocation,
    InvalidCast,
    InvalidCastNoLocation,
    IntOverflow,
    BindingNotFound,
    InvalidArguments,
    Generic,
}

impl EvalErrorCode {
    /// The canonical `EVALUATOR_*` name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::CastFailed => "EVALUATOR_CAST_FAILED",
            Self::CastFailedNoLocation => "EVALUATOR_CAST_FAILED_NO_LOCATION",
            Self::InvalidCast => "EVALUATOR_INVALID_CAST",
            Self::InvalidCastNoLocation => "EVALUATOR_INVALID_CAST_NO_LOCATION",
            Self::IntOverflow => "EVALUATOR_INT_OVERFLOW",
            Self::BindingNotFound => "EVALUATOR_BINDING_NOT_FOUND",
            Self::InvalidArguments => "EVALUATOR_INVALID_ARGUMENTS",
            Self::Generic => "EVALUATOR_GENERIC",
        }
    }
}

impl fmt::Display for EvalErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An evaluation failure.
#[derive(Debug, Clone, PartialEq)]
pub struct EvalError {
    pub code: EvalErrorCode,
    pub message: String,
    pub properties: PropertyBag,
    pub internal: bool,
}

impl EvalError {
    pub fn new(code: EvalErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            properties: PropertyBag::new(),
            internal: false,
        }
    }

    #[must_use]
    pub fn with_properties(mut self, properties: PropertyBag) -> Self {
        self.properties = properties;
        self
    }

    /// Mark this error as engine-internal.
    #[must_use]
    pub fn internal(mut self) -> Self {
        self.internal = true;
        self
    }
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)?;
        if let Some((line, col)) = self.properties.position() {
            write!(f, " at {line}:{col}")?;
        }
        Ok(())
    }
}

impl Error for EvalError {}

/// Any error the pipeline can produce.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DocQlError {
    #[error(transparent)]
    Parse(#[from] ParserError),
    #[error(transparent)]
    Eval(#[from] EvalError),
}
