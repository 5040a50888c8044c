//! The dynamically-typed document value and its type discriminator.

use std::cmp::Ordering;
use std::fmt;

use bigdecimal::BigDecimal;
use chrono::{DateTime, FixedOffset};

/// The closed set of document types.
///
/// Every value the engine touches is classified by exactly one of these.
/// MISSING and BAG never appear at the embedding layer: MISSING is encoded
/// there as the annotated typed null `missing::null.symbol`, and a bag
/// materializes as the conventional s-expression `(bag ...)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DocType {
    Missing,
    Null,
    Bool,
    Int,
    Float,
    Decimal,
    Timestamp,
    Symbol,
    String,
    Clob,
    Blob,
    List,
    Sexp,
    Bag,
    Struct,
}

impl DocType {
    /// The canonical upper-case name, as used in error properties.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Missing => "MISSING",
            Self::Null => "NULL",
            Self::Bool => "BOOL",
            Self::Int => "INT",
            Self::Float => "FLOAT",
            Self::Decimal => "DECIMAL",
            Self::Timestamp => "TIMESTAMP",
            Self::Symbol => "SYMBOL",
            Self::String => "STRING",
            Self::Clob => "CLOB",
            Self::Blob => "BLOB",
            Self::List => "LIST",
            Self::Sexp => "SEXP",
            Self::Bag => "BAG",
            Self::Struct => "STRUCT",
        }
    }

    /// The lower-case text-form suffix for typed nulls (`null.int`, ...).
    pub const fn null_suffix(self) -> &'static str {
        match self {
            Self::Missing => "missing",
            Self::Null => "null",
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Float => "float",
            Self::Decimal => "decimal",
            Self::Timestamp => "timestamp",
            Self::Symbol => "symbol",
            Self::String => "string",
            Self::Clob => "clob",
            Self::Blob => "blob",
            Self::List => "list",
            Self::Sexp => "sexp",
            Self::Bag => "bag",
            Self::Struct => "struct",
        }
    }

    /// Look up a typed-null suffix (`int` in `null.int`).
    pub fn from_null_suffix(s: &str) -> Option<Self> {
        Some(match s {
            "null" => Self::Null,
            "bool" => Self::Bool,
            "int" => Self::Int,
            "float" => Self::Float,
            "decimal" => Self::Decimal,
            "timestamp" => Self::Timestamp,
            "symbol" => Self::Symbol,
            "string" => Self::String,
            "clob" => Self::Clob,
            "blob" => Self::Blob,
            "list" => Self::List,
            "sexp" => Self::Sexp,
            "struct" => Self::Struct,
            _ => return None,
        })
    }

    /// True for the sequence containers.
    pub const fn is_sequence(self) -> bool {
        matches!(self, Self::List | Self::Sexp | Self::Bag)
    }

    /// True for the text scalars.
    pub const fn is_text(self) -> bool {
        matches!(self, Self::Symbol | Self::String)
    }

    /// True for the numeric scalars.
    pub const fn is_number(self) -> bool {
        matches!(self, Self::Int | Self::Float | Self::Decimal)
    }

    /// True for the LOB scalars.
    pub const fn is_lob(self) -> bool {
        matches!(self, Self::Clob | Self::Blob)
    }
}

impl fmt::Display for DocType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A document value.
///
/// Struct fields preserve insertion order so that projections are stable;
/// equality over structs ignores order. Typed nulls carry the declared
/// type (`Null(DocType::Int)` is `null.int`); the plain null is
/// `Null(DocType::Null)`.
#[derive(Debug, Clone, PartialEq)]
pub enum DocValue {
    /// Absence of a value. Distinct from every null.
    Missing,
    /// A (possibly typed) null.
    Null(DocType),
    Bool(bool),
    Int(i64),
    Float(f64),
    Decimal(BigDecimal),
    Timestamp(DateTime<FixedOffset>),
    Symbol(String),
    String(String),
    Clob(Vec<u8>),
    Blob(Vec<u8>),
    List(Vec<DocValue>),
    Sexp(Vec<DocValue>),
    Struct(Vec<(String, DocValue)>),
}

impl DocValue {
    /// The type discriminator for this value.
    ///
    /// A typed null reports NULL here; the declared type is only visible
    /// to strict equality and to the text writer.
    pub const fn doc_type(&self) -> DocType {
        match self {
            Self::Missing => DocType::Missing,
            Self::Null(_) => DocType::Null,
            Self::Bool(_) => DocType::Bool,
            Self::Int(_) => DocType::Int,
            Self::Float(_) => DocType::Float,
            Self::Decimal(_) => DocType::Decimal,
            Self::Timestamp(_) => DocType::Timestamp,
            Self::Symbol(_) => DocType::Symbol,
            Self::String(_) => DocType::String,
            Self::Clob(_) => DocType::Clob,
            Self::Blob(_) => DocType::Blob,
            Self::List(_) => DocType::List,
            Self::Sexp(_) => DocType::Sexp,
            Self::Struct(_) => DocType::Struct,
        }
    }

    /// True for MISSING and every null.
    pub const fn is_null_or_missing(&self) -> bool {
        matches!(self, Self::Missing | Self::Null(_))
    }

    /// True for LIST, SEXP (including bag-shaped sexps).
    pub const fn is_sequence(&self) -> bool {
        matches!(self, Self::List(_) | Self::Sexp(_))
    }

    /// Extract a bool.
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Extract an integer.
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Extract the text of a STRING or SYMBOL.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Symbol(s) | Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Children of a sequence value.
    pub fn sequence_elements(&self) -> Option<&[DocValue]> {
        match self {
            Self::List(items) | Self::Sexp(items) => Some(items),
            _ => None,
        }
    }

    /// Fields of a struct value, in insertion order.
    pub fn struct_fields(&self) -> Option<&[(String, DocValue)]> {
        match self {
            Self::Struct(fields) => Some(fields),
            _ => None,
        }
    }

    /// Look up a struct field by name. First match wins.
    pub fn field(&self, name: &str) -> Option<&DocValue> {
        self.struct_fields()?
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v)
    }

    /// Compare two numeric values on the common widest type
    /// (`i64` < `f64` < decimal). `None` if either side is non-numeric
    /// or the comparison is undefined (NaN).
    pub fn compare_numeric(&self, other: &Self) -> Option<Ordering> {
        use DocValue::{Decimal, Float, Int};
        match (self, other) {
            (Int(a), Int(b)) => Some(a.cmp(b)),
            (Float(a), Float(b)) => a.partial_cmp(b),
            (Decimal(a), Decimal(b)) => Some(a.cmp(b)),
            #[allow(clippy::cast_precision_loss)]
            (Int(a), Float(b)) => (*a as f64).partial_cmp(b),
            #[allow(clippy::cast_precision_loss)]
            (Float(a), Int(b)) => a.partial_cmp(&(*b as f64)),
            (Int(a), Decimal(b)) => Some(BigDecimal::from(*a).cmp(b)),
            (Decimal(a), Int(b)) => Some(a.cmp(&BigDecimal::from(*b))),
            (Float(a), Decimal(b)) => {
                let a = BigDecimal::try_from(*a).ok()?;
                Some(a.cmp(b))
            }
            (Decimal(a), Float(b)) => {
                let b = BigDecimal::try_from(*b).ok()?;
                Some(a.cmp(&b))
            }
            _ => None,
        }
    }
}
