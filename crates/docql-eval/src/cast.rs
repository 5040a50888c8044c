//! `CAST` conversions.
//!
//! The legal conversion table is closed: anything outside it raises an
//! invalid-cast error, while a legal conversion that fails on the actual
//! value (unparseable text, lost range) raises a cast-failed error. NULL
//! and MISSING cast to themselves for every target. Errors carry the
//! `_NO_LOCATION` code variants when the cast node has no source
//! position.

use bigdecimal::{BigDecimal, ToPrimitive, Zero};
use docql_ast::{SourcePosition, TypeSpec};
use docql_error::{EvalError, EvalErrorCode, Property, PropertyBag, PropertyValue};
use docql_types::{format_timestamp, parse_timestamp, DocType, DocValue};
use tracing::debug;

use crate::value::{ExprValue, SeqIter};

/// Cast a runtime value to the target type.
pub fn cast(
    value: ExprValue,
    target: &TypeSpec,
    pos: Option<SourcePosition>,
) -> Result<ExprValue, EvalError> {
    let target_type = target.name.doc_type();

    // A lazy sequence only converts to another sequence type, lazily.
    if value.as_doc().is_none() {
        if target_type.is_sequence() && value.value_type().is_sequence() {
            let iter = value
                .take_iter()?
                .expect("sequence values always carry an iterator");
            return Ok(ExprValue::sequence(target_type, iter));
        }
        return Err(invalid_cast(value.value_type(), target_type, pos));
    }

    let doc = value.as_doc().expect("non-sequence values are documents");
    let from = doc.doc_type();

    // NULL and MISSING cast to themselves for every target.
    if doc.is_null_or_missing() {
        return Ok(value);
    }

    debug!(from = %from, to = %target_type, "cast");
    let result = match target_type {
        DocType::Bool => cast_to_bool(doc).map(DocValue::Bool),
        DocType::Int => cast_to_int(doc, pos)?.map(DocValue::Int),
        DocType::Float => cast_to_float(doc).map(DocValue::Float),
        DocType::Decimal => cast_to_decimal(doc).map(DocValue::Decimal),
        DocType::Timestamp => match doc {
            DocValue::Timestamp(_) => Some(doc.clone()),
            DocValue::Symbol(s) | DocValue::String(s) => {
                let parsed = parse_timestamp(s)
                    .ok_or_else(|| cast_failed(from, target_type, pos, "invalid timestamp"))?;
                Some(DocValue::Timestamp(parsed))
            }
            _ => None,
        },
        DocType::String => cast_to_text(doc).map(DocValue::String),
        DocType::Symbol => cast_to_text(doc).map(DocValue::Symbol),
        DocType::Clob => match doc {
            DocValue::Clob(b) | DocValue::Blob(b) => Some(DocValue::Clob(b.clone())),
            _ => None,
        },
        DocType::Blob => match doc {
            DocValue::Clob(b) | DocValue::Blob(b) => Some(DocValue::Blob(b.clone())),
            _ => None,
        },
        DocType::List | DocType::Sexp | DocType::Bag => match doc {
            DocValue::List(items) | DocValue::Sexp(items) => {
                let items = items.clone();
                let iter: SeqIter =
                    Box::new(items.into_iter().map(|v| Ok(ExprValue::from_doc(v))));
                return Ok(ExprValue::sequence(target_type, iter));
            }
            _ => None,
        },
        DocType::Struct => match doc {
            DocValue::Struct(_) => Some(doc.clone()),
            _ => None,
        },
        DocType::Missing | DocType::Null => None,
    };

    match result {
        Some(doc) => Ok(ExprValue::from_doc(doc)),
        None => Err(invalid_cast(from, target_type, pos)),
    }
}

// ---------------------------------------------------------------------------
// Per-target conversions
// ---------------------------------------------------------------------------

fn cast_to_bool(doc: &DocValue) -> Option<bool> {
    Some(match doc {
        DocValue::Bool(b) => *b,
        DocValue::Int(i) => *i != 0,
        DocValue::Float(f) => *f != 0.0,
        DocValue::Decimal(d) => !d.is_zero(),
        // "true" in any letter case; every other text is false.
        DocValue::Symbol(s) | DocValue::String(s) => s.eq_ignore_ascii_case("true"),
        _ => return None,
    })
}

/// `Ok(None)` means the conversion is not in the table.
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
fn cast_to_int(doc: &DocValue, pos: Option<SourcePosition>) -> Result<Option<i64>, EvalError> {
    let from = doc.doc_type();
    Ok(Some(match doc {
        DocValue::Bool(b) => i64::from(*b),
        DocValue::Int(i) => *i,
        DocValue::Float(f) => {
            if f.is_nan() {
                return Err(cast_failed(from, DocType::Int, pos, "NaN has no integer value"));
            }
            let truncated = f.trunc();
            if truncated < -9_223_372_036_854_775_808.0 || truncated >= 9_223_372_036_854_775_808.0
            {
                return Err(int_overflow(pos));
            }
            truncated as i64
        }
        // Integral-quotient truncation toward zero; cheaper than
        // rescaling for huge or tiny magnitudes.
        DocValue::Decimal(d) => d.to_i64().ok_or_else(|| int_overflow(pos))?,
        DocValue::Symbol(s) | DocValue::String(s) => {
            return parse_int_text(s, pos).map(Some);
        }
        _ => return Ok(None),
    }))
}

/// Base-10, or `0x…`/`0b…` with an optional sign. Leading zeros are
/// insignificant. A well-formed number that exceeds the range is an
/// overflow; malformed text is a failed cast.
fn parse_int_text(text: &str, pos: Option<SourcePosition>) -> Result<i64, EvalError> {
    let trimmed = text.trim();
    let (sign, magnitude) = match trimmed.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("+", trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };

    let (radix, digits) = if let Some(hex) = magnitude
        .strip_prefix("0x")
        .or_else(|| magnitude.strip_prefix("0X"))
    {
        (16, hex)
    } else if let Some(bin) = magnitude
        .strip_prefix("0b")
        .or_else(|| magnitude.strip_prefix("0B"))
    {
        (2, bin)
    } else {
        (10, magnitude)
    };

    let well_formed = !digits.is_empty()
        && digits.chars().all(|c| c.is_digit(radix));
    if !well_formed {
        return Err(cast_failed(
            DocType::String,
            DocType::Int,
            pos,
            format!("'{text}' is not an integer"),
        ));
    }
    i64::from_str_radix(&format!("{sign}{digits}"), radix).map_err(|_| int_overflow(pos))
}

#[allow(clippy::cast_precision_loss)]
fn cast_to_float(doc: &DocValue) -> Option<f64> {
    match doc {
        DocValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        DocValue::Int(i) => Some(*i as f64),
        DocValue::Float(f) => Some(*f),
        DocValue::Decimal(d) => d.to_f64(),
        DocValue::Symbol(s) | DocValue::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn cast_to_decimal(doc: &DocValue) -> Option<BigDecimal> {
    match doc {
        DocValue::Bool(b) => Some(BigDecimal::from(i64::from(*b))),
        DocValue::Int(i) => Some(BigDecimal::from(*i)),
        DocValue::Float(f) => BigDecimal::try_from(*f).ok(),
        DocValue::Decimal(d) => Some(d.clone()),
        DocValue::Symbol(s) | DocValue::String(s) => s.trim().parse::<BigDecimal>().ok(),
        _ => None,
    }
}

fn cast_to_text(doc: &DocValue) -> Option<String> {
    Some(match doc {
        DocValue::Bool(b) => b.to_string(),
        DocValue::Int(i) => i.to_string(),
        DocValue::Float(f) => float_text(*f),
        DocValue::Decimal(d) => plain_decimal_text(d),
        DocValue::Symbol(s) | DocValue::String(s) => s.clone(),
        DocValue::Timestamp(ts) => format_timestamp(ts),
        _ => return None,
    })
}

/// Whole floats keep one fractional digit so the text reads as a float.
fn float_text(f: f64) -> String {
    if f.fract() == 0.0 && f.is_finite() {
        format!("{f:.1}")
    } else {
        f.to_string()
    }
}

/// Plain (non-exponent) decimal notation.
fn plain_decimal_text(d: &BigDecimal) -> String {
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
            out.extend(std::iter::repeat('0').take(scale - text.len()));
            out.push_str(&text);
        } else {
            let point = text.len() - scale;
            out.push_str(&text[..point]);
            out.push('.');
            out.push_str(&text[point..]);
        }
    } else {
        out.push_str(&text);
        out.extend(std::iter::repeat('0').take(usize::try_from(-scale).unwrap_or(0)));
    }
    out
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

fn cast_properties(
    from: DocType,
    to: DocType,
    pos: Option<SourcePosition>,
) -> PropertyBag {
    let bag = PropertyBag::new()
        .with(Property::CastFrom, PropertyValue::Text(from.name().to_owned()))
        .with(Property::CastTo, PropertyValue::Text(to.name().to_owned()));
    match pos {
        Some(pos) => bag.at(pos.line, pos.column),
        None => bag,
    }
}

fn invalid_cast(from: DocType, to: DocType, pos: Option<SourcePosition>) -> EvalError {
    let code = if pos.is_some() {
        EvalErrorCode::InvalidCast
    } else {
        EvalErrorCode::InvalidCastNoLocation
    };
    EvalError::new(code, format!("cannot cast {from} to {to}"))
        .with_properties(cast_properties(from, to, pos))
}

fn cast_failed(
    from: DocType,
    to: DocType,
    pos: Option<SourcePosition>,
    detail: impl Into<String>,
) -> EvalError {
    let code = if pos.is_some() {
        EvalErrorCode::CastFailed
    } else {
        EvalErrorCode::CastFailedNoLocation
    };
    EvalError::new(code, format!("cast to {to} failed: {}", detail.into()))
        .with_properties(cast_properties(from, to, pos))
}

fn int_overflow(pos: Option<SourcePosition>) -> EvalError {
    let bag = match pos {
        Some(pos) => PropertyBag::new().at(pos.line, pos.column),
        None => PropertyBag::new(),
    };
    EvalError::new(EvalErrorCode::IntOverflow, "integer value out of range")
        .with_properties(bag)
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use docql_ast::TypeName;

    use super::*;

    fn spec(name: TypeName) -> TypeSpec {
        TypeSpec::new(name)
    }

    fn cast_doc(doc: DocValue, name: TypeName) -> Result<DocValue, EvalError> {
        cast(ExprValue::from_doc(doc), &spec(name), None)?.materialize()
    }

    fn ok(doc: DocValue, name: TypeName) -> DocValue {
        cast_doc(doc, name).expect("cast should succeed")
    }

    fn text(s: &str) -> DocValue {
        DocValue::String(s.to_owned())
    }

    fn dec(s: &str) -> DocValue {
        DocValue::Decimal(BigDecimal::from_str(s).expect("valid decimal"))
    }

    #[test]
    fn int_text_forms_normalize() {
        assert_eq!(ok(text("-0005"), TypeName::Integer), DocValue::Int(-5));
        assert_eq!(ok(text("+0x10"), TypeName::Integer), DocValue::Int(16));
        assert_eq!(ok(text("0b101"), TypeName::Integer), DocValue::Int(5));
        assert_eq!(ok(text(" 42 "), TypeName::Integer), DocValue::Int(42));
    }

    #[test]
    fn int_overflow_is_its_own_error() {
        let err = cast_doc(text("99999999999999999999"), TypeName::Integer)
            .expect_err("overflow");
        assert_eq!(err.code, EvalErrorCode::IntOverflow);

        let err = cast_doc(DocValue::Float(1e300), TypeName::Integer).expect_err("overflow");
        assert_eq!(err.code, EvalErrorCode::IntOverflow);

        let err = cast_doc(dec("1e30"), TypeName::Integer).expect_err("overflow");
        assert_eq!(err.code, EvalErrorCode::IntOverflow);
    }

    #[test]
    fn malformed_int_text_is_cast_failed() {
        for bad in ["abc", "", "1.5", "0x", "12a"] {
            let err = cast_doc(text(bad), TypeName::Integer).expect_err(bad);
            assert_eq!(err.code, EvalErrorCode::CastFailedNoLocation, "{bad}");
        }
    }

    #[test]
    fn bool_casts() {
        assert_eq!(ok(text("true"), TypeName::Boolean), DocValue::Bool(true));
        assert_eq!(ok(text("TrUe"), TypeName::Boolean), DocValue::Bool(true));
        assert_eq!(ok(text("other"), TypeName::Boolean), DocValue::Bool(false));
        assert_eq!(ok(DocValue::Int(7), TypeName::Boolean), DocValue::Bool(true));
        assert_eq!(ok(dec("0.00"), TypeName::Boolean), DocValue::Bool(false));
        assert_eq!(ok(DocValue::Bool(true), TypeName::Integer), DocValue::Int(1));
        assert_eq!(ok(DocValue::Bool(false), TypeName::Float), DocValue::Float(0.0));
    }

    #[test]
    fn numeric_narrowing_truncates() {
        assert_eq!(ok(DocValue::Float(3.9), TypeName::Integer), DocValue::Int(3));
        assert_eq!(ok(DocValue::Float(-3.9), TypeName::Integer), DocValue::Int(-3));
        assert_eq!(ok(dec("3.99"), TypeName::Integer), DocValue::Int(3));
        assert_eq!(ok(dec("-3.99"), TypeName::Integer), DocValue::Int(-3));
    }

    #[test]
    fn text_casts() {
        assert_eq!(ok(DocValue::Int(5), TypeName::String), text("5"));
        assert_eq!(ok(DocValue::Bool(true), TypeName::String), text("true"));
        assert_eq!(ok(DocValue::Float(1.0), TypeName::String), text("1.0"));
        assert_eq!(ok(dec("1.50"), TypeName::String), text("1.50"));
        assert_eq!(
            ok(text("sym"), TypeName::Symbol),
            DocValue::Symbol("sym".to_owned())
        );
        assert_eq!(
            ok(DocValue::Symbol("s".to_owned()), TypeName::String),
            text("s")
        );
    }

    #[test]
    fn timestamp_casts() {
        let ts = ok(text("2007-02-23T12:14Z"), TypeName::Timestamp);
        assert_eq!(ts.doc_type(), DocType::Timestamp);
        assert_eq!(ok(ts, TypeName::String), text("2007-02-23T12:14:00Z"));
        let err = cast_doc(text("not a date"), TypeName::Timestamp).expect_err("bad timestamp");
        assert_eq!(err.code, EvalErrorCode::CastFailedNoLocation);
    }

    #[test]
    fn sequence_casts_rewrap() {
        let list = DocValue::List(vec![DocValue::Int(1), DocValue::Int(2)]);
        assert_eq!(
            ok(list.clone(), TypeName::Bag),
            DocValue::Sexp(vec![
                DocValue::Symbol("bag".to_owned()),
                DocValue::Int(1),
                DocValue::Int(2),
            ])
        );
        assert_eq!(
            ok(list.clone(), TypeName::Sexp),
            DocValue::Sexp(vec![DocValue::Int(1), DocValue::Int(2)])
        );
        assert_eq!(ok(list.clone(), TypeName::List), list);
    }

    #[test]
    fn lob_and_struct_casts() {
        let blob = DocValue::Blob(vec![1, 2]);
        assert_eq!(ok(blob.clone(), TypeName::Clob), DocValue::Clob(vec![1, 2]));
        assert_eq!(ok(DocValue::Clob(vec![3]), TypeName::Blob), DocValue::Blob(vec![3]));
        let s = DocValue::Struct(vec![("a".to_owned(), DocValue::Int(1))]);
        assert_eq!(ok(s.clone(), TypeName::Struct), s);
        assert_eq!(ok(s.clone(), TypeName::Tuple), s);
    }

    #[test]
    fn null_and_missing_cast_to_themselves() {
        for target in [
            TypeName::Boolean,
            TypeName::Integer,
            TypeName::String,
            TypeName::Bag,
            TypeName::Struct,
        ] {
            assert_eq!(
                ok(DocValue::Missing, target),
                DocValue::Missing,
                "{target:?}"
            );
            assert_eq!(
                ok(DocValue::Null(DocType::Int), target),
                DocValue::Null(DocType::Int),
                "{target:?}"
            );
        }
    }

    #[test]
    fn cast_is_idempotent_on_matching_type() {
        let cases = [
            (DocValue::Bool(true), TypeName::Boolean),
            (DocValue::Int(3), TypeName::Integer),
            (DocValue::Float(1.5), TypeName::Float),
            (dec("2.5"), TypeName::Decimal),
            (text("x"), TypeName::String),
        ];
        for (value, target) in cases {
            assert_eq!(ok(value.clone(), target), value);
        }
    }

    #[test]
    fn illegal_conversions_are_invalid_cast() {
        let cases = [
            (DocValue::Int(1), TypeName::Timestamp),
            (DocValue::Int(1), TypeName::Blob),
            (text("x"), TypeName::Clob),
            (DocValue::Int(1), TypeName::List),
            (DocValue::Struct(vec![]), TypeName::Integer),
            (DocValue::List(vec![]), TypeName::Struct),
            (DocValue::Int(1), TypeName::Null),
        ];
        for (value, target) in cases {
            let err = cast_doc(value, target).expect_err("must be invalid");
            assert_eq!(err.code, EvalErrorCode::InvalidCastNoLocation);
        }
    }

    #[test]
    fn location_selects_the_error_code_variant() {
        let pos = SourcePosition::new(2, 5);
        let err = cast(
            ExprValue::from_doc(DocValue::Int(1)),
            &spec(TypeName::Timestamp),
            Some(pos),
        )
        .expect_err("invalid cast");
        assert_eq!(err.code, EvalErrorCode::InvalidCast);
        assert_eq!(err.properties.position(), Some((2, 5)));

        let err = cast(
            ExprValue::from_doc(text("zzz")),
            &spec(TypeName::Timestamp),
            Some(pos),
        )
        .expect_err("failed cast");
        assert_eq!(err.code, EvalErrorCode::CastFailed);
    }
}
