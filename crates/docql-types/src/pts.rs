//! Strict structural equality for conformance testing.
//!
//! Stricter than the evaluator's SQL `=`: it never coerces types. Two
//! values of different top-level types are never equal, typed nulls only
//! match their own declared type, and MISSING only matches MISSING.
//! An s-expression whose head is the symbol `bag` (and that has at least
//! one element after the head) is compared as an unordered multiset.

use crate::value::DocValue;

/// Strict equality between two document values.
pub fn pts_eq(left: &DocValue, right: &DocValue) -> bool {
    match (left, right) {
        (DocValue::Missing, DocValue::Missing) => true,
        (DocValue::Null(a), DocValue::Null(b)) => a == b,
        (DocValue::Bool(a), DocValue::Bool(b)) => a == b,
        (DocValue::Int(a), DocValue::Int(b)) => a == b,
        (DocValue::Float(a), DocValue::Float(b)) => a == b || (a.is_nan() && b.is_nan()),
        // Numeric value, ignoring scale: BigDecimal compares numerically.
        (DocValue::Decimal(a), DocValue::Decimal(b)) => a == b,
        // By instant, not textual form.
        (DocValue::Timestamp(a), DocValue::Timestamp(b)) => a == b,
        (DocValue::Symbol(a), DocValue::Symbol(b)) | (DocValue::String(a), DocValue::String(b)) => {
            a == b
        }
        (DocValue::Clob(a), DocValue::Clob(b)) | (DocValue::Blob(a), DocValue::Blob(b)) => a == b,
        (DocValue::List(a), DocValue::List(b)) => positional_eq(a, b),
        (DocValue::Sexp(a), DocValue::Sexp(b)) => match (bag_elements(a), bag_elements(b)) {
            (Some(a), Some(b)) => multiset_eq(a, b),
            (None, None) => positional_eq(a, b),
            // A bag and a plain s-expression are different types.
            _ => false,
        },
        (DocValue::Struct(a), DocValue::Struct(b)) => struct_eq(a, b),
        _ => false,
    }
}

/// The elements of a bag-shaped s-expression: `(bag e1 e2 ...)` with at
/// least one element after the head.
fn bag_elements(items: &[DocValue]) -> Option<&[DocValue]> {
    match items.split_first() {
        Some((DocValue::Symbol(head), rest)) if head == "bag" && !rest.is_empty() => Some(rest),
        _ => None,
    }
}

fn positional_eq(a: &[DocValue], b: &[DocValue]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| pts_eq(x, y))
}

/// Multiset equality: same size and, for every element, the same
/// multiplicity on both sides (counted via `pts_eq` itself).
fn multiset_eq(a: &[DocValue], b: &[DocValue]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().all(|x| {
        let in_a = a.iter().filter(|y| pts_eq(x, y)).count();
        let in_b = b.iter().filter(|y| pts_eq(x, y)).count();
        in_a == in_b
    })
}

/// Same size; every field on the left has an equal same-named field on
/// the right. Field order is irrelevant.
fn struct_eq(a: &[(String, DocValue)], b: &[(String, DocValue)]) -> bool {
    a.len() == b.len()
        && a.iter()
            .all(|(name, v)| b.iter().any(|(n, w)| n == name && pts_eq(v, w)))
}
