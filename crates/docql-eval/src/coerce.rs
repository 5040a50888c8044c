//! Numeric coercion and arithmetic.
//!
//! Pairs of numbers promote to their common widest type along the ladder
//! integer < double < arbitrary-decimal, and arithmetic dispatches on the
//! promoted type. Integer arithmetic is checked; overflow is an error,
//! never a silent wrap.

use bigdecimal::{BigDecimal, Zero};
use docql_error::{EvalError, EvalErrorCode};
use docql_types::DocValue;

/// A pair of numbers promoted to their common widest type.
pub enum NumericPair {
    Int(i64, i64),
    Float(f64, f64),
    Decimal(BigDecimal, BigDecimal),
}

/// Promote a pair along the ladder. `None` if either side is non-numeric.
#[allow(clippy::cast_precision_loss)]
pub fn coerce(left: &DocValue, right: &DocValue) -> Option<NumericPair> {
    use DocValue::{Decimal, Float, Int};
    Some(match (left, right) {
        (Int(a), Int(b)) => NumericPair::Int(*a, *b),
        (Float(a), Float(b)) => NumericPair::Float(*a, *b),
        (Decimal(a), Decimal(b)) => NumericPair::Decimal(a.clone(), b.clone()),
        (Int(a), Float(b)) => NumericPair::Float(*a as f64, *b),
        (Float(a), Int(b)) => NumericPair::Float(*a, *b as f64),
        (Int(a), Decimal(b)) => NumericPair::Decimal(BigDecimal::from(*a), b.clone()),
        (Decimal(a), Int(b)) => NumericPair::Decimal(a.clone(), BigDecimal::from(*b)),
        (Float(a), Decimal(b)) => NumericPair::Decimal(BigDecimal::try_from(*a).ok()?, b.clone()),
        (Decimal(a), Float(b)) => NumericPair::Decimal(a.clone(), BigDecimal::try_from(*b).ok()?),
        _ => return None,
    })
}

/// The arithmetic operators dispatched over a promoted pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

/// Apply an arithmetic operator to a promoted pair.
pub fn arithmetic(op: ArithOp, pair: NumericPair) -> Result<DocValue, EvalError> {
    match pair {
        NumericPair::Int(a, b) => int_arithmetic(op, a, b),
        NumericPair::Float(a, b) => Ok(DocValue::Float(match op {
            ArithOp::Add => a + b,
            ArithOp::Sub => a - b,
            ArithOp::Mul => a * b,
            ArithOp::Div => a / b,
            ArithOp::Mod => a % b,
        })),
        NumericPair::Decimal(a, b) => decimal_arithmetic(op, &a, &b),
    }
}

fn int_arithmetic(op: ArithOp, a: i64, b: i64) -> Result<DocValue, EvalError> {
    let result = match op {
        ArithOp::Add => a.checked_add(b),
        ArithOp::Sub => a.checked_sub(b),
        ArithOp::Mul => a.checked_mul(b),
        ArithOp::Div => {
            if b == 0 {
                return Err(division_by_zero());
            }
            a.checked_div(b)
        }
        ArithOp::Mod => {
            if b == 0 {
                return Err(division_by_zero());
            }
            a.checked_rem(b)
        }
    };
    result.map(DocValue::Int).ok_or_else(|| {
        EvalError::new(EvalErrorCode::IntOverflow, "integer overflow in arithmetic")
    })
}

fn decimal_arithmetic(op: ArithOp, a: &BigDecimal, b: &BigDecimal) -> Result<DocValue, EvalError> {
    if matches!(op, ArithOp::Div | ArithOp::Mod) && b.is_zero() {
        return Err(division_by_zero());
    }
    Ok(DocValue::Decimal(match op {
        ArithOp::Add => a + b,
        ArithOp::Sub => a - b,
        ArithOp::Mul => a * b,
        ArithOp::Div => a / b,
        ArithOp::Mod => a % b,
    }))
}

fn division_by_zero() -> EvalError {
    EvalError::new(EvalErrorCode::InvalidArguments, "division by zero")
}
