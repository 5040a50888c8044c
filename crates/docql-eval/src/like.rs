//! The `LIKE` pattern matcher.
//!
//! Patterns compile to a small part list over code points: `_` matches
//! exactly one code point, `%` any (possibly empty) run, everything else
//! matches itself. With `ESCAPE c`, the escape must precede `_`, `%`, or
//! `c` itself; anything else is rejected. Matching is case-sensitive and
//! anchored at both ends.

use docql_error::{EvalError, EvalErrorCode};

/// One element of a compiled pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LikePart {
    Char(char),
    AnyOne,
    AnyRun,
}

/// Compile a pattern, validating escape usage.
pub fn compile_pattern(pattern: &str, escape: Option<char>) -> Result<Vec<LikePart>, EvalError> {
    let mut parts = Vec::new();
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        if Some(c) == escape {
            let escaped = chars.next().ok_or_else(|| {
                EvalError::new(
                    EvalErrorCode::InvalidArguments,
                    "LIKE pattern ends with its escape character",
                )
            })?;
            if escaped != '_' && escaped != '%' && Some(escaped) != escape {
                return Err(EvalError::new(
                    EvalErrorCode::InvalidArguments,
                    format!("escape character must precede '_', '%', or itself, found '{escaped}'"),
                ));
            }
            parts.push(LikePart::Char(escaped));
        } else if c == '_' {
            parts.push(LikePart::AnyOne);
        } else if c == '%' {
            parts.push(LikePart::AnyRun);
        } else {
            parts.push(LikePart::Char(c));
        }
    }
    Ok(parts)
}

/// Match a compiled pattern against the full text.
pub fn matches(parts: &[LikePart], text: &str) -> bool {
    let text: Vec<char> = text.chars().collect();
    let mut ti = 0;
    let mut pi = 0;
    let mut backtrack: Option<(usize, usize)> = None;

    while ti < text.len() {
        match parts.get(pi) {
            Some(LikePart::AnyOne) => {
                ti += 1;
                pi += 1;
            }
            Some(LikePart::Char(c)) if *c == text[ti] => {
                ti += 1;
                pi += 1;
            }
            Some(LikePart::AnyRun) => {
                // Try the empty run first; remember where to grow it.
                backtrack = Some((pi, ti));
                pi += 1;
            }
            _ => {
                let Some((star_pi, star_ti)) = backtrack else {
                    return false;
                };
                // Grow the last run by one code point and retry.
                backtrack = Some((star_pi, star_ti + 1));
                pi = star_pi + 1;
                ti = star_ti + 1;
            }
        }
    }
    parts[pi..].iter().all(|p| *p == LikePart::AnyRun)
}
