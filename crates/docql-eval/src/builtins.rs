//! Built-in scalar functions and their registry.
//!
//! Functions are keyed by lower-cased name with an arity range; lookup is
//! exact-name with an arity check. The embedder can register additional
//! functions through the pipeline builder.

use std::collections::HashMap;

use docql_error::{EvalError, EvalErrorCode};
use docql_types::{DocType, DocValue};
use tracing::debug;

/// A scalar function over materialized document values.
pub type BuiltinFn = fn(&[DocValue]) -> Result<DocValue, EvalError>;

/// One registered function.
#[derive(Debug, Clone)]
pub struct Builtin {
    pub name: &'static str,
    pub min_args: usize,
    pub max_args: usize,
    pub func: BuiltinFn,
}

/// Registry of scalar functions, keyed by lower-cased name.
#[derive(Debug, Clone)]
pub struct FunctionRegistry {
    functions: HashMap<String, Builtin>,
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        let mut registry = Self {
            functions: HashMap::new(),
        };
        registry.register(Builtin {
            name: "substring",
            min_args: 2,
            max_args: 3,
            func: builtin_substring,
        });
        registry.register(Builtin {
            name: "trim",
            min_args: 2,
            max_args: 3,
            func: builtin_trim,
        });
        registry.register(Builtin {
            name: "char_length",
            min_args: 1,
            max_args: 1,
            func: builtin_char_length,
        });
        registry.register(Builtin {
            name: "upper",
            min_args: 1,
            max_args: 1,
            func: builtin_upper,
        });
        registry.register(Builtin {
            name: "lower",
            min_args: 1,
            max_args: 1,
            func: builtin_lower,
        });
        registry.register(Builtin {
            name: "exists",
            min_args: 1,
            max_args: 1,
            func: builtin_exists,
        });
        registry
    }
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a function, replacing any previous one of the same name.
    pub fn register(&mut self, builtin: Builtin) {
        self.functions.insert(builtin.name.to_lowercase(), builtin);
    }

    /// Look up by name (case-insensitive) and check the call arity.
    pub fn resolve(&self, name: &str, num_args: usize) -> Result<&Builtin, EvalError> {
        let canonical = name.to_lowercase();
        let builtin = self.functions.get(&canonical).ok_or_else(|| {
            EvalError::new(
                EvalErrorCode::BindingNotFound,
                format!("no such function: {canonical}"),
            )
        })?;
        debug!(name = %canonical, arity = num_args, "function lookup");
        if num_args < builtin.min_args || num_args > builtin.max_args {
            return Err(EvalError::new(
                EvalErrorCode::InvalidArguments,
                format!(
                    "{canonical} takes {} to {} arguments, got {num_args}",
                    builtin.min_args, builtin.max_args
                ),
            ));
        }
        Ok(builtin)
    }
}

// ---------------------------------------------------------------------------
// The built-in functions
// ---------------------------------------------------------------------------

fn null_if_absent(args: &[DocValue]) -> bool {
    args.iter().any(DocValue::is_null_or_missing)
}

fn text_arg<'a>(name: &str, args: &'a [DocValue], index: usize) -> Result<&'a str, EvalError> {
    args[index].as_text().ok_or_else(|| {
        EvalError::new(
            EvalErrorCode::InvalidArguments,
            format!("{name}: argument {} must be text, got {}", index + 1, args[index].doc_type()),
        )
    })
}

fn int_arg(name: &str, args: &[DocValue], index: usize) -> Result<i64, EvalError> {
    args[index].as_int().ok_or_else(|| {
        EvalError::new(
            EvalErrorCode::InvalidArguments,
            format!(
                "{name}: argument {} must be an integer, got {}",
                index + 1,
                args[index].doc_type()
            ),
        )
    })
}

/// `substring(s, start [, length])`, 1-based, by code point. Follows the
/// standard rule: characters at positions `max(start, 1)` through
/// `start + length - 1`.
fn builtin_substring(args: &[DocValue]) -> Result<DocValue, EvalError> {
    if null_if_absent(args) {
        return Ok(DocValue::Null(DocType::Null));
    }
    let s = text_arg("substring", args, 0)?;
    let start = int_arg("substring", args, 1)?;
    let length = if args.len() == 3 {
        let length = int_arg("substring", args, 2)?;
        if length < 0 {
            return Err(EvalError::new(
                EvalErrorCode::InvalidArguments,
                "substring: length must be non-negative",
            ));
        }
        Some(length)
    } else {
        None
    };

    let chars: Vec<char> = s.chars().collect();
    let begin = start.max(1) - 1;
    let end = match length {
        Some(length) => (start.saturating_add(length) - 1).max(begin),
        None => i64::MAX,
    };
    let result: String = chars
        .iter()
        .enumerate()
        .filter(|(i, _)| {
            let position = *i as i64;
            position >= begin && position < end
        })
        .map(|(_, c)| *c)
        .collect();
    Ok(DocValue::String(result))
}

/// `trim(mode, [chars], target)` — the parser supplies the mode symbol
/// (`leading`, `trailing`, or `both`); the default trim set is the space
/// character.
fn builtin_trim(args: &[DocValue]) -> Result<DocValue, EvalError> {
    if null_if_absent(&args[1..]) {
        return Ok(DocValue::Null(DocType::Null));
    }
    let mode = text_arg("trim", args, 0)?;
    let (chars, target) = if args.len() == 3 {
        (text_arg("trim", args, 1)?, text_arg("trim", args, 2)?)
    } else {
        (" ", text_arg("trim", args, 1)?)
    };
    let set: Vec<char> = chars.chars().collect();
    let matcher = |c: char| set.contains(&c);
    let result = match mode {
        "leading" => target.trim_start_matches(matcher),
        "trailing" => target.trim_end_matches(matcher),
        _ => target.trim_matches(matcher),
    };
    Ok(DocValue::String(result.to_owned()))
}

fn builtin_char_length(args: &[DocValue]) -> Result<DocValue, EvalError> {
    if null_if_absent(args) {
        return Ok(DocValue::Null(DocType::Null));
    }
    let s = text_arg("char_length", args, 0)?;
    Ok(DocValue::Int(i64::try_from(s.chars().count()).unwrap_or(i64::MAX)))
}

fn builtin_upper(args: &[DocValue]) -> Result<DocValue, EvalError> {
    if null_if_absent(args) {
        return Ok(DocValue::Null(DocType::Null));
    }
    Ok(DocValue::String(text_arg("upper", args, 0)?.to_uppercase()))
}

fn builtin_lower(args: &[DocValue]) -> Result<DocValue, EvalError> {
    if null_if_absent(args) {
        return Ok(DocValue::Null(DocType::Null));
    }
    Ok(DocValue::String(text_arg("lower", args, 0)?.to_lowercase()))
}

/// True when a container has at least one element or field.
fn builtin_exists(args: &[DocValue]) -> Result<DocValue, EvalError> {
    let populated = match &args[0] {
        DocValue::List(items) | DocValue::Sexp(items) => !items.is_empty(),
        DocValue::Struct(fields) => !fields.is_empty(),
        _ => {
            return Err(EvalError::new(
                EvalErrorCode::InvalidArguments,
                format!("exists: expected a container, got {}", args[0].doc_type()),
            ));
        }
    };
    Ok(DocValue::Bool(populated))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(registry: &FunctionRegistry, name: &str, args: &[DocValue]) -> DocValue {
        let builtin = registry.resolve(name, args.len()).expect("function resolves");
        (builtin.func)(args).expect("function succeeds")
    }

    fn text(s: &str) -> DocValue {
        DocValue::String(s.to_owned())
    }

    fn sym(s: &str) -> DocValue {
        DocValue::Symbol(s.to_owned())
    }

    #[test]
    fn resolve_checks_name_and_arity() {
        let registry = FunctionRegistry::new();
        assert!(registry.resolve("UPPER", 1).is_ok());
        let err = registry.resolve("nope", 0).expect_err("unknown function");
        assert_eq!(err.code, EvalErrorCode::BindingNotFound);
        let err = registry.resolve("upper", 2).expect_err("bad arity");
        assert_eq!(err.code, EvalErrorCode::InvalidArguments);
    }

    #[test]
    fn substring_follows_sql_positions() {
        let registry = FunctionRegistry::new();
        let abc = text("abcde");
        assert_eq!(
            call(&registry, "substring", &[abc.clone(), DocValue::Int(2)]),
            text("bcde")
        );
        assert_eq!(
            call(
                &registry,
                "substring",
                &[abc.clone(), DocValue::Int(2), DocValue::Int(3)]
            ),
            text("bcd")
        );
        // A negative start still counts toward the end position.
        assert_eq!(
            call(
                &registry,
                "substring",
                &[abc.clone(), DocValue::Int(-1), DocValue::Int(3)]
            ),
            text("a")
        );
        assert_eq!(
            call(
                &registry,
                "substring",
                &[abc, DocValue::Int(3), DocValue::Int(0)]
            ),
            text("")
        );
    }

    #[test]
    fn trim_modes() {
        let registry = FunctionRegistry::new();
        assert_eq!(
            call(&registry, "trim", &[sym("both"), text("  x  ")]),
            text("x")
        );
        assert_eq!(
            call(&registry, "trim", &[sym("leading"), text("xx"), text("xyx")]),
            text("yx")
        );
        assert_eq!(
            call(&registry, "trim", &[sym("trailing"), text("x"), text("xyx")]),
            text("xy")
        );
    }

    #[test]
    fn scalar_functions_propagate_null() {
        let registry = FunctionRegistry::new();
        assert_eq!(
            call(&registry, "upper", &[DocValue::Missing]),
            DocValue::Null(DocType::Null)
        );
        assert_eq!(
            call(
                &registry,
                "substring",
                &[text("abc"), DocValue::Null(DocType::Null)]
            ),
            DocValue::Null(DocType::Null)
        );
    }

    #[test]
    fn text_helpers() {
        let registry = FunctionRegistry::new();
        assert_eq!(call(&registry, "upper", &[text("ab")]), text("AB"));
        assert_eq!(call(&registry, "lower", &[sym("AB")]), text("ab"));
        assert_eq!(
            call(&registry, "char_length", &[text("héllo")]),
            DocValue::Int(5)
        );
    }

    #[test]
    fn exists_checks_population() {
        let registry = FunctionRegistry::new();
        assert_eq!(
            call(&registry, "exists", &[DocValue::List(vec![DocValue::Int(1)])]),
            DocValue::Bool(true)
        );
        assert_eq!(
            call(&registry, "exists", &[DocValue::Struct(vec![])]),
            DocValue::Bool(false)
        );
        let builtin = registry.resolve("exists", 1).expect("resolves");
        let err = (builtin.func)(&[DocValue::Int(1)]).expect_err("not a container");
        assert_eq!(err.code, EvalErrorCode::InvalidArguments);
    }
}
