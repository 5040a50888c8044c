//! Evaluator for the DocQL dialect.
//!
//! Walks a parsed [`docql_ast::Expr`] over an environment of document
//! values and yields document-model output. Sequences stay lazy inside
//! the walk and materialize only at the boundary.

mod builtins;
mod cast;
mod coerce;
mod env;
mod eval;
mod like;
mod value;

pub use builtins::{Builtin, BuiltinFn, FunctionRegistry};
pub use env::{Bindings, Env};
pub use eval::{Evaluator, UndefinedVariableBehavior};
pub use value::{range_over, unpivot, ExprValue, SeqIter};
