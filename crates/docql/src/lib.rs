//! Public API facade for DocQL.
//!
//! The pipeline turns query text into a result against document-model
//! bindings:
//!
//! ```
//! use docql::{Bindings, CompilerPipeline, ExprValue};
//!
//! let mut globals = Bindings::new();
//! globals.bind(
//!     "data",
//!     ExprValue::from_doc(docql::parse_doc("[{x: 1}, {x: 2}]").unwrap()),
//! );
//!
//! let pipeline = CompilerPipeline::new();
//! let executable = pipeline.compile("SELECT d.x FROM data d WHERE d.x > 1").unwrap();
//! let result = executable.execute(&globals).unwrap();
//! assert_eq!(result.to_string(), "(bag {x: 2})");
//! ```

use docql_ast::Expr;
use docql_eval::{Evaluator, FunctionRegistry, UndefinedVariableBehavior};
use tracing::debug;

pub use docql_ast as ast;
pub use docql_error::DocQlError as Error;
pub use docql_error::{
    DocQlError, EvalError, EvalErrorCode, ParseErrorCode, ParserError, Property, PropertyBag,
    PropertyValue,
};
pub use docql_eval::{Bindings, Builtin, BuiltinFn, ExprValue};
pub use docql_parser::{parse, tokenize, Token, TokenType};
pub use docql_types::{parse_doc, pts_eq, DocType, DocValue};

/// The compile half of the pipeline: configuration plus [`compile`].
///
/// [`compile`]: CompilerPipeline::compile
pub struct CompilerPipeline {
    functions: FunctionRegistry,
    undefined_variables: UndefinedVariableBehavior,
}

impl Default for CompilerPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl CompilerPipeline {
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> CompilerPipelineBuilder {
        CompilerPipelineBuilder {
            functions: FunctionRegistry::new(),
            undefined_variables: UndefinedVariableBehavior::Error,
        }
    }

    /// Compile source text into a single-use executable.
    pub fn compile(&self, source: &str) -> Result<Executable, DocQlError> {
        let expr = parse(source)?;
        debug!("compiled statement");
        Ok(Executable {
            expr,
            evaluator: Evaluator::new()
                .with_functions(self.functions.clone())
                .with_undefined_variables(self.undefined_variables),
        })
    }
}

/// Configuration for a [`CompilerPipeline`].
pub struct CompilerPipelineBuilder {
    functions: FunctionRegistry,
    undefined_variables: UndefinedVariableBehavior,
}

impl CompilerPipelineBuilder {
    /// Register an extra scalar function (or override a built-in).
    #[must_use]
    pub fn with_function(mut self, builtin: Builtin) -> Self {
        self.functions.register(builtin);
        self
    }

    /// Evaluate unresolvable names to MISSING instead of raising
    /// `EVALUATOR_BINDING_NOT_FOUND`.
    #[must_use]
    pub fn lenient_undefined_variables(mut self) -> Self {
        self.undefined_variables = UndefinedVariableBehavior::Missing;
        self
    }

    pub fn build(self) -> CompilerPipeline {
        CompilerPipeline {
            functions: self.functions,
            undefined_variables: self.undefined_variables,
        }
    }
}

/// A compiled statement. The evaluation session is single-use:
/// [`execute`] consumes it.
///
/// [`execute`]: Executable::execute
#[derive(Debug)]
pub struct Executable {
    expr: Expr,
    evaluator: Evaluator,
}

impl Executable {
    /// The compiled AST (s-expression form available via
    /// [`docql_ast::Expr::to_sexp`]).
    pub fn ast(&self) -> &Expr {
        &self.expr
    }

    /// Run against a root environment and materialize the result.
    pub fn execute(self, globals: &Bindings) -> Result<DocValue, DocQlError> {
        Ok(self.evaluator.evaluate(&self.expr, globals)?)
    }
}

/// Compile and execute in one call.
pub fn eval(source: &str, globals: &Bindings) -> Result<DocValue, DocQlError> {
    CompilerPipeline::new().compile(source)?.execute(globals)
}
