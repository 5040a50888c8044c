//! API-level tests for the compile-and-evaluate entry points.

use docql::{
    eval, parse_doc, pts_eq, Bindings, Builtin, CompilerPipeline, DocValue, EvalErrorCode, Error,
    ExprValue, ParseErrorCode, Property, PropertyValue,
};

fn globals() -> Bindings {
    let mut globals = Bindings::new();
    globals.bind(
        "data",
        ExprValue::from_doc(parse_doc("[{x: 1}, {x: 2}]").expect("data parses")),
    );
    globals
}

#[test]
fn compile_then_execute() {
    let pipeline = CompilerPipeline::new();
    let executable = pipeline
        .compile("SELECT d.x FROM data d WHERE d.x > 1")
        .expect("compiles");
    let result = executable.execute(&globals()).expect("executes");
    assert!(pts_eq(
        &result,
        &parse_doc("(bag {x: 2})").expect("expected parses")
    ));
}

#[test]
fn one_pipeline_compiles_many_statements() {
    let pipeline = CompilerPipeline::new();
    let first = pipeline.compile("1 + 1").expect("compiles");
    let second = pipeline.compile("2 + 2").expect("compiles");
    let globals = Bindings::new();
    assert_eq!(first.execute(&globals).expect("runs"), DocValue::Int(2));
    assert_eq!(second.execute(&globals).expect("runs"), DocValue::Int(4));
}

#[test]
fn ast_is_inspectable_as_sexp() {
    let pipeline = CompilerPipeline::new();
    let executable = pipeline.compile("a + 1").expect("compiles");
    assert_eq!(
        executable.ast().to_sexp(),
        parse_doc("(+ (id a) (lit 1))").expect("expected parses")
    );
}

#[test]
fn parse_errors_surface_with_code_and_position() {
    let err = CompilerPipeline::new()
        .compile("5 BETWEEN 1  10")
        .expect_err("must fail");
    let Error::Parse(err) = err else {
        panic!("expected a parse error, got {err:?}");
    };
    assert_eq!(err.code, ParseErrorCode::ExpectedKeyword);
    assert_eq!(
        err.properties.get(Property::Keyword),
        Some(&PropertyValue::Text("AND".to_owned()))
    );
    assert_eq!(err.properties.position(), Some((1, 14)));
    assert_eq!(
        err.to_string(),
        "PARSE_EXPECTED_KEYWORD: expected keyword AND at 1:14"
    );
}

#[test]
fn eval_errors_surface_through_the_facade() {
    let err = eval("CAST('oops' AS TIMESTAMP)", &Bindings::new()).expect_err("must fail");
    let Error::Eval(err) = err else {
        panic!("expected an eval error, got {err:?}");
    };
    assert_eq!(err.code, EvalErrorCode::CastFailed);
    assert!(!err.internal);
}

#[test]
fn custom_functions_register_through_the_builder() {
    fn double(args: &[DocValue]) -> Result<docql::DocValue, docql::EvalError> {
        match &args[0] {
            DocValue::Int(i) => Ok(DocValue::Int(i * 2)),
            other => Err(docql::EvalError::new(
                EvalErrorCode::InvalidArguments,
                format!("double expects an integer, got {}", other.doc_type()),
            )),
        }
    }

    let pipeline = CompilerPipeline::builder()
        .with_function(Builtin {
            name: "double",
            min_args: 1,
            max_args: 1,
            func: double,
        })
        .build();
    let result = pipeline
        .compile("double(21)")
        .expect("compiles")
        .execute(&Bindings::new())
        .expect("executes");
    assert_eq!(result, DocValue::Int(42));
}

#[test]
fn lenient_pipelines_turn_unknown_names_into_missing() {
    let pipeline = CompilerPipeline::builder()
        .lenient_undefined_variables()
        .build();
    let result = pipeline
        .compile("nope")
        .expect("compiles")
        .execute(&Bindings::new())
        .expect("executes");
    assert_eq!(result, DocValue::Missing);

    let err = eval("nope", &Bindings::new()).expect_err("strict default");
    assert!(matches!(
        err,
        Error::Eval(e) if e.code == EvalErrorCode::BindingNotFound
    ));
}

#[test]
fn one_shot_eval_matches_compile_execute() {
    let via_eval = eval("SELECT d.x FROM data d", &globals()).expect("eval runs");
    let via_pipeline = CompilerPipeline::new()
        .compile("SELECT d.x FROM data d")
        .expect("compiles")
        .execute(&globals())
        .expect("executes");
    assert!(pts_eq(&via_eval, &via_pipeline));
}
