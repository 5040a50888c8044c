//! Conformance tests: queries and expected outputs expressed in the
//! document text form, with strict equality as the oracle (so bags
//! compare as unordered multisets and decimals by numeric value).

use docql::{eval, parse_doc, pts_eq, Bindings, EvalErrorCode, ExprValue};

/// Build bindings from a struct in text form.
fn bindings(env_text: &str) -> Bindings {
    let doc = parse_doc(env_text).expect("environment should parse");
    let mut globals = Bindings::new();
    for (name, value) in doc.struct_fields().expect("environment must be a struct") {
        globals.bind(name.clone(), ExprValue::from_doc(value.clone()));
    }
    globals
}

fn check(env_text: &str, query: &str, expected: &str) {
    let globals = bindings(env_text);
    let actual = eval(query, &globals).unwrap_or_else(|e| panic!("{query}: {e}"));
    let expected = parse_doc(expected).expect("expected output should parse");
    assert!(
        pts_eq(&actual, &expected),
        "{query}:\n  got  {actual}\n  want {expected}"
    );
}

fn check_eval_error(env_text: &str, query: &str, code: EvalErrorCode) {
    let globals = bindings(env_text);
    match eval(query, &globals) {
        Ok(value) => panic!("{query}: expected {code:?}, got {value}"),
        Err(docql::Error::Eval(e)) => assert_eq!(e.code, code, "{query}: {e}"),
        Err(docql::Error::Parse(e)) => panic!("{query}: unexpected parse error {e}"),
    }
}

const ANIMALS: &str = r#"{
    animals: [
        {name: "Kumo", type: "dog"},
        {name: "Mochi", type: "dog"},
        {name: "Lilikoi", type: "unicorn"},
    ],
}"#;

#[test]
fn select_star_with_row_independent_like_filter() {
    // The filter doesn't mention the row, is true, and keeps all three.
    check(
        ANIMALS,
        "SELECT * FROM animals a WHERE '100%' LIKE '1%[%' ESCAPE '['",
        r#"(bag {name: "Kumo", type: "dog"}
               {name: "Mochi", type: "dog"}
               {name: "Lilikoi", type: "unicorn"})"#,
    );
    check(
        ANIMALS,
        "SELECT * FROM animals a WHERE 'Kuumo' LIKE 'K_mo'",
        "(bag)",
    );
}

#[test]
fn like_is_row_sensitive_when_it_mentions_the_row() {
    check(
        ANIMALS,
        "SELECT a.name FROM animals a WHERE a.name LIKE '%o'",
        r#"(bag {name: "Kumo"})"#,
    );
    check(
        ANIMALS,
        "SELECT a.name FROM animals a WHERE a.name NOT LIKE '%i'",
        r#"(bag {name: "Kumo"})"#,
    );
}

#[test]
fn projection_aliases_and_synthetic_names() {
    check(
        ANIMALS,
        "SELECT a.name AS moniker, a.type, 1 AS one FROM animals a LIMIT 1",
        r#"(bag {moniker: "Kumo", type: "dog", one: 1})"#,
    );
    check(
        "{data: [2]}",
        "SELECT v + 1 FROM data v",
        "(bag {_1: 3})",
    );
}

#[test]
fn unpivot_turns_structs_into_named_bags() {
    check(
        "{prices: {apple: 3, pear: 4}}",
        "SELECT kv FROM unpivot(prices) AS kv",
        "(bag {apple: 3} {pear: 4})",
    );
    check("{}", "SELECT n FROM unpivot(42) AS n", "(bag {_1: 42})");
}

#[test]
fn cast_scenarios() {
    check("{}", "CAST('-0005' AS INT)", "-5");
    check("{}", "CAST('+0x10' AS INT)", "16");
    check("{}", "CAST('true' AS BOOLEAN)", "true");
    check("{}", "CAST('TrUe' AS BOOLEAN)", "true");
    check("{}", "CAST('other' AS BOOLEAN)", "false");
    check("{}", "CAST(3.9 AS INT)", "3");
    check("{}", "CAST('2007-02-23T12:14Z' AS TIMESTAMP)", "2007-02-23T12:14Z");
    check("{}", "CAST(`[1, 2]` AS BAG)", "(bag 1 2)");
    check("{}", "CAST(NULL AS INT)", "null");
    check("{}", "CAST(MISSING AS STRING)", "missing::null.symbol");
    check_eval_error(
        "{}",
        "CAST('99999999999999999999' AS INT)",
        EvalErrorCode::IntOverflow,
    );
    check_eval_error("{}", "CAST(1 AS TIMESTAMP)", EvalErrorCode::InvalidCast);
    check_eval_error("{}", "CAST('zzz' AS TIMESTAMP)", EvalErrorCode::CastFailed);
}

#[test]
fn cast_is_idempotent_on_matching_types() {
    for (value, target) in [
        ("true", "BOOLEAN"),
        ("5", "INT"),
        ("1e0", "FLOAT"),
        ("1.5", "DECIMAL"),
        ("\"x\"", "STRING"),
        ("{a: 1}", "STRUCT"),
    ] {
        check("{}", &format!("CAST(`{value}` AS {target})"), value);
    }
}

#[test]
fn equality_and_ordering() {
    check("{}", "1 = 1.0", "true");
    check("{}", "1.0 = 1.00", "true");
    check("{}", "1 = '1'", "false");
    check("{}", "NULL = NULL", "null");
    check("{}", "MISSING = 1", "null");
    check("{}", "2 > 1.5", "true");
    check("{}", "'b' >= 'a'", "true");
}

#[test]
fn literal_bags_round_trip_through_values() {
    check("{}", "VALUES (1, 1), (2, 1)", "(bag [1, 1] [2, 1])");
    // Multiset comparison accepts any order.
    check("{}", "VALUES (1, 1), (2, 1)", "(bag [2, 1] [1, 1])");
}

#[test]
fn paths_over_nested_data() {
    check(
        "{orders: [{lines: [{sku: \"a\"}, {sku: \"b\"}]}]}",
        "SELECT line.sku FROM orders o, o.lines AS line",
        "(bag {sku: \"a\"} {sku: \"b\"})",
    );
    check("{s: {a: {b: 7}}}", "s.a.b", "7");
    check("{s: {a: 1}}", "s.absent", "missing::null.symbol");
}

#[test]
fn embedded_literals_feed_the_pipeline() {
    check(
        "{}",
        "SELECT x.v FROM `[{v: 1.0}, {v: 1.00}]` AS x WHERE x.v = 1.0",
        "(bag {v: 1.0} {v: 1.00})",
    );
}

#[test]
fn case_and_functions_compose() {
    check(
        ANIMALS,
        "SELECT CASE a.type WHEN 'dog' THEN upper(a.name) ELSE a.name END AS label \
         FROM animals a",
        r#"(bag {label: "KUMO"} {label: "MOCHI"} {label: "Lilikoi"})"#,
    );
    check(
        ANIMALS,
        "SELECT a.name FROM animals a WHERE char_length(a.name) BETWEEN 4 AND 5",
        r#"(bag {name: "Kumo"} {name: "Mochi"})"#,
    );
}

#[test]
fn select_star_merges_all_sources() {
    check(
        "{xs: [1], ys: [2]}",
        "SELECT * FROM xs x, ys y",
        "(bag {x: 1, y: 2})",
    );
}

#[test]
fn at_positions_are_zero_based_and_unstable_only_for_bags() {
    check(
        "{letters: [\"a\", \"b\", \"c\"]}",
        "SELECT i FROM letters AS l AT i WHERE l = 'b'",
        "(bag {i: 1})",
    );
}
