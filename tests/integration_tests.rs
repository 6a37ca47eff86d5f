// tests/integration_tests.rs

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use dictquery::{
    CompiledPath, Error, EvalError, ParseError, QueryOptions, ScriptError, ScriptRegistry,
    SliceError, Value, query, query_segments, query_with,
};
use serde_json::json;

fn doc(json: serde_json::Value) -> Value {
    Value::from(json)
}

fn fixture() -> Value {
    doc(json!({
        "root": {
            "root_key": "root_value",
            "child": [["first", "second"], ["third", "fourth"]],
            "key.01": "value",
            "key[02]": "value2",
            ".": "pass",
            "data": [{"id": 1}, {"id": 2}, {"id": 3}],
            "info": {"list": ["first_list_item", {"details": "detail_value"}]},
            "empty": [],
            "items": [
                {"value": 10, "sub_value": 100},
                {"value": 20, "sub_value": 200},
                {"value": 30, "sub_value": 300}
            ],
            "array": [["a", "b", "c"], ["d", "e", "f"]],
            "dictionary": {"key": "value", "invalid": null},
            "list": [
                {"id": 1, "name": "value1", "sub_id": "A", "sub_list": [5, 6, 7, 8]},
                {"id": 2, "name": "value2", "sub_id": "A", "sub_list": [1, 2, 3, 4]},
                {"id": 3, "name": "value3", "sub_id": "B", "sub_list": [9, 10, 11, 12]},
                {"id": 2, "name": "value4", "sub_id": "B", "key": true, "sub_list": [5, 6, 7, 8]}
            ],
            "number_list": [1, 2, 3, 4, 5, 6, 7, 8, 9]
        }
    }))
}

fn check(cases: &[(&str, serde_json::Value)]) {
    let d = fixture();
    for (path, expected) in cases {
        let result = query(&d, path, false).unwrap_or_else(|e| panic!("{path}: {e}"));
        assert_eq!(result, doc(expected.clone()), "{path}");
    }
}

// ============================================================================
// Fixture document
// ============================================================================

#[test_log::test]
fn test_key_access() {
    check(&[
        ("root.root_key", json!("root_value")),
        (r#"root["root_key"]"#, json!("root_value")),
        ("root['.']", json!("pass")),
        ("root['key.01']", json!("value")),
        (r"root.key\.01", json!("value")),
        ("root['key[02]']", json!("value2")),
        ("root['dictionary']['key']", json!("value")),
        (".root.root_key", json!("root_value")),
        ("root.dictionary['invalid']", json!(null)),
    ]);
}

#[test_log::test]
fn test_indexing_and_wildcards() {
    check(&[
        ("root.number_list[2]", json!(3)),
        ("root.child[0][0]", json!("first")),
        ("root.child[1][0]", json!("third")),
        (".root.child[1][0]", json!("third")),
        ("root.items[*].value", json!([10, 20, 30])),
        ("root.data[*].id", json!([1, 2, 3])),
        ("root.info.list[1].details", json!("detail_value")),
        ("root.empty[*]", json!([])),
        ("root.array[1][2]", json!("f")),
    ]);
}

#[test_log::test]
fn test_filters() {
    check(&[
        ("root.list['id'==2].name", json!(["value2", "value4"])),
        ("root.list['sub_id'=='A'].sub_list", json!([[5, 6, 7, 8], [1, 2, 3, 4]])),
        (r#"root.list["id"<3].name"#, json!(["value1", "value2", "value4"])),
        (r#"root.list["id"==2&&"name"=="value4"].sub_list"#, json!([[5, 6, 7, 8]])),
        (r#"root.list["id"==2||"id"==3].sub_id"#, json!(["A", "B", "B"])),
        (r#"root.list[("id"==2||"id"==3)].sub_id"#, json!(["A", "B", "B"])),
        ("root.list['key'==true].name", json!(["value4"])),
    ]);
}

#[test_log::test]
fn test_slices() {
    check(&[
        ("root.number_list[1:4]", json!([2, 3, 4])),
        ("root.number_list[::2]", json!([1, 3, 5, 7, 9])),
        ("root.number_list[::-1]", json!([9, 8, 7, 6, 5, 4, 3, 2, 1])),
        ("root.number_list[-3:]", json!([7, 8, 9])),
        ("root.number_list[:3]", json!([1, 2, 3])),
        ("root.number_list[3:]", json!([4, 5, 6, 7, 8, 9])),
        ("root.number_list[1:6:2]", json!([2, 4, 6])),
        ("root.list[1:3].name", json!(["value2", "value3"])),
        ("root.array[0][1:3]", json!(["b", "c"])),
        ("root.empty[1:3]", json!([])),
        ("root.number_list[10:20]", json!([])),
        ("root.number_list[-10:-5]", json!([1, 2, 3, 4])),
        ("root.number_list[5:2:-1]", json!([6, 5, 4])),
    ]);
}

#[test_log::test]
fn test_fixture_errors() {
    let d = fixture();
    assert!(matches!(
        query(&d, "root.list[id==1].name", false),
        Err(Error::Eval(EvalError::UndefinedName { .. }))
    ));
    assert_eq!(
        query(&d, "root.number_list[2:5:0]", false),
        Err(Error::Eval(EvalError::Slice(SliceError::StepZero)))
    );
    assert!(matches!(
        query(&d, "root.number_list[2:5:1.5]", false),
        Err(Error::Eval(EvalError::Slice(SliceError::BoundNotInteger { .. })))
    ));
}

// ============================================================================
// Scenarios
// ============================================================================

#[test_log::test]
fn test_filter_then_key() {
    let d = doc(json!({"list": [{"id": 1, "v": [5, 6]}, {"id": 2, "v": [1, 2]}, {"id": 2, "v": [9, 9]}]}));
    assert_eq!(
        query(&d, "list['id'==2].v", false).unwrap(),
        doc(json!([[1, 2], [9, 9]]))
    );
}

#[test_log::test]
fn test_reverse_slice_and_zero_step() {
    let d = doc(json!({"n": [1, 2, 3, 4, 5, 6, 7, 8, 9]}));
    assert_eq!(query(&d, "n[5:2:-1]", false).unwrap(), doc(json!([6, 5, 4])));
    assert_eq!(
        query(&d, "n[2:5:0]", false).unwrap_err(),
        Error::Eval(EvalError::Slice(SliceError::StepZero))
    );
}

#[test_log::test]
fn test_missing_key_scenario() {
    let d = doc(json!({"a": {"b": "x"}}));
    assert_eq!(query(&d, "a.c", false).unwrap(), Value::Null);
    assert_eq!(query(&d, "a[*].c", true).unwrap(), doc(json!([])));

    let suppress = QueryOptions::new().with_suppress_errors(true);
    assert_eq!(query_segments(&d, "a[*].c", &suppress).unwrap(), doc(json!([])));
    assert_eq!(query_segments(&d, "a.c", &suppress).unwrap(), doc(json!([])));
    assert_eq!(
        query_segments(&d, "a.c", &QueryOptions::new()).unwrap_err(),
        Error::Eval(EvalError::KeyNotFound {
            key: "c".to_string()
        })
    );
}

#[test_log::test]
fn test_flatten() {
    assert_eq!(
        doc(json!([[1, [2, [3, 4]]], [5]])).flatten(),
        doc(json!([1, 2, 3, 4, 5]))
    );
    assert_eq!(doc(json!([])).flatten(), doc(json!([])));
    assert_eq!(doc(json!([1, 2, 3])).flatten(), doc(json!([1, 2, 3])));
    assert_eq!(Value::Integer(1).flatten(), Value::Integer(1));
}

// ============================================================================
// Error suppression
// ============================================================================

#[test_log::test]
fn test_suppression_of_evaluation_errors() {
    let d = fixture();
    assert!(matches!(
        query(&d, "root.list[99]", false),
        Err(Error::Eval(EvalError::IndexOutOfRange { index: 99, len: 4 }))
    ));
    for path in [
        "root.list[99]",
        "root.number_list[2:5:0]",
        "root.list[id==1]",
        "root.root_key - 1",
        "root.number_list[0] / 0",
    ] {
        assert_eq!(query(&d, path, true).unwrap(), doc(json!([])), "{path}");
    }
}

#[test_log::test]
fn test_malformed_paths_are_never_suppressed() {
    let d = fixture();
    assert!(matches!(query(&d, "root.#", true), Err(Error::Lex(_))));
    assert!(matches!(query(&d, "root[", true), Err(Error::Syntax(_))));
    assert_eq!(query(&d, "", true), Err(Error::Syntax(ParseError::EmptyPath)));
    assert!(matches!(
        query_segments(&d, "root]", &QueryOptions::new().with_suppress_errors(true)),
        Err(Error::Syntax(ParseError::InvalidExpression { .. }))
    ));
}

#[test_log::test]
fn test_script_errors_and_suppression() {
    let d = fixture();
    let options = QueryOptions::new().with_suppress_errors(true);

    let err = query(&d, "@nope()", true).unwrap_err();
    assert!(matches!(
        err,
        Error::Eval(EvalError::Script(ScriptError::Unresolved { .. }))
    ));
    assert!(!err.is_suppressible());

    let mut registry = ScriptRegistry::new();
    registry
        .register("fail", |_, _| Err("boom".to_string()))
        .unwrap();
    assert_eq!(
        query_with(&d, "@fail()", &options, &registry).unwrap(),
        doc(json!([]))
    );
}

// ============================================================================
// Scripts and variables
// ============================================================================

#[test_log::test]
fn test_filter_right_side_short_circuits() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let mut registry = ScriptRegistry::new();
    registry
        .register("touch", move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Value::Boolean(true))
        })
        .unwrap();

    let result = query_with(
        &fixture(),
        "root.list['id'==2 && @touch()].name",
        &QueryOptions::new(),
        &registry,
    )
    .unwrap();

    assert_eq!(result, doc(json!(["value2", "value4"])));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test_log::test]
fn test_variable_in_filter() {
    let mut registry = ScriptRegistry::new();
    registry.define("threshold", Value::Integer(20));

    let result = query_with(
        &fixture(),
        "root.items['value' >= $threshold].sub_value",
        &QueryOptions::new(),
        &registry,
    )
    .unwrap();
    assert_eq!(result, doc(json!([200, 300])));
}

#[test_log::test]
fn test_namespaced_script_with_kwargs() {
    let mut registry = ScriptRegistry::default();
    registry
        .register("math.scale", |args, kwargs| {
            let base = args.first().and_then(Value::as_int).unwrap_or(0);
            let factor = kwargs.get("factor").and_then(Value::as_int).unwrap_or(1);
            Ok(Value::Integer(base * factor))
        })
        .unwrap();

    let result = query_with(
        &fixture(),
        "@math.scale(@len($root.number_list), factor=5)",
        &QueryOptions::new(),
        &registry,
    )
    .unwrap();
    assert_eq!(result, Value::Integer(45));
}

// ============================================================================
// Compiled paths
// ============================================================================

#[test_log::test]
fn test_compiled_path_is_reusable() {
    let path: CompiledPath = "list['id'==2].v".parse().unwrap();
    let options = QueryOptions::new();
    let registry = ScriptRegistry::new();

    let first = doc(json!({"list": [{"id": 2, "v": 1}]}));
    let second = doc(json!({"list": [{"id": 1, "v": 1}, {"id": 2, "v": 7}]}));

    assert_eq!(path.evaluate(&first, &options, &registry).unwrap(), doc(json!([1])));
    assert_eq!(path.evaluate(&second, &options, &registry).unwrap(), doc(json!([7])));
}

#[test_log::test]
fn test_rendered_path_selects_the_same_values() {
    let d = fixture();
    let options = QueryOptions::new();
    let registry = ScriptRegistry::new();

    for path in [
        "root.list['id'==2].name",
        r#"root.list["id"==2&&"name"=="value4"].sub_list"#,
        "root.number_list[5:2:-1]",
        "root['key.01']",
        r"root.key\.01",
        ".root.items[*].value",
        "root.child[-1][0]",
        "$.root.number_list[0] + 1",
        r"$root\.x",
        "$root.items[0].value * 2",
    ] {
        let compiled = CompiledPath::parse(path).unwrap();
        let reparsed = CompiledPath::parse(&compiled.to_string()).unwrap();
        assert_eq!(
            compiled.evaluate(&d, &options, &registry),
            reparsed.evaluate(&d, &options, &registry),
            "{path} rendered as {compiled}"
        );
    }
}

#[test_log::test]
fn test_depth_option_applies_to_evaluation() {
    let d = doc(json!({"a": {"b": {"c": 1}}}));
    let shallow = QueryOptions::new().with_max_depth(2);
    let registry = ScriptRegistry::new();

    assert_eq!(
        query_with(&d, "a.b.c", &shallow, &registry).unwrap_err(),
        Error::Eval(EvalError::NestingTooDeep { limit: 2 })
    );
    assert_eq!(
        query_with(&d, "a.b.c", &QueryOptions::new(), &registry).unwrap(),
        Value::Integer(1)
    );
}
