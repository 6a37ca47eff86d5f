// tests/parser_tests.rs

use dictquery::ast::{BinOp, Expr, ExprKind};
use dictquery::lexer::{Lexer, Position};
use dictquery::parser::{ParseError, Parser, parse_path};

fn parse(path: &str) -> Expr {
    parse_path(path).unwrap()
}

fn parse_err(path: &str) -> ParseError {
    parse_path(path).unwrap_err()
}

// ============================================================================
// Primaries
// ============================================================================

#[test_log::test]
fn test_root_forms() {
    assert_eq!(parse("$").kind, ExprKind::Root);
    assert_eq!(parse("*").kind, ExprKind::RootWildcard);
    assert_eq!(parse("root").kind, ExprKind::Name("root".to_string()));
    assert_eq!(parse("$limit").kind, ExprKind::VarRef("limit".to_string()));

    let ExprKind::Key { object, key, wildcard } = parse("$.a").kind else {
        panic!("expected key access");
    };
    assert_eq!(object.kind, ExprKind::Root);
    assert_eq!(key, "a");
    assert!(!wildcard);
}

#[test_log::test]
fn test_leading_dot_is_root_wildcard() {
    let ExprKind::Key { object, key, .. } = parse(".root").kind else {
        panic!("expected key access");
    };
    assert_eq!(object.kind, ExprKind::RootWildcard);
    assert_eq!(key, "root");

    let ExprKind::Index { object, index } = parse(".[0]").kind else {
        panic!("expected index access");
    };
    assert_eq!(object.kind, ExprKind::RootWildcard);
    assert_eq!(index.kind, ExprKind::Integer(0));
}

#[test_log::test]
fn test_literals() {
    assert_eq!(parse("42").kind, ExprKind::Integer(42));
    assert_eq!(parse("-7").kind, ExprKind::Integer(-7));
    assert_eq!(parse("2.5").kind, ExprKind::Float(2.5));
    assert_eq!(parse("'text'").kind, ExprKind::String("text".to_string()));
    assert_eq!(parse("true").kind, ExprKind::Boolean(true));
    assert_eq!(parse("false").kind, ExprKind::Boolean(false));
    assert_eq!(parse("null").kind, ExprKind::Null);
}

#[test_log::test]
fn test_keywords_after_dot_are_keys() {
    let ExprKind::Key { key, .. } = parse("flags.true").kind else {
        panic!("expected key access");
    };
    assert_eq!(key, "true");
}

#[test_log::test]
fn test_escaped_name() {
    let ExprKind::Key { key, .. } = parse(r"root.key\.01").kind else {
        panic!("expected key access");
    };
    assert_eq!(key, "key.01");
}

// ============================================================================
// Access chains
// ============================================================================

#[test_log::test]
fn test_bracket_forms() {
    let ExprKind::Index { index, .. } = parse("a[*]").kind else {
        panic!("expected index access");
    };
    assert_eq!(index.kind, ExprKind::Wildcard);

    let ExprKind::Index { index, .. } = parse("a['key.01']").kind else {
        panic!("expected index access");
    };
    assert_eq!(index.kind, ExprKind::String("key.01".to_string()));

    let ExprKind::Index { index, .. } = parse("a[-1]").kind else {
        panic!("expected index access");
    };
    assert_eq!(index.kind, ExprKind::Integer(-1));

    let ExprKind::Key { wildcard, .. } = parse("a.*").kind else {
        panic!("expected key access");
    };
    assert!(wildcard);
}

#[test_log::test]
fn test_filter_predicate() {
    let ExprKind::Index { index, .. } = parse("list['id'==2]").kind else {
        panic!("expected index access");
    };
    assert!(matches!(
        index.kind,
        ExprKind::BinaryOp {
            op: BinOp::Equal,
            ..
        }
    ));
}

#[test_log::test]
fn test_slices() {
    let slice_parts = |path: &str| match parse(path).kind {
        ExprKind::Slice {
            start, end, step, ..
        } => (
            start.map(|e| e.kind),
            end.map(|e| e.kind),
            step.map(|e| e.kind),
        ),
        other => panic!("expected slice, got {other:?}"),
    };

    assert_eq!(
        slice_parts("n[1:4]"),
        (Some(ExprKind::Integer(1)), Some(ExprKind::Integer(4)), None)
    );
    assert_eq!(slice_parts("n[::-1]"), (None, None, Some(ExprKind::Integer(-1))));
    assert_eq!(slice_parts("n[:]"), (None, None, None));
    assert_eq!(slice_parts("n[3:]"), (Some(ExprKind::Integer(3)), None, None));
    assert_eq!(
        slice_parts("n[5:2:-1]"),
        (
            Some(ExprKind::Integer(5)),
            Some(ExprKind::Integer(2)),
            Some(ExprKind::Integer(-1))
        )
    );
}

#[test_log::test]
fn test_dot_before_bracket_is_ignored() {
    assert_eq!(parse("a.[0]").to_string(), parse("a[0]").to_string());
    assert!(matches!(parse("a.[0]").kind, ExprKind::Index { .. }));
}

// ============================================================================
// Precedence
// ============================================================================

#[test_log::test]
fn test_arithmetic_precedence() {
    let ExprKind::BinaryOp { op, right, .. } = parse("1 + 2 * 3").kind else {
        panic!("expected binary op");
    };
    assert_eq!(op, BinOp::Add);
    assert!(matches!(
        right.kind,
        ExprKind::BinaryOp {
            op: BinOp::Multiply,
            ..
        }
    ));
}

#[test_log::test]
fn test_logical_operators_share_a_tier() {
    let ExprKind::BinaryOp { op, left, .. } = parse("a || b && c").kind else {
        panic!("expected binary op");
    };
    assert_eq!(op, BinOp::And);
    assert!(matches!(left.kind, ExprKind::BinaryOp { op: BinOp::Or, .. }));
}

#[test_log::test]
fn test_comparisons_chain_left_to_right() {
    let ExprKind::BinaryOp { op, left, .. } = parse("1 < 2 == true").kind else {
        panic!("expected binary op");
    };
    assert_eq!(op, BinOp::Equal);
    assert!(matches!(
        left.kind,
        ExprKind::BinaryOp {
            op: BinOp::LessThan,
            ..
        }
    ));
}

#[test_log::test]
fn test_parentheses_override() {
    let ExprKind::BinaryOp { op, .. } = parse("(1 + 2) * 3").kind else {
        panic!("expected binary op");
    };
    assert_eq!(op, BinOp::Multiply);
}

// ============================================================================
// Script calls
// ============================================================================

#[test_log::test]
fn test_script_call() {
    let ExprKind::ScriptCall {
        module_path,
        name,
        args,
        kwargs,
    } = parse("@math.util.scale(2, $x, factor=5,)").kind
    else {
        panic!("expected script call");
    };
    assert_eq!(module_path, vec!["math".to_string(), "util".to_string()]);
    assert_eq!(name, "scale");
    assert_eq!(args.len(), 2);
    assert_eq!(args[1].kind, ExprKind::VarRef("x".to_string()));
    assert_eq!(kwargs["factor"].kind, ExprKind::Integer(5));
}

#[test_log::test]
fn test_script_call_without_parens() {
    let ExprKind::ScriptCall { name, args, .. } = parse("@now").kind else {
        panic!("expected script call");
    };
    assert_eq!(name, "now");
    assert!(args.is_empty());
}

#[test_log::test]
fn test_script_argument_errors() {
    assert!(matches!(
        parse_err("@f(k=1, 2)"),
        ParseError::PositionalAfterKeyword { .. }
    ));
    assert!(matches!(
        parse_err("@f(k=1, k=2)"),
        ParseError::DuplicateKeyword { name, .. } if name == "k"
    ));
}

// ============================================================================
// Errors
// ============================================================================

#[test_log::test]
fn test_empty_path() {
    assert_eq!(parse_err(""), ParseError::EmptyPath);
    assert_eq!(parse_err("   "), ParseError::EmptyPath);
}

#[test_log::test]
fn test_trailing_input() {
    assert_eq!(
        parse_err("root other"),
        ParseError::TrailingInput {
            found: "'other'".to_string(),
            position: Position::new(1, 6)
        }
    );
}

#[test_log::test]
fn test_unclosed_bracket() {
    let err = parse_err("a[1");
    assert!(matches!(err, ParseError::UnexpectedToken { ref found, .. } if found == "end of input"));
    assert!(err.to_string().contains("']'"));
}

#[test_log::test]
fn test_star_operand_only_opens_an_expression() {
    assert!(matches!(parse_err("a * *"), ParseError::UnexpectedToken { .. }));
    assert!(matches!(parse_err("1 + *.a"), ParseError::UnexpectedToken { .. }));
    assert_eq!(parse("(*.a)").to_string(), "*.a");
    assert!(matches!(parse("a * 2").kind, ExprKind::BinaryOp { op: BinOp::Multiply, .. }));
}

#[test_log::test]
fn test_root_marker_inside_expression() {
    let ExprKind::BinaryOp { left, .. } = parse("1 + $.a").kind else {
        panic!("expected binary op");
    };
    assert!(matches!(left.kind, ExprKind::Integer(1)));
    assert_eq!(parse("($.a + 1)").to_string(), "($.a + 1)");
    assert_eq!(parse(r"$key\.1").to_string(), r"$key\.1");
    assert_eq!(parse(r"$key\.1").kind, ExprKind::VarRef("key.1".to_string()));
}

#[test_log::test]
fn test_missing_key_after_dot() {
    assert!(matches!(parse_err("a..b"), ParseError::UnexpectedToken { .. }));
}

#[test_log::test]
fn test_invalid_number() {
    assert!(matches!(
        parse_err("99999999999999999999"),
        ParseError::InvalidNumber { .. }
    ));
}

#[test_log::test]
fn test_lex_errors_pass_through() {
    assert!(matches!(parse_err("a.#"), ParseError::Lex(_)));
}

#[test_log::test]
fn test_nesting_limit() {
    let nested = Parser::new(Lexer::new("((((1))))"))
        .unwrap()
        .with_max_depth(3)
        .parse();
    assert!(matches!(nested, Err(ParseError::NestingTooDeep { limit: 3, .. })));

    let chain = Parser::new(Lexer::new("a.b.c.d.e"))
        .unwrap()
        .with_max_depth(3)
        .parse();
    assert!(matches!(chain, Err(ParseError::NestingTooDeep { .. })));

    assert!(
        Parser::new(Lexer::new("a.b.c"))
            .unwrap()
            .with_max_depth(3)
            .parse()
            .is_ok()
    );
}

#[test_log::test]
fn test_deep_input_is_rejected_not_overflowed() {
    let path = format!("{}1{}", "(".repeat(10_000), ")".repeat(10_000));
    assert!(matches!(
        parse_err(&path),
        ParseError::NestingTooDeep { limit: 128, .. }
    ));
}

// ============================================================================
// Display round trip
// ============================================================================

#[test_log::test]
fn test_display() {
    assert_eq!(
        parse("root.list['id'==2].name").to_string(),
        r#"root.list[("id" == 2)].name"#
    );
    assert_eq!(parse("a['key.01'][0:3]").to_string(), r#"a["key.01"][0:3]"#);
    assert_eq!(parse("$.a.*").to_string(), "$.a.*");
    assert_eq!(parse("@ns.f(1, k=2.0)").to_string(), "@ns.f(1, k=2.0)");
}

#[test_log::test]
fn test_display_reparses_to_same_tree_shape() {
    for path in [
        "root.list['id'==2 && 'name'=='x'].sub[::-1]",
        r"root.key\.01",
        "a[-1].b['c d']",
        "*.name",
        "$threshold * 2 + 1",
        "a.true",
        "$.a + 1",
        "$ == 1",
        r"$key\.1",
        "*.a * 2",
    ] {
        let first = parse(path);
        let again = parse(&first.to_string());
        assert_eq!(first.to_string(), again.to_string(), "{path}");
    }
}
