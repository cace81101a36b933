mod support;

use serde_json::json;

use support::render;
use weft_engine::expression::ast::unparse;
use weft_engine::expression::Parser;

fn round_trip(src: &str) -> String {
    let ast = Parser::new()
        .parse(src)
        .unwrap_or_else(|e| panic!("parse `{src}`: {e}"));
    unparse(&ast)
}

#[test]
fn parses_binary_precedence() {
    assert_eq!(round_trip("a + b * c"), "a + b * c");
    assert_eq!(round_trip("a*b+c"), "a * b + c");
    assert_eq!(round_trip("a && b || c"), "a && b || c");
    assert_eq!(round_trip("a ?? b"), "a ?? b");
    assert_eq!(round_trip("a < b == c"), "a < b == c");
}

#[test]
fn parses_property_and_keyed_access() {
    assert_eq!(round_trip("user.name"), "user.name");
    assert_eq!(round_trip("user?.name"), "user?.name");
    assert_eq!(round_trip("items[0]"), "items[0]");
    assert_eq!(round_trip("items[i + 1].label"), "items[i + 1].label");
}

#[test]
fn parses_calls_and_literals() {
    assert_eq!(round_trip("fmt(a, 2)"), "fmt(a, 2)");
    assert_eq!(round_trip("[1, 'two', true]"), "[1, \"two\", true]");
    assert_eq!(round_trip("{a: 1, b: x}"), "{a: 1, b: x}");
    assert_eq!(round_trip("cond ? a : b"), "cond ? a : b");
    assert_eq!(round_trip("typeof x"), "typeof x");
}

#[test]
fn promotes_reads_to_writes_on_assignment() {
    assert_eq!(round_trip("a = 1"), "a = 1");
    assert_eq!(round_trip("user.name = 'x'"), "user.name = \"x\"");
    assert_eq!(round_trip("a = 1; b = 2"), "a = 1; b = 2");
}

#[test]
fn rejects_malformed_input() {
    assert!(Parser::new().parse("a +").is_err());
    assert!(Parser::new().parse("1 = 2").is_err());
    assert!(Parser::new().parse("a & b").is_err());
    assert!(Parser::new().parse("(a").is_err());
    assert!(Parser::new().parse("a b").is_err());
}

#[test]
fn empty_input_parses_to_empty() {
    assert!(Parser::new().parse("").is_ok());
    assert!(Parser::new().parse("   ").is_ok());
}

#[test]
fn evaluates_arithmetic_and_concat() {
    let (engine, host) = render("<p>%1 + 2 * 3%</p>", json!({}));
    assert_eq!(engine.markup(host), "<p>7</p>");

    let (engine, host) = render("<p>%'a' + 1%</p>", json!({}));
    assert_eq!(engine.markup(host), "<p>a1</p>");

    let (engine, host) = render("<p>%n / 4%</p>", json!({"n": 10}));
    assert_eq!(engine.markup(host), "<p>2.5</p>");
}

#[test]
fn evaluates_comparisons() {
    let (engine, host) = render(
        "<p>%a == '2'% %a === 2% %a != b% %b >= a%</p>",
        json!({"a": 2, "b": 3}),
    );
    assert_eq!(engine.markup(host), "<p>true true true true</p>");
}

#[test]
fn nullish_falls_back_for_null_values() {
    let (engine, host) = render("<p>%none ?? 'fallback'%</p>", json!({"none": null}));
    assert_eq!(engine.markup(host), "<p>fallback</p>");
}

#[test]
fn typeof_swallows_unresolved_names() {
    let (engine, host) = render("<p>%typeof missing% %typeof n%</p>", json!({"n": 1}));
    assert_eq!(engine.markup(host), "<p>undefined number</p>");
}

#[test]
fn value_helpers_are_callable() {
    let (engine, host) = render(
        "<p>%list.join('-')% %name.toUpperCase()% %list.includes(2)%</p>",
        json!({"list": [1, 2], "name": "ann"}),
    );
    assert_eq!(engine.markup(host), "<p>1-2 ANN true</p>");
}

#[test]
fn registered_methods_are_spliced_into_scope() {
    let engine = support::engine();
    engine.methods.register("double", |args| {
        let n = args.first().and_then(|v| v.as_f64()).unwrap_or(0.0);
        Ok(json!(n * 2.0))
    });
    let host = engine.mount("<p w-methods=\"double\">%double(21)%</p>", json!({}));
    assert_eq!(engine.markup(host), "<p>42</p>");
}

#[test]
fn undeclared_methods_stay_out_of_scope() {
    let engine = support::engine();
    engine.methods.register("double", |args| {
        let n = args.first().and_then(|v| v.as_f64()).unwrap_or(0.0);
        Ok(json!(n * 2.0))
    });
    let host = engine.mount("<p>%double(21)%</p>", json!({}));
    assert_eq!(engine.markup(host), "<p></p>");
}

#[test]
fn scope_names_shadow_registered_methods() {
    let engine = support::engine();
    engine.methods.register("label", |_| Ok(json!("from-method")));
    let host = engine.mount(
        "<p w-methods=\"label\">%label%</p>",
        json!({"label": "from-data"}),
    );
    assert_eq!(engine.markup(host), "<p>from-data</p>");
}

#[test]
fn globals_resolve_after_scope() {
    let engine = support::engine();
    engine.set_global("app", json!("weft"));
    let host = engine.mount("<p>%app%</p>", json!({}));
    assert_eq!(engine.markup(host), "<p>weft</p>");
}

#[test]
fn conditional_expression_selects_branch() {
    let (engine, host) = render("<p>%ok ? 'yes' : 'no'%</p>", json!({"ok": true}));
    assert_eq!(engine.markup(host), "<p>yes</p>");
}
