mod support;

use serde_json::json;

use support::render;

#[test]
fn fallthrough_runs_until_break() {
    let template = "<div w-switch=\"val\"><p w-case=\"2\">two</p><p w-case=\"3\" w-break=\"\">three</p><p w-default=\"\">other</p></div>";

    let (engine, host) = render(template, json!({"val": 2}));
    assert_eq!(
        engine.markup(host),
        "<div><p>two</p><p>three</p></div>"
    );

    let (engine, host) = render(template, json!({"val": 3}));
    assert_eq!(engine.markup(host), "<div><p>three</p></div>");
}

#[test]
fn default_renders_when_no_case_matches() {
    let template = "<div w-switch=\"val\"><p w-case=\"2\">two</p><p w-case=\"3\" w-break=\"\">three</p><p w-default=\"\">other</p></div>";
    let (engine, host) = render(template, json!({"val": 5}));
    assert_eq!(engine.markup(host), "<div><p>other</p></div>");
}

#[test]
fn no_match_and_no_default_renders_empty_container() {
    let (engine, host) = render(
        "<div w-switch=\"val\"><p w-case=\"1\">one</p></div>",
        json!({"val": 9}),
    );
    assert_eq!(engine.markup(host), "<div></div>");
}

#[test]
fn case_matches_loosely() {
    let (engine, host) = render(
        "<div w-switch=\"val\"><p w-case=\"'2'\" w-break=\"\">two</p></div>",
        json!({"val": 2}),
    );
    assert_eq!(engine.markup(host), "<div><p>two</p></div>");
}

#[test]
fn array_case_matches_by_membership() {
    let template =
        "<div w-switch=\"val\"><p w-case=\"[1, 2]\" w-break=\"\">low</p><p w-default=\"\">high</p></div>";
    let (engine, host) = render(template, json!({"val": 2}));
    assert_eq!(engine.markup(host), "<div><p>low</p></div>");
    let (engine, host) = render(template, json!({"val": 7}));
    assert_eq!(engine.markup(host), "<div><p>high</p></div>");
}

#[test]
fn regex_case_tests_the_rendered_value() {
    let template = "<div w-switch=\"name\"><p w-case=\"'/^an/'\" w-break=\"\">match</p><p w-default=\"\">miss</p></div>";
    let (engine, host) = render(template, json!({"name": "anna"}));
    assert_eq!(engine.markup(host), "<div><p>match</p></div>");
    let (engine, host) = render(template, json!({"name": "bo"}));
    assert_eq!(engine.markup(host), "<div><p>miss</p></div>");
}

#[test]
fn predicate_case_calls_the_registered_method() {
    let engine = support::engine();
    engine.methods.register("isBig", |args| {
        let n = args.first().and_then(|v| v.as_f64()).unwrap_or(0.0);
        Ok(json!(n > 100.0))
    });
    let host = engine.mount(
        "<div w-switch=\"val\" w-methods=\"isBig\"><p w-case=\"isBig\" w-break=\"\">big</p><p w-default=\"\">small</p></div>",
        json!({"val": 500}),
    );
    assert_eq!(engine.markup(host), "<div><p>big</p></div>");
}

#[test]
fn literal_list_fallback_splits_on_delimiters() {
    let template = "<div w-switch=\"color\"><p w-case=\"red|green\" w-break=\"\">warm</p><p w-default=\"\">cold</p></div>";
    let (engine, host) = render(template, json!({"color": "green"}));
    assert_eq!(engine.markup(host), "<div><p>warm</p></div>");
    let (engine, host) = render(template, json!({"color": "blue"}));
    assert_eq!(engine.markup(host), "<div><p>cold</p></div>");
}

#[test]
fn switch_value_is_visible_in_the_body() {
    let (engine, host) = render(
        "<div w-switch=\"val\"><p w-case=\"2\" w-break=\"\">saw %$switch%</p></div>",
        json!({"val": 2}),
    );
    assert_eq!(engine.markup(host), "<div><p>saw 2</p></div>");
}

#[test]
fn default_position_does_not_shadow_later_cases() {
    // A default listed before a matching case still loses to the match.
    let template = "<div w-switch=\"val\"><p w-default=\"\" w-break=\"\">other</p><p w-case=\"2\" w-break=\"\">two</p></div>";
    let (engine, host) = render(template, json!({"val": 2}));
    assert_eq!(engine.markup(host), "<div><p>two</p></div>");
}

#[test]
fn case_break_sugar_matches_and_stops() {
    let template = "<div w-switch=\"val\"><p w-case=\"1\">one</p><p w-case.break=\"2\">two</p><p w-default=\"\">other</p></div>";

    let (engine, host) = render(template, json!({"val": 2}));
    assert_eq!(engine.markup(host), "<div><p>two</p></div>");

    let (engine, host) = render(template, json!({"val": 5}));
    assert_eq!(engine.markup(host), "<div><p>other</p></div>");
}

#[test]
fn fallthrough_skips_non_case_children() {
    let (engine, host) = render(
        "<div w-switch=\"val\"><p w-case=\"1\">one</p><span>plain</span>and<p w-default=\"\" w-break=\"\">nine</p></div>",
        json!({"val": 1}),
    );
    assert_eq!(engine.markup(host), "<div><p>one</p><p>nine</p></div>");
}
