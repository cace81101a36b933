mod support;

use serde_json::json;

use support::{first_by_tag, render};
use weft_engine::DiagnosticKind;

#[test]
fn let_binds_on_the_local_frame() {
    let (engine, host) = render(
        "<div w-let=\"greeting = 'hi'\">%greeting%</div>",
        json!({}),
    );
    assert_eq!(engine.markup(host), "<div>hi</div>");
}

#[test]
fn let_materializes_nested_objects_without_raising() {
    let (engine, host) = render("<p w-let=\"a.b = 1\">%a.b%</p>", json!({}));
    assert_eq!(engine.markup(host), "<p>1</p>");
    let host = engine.host(host).unwrap();
    assert!(!host.has_diagnostic(DiagnosticKind::Expression));
    // The fresh object lives on the local frame, not in host data.
    assert!(host.data.borrow().get("a").is_none());
}

#[test]
fn let_shadows_data_without_mutating_it() {
    let (engine, host) = render(
        "<p w-let=\"name = 'shadow'\">%name%</p>",
        json!({"name": "real"}),
    );
    assert_eq!(engine.markup(host), "<p>shadow</p>");
    let host = engine.host(host).unwrap();
    assert_eq!(host.data.borrow()["name"], json!("real"));
}

#[test]
fn global_writes_through_to_existing_data_keys() {
    let (engine, host) = render(
        "<p w-global=\"count = 5\">%count%</p>",
        json!({"count": 0}),
    );
    assert_eq!(engine.markup(host), "<p>5</p>");
    let host = engine.host(host).unwrap();
    assert_eq!(host.data.borrow()["count"], json!(5));
}

#[test]
fn global_falls_back_to_engine_globals() {
    let (engine, host) = render("<p w-global=\"theme = 'dark'\">x</p>", json!({}));
    let host_ref = engine.host(host).unwrap();
    assert!(host_ref.data.borrow().get("theme").is_none());
    assert_eq!(engine.global("theme"), Some(json!("dark")));
}

#[test]
fn event_statement_assigns_into_host_data() {
    let (engine, host) = render(
        "<button @click=\"count = count + 1\">%count%</button>",
        json!({"count": 0}),
    );
    assert_eq!(engine.markup(host), "<button>0</button>");
    let button = first_by_tag(&engine, host, "button");
    engine.fire(host, button, "click", None);
    assert_eq!(engine.markup(host), "<button>1</button>");
}

#[test]
fn event_statement_sees_the_event_payload() {
    let (engine, host) = render(
        "<button @click=\"last = $event.key\">%last%</button>",
        json!({"last": ""}),
    );
    let button = first_by_tag(&engine, host, "button");
    engine.fire(host, button, "click", Some(&json!({"key": "Enter"})));
    assert_eq!(engine.markup(host), "<button>Enter</button>");
}

#[test]
fn nested_assignment_through_data() {
    let (engine, host) = render(
        "<button @click=\"user.name = 'zoe'\">%user.name%</button>",
        json!({"user": {"name": "ann"}}),
    );
    let button = first_by_tag(&engine, host, "button");
    engine.fire(host, button, "click", None);
    assert_eq!(engine.markup(host), "<button>zoe</button>");
    let host = engine.host(host).unwrap();
    assert_eq!(host.data.borrow()["user"]["name"], json!("zoe"));
}

#[test]
fn data_binding_is_always_visible() {
    let (engine, host) = render(
        "<p w-let=\"name = 'shadow'\">%$data.name%</p>",
        json!({"name": "real"}),
    );
    assert_eq!(engine.markup(host), "<p>real</p>");
}

#[test]
fn parent_and_root_reach_ancestor_hosts() {
    let engine = support::engine();
    engine.define_component("leaf-note", "<i>%$parent.level%/%$root.level%</i>");
    engine.define_component(
        "mid-node",
        "<span w-let=\"ignored = 0\"><leaf-note w-data=\"{level: 'mid'}\"></leaf-note></span>",
    );
    let host = engine.mount(
        "<div><mid-node w-data=\"{level: 'mid'}\"></mid-node></div>",
        json!({"level": "top"}),
    );
    assert_eq!(engine.markup(host), "<div><span><i>mid/top</i></span></div>");
}

#[test]
fn unresolved_read_degrades_with_a_diagnostic() {
    let (engine, host) = render("<p>before %missing% after</p>", json!({}));
    assert_eq!(engine.markup(host), "<p>before  after</p>");
    let host = engine.host(host).unwrap();
    assert!(host.has_diagnostic(DiagnosticKind::Expression));
}

#[test]
fn expression_failures_never_abort_the_pass() {
    let (engine, host) = render(
        "<div><p>%boom.x%</p><p>%ok%</p></div>",
        json!({"ok": "fine"}),
    );
    assert_eq!(engine.markup(host), "<div><p></p><p>fine</p></div>");
}

#[test]
fn statement_chains_run_left_to_right() {
    let (engine, host) = render(
        "<p w-let=\"a = 1; b = a + 1\">%a%%b%</p>",
        json!({}),
    );
    assert_eq!(engine.markup(host), "<p>12</p>");
}

#[test]
fn safe_navigation_suppresses_null_access() {
    let (engine, host) = render(
        "<p>%user?.name ?? 'anon'%</p>",
        json!({"user": null}),
    );
    assert_eq!(engine.markup(host), "<p>anon</p>");
}
