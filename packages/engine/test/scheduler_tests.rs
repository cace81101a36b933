mod support;

use std::cell::Cell;
use std::rc::Rc;

use serde_json::{json, Value};

use support::{engine_with, render};
use weft_engine::{DiagnosticKind, EngineConfig};

#[test]
fn repeated_updates_are_idempotent() {
    let (engine, host) = render(
        "<div><p w-if=\"ok\">%label%</p></div>",
        json!({"ok": true, "label": "stable"}),
    );
    let first = engine.markup(host);
    engine.update(host, false);
    engine.update(host, true);
    assert_eq!(engine.markup(host), first);
}

#[test]
fn updated_hook_runs_after_the_pass() {
    let (engine, host) = render("<p w-updated=\"n = 10\">%n%</p>", json!({"n": 0}));
    // The output of the pass predates the hook; the write it made lands in
    // data and shows up on the follow-up.
    assert_eq!(engine.markup(host), "<p>0</p>");
    let host_ref = engine.host(host).unwrap();
    assert_eq!(host_ref.data.borrow()["n"], json!(10));
    engine.drain_deferred();
    assert_eq!(engine.markup(host), "<p>10</p>");
}

#[test]
fn dirty_render_schedules_one_coalesced_follow_up() {
    let (engine, host) = render("<p w-updated=\"n = 10\">%n%</p>", json!({"n": 0}));
    // The hook dirtied the data, so exactly one follow-up is queued.
    assert_eq!(engine.pending_deferred(), 1);
    engine.drain_deferred();
    assert_eq!(engine.pending_deferred(), 0);
    assert_eq!(engine.markup(host), "<p>10</p>");
    let host = engine.host(host).unwrap();
    assert!(!host.has_diagnostic(DiagnosticKind::DepthExceeded));
}

#[test]
fn converged_writes_stop_rescheduling() {
    let (engine, host) = render("<p w-updated=\"n = 1\">%n%</p>", json!({"n": 0}));
    engine.drain_deferred();
    // The second pass writes the same value, which is not a change.
    assert_eq!(engine.pending_deferred(), 0);
    let host = engine.host(host).unwrap();
    assert_eq!(host.data.borrow()["n"], json!(1));
}

#[test]
fn loop_guard_trips_on_runaway_hooks() {
    let engine = engine_with(EngineConfig {
        loop_limit: 3,
        ..EngineConfig::default()
    });
    let host = engine.mount("<p w-updated=\"n = n + 1\">%n%</p>", json!({"n": 0}));
    engine.drain_deferred();

    let host_ref = engine.host(host).unwrap();
    assert!(host_ref.has_diagnostic(DiagnosticKind::DepthExceeded));
    // Three dirty runs completed before the guard refused the fourth.
    assert_eq!(host_ref.data.borrow()["n"], json!(3));
    assert_eq!(engine.pending_deferred(), 0);
}

#[test]
fn guard_counter_resets_after_a_clean_run() {
    let engine = engine_with(EngineConfig {
        loop_limit: 3,
        ..EngineConfig::default()
    });
    let host = engine.mount("<p w-updated=\"n = 1\">%n%</p>", json!({"n": 0}));
    engine.drain_deferred();
    // Converged, so later updates start a fresh cycle instead of tripping.
    for _ in 0..10 {
        engine.update(host, false);
    }
    let host_ref = engine.host(host).unwrap();
    assert!(!host_ref.has_diagnostic(DiagnosticKind::DepthExceeded));
}

#[test]
fn lazy_host_keeps_output_on_soft_updates() {
    let (engine, host) = render(
        "<div w-lazy=\"\">%label%</div>",
        json!({"label": "before"}),
    );
    assert_eq!(engine.markup(host), "<div>before</div>");

    let host_ref = engine.host(host).unwrap();
    host_ref.write_path(&["label".to_string()], json!("after"));
    engine.update(host, false);
    assert_eq!(engine.markup(host), "<div>before</div>");

    engine.update(host, true);
    assert_eq!(engine.markup(host), "<div>after</div>");
}

#[test]
fn lazy_host_still_runs_recorded_hooks() {
    let (engine, host) = render(
        "<div w-lazy=\"\" w-updated=\"seen = seen + 1\">x</div>",
        json!({"seen": 0}),
    );
    let host_ref = engine.host(host).unwrap();
    assert_eq!(host_ref.data.borrow()["seen"], json!(1));

    // Soft passes skip the rebuild but replay the recorded hook.
    engine.update(host, false);
    assert_eq!(host_ref.data.borrow()["seen"], json!(2));
}

#[test]
fn lazy_host_still_updates_its_children() {
    let engine = support::engine();
    engine.define_component("leaf-note", "<i>%n%</i>");
    let parent = engine.mount(
        "<div w-lazy=\"\"><leaf-note w-data=\"{n: 1}\"></leaf-note></div>",
        json!({}),
    );
    let parent_ref = engine.host(parent).unwrap();
    let child = parent_ref.children.borrow()[0];
    engine
        .host(child)
        .unwrap()
        .write_path(&["n".to_string()], json!(2));

    // The parent's own output stays frozen, the child's does not.
    engine.update(parent, false);
    assert!(engine.markup(parent).contains("<i>2</i>"));
}

#[test]
fn lazy_flag_is_rederived_each_pass() {
    let (engine, host) = render(
        "<div><p w-lazy=\"\" w-if=\"l\">x</p>%n%</div>",
        json!({"l": true, "n": 1}),
    );
    let host_ref = engine.host(host).unwrap();
    host_ref.write_path(&["n".to_string()], json!(2));
    engine.update(host, false);
    assert!(engine.markup(host).contains("1"));

    // Once the marked branch drops out, the host is ordinary again.
    host_ref.write_path(&["l".to_string()], json!(false));
    engine.update(host, true);
    host_ref.write_path(&["n".to_string()], json!(3));
    engine.update(host, false);
    assert!(engine.markup(host).contains("3"));
}

#[test]
fn updated_propagate_refreshes_the_root_ancestor() {
    let engine = support::engine();
    let ticks = Rc::new(Cell::new(0));
    let counter = Rc::clone(&ticks);
    engine.methods.register("tick", move |_args| {
        counter.set(counter.get() + 1);
        Ok(Value::from(counter.get()))
    });
    engine.define_component("leaf-note", "<i w-updated-propagate=\"root\">x</i>");
    engine.mount(
        "<div w-methods=\"tick\">%tick()%<leaf-note></leaf-note></div>",
        json!({}),
    );

    // First parent render, then one propagate-driven re-render when the
    // forced cascade re-ran the child. The propagation that landed while
    // the parent was still mid-render coalesced into one follow-up.
    assert_eq!(ticks.get(), 2);
    assert_eq!(engine.pending_deferred(), 1);
    engine.drain_deferred();
    assert_eq!(ticks.get(), 3);
    assert_eq!(engine.pending_deferred(), 0);
}

#[test]
fn updated_propagate_counts_hops_to_the_ancestor() {
    let engine = support::engine();
    engine.define_component("leaf-note", "<i w-updated-propagate=\"1\">x</i>");
    let parent = engine.mount(
        "<div>%label%<leaf-note></leaf-note></div>",
        json!({"label": "a"}),
    );
    engine.drain_deferred();

    let parent_ref = engine.host(parent).unwrap();
    parent_ref.write_path(&["label".to_string()], json!("b"));
    assert!(engine.markup(parent).starts_with("<div>a"));

    // Updating only the child drags the stale parent along.
    let child = parent_ref.children.borrow()[0];
    engine.update(child, false);
    assert!(engine.markup(parent).starts_with("<div>b"));
}

#[test]
fn propagate_forces_a_lazy_ancestor_to_rebuild() {
    let engine = support::engine();
    engine.define_component("leaf-note", "<i w-updated-propagate=\"1\">x</i>");
    let parent = engine.mount(
        "<div w-lazy=\"\">%label%<leaf-note></leaf-note></div>",
        json!({"label": "a"}),
    );
    let parent_ref = engine.host(parent).unwrap();
    parent_ref.write_path(&["label".to_string()], json!("b"));
    engine.update(parent, false);
    assert!(engine.markup(parent).starts_with("<div>a"));

    // A soft update skips the lazy parent; propagation does not.
    let child = parent_ref.children.borrow()[0];
    engine.update(child, false);
    assert!(engine.markup(parent).starts_with("<div>b"));
}

#[test]
fn teardown_makes_updates_no_ops() {
    let (engine, host) = render("<p>%n%</p>", json!({"n": 1}));
    engine.teardown(host);
    engine.update(host, false);
    engine.update(host, true);
    assert!(engine.host(host).is_none());
}
