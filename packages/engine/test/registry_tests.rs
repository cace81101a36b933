mod support;

use std::cell::Cell;
use std::rc::Rc;

use serde_json::json;

use support::{engine_with, render};
use weft_engine::{DiagnosticKind, EngineConfig, ExternalSource};

#[test]
fn declarations_register_without_rendering() {
    let (engine, host) = render(
        "<div><p w-template=\"greet\">hi %name%</p><span w-include=\"greet\"></span></div>",
        json!({"name": "zoe"}),
    );
    assert_eq!(engine.markup(host), "<div><span>hi zoe</span></div>");
    let host = engine.host(host).unwrap();
    assert!(host.registry.contains("greet"));
}

#[test]
fn inclusion_works_before_the_declaration_in_document_order() {
    let (engine, host) = render(
        "<div><span w-include=\"greet\"></span><p w-template=\"greet\">hi</p></div>",
        json!({}),
    );
    assert_eq!(engine.markup(host), "<div><span>hi</span></div>");
}

#[test]
fn include_target_can_come_from_an_expression() {
    let (engine, host) = render(
        "<div><p w-template=\"a\">first</p><p w-template=\"b\">second</p><span w-include=\"which\"></span></div>",
        json!({"which": "b"}),
    );
    assert_eq!(engine.markup(host), "<div><span>second</span></div>");
}

#[test]
fn include_target_can_be_a_quoted_literal() {
    let (engine, host) = render(
        "<div><p w-template=\"a\">first</p><span w-include=\"'a'\"></span></div>",
        json!({}),
    );
    assert_eq!(engine.markup(host), "<div><span>first</span></div>");
}

#[test]
fn included_body_evaluates_in_the_call_site_scope() {
    let (engine, host) = render(
        "<div><p w-template=\"row\">%item%</p><span w-for=\"item of [1, 2]\" w-include=\"row\"></span></div>",
        json!({}),
    );
    assert_eq!(engine.markup(host), "<div><span>1</span><span>2</span></div>");
}

#[test]
fn missing_template_marks_the_node_and_keeps_children() {
    let (engine, host) = render(
        "<div><span w-include=\"nope\">fallback</span></div>",
        json!({}),
    );
    let markup = engine.markup(host);
    assert!(markup.contains("weft-template-not-found=\"nope\""));
    assert!(markup.contains("fallback"));
    let host = engine.host(host).unwrap();
    assert!(host.has_diagnostic(DiagnosticKind::ResourceUnavailable));
}

#[test]
fn over_deep_inclusion_is_cut_and_marked() {
    let engine = engine_with(EngineConfig {
        include_max_depth: 2,
        ..EngineConfig::default()
    });
    let host = engine.mount(
        "<div><p w-template=\"r\"><span w-include=\"r\"></span></p><em w-include=\"r\"></em></div>",
        json!({}),
    );
    let markup = engine.markup(host);
    assert!(markup.contains("weft-include-depth-overflow=\"3\""));
    let host = engine.host(host).unwrap();
    assert!(host.has_diagnostic(DiagnosticKind::DepthExceeded));
}

#[test]
fn siblings_of_an_over_deep_chain_still_render() {
    let engine = engine_with(EngineConfig {
        include_max_depth: 1,
        ..EngineConfig::default()
    });
    let host = engine.mount(
        "<div><p w-template=\"r\"><span w-include=\"r\"></span></p><em w-include=\"r\"></em><b>tail</b></div>",
        json!({}),
    );
    assert!(engine.markup(host).contains("<b>tail</b>"));
}

#[test]
fn lookup_walks_outward_through_ancestor_hosts() {
    let engine = support::engine();
    engine.define_component("card-view", "<b w-include=\"greet\"></b>");
    let host = engine.mount(
        "<div><i w-template=\"greet\">yo</i><card-view></card-view></div>",
        json!({}),
    );
    assert_eq!(engine.markup(host), "<div><b>yo</b></div>");
}

#[test]
fn nameless_declaration_is_reported() {
    let (engine, host) = render("<div><p w-template=\"\">x</p></div>", json!({}));
    let host = engine.host(host).unwrap();
    assert!(host.has_diagnostic(DiagnosticKind::DirectiveMisuse));
    assert!(host.registry.is_empty());
}

struct CountingSource {
    calls: Rc<Cell<usize>>,
    body: &'static str,
}

impl ExternalSource for CountingSource {
    fn fetch(&self, _url: &str) -> anyhow::Result<String> {
        self.calls.set(self.calls.get() + 1);
        Ok(self.body.to_string())
    }
}

struct FailingSource;

impl ExternalSource for FailingSource {
    fn fetch(&self, url: &str) -> anyhow::Result<String> {
        Err(anyhow::anyhow!("unreachable: {url}"))
    }
}

#[test]
fn imports_are_fetched_once_per_url() {
    let calls = Rc::new(Cell::new(0));
    let engine = support::engine();
    engine.set_external(Box::new(CountingSource {
        calls: Rc::clone(&calls),
        body: "<b>ext %n%</b>",
    }));
    let host = engine.mount(
        "<div><span w-import=\"'u1'\"></span><span w-import=\"'u1'\"></span></div>",
        json!({"n": 7}),
    );
    assert_eq!(
        engine.markup(host),
        "<div><span><b>ext 7</b></span><span><b>ext 7</b></span></div>"
    );
    assert_eq!(calls.get(), 1);

    engine.update(host, true);
    assert_eq!(calls.get(), 1);
}

#[test]
fn failed_import_marks_the_node_and_keeps_children() {
    let engine = support::engine();
    engine.set_external(Box::new(FailingSource));
    let host = engine.mount(
        "<div><span w-import=\"'u1'\">offline</span></div>",
        json!({}),
    );
    let markup = engine.markup(host);
    assert!(markup.contains("weft-import-error=\"u1\""));
    assert!(markup.contains("offline"));
    let host = engine.host(host).unwrap();
    assert!(host.has_diagnostic(DiagnosticKind::ResourceUnavailable));
}

#[test]
fn import_without_a_source_is_reported() {
    let (engine, host) = render("<div><span w-import=\"'u1'\"></span></div>", json!({}));
    let host = engine.host(host).unwrap();
    assert!(host.has_diagnostic(DiagnosticKind::ResourceUnavailable));
}
