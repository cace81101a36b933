//! Directive dispatcher: the per-node control-flow interpreter.
//!
//! `render_nodes` walks a sibling list and appends output nodes. Directives
//! apply in fixed precedence per node; exclusive ones (conditionals,
//! switch, iteration, inclusion) take over the node, non-exclusive ones
//! (`w-let`, `w-global`, markers) extend the effective scope and fall
//! through. Every failure degrades locally; a render pass always runs to
//! completion.

use std::rc::Rc;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::engine::Engine;
use crate::error::DiagnosticKind;
use crate::expression::eval::{EvalCtx, Rich, WriteRule};
use crate::host::Host;
use crate::output::{Action, Handler, NodeMarks, OutputElement, OutputNode};
use crate::scope::{self, Scope, ScopeFrame};
use crate::source::{self, SourceElement, SourceNode};
use crate::value_ops;

/// Diagnostic attribute stamped on a node whose include target was not
/// found in any reachable registry.
pub const ATTR_TEMPLATE_NOT_FOUND: &str = "weft-template-not-found";
/// Diagnostic attribute stamped on the deepest node of an over-deep
/// inclusion chain.
pub const ATTR_INCLUDE_DEPTH: &str = "weft-include-depth-overflow";
/// Diagnostic attribute stamped on a node whose external import failed.
pub const ATTR_IMPORT_ERROR: &str = "weft-import-error";

static CASE_LIST_SPLIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[,|]").expect("static pattern"));

pub struct RenderCtx<'a> {
    pub engine: &'a Engine,
    pub host: &'a Rc<Host>,
    /// Inclusion nesting depth of the subtree being rendered.
    pub depth: usize,
}

impl<'a> RenderCtx<'a> {
    fn dn(&self, name: &str) -> String {
        format!("{}{}", self.engine.config.directive_prefix, name)
    }

    fn deeper(&self) -> RenderCtx<'a> {
        RenderCtx {
            engine: self.engine,
            host: self.host,
            depth: self.depth + 1,
        }
    }

    fn eval<'b>(&'b self, scope: &'b Scope) -> EvalCtx<'b> {
        EvalCtx::new(self.engine, self.host, scope)
    }
}

/// Pre-scan pass: named-template declarations register before anything
/// renders, so inclusion order never depends on document order.
pub fn collect_templates(engine: &Engine, host: &Host, nodes: &[SourceNode]) {
    let marker = format!("{}template", engine.config.directive_prefix);
    collect_templates_inner(host, nodes, &marker);
}

fn collect_templates_inner(host: &Host, nodes: &[SourceNode], marker: &str) {
    for node in nodes {
        if let SourceNode::Element(el) = node {
            if let Some(name) = el.attr(marker) {
                if name.is_empty() {
                    host.diag(
                        DiagnosticKind::DirectiveMisuse,
                        format!("template declaration without a name: {}", el.excerpt()),
                    );
                } else {
                    host.registry
                        .register(name.to_string(), el.clone_without(&[marker]));
                }
            }
            collect_templates_inner(host, &el.children, marker);
        }
    }
}

/// Render a sibling run. Conditional chains are resolved here because they
/// span siblings; everything else is per-node.
pub fn render_nodes(rc: &RenderCtx, nodes: &[SourceNode], scope: &Scope, out: &mut Vec<OutputNode>) {
    let d_if = rc.dn("if");
    let d_elseif = rc.dn("elseif");
    let d_else = rc.dn("else");

    let mut i = 0;
    while i < nodes.len() {
        match &nodes[i] {
            SourceNode::Text(t) => {
                out.push(OutputNode::Text(interpolate(rc, scope, t)));
                i += 1;
            }
            SourceNode::Comment(c) => {
                out.push(OutputNode::Comment(c.clone()));
                i += 1;
            }
            SourceNode::Element(el) => {
                if el.has_attr(&d_if) {
                    i = render_chain(rc, nodes, i, scope, out);
                } else if el.has_attr(&d_elseif) || el.has_attr(&d_else) {
                    // A continuation with no reachable head is inert.
                    rc.host.diag(
                        DiagnosticKind::DirectiveMisuse,
                        format!(
                            "conditional continuation without a reachable head: {}",
                            el.excerpt()
                        ),
                    );
                    i += 1;
                } else {
                    render_element(rc, el, scope, out);
                    i += 1;
                }
            }
        }
    }
}

/// Resolve an if/elseif/else chain starting at `head`. Returns the index of
/// the first sibling past the chain. At most one branch renders.
fn render_chain(
    rc: &RenderCtx,
    siblings: &[SourceNode],
    head: usize,
    scope: &Scope,
    out: &mut Vec<OutputNode>,
) -> usize {
    let d_if = rc.dn("if");
    let d_elseif = rc.dn("elseif");
    let d_else = rc.dn("else");
    let d_let = rc.dn("let");

    // The maximal contiguous run of conditional siblings; a second head or
    // any non-conditional (non-blank) sibling terminates it.
    let mut branches = vec![head];
    let mut j = head + 1;
    let mut last = head;
    while j < siblings.len() {
        match &siblings[j] {
            SourceNode::Text(t) if t.trim().is_empty() => j += 1,
            SourceNode::Comment(_) => j += 1,
            SourceNode::Element(el)
                if !el.has_attr(&d_if) && (el.has_attr(&d_elseif) || el.has_attr(&d_else)) =>
            {
                branches.push(j);
                last = j;
                j += 1;
            }
            _ => break,
        }
    }

    for &idx in &branches {
        let el = match siblings[idx].as_element() {
            Some(el) => el,
            None => continue,
        };
        // Per-branch `let` extends the chain scope before the condition
        // evaluates; discarded branches never leak their bindings.
        let branch_scope = match el.attr(&d_let) {
            Some(stmt) => {
                let frame = ScopeFrame::child_of(scope);
                let excerpt = el.excerpt();
                rc.eval(&frame)
                    .with_rule(WriteRule::Let)
                    .with_excerpt(&excerpt)
                    .statement(stmt);
                frame
            }
            None => Rc::clone(scope),
        };
        let is_else = idx != head && el.has_attr(&d_else) && !el.has_attr(&d_elseif);
        let taken = if is_else {
            true
        } else {
            let expr = el
                .attr(if idx == head { &d_if } else { &d_elseif })
                .unwrap_or("");
            let excerpt = el.excerpt();
            let v = rc
                .eval(&branch_scope)
                .with_excerpt(&excerpt)
                .read(expr);
            value_ops::coerce_condition(&v)
        };
        if taken {
            let clone = el.clone_without(&[
                d_if.as_str(),
                d_elseif.as_str(),
                d_else.as_str(),
                d_let.as_str(),
            ]);
            render_element(rc, &clone, &branch_scope, out);
            break;
        }
    }

    last + 1
}

/// Per-node dispatch in fixed precedence order.
pub fn render_element(rc: &RenderCtx, el: &SourceElement, scope: &Scope, out: &mut Vec<OutputNode>) {
    // 1. Comment-out and raw-literal passthrough.
    if el.has_attr(&rc.dn("rem")) {
        return;
    }
    if let Some(raw) = el.attr(&rc.dn("literal")) {
        let text = if raw.is_empty() {
            source::to_markup(&el.children)
        } else {
            raw.to_string()
        };
        out.push(OutputNode::Text(text));
        return;
    }
    // Declarations register in the pre-scan and never render.
    if el.has_attr(&rc.dn("template")) {
        return;
    }

    // Non-exclusive markers.
    if el.has_attr(&rc.dn("lazy")) {
        rc.host.state.set_lazy(true);
    }
    if el.has_attr(&rc.dn("stage")) {
        rc.host.begin_stage();
        rc.host.refresh_stage();
    }
    if let Some(names) = el.attr(&rc.dn("methods")) {
        rc.host.splice_methods(names);
    }

    // 2./3. `let` and `global` extend the effective scope and fall through.
    // A `for` node repeats as a whole and every copy re-dispatches through
    // here, so they run per copy, not once at the container.
    let iterating = el.has_attr(&rc.dn("for"))
        && !el.has_attr(&rc.dn("switch"))
        && !el.has_attr(&rc.dn("each"));
    let mut scope = Rc::clone(scope);
    if !iterating {
        if let Some(stmt) = el.attr(&rc.dn("let")) {
            let frame = ScopeFrame::child_of(&scope);
            let excerpt = el.excerpt();
            rc.eval(&frame)
                .with_rule(WriteRule::Let)
                .with_excerpt(&excerpt)
                .statement(stmt);
            scope = frame;
        }
        if let Some(stmt) = el.attr(&rc.dn("global")) {
            let excerpt = el.excerpt();
            rc.eval(&scope)
                .with_rule(WriteRule::Global)
                .with_excerpt(&excerpt)
                .statement(stmt);
        }
    }

    // 5. Switch.
    if el.has_attr(&rc.dn("switch")) {
        render_switch(rc, el, &scope, out);
        return;
    }
    // 6./7. Iteration.
    if el.has_attr(&rc.dn("each")) {
        render_each(rc, el, &scope, out);
        return;
    }
    if el.has_attr(&rc.dn("for")) {
        render_for(rc, el, &scope, out);
        return;
    }
    // 8. Sub-host mounting.
    if rc.engine.is_component(&el.tag) {
        mount_component(rc, el, &scope, out);
        return;
    }
    // 10. Inclusion and import.
    if el.has_attr(&rc.dn("include")) {
        render_include(rc, el, &scope, out);
        return;
    }
    if el.has_attr(&rc.dn("import")) {
        render_import(rc, el, &scope, out);
        return;
    }

    // 11. Ordinary element: bindings, events, model, then children.
    let mut element = emit_shell(rc, el, &scope);
    render_nodes(rc, &el.children, &scope, &mut element.children);
    out.push(OutputNode::Element(element));
}

/// Build the output element for a node: evaluated bindings, wired handlers,
/// model path, lifecycle statements, flag-index entries. Children are left
/// for the caller.
fn emit_shell(rc: &RenderCtx, el: &SourceElement, scope: &Scope) -> OutputElement {
    let cfg = &rc.engine.config;
    let id = rc.host.alloc_node_id();
    let mut element = OutputElement::new(id, el.tag.clone());
    let mut marks = NodeMarks::empty();
    let excerpt = el.excerpt();

    for attr in &el.attrs {
        let name = attr.name.as_str();
        let value = attr.value.as_str();
        if let Some(stripped) = name.strip_prefix(&cfg.directive_prefix) {
            element.flags.push(name.to_string());
            rc.host.flag(name, id);
            match stripped {
                "model" => {
                    marks |= NodeMarks::MODEL;
                    element.model = Some(value.to_string());
                    let v = rc.eval(scope).with_excerpt(&excerpt).read(value);
                    element
                        .attrs
                        .insert("value".to_string(), value_ops::to_display(&v));
                }
                "updated" => {
                    // Recorded only; the scheduler runs the hook set once
                    // the pass has finished.
                    marks |= NodeMarks::LIFECYCLE;
                    rc.host.lifecycle.borrow_mut().push(value.to_string());
                }
                "updated-propagate" => {
                    marks |= NodeMarks::LIFECYCLE;
                    *rc.host.propagate.borrow_mut() = Some(value.to_string());
                }
                "apply" | "restore" | "save" | "load" => {
                    marks |= NodeMarks::EVENT;
                    let event = if value.is_empty() { "click" } else { value };
                    let props = el.attr(&rc.dn("props")).map(|p| {
                        p.split_whitespace().map(String::from).collect::<Vec<_>>()
                    });
                    let action = match stripped {
                        "apply" => Action::ApplyStage,
                        "restore" => Action::RestoreStage,
                        "save" => Action::SaveScope { props },
                        _ => Action::LoadScope { props },
                    };
                    element.handlers.push(Handler {
                        event: event.to_string(),
                        action,
                    });
                }
                // Handled before dispatch reaches the shell.
                "let" | "global" | "methods" | "lazy" | "stage" | "props" | "data" => {}
                _ => {}
            }
            if !cfg.cleanup_directives {
                element.attrs.insert(name.to_string(), value.to_string());
            }
        } else if let Some(event) = name.strip_prefix(&cfg.event_prefix) {
            marks |= NodeMarks::EVENT;
            element.flags.push(name.to_string());
            rc.host.flag(name, id);
            element.handlers.push(Handler {
                event: event.to_string(),
                action: Action::Statement(value.to_string()),
            });
            if !cfg.cleanup_directives {
                element.attrs.insert(name.to_string(), value.to_string());
            }
        } else if let Some(target) = name.strip_prefix(&cfg.binding_prefix) {
            marks |= NodeMarks::BINDING;
            element.flags.push(name.to_string());
            rc.host.flag(name, id);
            let v = rc.eval(scope).with_excerpt(&excerpt).read(value);
            element
                .attrs
                .insert(target.to_string(), rc.engine.filters.attribute(target, &v));
        } else {
            element
                .attrs
                .insert(name.to_string(), interpolate(rc, scope, value));
        }
    }

    element.marks = marks;
    element
}

// The directive attribute itself is flagged by `emit_shell`.
fn mark_control(element: &mut OutputElement) {
    element.marks |= NodeMarks::CONTROL;
}

fn render_switch(rc: &RenderCtx, el: &SourceElement, scope: &Scope, out: &mut Vec<OutputNode>) {
    let d_switch = rc.dn("switch");
    let d_case = rc.dn("case");
    // Sugar: a case that breaks after rendering.
    let d_case_break = rc.dn("case.break");
    let d_default = rc.dn("default");
    let d_break = rc.dn("break");

    let expr = el.attr(&d_switch).unwrap_or("");
    let excerpt = el.excerpt();
    let switch_value = rc.eval(scope).with_excerpt(&excerpt).read(expr);
    let child_scope = ScopeFrame::with_bindings(
        scope,
        [("$switch".to_string(), switch_value.clone())],
    );

    let mut shell = emit_shell(rc, el, scope);
    mark_control(&mut shell);

    // First matching case wins; a default only activates when no case
    // matched anywhere in the list.
    let mut start = None;
    for (idx, child) in el.children.iter().enumerate() {
        if let Some(c) = child.as_element() {
            if let Some(raw) = c.attr(&d_case).or_else(|| c.attr(&d_case_break)) {
                if case_matches(rc, &child_scope, raw, &switch_value) {
                    start = Some(idx);
                    break;
                }
            }
        }
    }
    if start.is_none() {
        start = el.children.iter().position(|child| {
            child
                .as_element()
                .map(|c| c.has_attr(&d_default))
                .unwrap_or(false)
        });
    }

    // Fallthrough: from the activated branch, later case and default
    // branches render until a break-marked one has rendered. Children that
    // are not branches never render, before or after the activation point.
    if let Some(start) = start {
        for child in &el.children[start..] {
            let c = match child.as_element() {
                Some(c) => c,
                None => continue,
            };
            let is_branch = c.attr(&d_case).is_some()
                || c.attr(&d_case_break).is_some()
                || c.has_attr(&d_default);
            if !is_branch {
                continue;
            }
            let clone = c.clone_without(&[
                d_case.as_str(),
                d_case_break.as_str(),
                d_default.as_str(),
                d_break.as_str(),
            ]);
            render_element(rc, &clone, &child_scope, &mut shell.children);
            if c.has_attr(&d_break) || c.has_attr(&d_case_break) {
                break;
            }
        }
    }

    out.push(OutputNode::Element(shell));
}

/// Case matching, in priority order: predicate call, regular-expression
/// test, membership, direct equality; when the expression itself fails to
/// evaluate, a delimiter-separated literal list compared by display value.
fn case_matches(rc: &RenderCtx, scope: &Scope, raw: &str, switch_value: &Value) -> bool {
    match rc.eval(scope).quiet().try_rich(raw) {
        Ok(Rich::Callable(predicate)) => predicate(&[switch_value.clone()])
            .map(|v| value_ops::is_truthy(&v))
            .unwrap_or(false),
        Ok(Rich::Val(Value::String(s)))
            if s.len() >= 2 && s.starts_with('/') && s.ends_with('/') =>
        {
            Regex::new(&s[1..s.len() - 1])
                .map(|re| re.is_match(&value_ops::to_display(switch_value)))
                .unwrap_or(false)
        }
        Ok(Rich::Val(Value::Array(items))) => items
            .iter()
            .any(|item| value_ops::loose_eq(item, switch_value)),
        Ok(Rich::Val(v)) => value_ops::loose_eq(&v, switch_value),
        Ok(_) => false,
        Err(_) => {
            let shown = value_ops::to_display(switch_value);
            CASE_LIST_SPLIT
                .split(raw)
                .map(str::trim)
                .any(|lit| !lit.is_empty() && lit == shown)
        }
    }
}

struct IterBinding {
    key: Option<String>,
    value: String,
    is_in: bool,
    expr: String,
}

/// Binding grammar: `(key, value)? (in|of) <expr>`.
fn parse_iteration(src: &str) -> Result<IterBinding, String> {
    let src = src.trim();
    let (key, value, rest) = if let Some(stripped) = src.strip_prefix('(') {
        let close = stripped
            .find(')')
            .ok_or_else(|| "missing `)` in iteration binding".to_string())?;
        let names: Vec<&str> = stripped[..close].split(',').map(str::trim).collect();
        if names.len() != 2 || names.iter().any(|n| n.is_empty()) {
            return Err("expected `(key, value)` in iteration binding".to_string());
        }
        (
            Some(names[0].to_string()),
            names[1].to_string(),
            stripped[close + 1..].trim_start(),
        )
    } else {
        let mut parts = src.splitn(2, char::is_whitespace);
        let name = parts.next().unwrap_or("").to_string();
        if name.is_empty() {
            return Err("empty iteration binding".to_string());
        }
        (None, name, parts.next().unwrap_or("").trim_start())
    };
    let mut parts = rest.splitn(2, char::is_whitespace);
    let keyword = parts.next().unwrap_or("");
    let expr = parts.next().unwrap_or("").trim().to_string();
    let is_in = match keyword {
        "in" => true,
        "of" => false,
        other => {
            return Err(format!(
                "expected `in` or `of` in iteration binding, found `{other}`"
            ))
        }
    };
    if expr.is_empty() {
        return Err("missing iteration expression".to_string());
    }
    Ok(IterBinding {
        key,
        value,
        is_in,
        expr,
    })
}

/// Expand the binding over a value: `of` enumerates values, `in` enumerates
/// keys; arrays key by index, `in` spelling them as strings.
fn enumerate(rc: &RenderCtx, binding: &IterBinding, value: &Value) -> Vec<Vec<(String, Value)>> {
    let keyed = binding.key.is_some();
    if binding.is_in && keyed {
        rc.host.diag(
            DiagnosticKind::Deprecation,
            "the (key, value) form with `in` is deprecated, use `of`",
        );
    }
    let mut items = Vec::new();
    let mut push = |key: Value, item: Value| {
        if keyed {
            items.push(vec![
                (binding.key.clone().unwrap_or_default(), key),
                (binding.value.clone(), item),
            ]);
        } else if binding.is_in {
            items.push(vec![(binding.value.clone(), key)]);
        } else {
            items.push(vec![(binding.value.clone(), item)]);
        }
    };
    match value {
        Value::Array(entries) => {
            for (i, item) in entries.iter().enumerate() {
                let key = if binding.is_in {
                    Value::String(i.to_string())
                } else {
                    Value::from(i as i64)
                };
                push(key, item.clone());
            }
        }
        Value::Object(map) => {
            for (k, v) in map {
                push(Value::String(k.clone()), v.clone());
            }
        }
        Value::String(s) => {
            for (i, ch) in s.chars().enumerate() {
                let key = if binding.is_in {
                    Value::String(i.to_string())
                } else {
                    Value::from(i as i64)
                };
                push(key, Value::String(ch.to_string()));
            }
        }
        Value::Null => {}
        other => {
            rc.host.diag(
                DiagnosticKind::DirectiveMisuse,
                format!(
                    "cannot iterate over `{}`",
                    value_ops::to_display(other)
                ),
            );
        }
    }
    items
}

/// `each`: one shared container, children repeated per item.
fn render_each(rc: &RenderCtx, el: &SourceElement, scope: &Scope, out: &mut Vec<OutputNode>) {
    let d_each = rc.dn("each");
    let binding_src = el.attr(&d_each).unwrap_or("").to_string();
    let mut shell = emit_shell(rc, el, scope);
    mark_control(&mut shell);
    match parse_iteration(&binding_src) {
        Ok(binding) => {
            let excerpt = el.excerpt();
            let value = rc
                .eval(scope)
                .with_excerpt(&excerpt)
                .read(&binding.expr);
            for bindings in enumerate(rc, &binding, &value) {
                let iter_scope = ScopeFrame::with_bindings(scope, bindings);
                render_nodes(rc, &el.children, &iter_scope, &mut shell.children);
            }
        }
        Err(message) => {
            rc.host.diag(
                DiagnosticKind::DirectiveMisuse,
                format!("{message}: {}", el.excerpt()),
            );
        }
    }
    out.push(OutputNode::Element(shell));
}

/// `for`: the whole node repeats, each copy independently re-dispatched.
fn render_for(rc: &RenderCtx, el: &SourceElement, scope: &Scope, out: &mut Vec<OutputNode>) {
    let d_for = rc.dn("for");
    let binding_src = el.attr(&d_for).unwrap_or("").to_string();
    match parse_iteration(&binding_src) {
        Ok(binding) => {
            let excerpt = el.excerpt();
            let value = rc
                .eval(scope)
                .with_excerpt(&excerpt)
                .read(&binding.expr);
            // Each copy re-dispatches with the iteration bindings in scope,
            // running any `let`/`global` on the node per copy.
            let clone = el.clone_without(&[d_for.as_str()]);
            for bindings in enumerate(rc, &binding, &value) {
                let iter_scope = ScopeFrame::with_bindings(scope, bindings);
                render_element(rc, &clone, &iter_scope, out);
            }
        }
        Err(message) => {
            rc.host.diag(
                DiagnosticKind::DirectiveMisuse,
                format!("{message}: {}", el.excerpt()),
            );
        }
    }
}

/// Mount a registered component as a nested host. Inherited scope is
/// injected only when the node declares no explicit data source.
fn mount_component(rc: &RenderCtx, el: &SourceElement, scope: &Scope, out: &mut Vec<OutputNode>) {
    let data = el
        .attr(&rc.dn("data"))
        .map(|expr| {
            let excerpt = el.excerpt();
            rc.eval(scope).with_excerpt(&excerpt).read(expr)
        });
    let inherited = if data.is_none() {
        match scope::flatten(scope) {
            Value::Object(map) => Some(map),
            _ => None,
        }
    } else {
        None
    };
    if let Some(child) = rc
        .engine
        .mount_component(rc.host, &el.tag, el.id, data, inherited)
    {
        out.push(OutputNode::Mount(child));
    } else {
        rc.host.diag(
            DiagnosticKind::ResourceUnavailable,
            format!("component `{}` has no template", el.tag),
        );
    }
}

/// Resolve an inclusion target name: evaluate in read mode (silently); a
/// usable string/number/boolean wins, otherwise a bare identifier or
/// quoted literal is taken verbatim.
fn resolve_include_name(rc: &RenderCtx, scope: &Scope, raw: &str) -> Option<String> {
    match rc.eval(scope).quiet().try_read(raw) {
        Ok(Value::String(s)) if !s.is_empty() => return Some(s),
        Ok(Value::Number(n)) => return Some(value_ops::to_display(&Value::Number(n))),
        Ok(Value::Bool(b)) => return Some(b.to_string()),
        _ => {}
    }
    let t = raw.trim();
    if t.len() >= 2 {
        let bytes = t.as_bytes();
        if (bytes[0] == b'\'' && bytes[t.len() - 1] == b'\'')
            || (bytes[0] == b'"' && bytes[t.len() - 1] == b'"')
        {
            return Some(t[1..t.len() - 1].to_string());
        }
    }
    let mut chars = t.chars();
    let bare = match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' || first == '$' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$' || c == '-')
        }
        _ => false,
    };
    if bare {
        Some(t.to_string())
    } else {
        None
    }
}

fn render_include(rc: &RenderCtx, el: &SourceElement, scope: &Scope, out: &mut Vec<OutputNode>) {
    let d_include = rc.dn("include");
    let raw = el.attr(&d_include).unwrap_or("").to_string();

    if rc.depth + 1 > rc.engine.config.include_max_depth {
        rc.host.diag(
            DiagnosticKind::DepthExceeded,
            format!(
                "inclusion depth {} exceeds the configured maximum {}",
                rc.depth + 1,
                rc.engine.config.include_max_depth
            ),
        );
        let mut shell = emit_shell(rc, el, scope);
        mark_control(&mut shell);
        if rc.engine.config.mark_on_element {
            shell
                .attrs
                .insert(ATTR_INCLUDE_DEPTH.to_string(), (rc.depth + 1).to_string());
        }
        out.push(OutputNode::Element(shell));
        return;
    }

    let name = resolve_include_name(rc, scope, &raw);
    let proto = name
        .as_deref()
        .and_then(|n| rc.engine.resolve_template(rc.host, n));
    let mut shell = emit_shell(rc, el, scope);
    mark_control(&mut shell);
    match proto {
        Some(proto) => {
            let deeper = rc.deeper();
            render_nodes(&deeper, &proto.children, scope, &mut shell.children);
        }
        None => {
            let shown = name.unwrap_or(raw);
            rc.host.diag(
                DiagnosticKind::ResourceUnavailable,
                format!("template `{shown}` not found"),
            );
            if rc.engine.config.mark_on_element {
                shell
                    .attrs
                    .insert(ATTR_TEMPLATE_NOT_FOUND.to_string(), shown);
            }
            render_nodes(rc, &el.children, scope, &mut shell.children);
        }
    }
    out.push(OutputNode::Element(shell));
}

fn render_import(rc: &RenderCtx, el: &SourceElement, scope: &Scope, out: &mut Vec<OutputNode>) {
    let d_import = rc.dn("import");
    let raw = el.attr(&d_import).unwrap_or("").to_string();

    if rc.depth + 1 > rc.engine.config.include_max_depth {
        rc.host.diag(
            DiagnosticKind::DepthExceeded,
            format!(
                "import depth {} exceeds the configured maximum {}",
                rc.depth + 1,
                rc.engine.config.include_max_depth
            ),
        );
        let mut shell = emit_shell(rc, el, scope);
        mark_control(&mut shell);
        if rc.engine.config.mark_on_element {
            shell
                .attrs
                .insert(ATTR_INCLUDE_DEPTH.to_string(), (rc.depth + 1).to_string());
        }
        out.push(OutputNode::Element(shell));
        return;
    }

    let url = match rc.eval(scope).quiet().try_read(&raw) {
        Ok(Value::String(s)) if !s.is_empty() => s,
        _ => raw.trim().to_string(),
    };
    let mut shell = emit_shell(rc, el, scope);
    mark_control(&mut shell);
    match rc.engine.fetch_import(&url, rc.host.id) {
        Ok(nodes) => {
            let deeper = rc.deeper();
            render_nodes(&deeper, &nodes, scope, &mut shell.children);
        }
        Err(err) => {
            rc.host.diag(
                DiagnosticKind::ResourceUnavailable,
                format!("import of `{url}` failed: {err}"),
            );
            if rc.engine.config.mark_on_element {
                shell.attrs.insert(ATTR_IMPORT_ERROR.to_string(), url);
            }
            render_nodes(rc, &el.children, scope, &mut shell.children);
        }
    }
    out.push(OutputNode::Element(shell));
}

/// Expand interpolation segments in text. A doubled opening delimiter
/// escapes to a single literal one.
pub fn interpolate(rc: &RenderCtx, scope: &Scope, text: &str) -> String {
    let (open, close) = (
        rc.engine.config.delimiters.0.clone(),
        rc.engine.config.delimiters.1.clone(),
    );
    let mut out = String::new();
    let mut rest = text;
    while let Some(start) = rest.find(open.as_str()) {
        out.push_str(&rest[..start]);
        let after = &rest[start + open.len()..];
        match after.find(close.as_str()) {
            Some(end) => {
                let expr = after[..end].trim();
                if expr.is_empty() {
                    out.push_str(&open);
                } else {
                    let v = rc.eval(scope).read(expr);
                    out.push_str(&rc.engine.filters.display(&v));
                }
                rest = &after[end + close.len()..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}
