//! Engine: host table, scheduling, template plumbing.
//!
//! The engine owns every host, the frozen filter set, the method registry
//! and the process-wide globals. Collaborators plug in at construction:
//! a source-tree provider (markup text → node tree), an optional external
//! source for imports, and optional pre/post parse hooks.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use serde_json::{Map, Value};

use crate::config::EngineConfig;
use crate::directives::{self, RenderCtx};
use crate::error::DiagnosticKind;
use crate::expression::ast::Ast;
use crate::expression::eval::{EvalCtx, WriteRule};
use crate::expression::{ExprError, Parser};
use crate::filters::Filters;
use crate::filters::MethodRegistry;
use crate::host::{Host, HostId};
use crate::output::{self, Action, MountTarget, NodeId, OutputNode};
use crate::registry::ExternalSource;
use crate::source::{self, PlainNode, SourceElement, SourceNode};
use crate::value_ops;

/// Markup text → source tree. Invoked once per distinct template text and
/// again after any pre-processing hook rewrite.
pub trait SourceTreeProvider {
    fn parse(&self, text: &str) -> Vec<SourceNode>;
}

/// Pre-processing hook: may mutate the tree in place, or return replacement
/// text to trigger a re-parse.
pub type PreHook = Box<dyn Fn(&mut Vec<SourceNode>, HostId) -> Option<String>>;

/// Post-parse hook: sees a read-only plain-data tree once per pass.
pub type PostHook = Box<dyn Fn(&[PlainNode], HostId)>;

pub struct Engine {
    pub config: EngineConfig,
    pub filters: Filters,
    pub methods: MethodRegistry,
    provider: Box<dyn SourceTreeProvider>,
    external: RefCell<Option<Box<dyn ExternalSource>>>,
    components: RefCell<HashMap<String, String>>,
    hosts: RefCell<Vec<Option<Rc<Host>>>>,
    globals: Rc<RefCell<Value>>,
    deferred: RefCell<VecDeque<HostId>>,
    parse_cache: RefCell<HashMap<String, Rc<Vec<SourceNode>>>>,
    import_cache: RefCell<HashMap<String, Rc<Vec<SourceNode>>>>,
    expr_cache: RefCell<HashMap<String, Rc<Result<Ast, ExprError>>>>,
    pre_hook: RefCell<Option<PreHook>>,
    post_hook: RefCell<Option<PostHook>>,
    next_source_id: Cell<u64>,
}

impl Engine {
    pub fn new(provider: Box<dyn SourceTreeProvider>) -> Self {
        Engine::with_config(provider, EngineConfig::default())
    }

    pub fn with_config(provider: Box<dyn SourceTreeProvider>, config: EngineConfig) -> Self {
        Engine {
            config,
            filters: Filters::standard(),
            methods: MethodRegistry::new(),
            provider,
            external: RefCell::new(None),
            components: RefCell::new(HashMap::new()),
            hosts: RefCell::new(Vec::new()),
            globals: Rc::new(RefCell::new(Value::Object(Map::new()))),
            deferred: RefCell::new(VecDeque::new()),
            parse_cache: RefCell::new(HashMap::new()),
            import_cache: RefCell::new(HashMap::new()),
            expr_cache: RefCell::new(HashMap::new()),
            pre_hook: RefCell::new(None),
            post_hook: RefCell::new(None),
            next_source_id: Cell::new(0),
        }
    }

    pub fn set_filters(&mut self, filters: Filters) {
        self.filters = filters;
    }

    pub fn set_external(&self, external: Box<dyn ExternalSource>) {
        *self.external.borrow_mut() = Some(external);
    }

    pub fn set_pre_hook(&self, hook: PreHook) {
        *self.pre_hook.borrow_mut() = Some(hook);
    }

    pub fn set_post_hook(&self, hook: PostHook) {
        *self.post_hook.borrow_mut() = Some(hook);
    }

    /// Register a component: mounting an element with this tag creates a
    /// nested host rendering `template`.
    pub fn define_component(&self, name: impl Into<String>, template: impl Into<String>) {
        self.components
            .borrow_mut()
            .insert(name.into(), template.into());
    }

    pub fn is_component(&self, tag: &str) -> bool {
        self.components.borrow().contains_key(tag)
    }

    pub fn set_global(&self, name: impl Into<String>, value: Value) {
        if let Value::Object(map) = &mut *self.globals.borrow_mut() {
            map.insert(name.into(), value);
        }
    }

    pub fn global(&self, name: &str) -> Option<Value> {
        match &*self.globals.borrow() {
            Value::Object(map) => map.get(name).cloned(),
            _ => None,
        }
    }

    pub fn write_global_path(&self, path: &[String], value: Value) {
        value_ops::set_path(&mut self.globals.borrow_mut(), path, value);
    }

    pub fn host(&self, id: HostId) -> Option<Rc<Host>> {
        self.hosts.borrow().get(id).and_then(|slot| slot.clone())
    }

    pub fn parent_host(&self, host: &Host) -> Option<Rc<Host>> {
        host.parent.and_then(|id| self.host(id))
    }

    pub fn root_host(&self, host: &Host) -> Option<Rc<Host>> {
        let mut cur = self.parent_host(host)?;
        while let Some(parent) = self.parent_host(&cur) {
            cur = parent;
        }
        Some(cur)
    }

    pub fn parent_data(&self, host: &Host) -> Value {
        self.parent_host(host)
            .map(|h| h.active_data().borrow().clone())
            .unwrap_or(Value::Null)
    }

    pub fn root_data(&self, host: &Host) -> Value {
        self.root_host(host)
            .map(|h| h.active_data().borrow().clone())
            .unwrap_or_else(|| host.active_data().borrow().clone())
    }

    /// Mount a template over a data object as a new top-level host. The
    /// first update runs before this returns.
    pub fn mount(&self, template: impl Into<String>, data: Value) -> HostId {
        let id = self.alloc_host(None, data);
        if let Some(host) = self.host(id) {
            *host.template_text.borrow_mut() = Some(template.into());
        }
        self.update(id, true);
        id
    }

    fn alloc_host(&self, parent: Option<HostId>, data: Value) -> HostId {
        let mut hosts = self.hosts.borrow_mut();
        let id = hosts.len();
        hosts.push(Some(Rc::new(Host::new(id, parent, data))));
        id
    }

    /// Mount (or re-use) a component instance under `parent` for the source
    /// node `source_id`.
    pub fn mount_component(
        &self,
        parent: &Host,
        name: &str,
        source_id: u64,
        data: Option<Value>,
        inherited: Option<Map<String, Value>>,
    ) -> Option<HostId> {
        if let Some(existing) = parent.mounts.borrow().get(&source_id).copied() {
            // Reused mounts still pick up the parent's latest scope values.
            if let Some(child) = self.host(existing) {
                if inherited.is_some() {
                    *child.inherited.borrow_mut() = inherited;
                }
            }
            return Some(existing);
        }
        let template = self.components.borrow().get(name).cloned()?;
        let id = self.alloc_host(Some(parent.id), data.unwrap_or(Value::Object(Map::new())));
        if let Some(host) = self.host(id) {
            *host.template_text.borrow_mut() = Some(template);
            // Inherited scope only when no explicit data source was given.
            if inherited.is_some() {
                *host.inherited.borrow_mut() = inherited;
            }
        }
        parent.mounts.borrow_mut().insert(source_id, id);
        parent.children.borrow_mut().push(id);
        self.update(id, true);
        Some(id)
    }

    /// The scheduler entry point. Re-entrant calls while this host renders
    /// are dropped but recorded; the run then schedules one coalesced
    /// deferred follow-up. Consecutive dirty runs trip the loop guard.
    pub fn update(&self, id: HostId, force: bool) {
        let host = match self.host(id) {
            Some(host) => host,
            None => return,
        };
        if host.torn_down.get() {
            return;
        }
        if !host.state.begin() {
            return;
        }
        if host.state.over_limit(self.config.loop_limit) {
            host.diag(
                DiagnosticKind::DepthExceeded,
                format!(
                    "update loop guard tripped after {} consecutive dirty runs",
                    self.config.loop_limit
                ),
            );
            host.state.reset_cycle();
            return;
        }

        let lazy_skip = host.state.is_lazy() && !force;
        if !lazy_skip {
            self.render_host(&host);
        }

        // Update hooks run after the pass; lazy passes replay the set
        // recorded during the last full pass.
        let hooks = host.lifecycle.borrow().clone();
        if !hooks.is_empty() {
            let scope = host.root_scope();
            for hook in hooks {
                EvalCtx::new(self, &host, &scope)
                    .with_rule(WriteRule::Assign)
                    .statement(&hook);
            }
        }

        if lazy_skip {
            // Lazy: the output stays frozen but children move on.
            let children: Vec<HostId> = host.children.borrow().clone();
            for child in children {
                self.update(child, false);
            }
        }

        // Ancestor propagation runs inside the re-entrancy guard, so a
        // forced ancestor pass cannot cascade back into this host.
        let propagate = host.propagate.borrow().clone();
        if let Some(target) = propagate {
            self.propagate_update(&host, &target);
        }

        let follow_up = host.state.finish();

        let children: Vec<HostId> = host.children.borrow().clone();
        if force && self.config.cascade_forced {
            for child in children {
                if let Some(child_host) = self.host(child) {
                    if child_host.state.is_rendering() {
                        continue;
                    }
                }
                self.update(child, true);
            }
        }

        if follow_up && host.state.try_schedule() {
            self.deferred.borrow_mut().push_back(id);
        }
    }

    /// Resolve an ancestor-propagation target and update it: `"root"` is
    /// the top-most ancestor, a number the n-th ancestor, clamped at the
    /// root. The ancestor update is forced, so even a lazy ancestor
    /// rebuilds its output.
    fn propagate_update(&self, host: &Host, target: &str) {
        let trimmed = target.trim();
        let ancestor = if trimmed.eq_ignore_ascii_case("root") {
            self.root_host(host)
        } else {
            let hops = trimmed.parse::<usize>().unwrap_or(1).max(1);
            let mut cur = self.parent_host(host);
            for _ in 1..hops {
                match cur.as_ref().and_then(|h| self.parent_host(h)) {
                    Some(next) => cur = Some(next),
                    None => break,
                }
            }
            cur
        };
        if let Some(ancestor) = ancestor {
            self.update(ancestor.id, true);
        }
    }

    /// Run coalesced follow-ups until the queue drains. The per-host loop
    /// guard bounds runaway chains.
    pub fn drain_deferred(&self) {
        loop {
            let next = self.deferred.borrow_mut().pop_front();
            match next {
                Some(id) => {
                    if let Some(host) = self.host(id) {
                        host.state.clear_scheduled();
                    }
                    self.update(id, false);
                }
                None => break,
            }
        }
    }

    pub fn pending_deferred(&self) -> usize {
        self.deferred.borrow().len()
    }

    fn render_host(&self, host: &Rc<Host>) {
        let template = match self.capture_template(host) {
            Some(template) => template,
            None => return,
        };
        host.begin_pass();
        directives::collect_templates(self, host, &template);
        let scope = host.root_scope();
        let mut out = Vec::new();
        let rc = RenderCtx {
            engine: self,
            host,
            depth: 0,
        };
        directives::render_nodes(&rc, &template, &scope, &mut out);
        *host.output.borrow_mut() = out;
        if let Some(hook) = &*self.post_hook.borrow() {
            hook(&source::to_plain(&template), host.id);
        }
    }

    /// Parse and capture the host's template on first activation.
    fn capture_template(&self, host: &Rc<Host>) -> Option<Rc<Vec<SourceNode>>> {
        if let Some(template) = &*host.template.borrow() {
            return Some(Rc::clone(template));
        }
        let text = host.template_text.borrow().clone()?;
        let parsed = self.parse_template(&text, host.id);
        *host.template.borrow_mut() = Some(Rc::clone(&parsed));
        Some(parsed)
    }

    /// Cached parse, with pre-processing hook applied on a cache miss.
    pub fn parse_template(&self, text: &str, host: HostId) -> Rc<Vec<SourceNode>> {
        if let Some(cached) = self.parse_cache.borrow().get(text) {
            return Rc::clone(cached);
        }
        let mut nodes = self.provider.parse(text);
        if let Some(hook) = &*self.pre_hook.borrow() {
            if let Some(replacement) = hook(&mut nodes, host) {
                nodes = self.provider.parse(&replacement);
            }
        }
        let mut counter = self.next_source_id.get();
        source::assign_ids(&mut nodes, &mut counter);
        self.next_source_id.set(counter);
        let parsed = Rc::new(nodes);
        self.parse_cache
            .borrow_mut()
            .insert(text.to_string(), Rc::clone(&parsed));
        parsed
    }

    /// Cached expression parse shared by every host.
    pub fn parse_expr(&self, src: &str) -> Result<Rc<Ast>, ExprError> {
        let key = src.trim();
        if let Some(cached) = self.expr_cache.borrow().get(key) {
            return match &**cached {
                Ok(ast) => Ok(Rc::new(ast.clone())),
                Err(err) => Err(err.clone()),
            };
        }
        let parsed = Parser::new().parse(key);
        self.expr_cache
            .borrow_mut()
            .insert(key.to_string(), Rc::new(parsed.clone()));
        parsed.map(Rc::new)
    }

    /// Named-template lookup walking outward through ancestor hosts.
    pub fn resolve_template(&self, host: &Host, name: &str) -> Option<SourceElement> {
        if let Some(proto) = host.registry.resolve(name) {
            return Some(proto);
        }
        let mut cur = self.parent_host(host);
        while let Some(h) = cur {
            if let Some(proto) = h.registry.resolve(name) {
                return Some(proto);
            }
            cur = self.parent_host(&h);
        }
        None
    }

    /// Fetch-and-parse an external template, cached per URL for the engine
    /// lifetime.
    pub fn fetch_import(&self, url: &str, host: HostId) -> anyhow::Result<Rc<Vec<SourceNode>>> {
        if let Some(cached) = self.import_cache.borrow().get(url) {
            return Ok(Rc::clone(cached));
        }
        let external = self.external.borrow();
        let source = external
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("no external source configured"))?;
        let text = source.fetch(url)?;
        drop(external);
        let parsed = self.parse_template(&text, host);
        self.import_cache
            .borrow_mut()
            .insert(url.to_string(), Rc::clone(&parsed));
        Ok(parsed)
    }

    /// Deliver an interaction event to a rendered node. Returns the saved
    /// scope payload when the wired action is a save.
    pub fn fire(
        &self,
        id: HostId,
        node: NodeId,
        event: &str,
        payload: Option<&Value>,
    ) -> Option<String> {
        let host = self.host(id)?;
        let handler = {
            let output = host.output.borrow();
            let element = output::find_element(&output, node)?;
            element.handler(event)?.clone()
        };
        match handler.action {
            Action::Statement(src) => {
                let scope = host.root_scope();
                let event_value = payload.cloned().unwrap_or(Value::Null);
                EvalCtx::new(self, &host, &scope)
                    .with_rule(WriteRule::Assign)
                    .with_event(&event_value)
                    .statement(&src);
                if !self.config.is_non_mutating(event) {
                    self.update(id, false);
                }
                None
            }
            Action::ApplyStage => {
                host.apply_stage();
                self.update(id, true);
                None
            }
            Action::RestoreStage => {
                host.restore_stage();
                self.update(id, true);
                None
            }
            Action::SaveScope { props } => Some(host.save_scope(props.as_deref())),
            Action::LoadScope { props } => {
                if let Some(payload) = payload {
                    host.load_scope(payload, props.as_deref());
                    self.update(id, true);
                }
                None
            }
        }
    }

    /// Two-way binding input: write the value through the node's model path
    /// and refresh.
    pub fn model_input(&self, id: HostId, node: NodeId, value: Value) {
        let host = match self.host(id) {
            Some(host) => host,
            None => return,
        };
        let path = {
            let output = host.output.borrow();
            match output::find_element(&output, node).and_then(|el| el.model.clone()) {
                Some(path) => path,
                None => return,
            }
        };
        let scope = host.root_scope();
        EvalCtx::new(self, &host, &scope)
            .with_rule(WriteRule::Assign)
            .assign(&path, value);
        self.update(id, true);
    }

    /// Hand a host's current output to a physical mount target.
    pub fn attach(&self, id: HostId, target: &mut dyn MountTarget) {
        if let Some(host) = self.host(id) {
            target.append(&host.output.borrow());
        }
    }

    /// Serialize a host's output, expanding mounted child hosts inline.
    pub fn markup(&self, id: HostId) -> String {
        match self.host(id) {
            Some(host) => {
                let output = host.output.borrow();
                self.markup_nodes(&output)
            }
            None => String::new(),
        }
    }

    fn markup_nodes(&self, nodes: &[OutputNode]) -> String {
        let mut out = String::new();
        for node in nodes {
            match node {
                OutputNode::Mount(child) => out.push_str(&self.markup(*child)),
                OutputNode::Element(el) => {
                    out.push('<');
                    out.push_str(&el.tag);
                    for (name, value) in &el.attrs {
                        out.push(' ');
                        out.push_str(name);
                        if !value.is_empty() {
                            out.push_str("=\"");
                            out.push_str(value);
                            out.push('"');
                        }
                    }
                    out.push('>');
                    out.push_str(&self.markup_nodes(&el.children));
                    out.push_str("</");
                    out.push_str(&el.tag);
                    out.push('>');
                }
                other => out.push_str(&output::to_markup(std::slice::from_ref(other))),
            }
        }
        out
    }

    /// Tear down a host and its descendants: pending timers dropped, flag
    /// index released, slot freed.
    pub fn teardown(&self, id: HostId) {
        let host = match self.host(id) {
            Some(host) => host,
            None => return,
        };
        let children: Vec<HostId> = host.children.borrow().clone();
        for child in children {
            self.teardown(child);
        }
        host.teardown();
        self.deferred.borrow_mut().retain(|queued| *queued != id);
        if let Some(slot) = self.hosts.borrow_mut().get_mut(id) {
            *slot = None;
        }
    }
}
