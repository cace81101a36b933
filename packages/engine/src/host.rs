//! Render-target instances.
//!
//! A host owns its data object, an optional stage buffer for isolated
//! edits, the captured template, its template registry, update state and
//! the output of the last pass. Hosts nest: a mounted component becomes a
//! child host, and registry lookups walk outward through the chain.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use serde_json::{Map, Value};

use crate::engine::Engine;
use crate::error::{Diagnostic, DiagnosticKind};
use crate::filters::MethodEntry;
use crate::observe::Observation;
use crate::output::{NodeId, OutputNode};
use crate::registry::TemplateRegistry;
use crate::scheduler::UpdateState;
use crate::scope::{FrameKind, Scope, ScopeFrame};
use crate::source::SourceNode;
use crate::value_ops;

pub type HostId = usize;

pub struct Host {
    pub id: HostId,
    pub parent: Option<HostId>,
    pub children: RefCell<Vec<HostId>>,
    /// Source-node id → mounted child host, so re-rendering reuses the
    /// same child instance.
    pub mounts: RefCell<HashMap<u64, HostId>>,
    /// Template text, captured once on first successful activation.
    pub template_text: RefCell<Option<String>>,
    pub template: RefCell<Option<Rc<Vec<SourceNode>>>>,
    /// Source of truth. Always an object.
    pub data: Rc<RefCell<Value>>,
    /// Isolated edit copy; present while staged editing is active.
    pub stage: RefCell<Option<Rc<RefCell<Value>>>>,
    /// Snapshot taken at stage creation and on each apply, for restore.
    pub applied: RefCell<Option<Value>>,
    /// Scope overrides injected by the parent at mount time.
    pub inherited: RefCell<Option<Map<String, Value>>>,
    pub registry: TemplateRegistry,
    pub state: UpdateState,
    pub observation: Observation,
    pub output: RefCell<Vec<OutputNode>>,
    /// Reverse lookup: directive attribute name → output node ids.
    pub flag_index: RefCell<HashMap<String, Vec<NodeId>>>,
    pub diags: RefCell<Vec<Diagnostic>>,
    /// Method names spliced into expression scope for this host.
    pub spliced: RefCell<Vec<String>>,
    /// Update-hook statements collected during the last full pass, re-run
    /// by lazy passes.
    pub lifecycle: RefCell<Vec<String>>,
    /// Ancestor-propagation target collected during the last full pass:
    /// `"root"` or a hop count.
    pub propagate: RefCell<Option<String>>,
    pub next_node_id: Cell<NodeId>,
    pub torn_down: Cell<bool>,
}

impl Host {
    pub fn new(id: HostId, parent: Option<HostId>, data: Value) -> Self {
        Host {
            id,
            parent,
            children: RefCell::new(Vec::new()),
            mounts: RefCell::new(HashMap::new()),
            template_text: RefCell::new(None),
            template: RefCell::new(None),
            data: Rc::new(RefCell::new(value_ops::ensure_object(data))),
            stage: RefCell::new(None),
            applied: RefCell::new(None),
            inherited: RefCell::new(None),
            registry: TemplateRegistry::new(),
            state: UpdateState::new(),
            observation: Observation::new(),
            output: RefCell::new(Vec::new()),
            flag_index: RefCell::new(HashMap::new()),
            diags: RefCell::new(Vec::new()),
            spliced: RefCell::new(Vec::new()),
            lifecycle: RefCell::new(Vec::new()),
            propagate: RefCell::new(None),
            next_node_id: Cell::new(0),
            torn_down: Cell::new(false),
        }
    }

    /// The object expressions read and write: the stage buffer while staged
    /// editing is active, the data object otherwise.
    pub fn active_data(&self) -> Rc<RefCell<Value>> {
        match &*self.stage.borrow() {
            Some(stage) => Rc::clone(stage),
            None => Rc::clone(&self.data),
        }
    }

    /// Root scope chain for a pass: active data on top, inherited
    /// overrides beneath it.
    pub fn root_scope(&self) -> Scope {
        let base = self.inherited.borrow().as_ref().map(|inherited| {
            Rc::new(ScopeFrame {
                kind: FrameKind::Local(RefCell::new(inherited.clone())),
                parent: None,
            })
        });
        Rc::new(ScopeFrame {
            kind: FrameKind::Data(self.active_data()),
            parent: base,
        })
    }

    /// Create the stage buffer as a full copy of data. Idempotent.
    pub fn begin_stage(&self) {
        let mut stage = self.stage.borrow_mut();
        if stage.is_none() {
            let snapshot = self.data.borrow().clone();
            *self.applied.borrow_mut() = Some(snapshot.clone());
            *stage = Some(Rc::new(RefCell::new(snapshot)));
        }
    }

    /// Re-seed parent-supplied scope entries into an active stage. The
    /// parent may have moved since the stage was created; staged edits to
    /// keys the parent does not supply survive.
    pub fn refresh_stage(&self) {
        let inherited = self.inherited.borrow();
        let overrides = match inherited.as_ref() {
            Some(map) if !map.is_empty() => map,
            _ => return,
        };
        let stage_guard = self.stage.borrow();
        let stage = match &*stage_guard {
            Some(stage) => stage,
            None => return,
        };
        let mut staged = stage.borrow_mut();
        if let Value::Object(map) = &mut *staged {
            for (key, v) in overrides {
                map.insert(key.clone(), v.clone());
            }
        }
    }

    /// Commit staged edits into data and advance the restore snapshot.
    pub fn apply_stage(&self) {
        let staged = match &*self.stage.borrow() {
            Some(stage) => stage.borrow().clone(),
            None => return,
        };
        *self.data.borrow_mut() = staged.clone();
        *self.applied.borrow_mut() = Some(staged);
    }

    /// Rewind staged edits to the last applied snapshot.
    pub fn restore_stage(&self) {
        let snapshot = match &*self.applied.borrow() {
            Some(snapshot) => snapshot.clone(),
            None => self.data.borrow().clone(),
        };
        if let Some(stage) = &*self.stage.borrow() {
            *stage.borrow_mut() = snapshot;
        }
    }

    /// Serialize the active scope, optionally restricted to `props`.
    pub fn save_scope(&self, props: Option<&[String]>) -> String {
        let data = self.active_data();
        let borrowed = data.borrow();
        let view = match (props, &*borrowed) {
            (Some(props), Value::Object(map)) => {
                let mut picked = Map::new();
                for prop in props {
                    if let Some(v) = map.get(prop) {
                        picked.insert(prop.clone(), v.clone());
                    }
                }
                Value::Object(picked)
            }
            _ => borrowed.clone(),
        };
        serde_json::to_string(&view).unwrap_or_else(|_| "{}".to_string())
    }

    /// Merge a payload into the active scope, optionally restricted to
    /// `props`. Writes funnel through observation.
    pub fn load_scope(&self, payload: &Value, props: Option<&[String]>) {
        if let Value::Object(map) = payload {
            for (key, value) in map {
                if let Some(props) = props {
                    if !props.iter().any(|p| p == key) {
                        continue;
                    }
                }
                self.write_path(std::slice::from_ref(key), value.clone());
            }
        }
    }

    /// External-data reducer: place a fetched value into a path of the
    /// active scope, or replace the whole object when no path is given.
    /// Either way the writes funnel through observation.
    pub fn ingest(&self, path: Option<&[String]>, value: Value) {
        match path {
            Some(path) if !path.is_empty() => self.write_path(path, value),
            _ => {
                if let Value::Object(incoming) = value_ops::ensure_object(value) {
                    for (key, v) in &incoming {
                        self.write_path(std::slice::from_ref(key), v.clone());
                    }
                    let cell = self.active_data();
                    let mut current = cell.borrow_mut();
                    if let Value::Object(map) = &mut *current {
                        map.retain(|key, _| incoming.contains_key(key));
                    }
                }
            }
        }
    }

    /// The single write funnel: every mutation of host data lands here so
    /// observation sees it and the scheduler notices a dirtied pass.
    pub fn write_path(&self, path: &[String], value: Value) {
        let cell = self.active_data();
        let old = value_ops::get_path(&cell.borrow(), path).cloned();
        let changed = old.as_ref() != Some(&value);
        self.observation.note_write(path, old.as_ref(), &value);
        value_ops::set_path(&mut cell.borrow_mut(), path, value);
        if changed && self.state.is_rendering() {
            self.state.mark_pending();
        }
    }

    pub fn diag(&self, kind: DiagnosticKind, message: impl Into<String>) {
        let message = message.into();
        log::warn!("host {}: {}: {}", self.id, kind.label(), message);
        self.diags.borrow_mut().push(Diagnostic::new(kind, message));
    }

    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.diags.borrow().clone()
    }

    pub fn has_diagnostic(&self, kind: DiagnosticKind) -> bool {
        self.diags.borrow().iter().any(|d| d.kind == kind)
    }

    pub fn alloc_node_id(&self) -> NodeId {
        let id = self.next_node_id.get();
        self.next_node_id.set(id + 1);
        id
    }

    pub fn flag(&self, name: &str, node: NodeId) {
        self.flag_index
            .borrow_mut()
            .entry(name.to_string())
            .or_default()
            .push(node);
    }

    pub fn flagged(&self, name: &str) -> Vec<NodeId> {
        self.flag_index
            .borrow()
            .get(name)
            .cloned()
            .unwrap_or_default()
    }

    pub fn splice_methods(&self, names: &str) {
        let mut spliced = self.spliced.borrow_mut();
        for name in names.split_whitespace() {
            if !spliced.iter().any(|n| n == name) {
                spliced.push(name.to_string());
            }
        }
    }

    /// A method visible to this host's expressions: only names the host
    /// declared through its splice list resolve against the process
    /// registry. Registry entries never shadow scope names; the evaluator
    /// checks scope first.
    pub fn spliced_method(&self, engine: &Engine, name: &str) -> Option<MethodEntry> {
        if !self.spliced.borrow().iter().any(|n| n == name) {
            return None;
        }
        engine.methods.get(name)
    }

    /// Reset per-pass bookkeeping before a full rebuild.
    pub fn begin_pass(&self) {
        self.next_node_id.set(0);
        self.flag_index.borrow_mut().clear();
        self.lifecycle.borrow_mut().clear();
        self.spliced.borrow_mut().clear();
        *self.propagate.borrow_mut() = None;
        // Lazy is re-derived from the template on every full pass.
        self.state.set_lazy(false);
    }

    pub fn teardown(&self) {
        self.torn_down.set(true);
        self.output.borrow_mut().clear();
        self.flag_index.borrow_mut().clear();
        self.lifecycle.borrow_mut().clear();
        *self.propagate.borrow_mut() = None;
        self.state.reset_cycle();
    }
}
