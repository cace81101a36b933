//! Selective change observation.
//!
//! Every mutation of host data funnels through `Host::write_path`, which
//! consults this layer. Observation never triggers a re-render by itself;
//! it produces change notifications for two-way-binding consistency and
//! diagnostics, and the scheduler separately notices that a render pass
//! dirtied data.

use std::cell::RefCell;

use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ObserveMode {
    /// No interception at all.
    #[default]
    Off,
    /// Only registered paths (and anything beneath them) notify.
    Observed,
    /// Every write notifies.
    All,
}

/// One delivered write notification.
#[derive(Debug, Clone, PartialEq)]
pub struct Change {
    pub path: Vec<String>,
    pub old: Option<Value>,
    pub new: Value,
}

type Listener = Box<dyn Fn(&Change)>;

/// Per-host observation state.
#[derive(Default)]
pub struct Observation {
    mode: RefCell<ObserveMode>,
    paths: RefCell<Vec<Vec<String>>>,
    listeners: RefCell<Vec<Listener>>,
}

impl Observation {
    pub fn new() -> Self {
        Observation::default()
    }

    pub fn mode(&self) -> ObserveMode {
        *self.mode.borrow()
    }

    pub fn set_mode(&self, mode: ObserveMode) {
        *self.mode.borrow_mut() = mode;
    }

    /// Register a path of interest; implies `Observed` mode unless the mode
    /// is already `All`.
    pub fn observe(&self, path: Vec<String>) {
        if self.mode() == ObserveMode::Off {
            self.set_mode(ObserveMode::Observed);
        }
        self.paths.borrow_mut().push(path);
    }

    pub fn listen<F>(&self, f: F)
    where
        F: Fn(&Change) + 'static,
    {
        self.listeners.borrow_mut().push(Box::new(f));
    }

    /// Whether a write at `path` is within observed territory: at, beneath,
    /// or directly above a registered path.
    pub fn covers(&self, path: &[String]) -> bool {
        match self.mode() {
            ObserveMode::Off => false,
            ObserveMode::All => true,
            ObserveMode::Observed => self.paths.borrow().iter().any(|p| {
                let n = p.len().min(path.len());
                p[..n] == path[..n]
            }),
        }
    }

    /// Deliver a notification if the write changed a covered path.
    pub fn note_write(&self, path: &[String], old: Option<&Value>, new: &Value) {
        if !self.covers(path) {
            return;
        }
        if old == Some(new) {
            return;
        }
        let change = Change {
            path: path.to_vec(),
            old: old.cloned(),
            new: new.clone(),
        };
        for listener in self.listeners.borrow().iter() {
            listener(&change);
        }
    }
}
