//! Scope frames and deferred-write holes.
//!
//! A scope is a chain of frames; the nearest frame wins on read. The root
//! frame of a pass aliases the host's data object (or its stage buffer), so
//! bare identifiers reach host data without copying. Iteration and `w-let`
//! push local frames; siblings never share a local frame — each node builds
//! its own chain from the frame handed down by its parent.

use std::cell::RefCell;
use std::rc::Rc;

use serde_json::{Map, Value};
use smallvec::SmallVec;

use crate::value_ops;

pub type Scope = Rc<ScopeFrame>;

pub enum FrameKind {
    /// Aliases a host data object (data or stage). Writes through this
    /// frame hit the shared object directly.
    Data(Rc<RefCell<Value>>),
    /// An ordinary key/value layer (`w-let`, iteration bindings).
    Local(RefCell<Map<String, Value>>),
}

pub struct ScopeFrame {
    pub kind: FrameKind,
    pub parent: Option<Scope>,
}

impl ScopeFrame {
    /// Fresh empty local frame on top of `parent`.
    pub fn child_of(parent: &Scope) -> Scope {
        Rc::new(ScopeFrame {
            kind: FrameKind::Local(RefCell::new(Map::new())),
            parent: Some(Rc::clone(parent)),
        })
    }

    pub fn with_bindings<I>(parent: &Scope, bindings: I) -> Scope
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        let frame = ScopeFrame::child_of(parent);
        for (name, value) in bindings {
            frame.set_local(name, value);
        }
        frame
    }

    pub fn has_local(&self, name: &str) -> bool {
        match &self.kind {
            FrameKind::Data(data) => match &*data.borrow() {
                Value::Object(map) => map.contains_key(name),
                _ => false,
            },
            FrameKind::Local(map) => map.borrow().contains_key(name),
        }
    }

    pub fn get_local(&self, name: &str) -> Option<Value> {
        match &self.kind {
            FrameKind::Data(data) => match &*data.borrow() {
                Value::Object(map) => map.get(name).cloned(),
                _ => None,
            },
            FrameKind::Local(map) => map.borrow().get(name).cloned(),
        }
    }

    pub fn set_local(&self, name: impl Into<String>, value: Value) {
        match &self.kind {
            FrameKind::Data(data) => {
                if let Value::Object(map) = &mut *data.borrow_mut() {
                    map.insert(name.into(), value);
                }
            }
            FrameKind::Local(map) => {
                map.borrow_mut().insert(name.into(), value);
            }
        }
    }

    /// Write a nested path rooted at this frame, materializing intermediate
    /// objects.
    pub fn set_path_local(&self, path: &[String], value: Value) {
        if path.is_empty() {
            return;
        }
        match &self.kind {
            FrameKind::Data(data) => {
                value_ops::set_path(&mut data.borrow_mut(), path, value);
            }
            FrameKind::Local(map) => {
                let mut borrowed = map.borrow_mut();
                let root = borrowed
                    .entry(path[0].clone())
                    .or_insert(Value::Object(Map::new()));
                if path.len() == 1 {
                    *root = value;
                } else {
                    value_ops::set_path(root, &path[1..], value);
                }
            }
        }
    }

    /// Shared-data identity, when this frame aliases a data object.
    pub fn data_cell(&self) -> Option<&Rc<RefCell<Value>>> {
        match &self.kind {
            FrameKind::Data(cell) => Some(cell),
            FrameKind::Local(_) => None,
        }
    }
}

/// Nearest-wins read along the chain.
pub fn lookup(scope: &Scope, name: &str) -> Option<Value> {
    let mut cur = Some(scope);
    while let Some(frame) = cur {
        if let Some(v) = frame.get_local(name) {
            return Some(v);
        }
        cur = frame.parent.as_ref();
    }
    None
}

/// The nearest frame that owns `name`; shadowing is respected.
pub fn find_owner(scope: &Scope, name: &str) -> Option<Scope> {
    let mut cur = Some(scope);
    while let Some(frame) = cur {
        if frame.has_local(name) {
            return Some(Rc::clone(frame));
        }
        cur = frame.parent.as_ref();
    }
    None
}

/// Flatten the chain into a plain object, nearest frame winning. Used when
/// injecting inherited scope into a mounted child host.
pub fn flatten(scope: &Scope) -> Value {
    let mut frames: Vec<&ScopeFrame> = Vec::new();
    let mut cur = Some(scope);
    while let Some(frame) = cur {
        frames.push(frame);
        cur = frame.parent.as_ref();
    }
    let mut out = Map::new();
    for frame in frames.iter().rev() {
        match &frame.kind {
            FrameKind::Data(data) => {
                if let Value::Object(map) = &*data.borrow() {
                    for (k, v) in map {
                        out.insert(k.clone(), v.clone());
                    }
                }
            }
            FrameKind::Local(map) => {
                for (k, v) in map.borrow().iter() {
                    out.insert(k.clone(), v.clone());
                }
            }
        }
    }
    Value::Object(out)
}

/// Placeholder for an unresolved nested assignment target. Accumulates the
/// path as property reads walk deeper; the first terminal write resolves a
/// root per the caller's write rule and materializes the chain.
#[derive(Debug, Clone, PartialEq)]
pub struct Hole {
    pub path: SmallVec<[String; 4]>,
}

impl Hole {
    pub fn new(name: impl Into<String>) -> Self {
        let mut path = SmallVec::new();
        path.push(name.into());
        Hole { path }
    }

    pub fn extended(&self, segment: impl Into<String>) -> Self {
        let mut path = self.path.clone();
        path.push(segment.into());
        Hole { path }
    }
}
