//! Named templates and external sources.
//!
//! Each host carries its own name→prototype registry, populated by
//! declaration nodes that register but never render. Lookup walks outward
//! through ancestor hosts; the walk itself lives in the dispatcher, which
//! has the host chain in hand.

use std::cell::RefCell;
use std::collections::HashMap;

use crate::source::SourceElement;

#[derive(Default)]
pub struct TemplateRegistry {
    templates: RefCell<HashMap<String, SourceElement>>,
}

impl TemplateRegistry {
    pub fn new() -> Self {
        TemplateRegistry::default()
    }

    /// Later registrations under the same name win.
    pub fn register(&self, name: impl Into<String>, prototype: SourceElement) {
        self.templates.borrow_mut().insert(name.into(), prototype);
    }

    pub fn resolve(&self, name: &str) -> Option<SourceElement> {
        self.templates.borrow().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.templates.borrow().contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.templates.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.borrow().is_empty()
    }
}

/// URL-keyed synchronous fetch of external template text. Retrieval
/// mechanics stay outside the engine; results are cached per URL for the
/// engine's lifetime.
pub trait ExternalSource {
    fn fetch(&self, url: &str) -> anyhow::Result<String>;
}
