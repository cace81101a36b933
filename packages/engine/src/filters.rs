//! Output filters and callable methods.
//!
//! Filters are pure text transforms applied at fixed points of the render
//! path: interpolated text, bound attribute values, link-like attributes.
//! They are installed once at engine construction and frozen. The method
//! registry is the mutable counterpart: named callables spliced into
//! expression scope, extendable at any time.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;

use crate::value_ops;

pub type FilterFn = Box<dyn Fn(&str) -> String>;

lazy_static! {
    static ref UNSAFE_SCHEME: Regex =
        Regex::new(r"(?i)^\s*(javascript|data|vbscript)\s*:").expect("static pattern");
}

/// Attribute names that receive the URL filter instead of the plain
/// attribute filter.
pub const LINK_ATTRS: &[&str] = &["href", "src", "action", "formaction", "xlink:href"];

/// The frozen filter set. Build once with [`Filters::standard`] or assemble
/// custom transforms before handing it to the engine.
pub struct Filters {
    /// Structural sanitization for interpolated markup-bearing text.
    pub markup: FilterFn,
    /// Scheme scrubbing for link-like attribute values.
    pub url: FilterFn,
    /// Generic transform for bound attribute values.
    pub attr: FilterFn,
    /// Plain-text coercion for interpolated values.
    pub text: FilterFn,
    /// Replacement text for null and boolean-false interpolation results.
    pub placeholder: String,
}

impl Filters {
    pub fn standard() -> Self {
        Filters {
            markup: Box::new(escape_markup),
            url: Box::new(scrub_url),
            attr: Box::new(escape_attr),
            text: Box::new(|s| s.to_string()),
            placeholder: String::new(),
        }
    }

    /// Render a value for text interpolation: text coercion first, then
    /// structural sanitization.
    pub fn display(&self, v: &Value) -> String {
        match v {
            Value::Null => self.placeholder.clone(),
            Value::Bool(false) => self.placeholder.clone(),
            other => (self.markup)(&(self.text)(&value_ops::to_display(other))),
        }
    }

    /// Render a value for an attribute, routing link-like names through the
    /// URL filter.
    pub fn attribute(&self, name: &str, v: &Value) -> String {
        let raw = value_ops::to_display(v);
        if LINK_ATTRS.contains(&name) {
            (self.url)(&raw)
        } else {
            (self.attr)(&raw)
        }
    }
}

impl Default for Filters {
    fn default() -> Self {
        Filters::standard()
    }
}

pub fn escape_markup(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            other => out.push(other),
        }
    }
    out
}

pub fn escape_attr(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            other => out.push(other),
        }
    }
    out
}

/// Empty out values carrying an executable scheme.
pub fn scrub_url(input: &str) -> String {
    if UNSAFE_SCHEME.is_match(input) {
        String::new()
    } else {
        escape_attr(input)
    }
}

/// A callable spliced into expression scope.
pub type Method = Rc<dyn Fn(&[Value]) -> Result<Value, String>>;

/// Registry entries are either direct callables or named groups addressed
/// with property access (`group.member(...)`).
#[derive(Clone)]
pub enum MethodEntry {
    Callable(Method),
    Namespace(HashMap<String, Method>),
}

/// Mutable name→callable registry. Names already present in the scope chain
/// shadow registry entries during evaluation.
#[derive(Default)]
pub struct MethodRegistry {
    entries: RefCell<HashMap<String, MethodEntry>>,
}

impl MethodRegistry {
    pub fn new() -> Self {
        MethodRegistry::default()
    }

    pub fn register<F>(&self, name: impl Into<String>, f: F)
    where
        F: Fn(&[Value]) -> Result<Value, String> + 'static,
    {
        self.entries
            .borrow_mut()
            .insert(name.into(), MethodEntry::Callable(Rc::new(f)));
    }

    pub fn register_namespace(&self, name: impl Into<String>, members: HashMap<String, Method>) {
        self.entries
            .borrow_mut()
            .insert(name.into(), MethodEntry::Namespace(members));
    }

    pub fn get(&self, name: &str) -> Option<MethodEntry> {
        self.entries.borrow().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.borrow().contains_key(name)
    }
}
