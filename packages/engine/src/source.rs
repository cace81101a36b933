//! Source tree data model.
//!
//! The parsed template: tagged element nodes with ordered attribute lists,
//! plus text and comment leaves. A collaborator (`SourceTreeProvider`)
//! produces this tree from template text; the engine never parses markup
//! itself. Trees are immutable per pass — output is always re-expanded from
//! source, never patched.

use crate::error::bounded;

/// One attribute: names are unique per element, order is preserved.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceAttr {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourceElement {
    pub tag: String,
    pub attrs: Vec<SourceAttr>,
    pub children: Vec<SourceNode>,
    /// Stable per-node id, assigned once when the tree enters the parse
    /// cache; exposed to post-parse hooks.
    pub id: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SourceNode {
    Element(SourceElement),
    Text(String),
    Comment(String),
}

impl SourceElement {
    pub fn new(tag: impl Into<String>) -> Self {
        SourceElement {
            tag: tag.into(),
            attrs: Vec::new(),
            children: Vec::new(),
            id: 0,
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attrs.iter().any(|a| a.name == name)
    }

    /// Copy of this element without the given attributes. Children are
    /// cloned; used when a directive strips its own markers before re-entry.
    pub fn clone_without(&self, drop: &[&str]) -> SourceElement {
        SourceElement {
            tag: self.tag.clone(),
            attrs: self
                .attrs
                .iter()
                .filter(|a| !drop.contains(&a.name.as_str()))
                .cloned()
                .collect(),
            children: self.children.clone(),
            id: self.id,
        }
    }

    /// Bounded one-line rendering for diagnostics.
    pub fn excerpt(&self) -> String {
        bounded(&to_markup(std::slice::from_ref(&SourceNode::Element(self.clone()))), 256)
    }
}

impl SourceNode {
    pub fn as_element(&self) -> Option<&SourceElement> {
        match self {
            SourceNode::Element(el) => Some(el),
            _ => None,
        }
    }
}

/// Serialize a subtree back to markup text. Used for `w-literal` raw output
/// and diagnostic excerpts; not a general-purpose HTML serializer.
pub fn to_markup(nodes: &[SourceNode]) -> String {
    let mut out = String::new();
    for node in nodes {
        match node {
            SourceNode::Text(t) => out.push_str(t),
            SourceNode::Comment(c) => {
                out.push_str("<!--");
                out.push_str(c);
                out.push_str("-->");
            }
            SourceNode::Element(el) => {
                out.push('<');
                out.push_str(&el.tag);
                for a in &el.attrs {
                    out.push(' ');
                    out.push_str(&a.name);
                    out.push_str("=\"");
                    out.push_str(&a.value);
                    out.push('"');
                }
                out.push('>');
                out.push_str(&to_markup(&el.children));
                out.push_str("</");
                out.push_str(&el.tag);
                out.push('>');
            }
        }
    }
    out
}

/// Assign stable ids to every element in document order.
pub fn assign_ids(nodes: &mut [SourceNode], counter: &mut u64) {
    for node in nodes {
        if let SourceNode::Element(el) = node {
            *counter += 1;
            el.id = *counter;
            assign_ids(&mut el.children, counter);
        }
    }
}

/// Read-only plain-data tree handed to post-parse hooks.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct PlainNode {
    pub id: u64,
    pub tag: Option<String>,
    pub attrs: Vec<(String, String)>,
    pub text: Option<String>,
    pub children: Vec<PlainNode>,
}

pub fn to_plain(nodes: &[SourceNode]) -> Vec<PlainNode> {
    nodes
        .iter()
        .filter_map(|node| match node {
            SourceNode::Text(t) => Some(PlainNode {
                id: 0,
                tag: None,
                attrs: Vec::new(),
                text: Some(t.clone()),
                children: Vec::new(),
            }),
            SourceNode::Comment(_) => None,
            SourceNode::Element(el) => Some(PlainNode {
                id: el.id,
                tag: Some(el.tag.clone()),
                attrs: el
                    .attrs
                    .iter()
                    .map(|a| (a.name.clone(), a.value.clone()))
                    .collect(),
                text: None,
                children: to_plain(&el.children),
            }),
        })
        .collect()
}
