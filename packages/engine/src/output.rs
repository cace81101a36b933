//! Output tree: the fully expanded result of a render pass.
//!
//! Elements carry evaluated attributes, wired interaction handlers and
//! optional two-way model bindings. The tree is plain data so embedders
//! can attach it anywhere.

use bitflags::bitflags;
use indexmap::IndexMap;

use crate::host::HostId;

/// Per-pass node id; reset to zero at the start of every rebuild so that two
/// structurally identical passes produce identical trees.
pub type NodeId = u32;

bitflags! {
    /// Coarse categories of directives a node carried, kept for the host
    /// flag index and for diagnostics.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct NodeMarks: u8 {
        const CONTROL   = 1 << 0;
        const BINDING   = 1 << 1;
        const EVENT     = 1 << 2;
        const MODEL     = 1 << 3;
        const LIFECYCLE = 1 << 4;
    }
}

/// What firing a handler does. Statements run through the evaluator;
/// the stage actions drive the host's edit buffer.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Execute a statement with `$event` in scope.
    Statement(String),
    /// Commit the stage buffer into host data.
    ApplyStage,
    /// Rewind the stage buffer to the last applied snapshot.
    RestoreStage,
    /// Serialize the active scope (stage if present, else data) to JSON.
    SaveScope { props: Option<Vec<String>> },
    /// Merge a JSON payload supplied by the embedder into the active scope.
    LoadScope { props: Option<Vec<String>> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Handler {
    pub event: String,
    pub action: Action,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutputElement {
    pub id: NodeId,
    pub tag: String,
    pub attrs: IndexMap<String, String>,
    pub handlers: Vec<Handler>,
    /// Two-way binding target path expression, when the node carried one.
    pub model: Option<String>,
    pub marks: NodeMarks,
    /// Raw directive/binding attribute names present on the source node,
    /// feeding the host's reverse flag index.
    pub flags: Vec<String>,
    pub children: Vec<OutputNode>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OutputNode {
    Element(OutputElement),
    Text(String),
    Comment(String),
    /// A mounted child host renders its own subtree.
    Mount(HostId),
}

impl OutputElement {
    pub fn new(id: NodeId, tag: impl Into<String>) -> Self {
        OutputElement {
            id,
            tag: tag.into(),
            attrs: IndexMap::new(),
            handlers: Vec::new(),
            model: None,
            marks: NodeMarks::empty(),
            flags: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(|s| s.as_str())
    }

    pub fn handler(&self, event: &str) -> Option<&Handler> {
        self.handlers.iter().find(|h| h.event == event)
    }
}

/// Opaque append-nodes capability for embedders that place output into a
/// physical tree. The engine only ever appends; it never inspects the
/// target further.
pub trait MountTarget {
    fn append(&mut self, nodes: &[OutputNode]);
}

impl OutputNode {
    pub fn as_element(&self) -> Option<&OutputElement> {
        match self {
            OutputNode::Element(el) => Some(el),
            _ => None,
        }
    }
}

/// Depth-first search for an element by id.
pub fn find_element<'a>(nodes: &'a [OutputNode], id: NodeId) -> Option<&'a OutputElement> {
    for node in nodes {
        if let OutputNode::Element(el) = node {
            if el.id == id {
                return Some(el);
            }
            if let Some(found) = find_element(&el.children, id) {
                return Some(found);
            }
        }
    }
    None
}

/// Visit every element in document order.
pub fn walk_elements<'a>(nodes: &'a [OutputNode], visit: &mut dyn FnMut(&'a OutputElement)) {
    for node in nodes {
        if let OutputNode::Element(el) = node {
            visit(el);
            walk_elements(&el.children, visit);
        }
    }
}

/// Serialize the output tree to markup text for assertions and mounting
/// into text-based targets. Mounted child hosts render as placeholders; the
/// engine-level serializer expands them.
pub fn to_markup(nodes: &[OutputNode]) -> String {
    let mut out = String::new();
    for node in nodes {
        match node {
            OutputNode::Text(t) => out.push_str(t),
            OutputNode::Comment(c) => {
                out.push_str("<!--");
                out.push_str(c);
                out.push_str("-->");
            }
            OutputNode::Mount(id) => {
                out.push_str(&format!("<mount #{id}>"));
            }
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
                out.push_str(&to_markup(&el.children));
                out.push_str("</");
                out.push_str(&el.tag);
                out.push('>');
            }
        }
    }
    out
}
