//! Error taxonomy and per-host diagnostics.
//!
//! Every failure inside a render pass is recovered locally: expressions
//! degrade to a falsy sentinel, misused directives go inert, depth overruns
//! abort only the offending branch. Nothing here ever propagates out of
//! `update()`.

use serde::Serialize;

/// Classification of recoverable render-pass failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiagnosticKind {
    /// An expression raised during evaluation; degraded to falsy / no-op.
    Expression,
    /// A structurally invalid directive combination; the directive is ignored.
    DirectiveMisuse,
    /// Inclusion or update recursion past the configured limit.
    DepthExceeded,
    /// A named template or external source could not be resolved.
    ResourceUnavailable,
    /// A supported-but-discouraged form was used.
    Deprecation,
}

impl DiagnosticKind {
    pub fn label(&self) -> &'static str {
        match self {
            DiagnosticKind::Expression => "expression",
            DiagnosticKind::DirectiveMisuse => "directive-misuse",
            DiagnosticKind::DepthExceeded => "depth-exceeded",
            DiagnosticKind::ResourceUnavailable => "resource-unavailable",
            DiagnosticKind::Deprecation => "deprecation",
        }
    }
}

/// One side-channel diagnostic recorded on a host.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Diagnostic {
            kind,
            message: message.into(),
        }
    }
}

/// Truncate a diagnostic payload so log lines stay bounded.
pub fn bounded(text: &str, max: usize) -> String {
    let collapsed: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.len() <= max {
        collapsed
    } else {
        let mut cut = max;
        while !collapsed.is_char_boundary(cut) {
            cut -= 1;
        }
        format!("{}…", &collapsed[..cut])
    }
}
