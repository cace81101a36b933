//! Engine configuration.
//!
//! Directive spellings, interpolation delimiters, depth/loop limits and the
//! non-mutating event list are all configurable; the defaults below are the
//! documented spellings used throughout the tests.

/// Process-wide engine configuration, injected at construction.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Prefix for control/model/lifecycle directives, e.g. `w-if`.
    pub directive_prefix: String,
    /// Prefix for one-way attribute bindings, e.g. `:class`.
    pub binding_prefix: String,
    /// Prefix for event handler attributes, e.g. `@click`.
    pub event_prefix: String,
    /// Text interpolation delimiters, e.g. `%name%`.
    pub delimiters: (String, String),
    /// Maximum nesting depth for include/import expansion.
    pub include_max_depth: usize,
    /// Per-cycle update counter limit (runaway lifecycle-hook guard).
    pub loop_limit: u32,
    /// Mark failing nodes with diagnostic attributes in the output tree.
    pub mark_on_element: bool,
    /// Strip directive attributes from the output tree.
    pub cleanup_directives: bool,
    /// Forced updates cascade synchronously into direct child hosts.
    pub cascade_forced: bool,
    /// Events that never trigger a follow-up update after their handler runs.
    pub non_mutating_events: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            directive_prefix: "w-".to_string(),
            binding_prefix: ":".to_string(),
            event_prefix: "@".to_string(),
            delimiters: ("%".to_string(), "%".to_string()),
            include_max_depth: 16,
            loop_limit: 32,
            mark_on_element: true,
            cleanup_directives: true,
            cascade_forced: true,
            non_mutating_events: [
                "mouseover",
                "mouseenter",
                "mousemove",
                "mouseout",
                "mouseleave",
                "pointermove",
                "wheel",
                "scroll",
                "dragover",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

impl EngineConfig {
    pub fn is_non_mutating(&self, event: &str) -> bool {
        self.non_mutating_events.iter().any(|e| e == event)
    }
}
