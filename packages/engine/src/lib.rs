//! Directive-driven template rendering engine.
//!
//! A parsed markup template plus a layered data scope expands into a
//! concrete output tree, re-entrantly, with two-way write-back from the
//! output into the data. The engine implements a small control-flow
//! language (conditionals, switch with fallthrough, two iteration forms),
//! multi-frame scope resolution with deferred-write placeholders, an
//! update scheduler with loop guards and cross-host propagation, and a
//! selective change-observation layer.
//!
//! Markup parsing and physical attachment stay outside: embedders supply a
//! [`SourceTreeProvider`] and consume the plain-data output tree.

pub mod config;
pub mod directives;
pub mod engine;
pub mod error;
pub mod expression;
pub mod filters;
pub mod host;
pub mod observe;
pub mod output;
pub mod registry;
pub mod scheduler;
pub mod scope;
pub mod source;
pub mod value_ops;

pub use config::EngineConfig;
pub use engine::{Engine, SourceTreeProvider};
pub use error::{Diagnostic, DiagnosticKind};
pub use expression::ExprError;
pub use filters::{Filters, MethodRegistry};
pub use host::{Host, HostId};
pub use observe::{Change, ObserveMode};
pub use output::{Action, Handler, MountTarget, NodeId, OutputElement, OutputNode};
pub use registry::ExternalSource;
pub use scheduler::Phase;
pub use source::{SourceAttr, SourceElement, SourceNode};
