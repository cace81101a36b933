//! Expression language: lexer, recursive-descent parser, tree-walking
//! evaluator. Expressions appear in directive values, attribute bindings,
//! event handlers and text interpolation; they never abort a render pass.

pub mod ast;
pub mod eval;
pub mod lexer;
pub mod parser;

use thiserror::Error;

pub use ast::Ast;
pub use eval::{EvalCtx, Rich, WriteRule};
pub use lexer::Lexer;
pub use parser::Parser;

/// Internal expression failure; surfaces only as a diagnostic.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct ExprError {
    pub message: String,
}

impl ExprError {
    pub fn new(message: impl Into<String>) -> Self {
        ExprError {
            message: message.into(),
        }
    }
}
