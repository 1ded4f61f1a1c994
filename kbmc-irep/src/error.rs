#![forbid(unsafe_code)]
#![allow(unused_assignments)]

use miette::Diagnostic;
use thiserror::Error;

/// Structural errors raised while building or converting IR nodes.
///
/// These are never recovered from: a node that fails validation is never
/// handed out, so it can never reach the pool or a goto-program.
#[derive(Debug, Error, Diagnostic, Clone, PartialEq, Eq)]
pub enum IrepError {
    #[error("invalid type: {message}")]
    #[diagnostic(code(kbmc::irep::invalid_type))]
    InvalidType { message: String, node: String },

    #[error("ill-typed expression: {message}")]
    #[diagnostic(code(kbmc::irep::ill_typed))]
    IllTyped { message: String, node: String },

    #[error("unsupported {what} `{id}` in legacy tree")]
    #[diagnostic(
        code(kbmc::irep::unsupported),
        help("the front end produced a construct this converter does not know")
    )]
    Unsupported { what: &'static str, id: String, node: String },

    #[error("malformed legacy node `{id}`: {message}")]
    #[diagnostic(code(kbmc::irep::malformed))]
    Malformed { id: String, message: String, node: String },
}

impl IrepError {
    pub(crate) fn invalid_type(message: impl Into<String>, node: impl std::fmt::Debug) -> Self {
        IrepError::InvalidType {
            message: message.into(),
            node: format!("{node:?}"),
        }
    }

    pub(crate) fn ill_typed(message: impl Into<String>, node: impl std::fmt::Debug) -> Self {
        IrepError::IllTyped {
            message: message.into(),
            node: format!("{node:?}"),
        }
    }

    /// Debug rendering of the node that caused the error.
    pub fn node(&self) -> &str {
        match self {
            IrepError::InvalidType { node, .. }
            | IrepError::IllTyped { node, .. }
            | IrepError::Unsupported { node, .. }
            | IrepError::Malformed { node, .. } => node,
        }
    }
}
