//! Core error types.

use thiserror::Error;

/// Errors produced by the core value types.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CoreError {
    /// A role name did not match any known site role.
    #[error("unknown site role: '{name}'")]
    UnknownRole { name: String },

    /// An authentication mode token did not match any known mode.
    #[error("unknown authentication mode: '{name}'")]
    UnknownAuthMode { name: String },
}

/// Result alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;
