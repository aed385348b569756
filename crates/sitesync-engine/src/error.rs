//! Engine error types
//!
//! Fatal errors (configuration, exact-match directory drift) abort a run
//! before any site mutation; everything else is recorded per entity and the
//! run continues.

use thiserror::Error;

use sitesync_connector::ConnectorError;

/// Errors in the source configuration, detected before a run starts.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A rule has an empty source name or pattern.
    #[error("rule has an empty source name")]
    EmptySource,

    /// Two rules name the same explicit target group.
    #[error("duplicate target group '{name}' across group rules")]
    DuplicateTargetGroup { name: String },

    /// An override principal has an empty name.
    #[error("override principal has an empty name")]
    EmptyOverrideName,

    /// A traversal limit is out of range.
    #[error("invalid limit: {message}")]
    InvalidLimit { message: String },
}

/// Errors that can occur during a reconciliation run.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Malformed configuration; fatal before any mutation.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// An exact-match rule resolved to no directory group. This signals
    /// configuration drift the operator must see immediately.
    #[error("directory group not found for exact-match rule: '{pattern}'")]
    DirectoryNotFound { pattern: String },

    /// A collaborator call failed.
    #[error("connector error: {0}")]
    Connector(#[from] ConnectorError),

    /// An entity believed present was missing mid-operation. The specific
    /// operation is skipped; the run continues.
    #[error("invariant violation: {message}")]
    Invariant { message: String },
}

impl EngineError {
    /// Create an invariant-violation error.
    pub fn invariant(message: impl Into<String>) -> Self {
        EngineError::Invariant {
            message: message.into(),
        }
    }

    /// Whether this error aborts the run before mutation begins.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            EngineError::Config(_) | EngineError::DirectoryNotFound { .. }
        )
    }
}

/// Result alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(EngineError::Config(ConfigError::EmptySource).is_fatal());
        assert!(EngineError::DirectoryNotFound {
            pattern: "Eng".into()
        }
        .is_fatal());
        assert!(!EngineError::invariant("gone").is_fatal());
        assert!(!EngineError::Connector(ConnectorError::network("reset")).is_fatal());
    }
}
