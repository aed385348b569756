//! Connector error types
//!
//! Error definitions with transient/permanent classification so the engine
//! can distinguish retryable network conditions from hard refusals.

use thiserror::Error;

/// Error that can occur during directory or site operations.
#[derive(Debug, Error)]
pub enum ConnectorError {
    // Lookup errors (permanent; distinct from empty results)
    /// A group named by an exact-match rule does not exist.
    #[error("group not found: '{name}'")]
    GroupNotFound { name: String },

    /// A user referenced by id or name does not exist on the target.
    #[error("user not found: '{name}'")]
    UserNotFound { name: String },

    /// Create refused because an entity with the same name already exists.
    #[error("duplicate {entity_kind}: '{name}' already exists")]
    DuplicateEntity { entity_kind: String, name: String },

    // Site refusals (permanent for the attempted operation)
    /// Delete refused because the user still owns content.
    #[error("user '{name}' owns content and cannot be deleted")]
    OwnsContent { name: String },

    /// The site rejected the requested change.
    #[error("operation rejected by site: {message}")]
    Rejected { message: String },

    // Transport errors (usually transient)
    /// Network error during communication.
    #[error("network error: {message}")]
    NetworkError {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Target system is temporarily unavailable.
    #[error("target system unavailable: {message}")]
    TargetUnavailable { message: String },

    /// A pagination continuation token was stale or malformed.
    #[error("invalid page token: {message}")]
    InvalidPage { message: String },
}

impl ConnectorError {
    /// Create a network error without an underlying source.
    pub fn network(message: impl Into<String>) -> Self {
        ConnectorError::NetworkError {
            message: message.into(),
            source: None,
        }
    }

    /// Create a site rejection.
    pub fn rejected(message: impl Into<String>) -> Self {
        ConnectorError::Rejected {
            message: message.into(),
        }
    }

    /// Whether retrying the same call could plausibly succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ConnectorError::NetworkError { .. } | ConnectorError::TargetUnavailable { .. }
        )
    }
}

/// Result alias for connector operations.
pub type ConnectorResult<T> = Result<T, ConnectorError>;
