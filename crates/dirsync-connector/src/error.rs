//! Connector error types
//!
//! Error definitions with transient/permanent classification. A transient
//! error signals a systemic condition (the service itself is unreachable)
//! rather than a problem with one entry.

use thiserror::Error;

use crate::entry::EntryKey;

/// Error that can occur while talking to a source or destination service.
#[derive(Debug, Error)]
pub enum ConnectorError {
    // Connection errors (transient)
    /// Failed to establish a connection to the service.
    #[error("connection failed: {message}")]
    ConnectionFailed {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The service did not answer in time.
    #[error("connection timeout after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    /// The service is temporarily unavailable.
    #[error("target system unavailable: {message}")]
    TargetUnavailable { message: String },

    // Resolution errors (permanent, configuration-level)
    /// No service is registered under the declared identifier.
    #[error("no {kind} service registered under '{identifier}'")]
    ServiceNotFound {
        kind: &'static str,
        identifier: String,
    },

    /// A registered factory failed to construct the service.
    #[error("construction of service '{identifier}' failed")]
    ConstructionFailed {
        identifier: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    // Entry-level errors (permanent, fail one entry only)
    /// The entry carries no usable pivot attribute.
    #[error("entry has no value for pivot attribute '{attribute}'")]
    MissingPivot { attribute: String },

    /// The entry to update or delete is gone at the destination.
    #[error("object not found: {key}")]
    ObjectNotFound { key: EntryKey },

    /// The entry to create already exists at the destination.
    #[error("object already exists: {key}")]
    ObjectAlreadyExists { key: EntryKey },

    /// The service rejected the data as malformed.
    #[error("invalid data: {message}")]
    InvalidData { message: String },

    /// The operation failed for a service-specific reason.
    #[error("operation failed: {message}")]
    OperationFailed {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl ConnectorError {
    /// Whether this error is a systemic, possibly self-resolving condition.
    ///
    /// Transient errors mean the service as a whole misbehaved; permanent
    /// errors are tied to one entry or to the configuration.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ConnectorError::ConnectionFailed { .. }
                | ConnectorError::Timeout { .. }
                | ConnectorError::TargetUnavailable { .. }
        )
    }

    // Convenience constructors

    /// Create a connection failed error.
    pub fn connection_failed(message: impl Into<String>) -> Self {
        ConnectorError::ConnectionFailed {
            message: message.into(),
            source: None,
        }
    }

    /// Create a connection failed error with an underlying cause.
    pub fn connection_failed_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        ConnectorError::ConnectionFailed {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an operation failed error.
    pub fn operation_failed(message: impl Into<String>) -> Self {
        ConnectorError::OperationFailed {
            message: message.into(),
            source: None,
        }
    }

    /// Create an invalid data error.
    pub fn invalid_data(message: impl Into<String>) -> Self {
        ConnectorError::InvalidData {
            message: message.into(),
        }
    }
}

/// Result type for connector operations.
pub type ConnectorResult<T> = Result<T, ConnectorError>;
