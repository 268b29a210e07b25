//! Error handling types
//!
//! One error enum for the whole workspace. Variants map 1:1 onto the
//! user-visible error kinds, so the HTTP and CLI layers can translate a
//! failure into a status code without string matching.

use thiserror::Error;

/// Result type alias for operations that can fail
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for Agent Brain
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid argument provided by a caller
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Description of the invalid argument
        message: String,
    },

    /// Resource not found
    #[error("Not found: {resource}")]
    NotFound {
        /// The resource that was not found
        resource: String,
    },

    /// Conflicting state (lock held, duplicate job, instance already running)
    #[error("Conflict: {message}")]
    Conflict {
        /// Description of the conflict
        message: String,
    },

    /// Embedding dimension does not match the backend's recorded dimension
    #[error("Dimension mismatch: backend stores {expected}-dim embeddings, got {actual}")]
    DimensionMismatch {
        /// Dimension recorded in the backend's embedding metadata
        expected: usize,
        /// Dimension of the rejected write or query
        actual: usize,
    },

    /// Storage backend cannot be reached or refused the operation
    #[error("Backend unavailable: {message}")]
    BackendUnavailable {
        /// Description of the backend failure
        message: String,
        /// Optional source error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Embedding or summarization provider failed after retries
    #[error("Provider '{provider}' unavailable: {message}")]
    ProviderUnavailable {
        /// Name of the failing provider
        provider: String,
        /// Description of the provider failure
        message: String,
    },

    /// Graph retrieval requested while the graph index is disabled
    #[error("GraphRAG not enabled")]
    GraphDisabled,

    /// Operation cancelled via its cancellation token
    #[error("Operation cancelled")]
    Cancelled,

    /// Operation exceeded its deadline
    #[error("Timed out: {operation}")]
    Timeout {
        /// The operation that timed out
        operation: String,
    },

    /// I/O operation error
    #[error("I/O error: {source}")]
    Io {
        /// The underlying I/O error
        #[from]
        source: std::io::Error,
    },

    /// JSON parsing or serialization error
    #[error("JSON error: {source}")]
    Json {
        /// The underlying JSON error
        #[from]
        source: serde_json::Error,
    },

    /// Configuration-related error
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration error
        message: String,
    },

    /// Invalid configuration value for a specific key
    #[error("Invalid configuration for '{key}': {message}")]
    ConfigInvalid {
        /// The configuration key that is invalid
        key: String,
        /// Reason why it is invalid
        message: String,
    },

    /// Unexpected internal failure
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal failure
        message: String,
    },
}

/// Coarse error kind used for HTTP status and CLI exit-code mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// User-surface validation failure
    InvalidArgument,
    /// Missing resource
    NotFound,
    /// Conflicting state
    Conflict,
    /// Embedding dimension mismatch
    DimensionMismatch,
    /// Storage backend unreachable
    BackendUnavailable,
    /// Embedding/summarization provider unreachable
    ProviderUnavailable,
    /// Graph index disabled
    GraphDisabled,
    /// Cancelled by caller
    Cancelled,
    /// Deadline exceeded
    Timeout,
    /// Configuration error
    Configuration,
    /// Everything else
    Internal,
}

impl Error {
    /// Build an `InvalidArgument` error
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Build a `NotFound` error
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    /// Build a `Conflict` error
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Build a `BackendUnavailable` error without a source
    pub fn backend_unavailable(message: impl Into<String>) -> Self {
        Self::BackendUnavailable {
            message: message.into(),
            source: None,
        }
    }

    /// Build a `BackendUnavailable` error wrapping a source error
    pub fn backend_unavailable_with(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::BackendUnavailable {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Build a `ProviderUnavailable` error
    pub fn provider_unavailable(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ProviderUnavailable {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Build a `Timeout` error
    pub fn timeout(operation: impl Into<String>) -> Self {
        Self::Timeout {
            operation: operation.into(),
        }
    }

    /// Build a `Configuration` error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Build an `Internal` error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// The coarse kind of this error, for status-code mapping
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument { .. } => ErrorKind::InvalidArgument,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::DimensionMismatch { .. } => ErrorKind::DimensionMismatch,
            Self::BackendUnavailable { .. } => ErrorKind::BackendUnavailable,
            Self::ProviderUnavailable { .. } => ErrorKind::ProviderUnavailable,
            Self::GraphDisabled => ErrorKind::GraphDisabled,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Configuration { .. } | Self::ConfigInvalid { .. } => ErrorKind::Configuration,
            Self::Io { .. } | Self::Json { .. } | Self::Internal { .. } => ErrorKind::Internal,
        }
    }
}

impl ErrorKind {
    /// Stable wire name of this kind (used in HTTP error bodies)
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidArgument => "invalid_argument",
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::DimensionMismatch => "dimension_mismatch",
            Self::BackendUnavailable => "backend_unavailable",
            Self::ProviderUnavailable => "provider_unavailable",
            Self::GraphDisabled => "graph_disabled",
            Self::Cancelled => "cancelled",
            Self::Timeout => "timeout",
            Self::Configuration => "configuration",
            Self::Internal => "internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_maps_every_taxonomy_variant() {
        assert_eq!(
            Error::invalid_argument("k").kind(),
            ErrorKind::InvalidArgument
        );
        assert_eq!(Error::not_found("job abc").kind(), ErrorKind::NotFound);
        assert_eq!(Error::conflict("lock held").kind(), ErrorKind::Conflict);
        assert_eq!(
            Error::DimensionMismatch {
                expected: 8,
                actual: 4
            }
            .kind(),
            ErrorKind::DimensionMismatch
        );
        assert_eq!(Error::GraphDisabled.kind(), ErrorKind::GraphDisabled);
        assert_eq!(Error::Cancelled.kind(), ErrorKind::Cancelled);
        assert_eq!(Error::timeout("embed").kind(), ErrorKind::Timeout);
    }

    #[test]
    fn graph_disabled_message_is_stable() {
        // The HTTP layer surfaces this message verbatim with a 409.
        assert_eq!(Error::GraphDisabled.to_string(), "GraphRAG not enabled");
    }
}
