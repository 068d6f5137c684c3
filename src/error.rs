//! Error types for diagqual.
//!
//! All errors are strongly typed using thiserror and returned as explicit
//! results. Debounce policy outcomes (clamping, redundant reports, reports to a
//! frozen monitor) are not errors and never show up here.

use thiserror::Error;

/// Configuration errors raised while validating debounce or engine settings.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Field '{field}' must be greater than 0")]
    NotPositive {
        field: &'static str,
    },

    #[error("Field '{field}' is out of range: {reason}")]
    OutOfRange {
        field: &'static str,
        reason: String,
    },

    #[error("Invalid configuration document: {reason}")]
    Malformed {
        reason: String,
    },
}

/// Top-level error type for diagqual.
#[derive(Debug, Error)]
pub enum DiagError {
    #[error("{kind} already registered: {key}")]
    AlreadyExists {
        kind: &'static str,
        key: String,
    },

    #[error("{kind} not found: {key}")]
    NotFound {
        kind: &'static str,
        key: String,
    },

    #[error("Operation not supported: {operation}")]
    NotSupported {
        operation: &'static str,
    },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Engine has been shut down; qualification ticker is unavailable")]
    EngineStopped,

    #[error("Operation timed out after {duration_ms}ms")]
    Timeout {
        duration_ms: u64,
    },

    #[error("Channel disconnected: {path}")]
    Disconnected {
        path: String,
    },

    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },
}

impl DiagError {
    /// Creates an `AlreadyExists` error for the given registry kind and key.
    #[must_use]
    pub fn already_exists(kind: &'static str, key: impl ToString) -> Self {
        Self::AlreadyExists {
            kind,
            key: key.to_string(),
        }
    }

    /// Creates a `NotFound` error for the given registry kind and key.
    #[must_use]
    pub fn not_found(kind: &'static str, key: impl ToString) -> Self {
        Self::NotFound {
            kind,
            key: key.to_string(),
        }
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this is a registration collision.
    #[must_use]
    pub const fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }

    /// Returns true if the addressed key is not registered.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns true if the operation has no backend in this deployment.
    #[must_use]
    pub const fn is_not_supported(&self) -> bool {
        matches!(self, Self::NotSupported { .. })
    }

    /// Returns true if this is a configuration error.
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// Returns true if this is an internal error.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::Internal { .. })
    }
}

/// Result type alias for diagqual operations.
pub type DiagResult<T> = Result<T, DiagError>;
