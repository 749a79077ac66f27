// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for wb-core operations.
//!
//! Every failure is classified into an [`ErrorKind`], which decides how the
//! reliability layer and the orchestrator propagate it.

use thiserror::Error;

/// Classification of an [`Error`] for retry and propagation decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Network,
    Timeout,
    RateLimited,
    CircuitOpen,
    Permission,
    NotFound,
    BinaryUnavailable,
    RetryExhausted,
    SyncInProgress,
    Store,
    Io,
    Json,
}

impl ErrorKind {
    /// Transient failures that are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorKind::Network | ErrorKind::Timeout | ErrorKind::RateLimited
        )
    }
}

/// All possible errors that can occur in wb-core operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid {field}: {message}")]
    Validation { field: String, message: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("{label} timed out after {timeout_ms}ms")]
    Timeout { label: String, timeout_ms: u64 },

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("circuit open for '{label}': service unavailable, failing fast")]
    CircuitOpen { label: String },

    #[error("permission denied: {0}")]
    Permission(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("tracker binary unavailable: {0}\n  hint: install the binary or configure target.fallback_file")]
    BinaryUnavailable(String),

    #[error("{label} failed after {attempts} attempts: {source}")]
    RetryExhausted {
        label: String,
        attempts: u32,
        #[source]
        source: Box<Error>,
    },

    #[error("a sync is already in progress")]
    SyncInProgress,

    #[error("store error: {0}")]
    Store(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Shorthand for a validation failure on a named field.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation { .. } => ErrorKind::Validation,
            Error::Network(_) => ErrorKind::Network,
            Error::Timeout { .. } => ErrorKind::Timeout,
            Error::RateLimited(_) => ErrorKind::RateLimited,
            Error::CircuitOpen { .. } => ErrorKind::CircuitOpen,
            Error::Permission(_) => ErrorKind::Permission,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::BinaryUnavailable(_) => ErrorKind::BinaryUnavailable,
            Error::RetryExhausted { .. } => ErrorKind::RetryExhausted,
            Error::SyncInProgress => ErrorKind::SyncInProgress,
            Error::Store(_) => ErrorKind::Store,
            Error::Io(_) => ErrorKind::Io,
            Error::Json(_) => ErrorKind::Json,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }

    /// Errors that indicate misconfiguration rather than a transient fault.
    ///
    /// A sync run aborts as soon as one of these surfaces. Retry exhaustion is
    /// looked through so a wrapped permission failure still counts.
    pub fn is_systemic(&self) -> bool {
        match self {
            Error::Permission(_) | Error::BinaryUnavailable(_) => true,
            Error::RetryExhausted { source, .. } => source.is_systemic(),
            _ => false,
        }
    }

    /// Stable tag used as the prefix of entries in `SyncResult::errors`.
    pub fn code(&self) -> &'static str {
        match self.kind() {
            ErrorKind::Validation => "VALIDATION_ERROR",
            ErrorKind::Network => "NETWORK_ERROR",
            ErrorKind::Timeout => "TIMEOUT",
            ErrorKind::RateLimited => "RATE_LIMITED",
            ErrorKind::CircuitOpen => "CIRCUIT_OPEN",
            ErrorKind::Permission => "PERMISSION_DENIED",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::BinaryUnavailable => "BINARY_UNAVAILABLE",
            ErrorKind::RetryExhausted => "RETRY_EXHAUSTED",
            ErrorKind::SyncInProgress => "SYNC_IN_PROGRESS",
            ErrorKind::Store => "STORE_ERROR",
            ErrorKind::Io => "IO_ERROR",
            ErrorKind::Json => "JSON_ERROR",
        }
    }

    /// Render as `"{code}: {message}"` for result error lists.
    pub fn to_entry(&self) -> String {
        format!("{}: {}", self.code(), self)
    }
}

/// A specialized Result type for wb-core operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
