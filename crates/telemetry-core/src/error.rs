//! Error types shared across the telemetry crates.
//!
//! We use `thiserror` for `Display`/`Error` impls, matching the error model
//! used throughout the rest of the workspace: one enum per failure domain,
//! carrying structured fields rather than pre-formatted strings so callers
//! (HTTP handlers, the client library) can map variants to outcomes without
//! parsing messages.

use thiserror::Error;

/// Result type alias used throughout the telemetry crates.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the write/read path described in spec §7.
#[derive(Debug, Error)]
pub enum Error {
    /// A field failed validation (bad type, missing required field, bad
    /// enum value, size overflow). Never retried.
    #[error("validation error on field `{field}`: {reason}")]
    Validation {
        /// Name of the offending field.
        field: String,
        /// Human-readable reason.
        reason: String,
    },

    /// No row exists for the given `event_id`.
    #[error("run not found: {event_id}")]
    NotFound {
        /// The `event_id` that was looked up.
        event_id: String,
    },

    /// The store was transiently busy/locked; caller may retry.
    #[error("store busy")]
    Busy,

    /// The embedded store reported corruption.
    #[error("store corruption: {0}")]
    Corruption(String),

    /// Underlying SQLite error not covered by a more specific variant.
    #[error("store error: {0}")]
    Store(String),

    /// I/O error (lock file, NDJSON buffer, backup copy).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Validation errors are the only kind that is never retried and never
    /// represents a storage problem.
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// True for errors a caller may usefully retry (busy/locked).
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Busy)
    }

    /// Short machine-readable class used in structured log lines and HTTP
    /// error bodies (§6, §7).
    pub fn class(&self) -> &'static str {
        match self {
            Error::Validation { .. } => "validation",
            Error::NotFound { .. } => "not_found",
            Error::Busy => "busy",
            Error::Corruption(_) => "corruption",
            Error::Store(_) => "store",
            Error::Io(_) => "io",
            Error::Serialization(_) => "serialization",
        }
    }
}
