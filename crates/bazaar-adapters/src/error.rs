//! Error types for the adapter subsystem.
//!
//! A [`SourceFailure`] is a value an adapter returns, never a panic; an
//! [`AdapterError`] is raised only while building adapters at startup.

use bazaar_core::FailureKind;
use std::time::Duration;
use thiserror::Error;

/// Typed failure of one call to one source.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {detail}")]
pub struct SourceFailure {
    /// Failure class
    pub kind: FailureKind,
    /// Human-readable detail (never contains credentials)
    pub detail: String,
    /// Server-requested delay before trying again
    pub retry_after: Option<Duration>,
}

impl SourceFailure {
    /// Create a failure of the given kind.
    #[must_use]
    pub fn new(kind: FailureKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
            retry_after: None,
        }
    }

    /// Attach a `Retry-After` hint.
    #[must_use]
    pub fn with_retry_after(mut self, delay: Duration) -> Self {
        self.retry_after = Some(delay);
        self
    }

    /// The call ran out of time.
    #[must_use]
    pub fn timeout(detail: impl Into<String>) -> Self {
        Self::new(FailureKind::Timeout, detail)
    }

    /// The parent request was cancelled while the call was in flight.
    #[must_use]
    pub fn cancelled() -> Self {
        Self::new(FailureKind::Timeout, "request cancelled")
    }

    /// The response body could not be read as expected.
    #[must_use]
    pub fn parse(detail: impl Into<String>) -> Self {
        Self::new(FailureKind::ParseError, detail)
    }

    /// The source answered with an error or could not be reached.
    #[must_use]
    pub fn upstream(detail: impl Into<String>) -> Self {
        Self::new(FailureKind::UpstreamError, detail)
    }

    /// Classify a transport-level `reqwest` error.
    #[must_use]
    pub fn from_transport(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::timeout("no response within the time budget")
        } else if err.is_connect() {
            Self::upstream("connection failed")
        } else if err.is_decode() || err.is_body() {
            Self::upstream("response body could not be read")
        } else {
            Self::upstream(format!("request failed: {err}"))
        }
    }
}

/// Errors raised while constructing adapters.
#[derive(Error, Debug)]
pub enum AdapterError {
    /// The shared HTTP client could not be built
    #[error("failed to create HTTP client: {0}")]
    HttpClient(String),

    /// A CSS selector in a definition does not parse
    #[error("invalid selector for {source_id} ({field}): {reason}")]
    InvalidSelector {
        /// Source ID
        source_id: String,
        /// Which selector
        field: String,
        /// Parser message
        reason: String,
    },

    /// A definition cannot be turned into an adapter
    #[error("cannot build adapter for {source_id}: {reason}")]
    Unsupported {
        /// Source ID
        source_id: String,
        /// Why
        reason: String,
    },
}

/// Result type alias for adapter construction.
pub type Result<T> = std::result::Result<T, AdapterError>;
