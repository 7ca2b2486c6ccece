//! Error types for credential resolution.

use bazaar_core::FailureKind;
use thiserror::Error;

/// Errors reported by a credential store.
///
/// Messages never include credential values.
#[derive(Error, Debug)]
pub enum CredentialError {
    /// The store could not be reached
    #[error("credential store unavailable: {0}")]
    StoreUnavailable(String),
}

/// Why no credential bundle could be produced for a source.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CredentialUnavailable {
    /// The source cannot be automated at all
    #[error("source not automatable: {reason}")]
    NotAutomatable {
        /// Reason from the source definition
        reason: String,
    },

    /// No tier supplied every required field
    #[error("requires credentials, none configured (set {})", env_vars.join(", "))]
    Missing {
        /// Required field names
        fields: Vec<String>,
        /// Environment variables that would satisfy the requirement
        env_vars: Vec<String>,
    },
}

impl CredentialUnavailable {
    /// Failure kind recorded for a source that resolved this way.
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::NotAutomatable { .. } => FailureKind::Unavailable,
            Self::Missing { .. } => FailureKind::AuthMissing,
        }
    }
}

/// Result type for credential store operations.
pub type Result<T> = std::result::Result<T, CredentialError>;
