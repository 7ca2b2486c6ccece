//! Error types for the aggregator.
//!
//! Only caller mistakes are errors here. Anything that goes wrong with a
//! marketplace is recorded as that source's outcome instead.

use bazaar_core::SourceId;
use rust_decimal::Decimal;
use thiserror::Error;

/// Errors that reject a whole search request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SearchError {
    /// The request failed validation; no source was contacted
    #[error("invalid request: {0}")]
    RequestInvalid(#[from] InvalidRequest),
}

/// Why a request was rejected before dispatch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvalidRequest {
    /// Keywords are missing or blank
    #[error("keywords must not be empty")]
    EmptyKeywords,

    /// No source was selected
    #[error("at least one source must be selected")]
    NoSources,

    /// A source ID is not well formed
    #[error("invalid source ID '{id}'")]
    InvalidSourceId {
        /// The rejected ID as given
        id: String,
    },

    /// A source ID is well formed but not registered
    #[error("unknown source '{id}'")]
    UnknownSource {
        /// The unknown ID
        id: SourceId,
    },

    /// Minimum price above maximum price
    #[error("price_min ({min}) is greater than price_max ({max})")]
    InvalidPriceRange {
        /// Lower bound
        min: Decimal,
        /// Upper bound
        max: Decimal,
    },

    /// A price bound is below zero
    #[error("price bounds must not be negative")]
    NegativePrice,
}

impl InvalidRequest {
    /// Stable machine-readable code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::EmptyKeywords => "EMPTY_KEYWORDS",
            Self::NoSources => "NO_SOURCES",
            Self::InvalidSourceId { .. } => "INVALID_SOURCE_ID",
            Self::UnknownSource { .. } => "UNKNOWN_SOURCE",
            Self::InvalidPriceRange { .. } => "INVALID_PRICE_RANGE",
            Self::NegativePrice => "NEGATIVE_PRICE",
        }
    }
}

/// Result type alias for aggregator operations.
pub type Result<T> = std::result::Result<T, SearchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_and_code() {
        let err = SearchError::from(InvalidRequest::UnknownSource {
            id: SourceId::new("nonexistent").expect("valid source id"),
        });
        assert_eq!(err.to_string(), "invalid request: unknown source 'nonexistent'");

        let SearchError::RequestInvalid(inner) = err;
        assert_eq!(inner.code(), "UNKNOWN_SOURCE");
    }
}
