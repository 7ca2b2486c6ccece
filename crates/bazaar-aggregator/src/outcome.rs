//! Per-source outcomes and the assembled response.

use crate::intelligence::MarketIntelligence;
use crate::normalizer::SourceYield;
use bazaar_core::{FailureKind, RequestId, SearchRequest, SearchResult, SourceId};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// What happened to one requested source. Never partially both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum SourceOutcome {
    /// The source answered and its listings were normalized
    Success {
        /// Listings kept after normalization and filtering
        results: Vec<SearchResult>,
        /// When the answer arrived
        #[serde(rename = "fetchedAt")]
        fetched_at: DateTime<Utc>,
        /// What happened to each returned listing
        #[serde(rename = "yield")]
        source_yield: SourceYield,
    },
    /// The source contributed nothing
    Failure {
        /// Failure class
        kind: FailureKind,
        /// Specific detail, e.g. `"403 Forbidden"`
        detail: String,
        /// Human-readable explanation of the failure class
        reason: &'static str,
    },
}

impl SourceOutcome {
    /// Successful outcome fetched now.
    #[must_use]
    pub fn success(results: Vec<SearchResult>, source_yield: SourceYield) -> Self {
        Self::Success {
            results,
            fetched_at: Utc::now(),
            source_yield,
        }
    }

    /// Failed outcome.
    #[must_use]
    pub fn failure(kind: FailureKind, detail: impl Into<String>) -> Self {
        Self::Failure {
            kind,
            detail: detail.into(),
            reason: kind.description(),
        }
    }

    /// Whether the source answered.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Failure class, `None` on success.
    #[must_use]
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { kind, .. } => Some(*kind),
        }
    }

    /// Results of a successful source, empty otherwise.
    #[must_use]
    pub fn results(&self) -> &[SearchResult] {
        match self {
            Self::Success { results, .. } => results,
            Self::Failure { .. } => &[],
        }
    }
}

/// Everything a search produced.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateSearchResponse {
    /// Unique ID of this request
    pub request_id: RequestId,
    /// The request as received
    pub request: SearchRequest,
    /// Exactly one outcome per requested source, ordered by source ID
    pub per_source_outcomes: BTreeMap<SourceId, SourceOutcome>,
    /// All successful results, filtered and sorted
    pub results: Vec<SearchResult>,
    /// Statistics over `results`
    pub intelligence: MarketIntelligence,
    /// Wall-clock time spent on the request
    pub elapsed_ms: u64,
}

impl AggregateSearchResponse {
    /// Sources that answered.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.per_source_outcomes
            .values()
            .filter(|o| o.is_success())
            .count()
    }

    /// Sources that contributed nothing.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.per_source_outcomes.len() - self.succeeded()
    }

    /// Outcome of one source.
    #[must_use]
    pub fn outcome(&self, source_id: &SourceId) -> Option<&SourceOutcome> {
        self.per_source_outcomes.get(source_id)
    }
}
