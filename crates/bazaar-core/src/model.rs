//! Search domain model shared by adapters and the aggregator.
//!
//! A [`SearchRequest`] arrives from the caller, is turned into a
//! [`NormalizedQuery`] that every adapter receives, and the canonical
//! [`SearchResult`] is what comes back out of the normalizer.

use crate::types::{SourceId, UserId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// One unified query against a set of marketplaces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    /// Free-text keywords (required, non-blank)
    pub keywords: String,

    /// Optional result filters
    #[serde(default)]
    pub filters: SearchFilters,

    /// Sources to query (required, non-empty)
    pub sources: BTreeSet<SourceId>,

    /// End user the search runs for, used to pick user-scoped credentials
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,

    /// Per-source result cap; the engine default applies when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_results_per_source: Option<usize>,
}

impl SearchRequest {
    /// Create a request with no filters and no user.
    #[must_use]
    pub fn new(keywords: impl Into<String>, sources: impl IntoIterator<Item = SourceId>) -> Self {
        Self {
            keywords: keywords.into(),
            filters: SearchFilters::default(),
            sources: sources.into_iter().collect(),
            user_id: None,
            max_results_per_source: None,
        }
    }

    /// Set the filters.
    #[must_use]
    pub fn with_filters(mut self, filters: SearchFilters) -> Self {
        self.filters = filters;
        self
    }

    /// Set the user the search runs for.
    #[must_use]
    pub fn with_user(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    /// Set the per-source result cap.
    #[must_use]
    pub fn with_max_results(mut self, max: usize) -> Self {
        self.max_results_per_source = Some(max);
        self
    }
}

/// Optional filters applied upstream where a source supports them and
/// re-applied after normalization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchFilters {
    /// Inclusive lower price bound
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_min: Option<Decimal>,
    /// Inclusive upper price bound
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_max: Option<Decimal>,
    /// Required item condition
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<ItemCondition>,
    /// Category hint passed through to sources that understand it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_type: Option<String>,
    /// Ordering of the merged result list
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<SortOrder>,
}

impl SearchFilters {
    /// Check whether a normalized result satisfies the price and condition filters.
    ///
    /// A result with an unknown condition is kept: the filter can only
    /// exclude listings that positively report a different condition.
    #[must_use]
    pub fn admits(&self, result: &SearchResult) -> bool {
        if self.price_min.is_some_and(|min| result.price < min) {
            return false;
        }
        if self.price_max.is_some_and(|max| result.price > max) {
            return false;
        }
        match (self.condition, result.condition) {
            (Some(wanted), Some(actual)) => wanted == actual,
            _ => true,
        }
    }

    /// The effective sort order.
    #[must_use]
    pub fn sort_order(&self) -> SortOrder {
        self.sort.unwrap_or_default()
    }
}

/// Coarse item condition shared by all marketplaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemCondition {
    /// Brand new, unopened
    New,
    /// Open box or used once
    LikeNew,
    /// Pre-owned
    Used,
    /// Refurbished by seller or manufacturer
    Refurbished,
    /// Not working, sold for parts
    ForParts,
}

impl ItemCondition {
    /// Map a marketplace's free-text condition label onto the shared scale.
    ///
    /// Returns `None` when the label is not recognised.
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim().to_lowercase();
        if label.is_empty() {
            return None;
        }
        if label.contains("parts") || label.contains("not working") {
            Some(Self::ForParts)
        } else if label.contains("refurb") {
            Some(Self::Refurbished)
        } else if label.contains("like new") || label.contains("open box") || label == "like_new"
        {
            Some(Self::LikeNew)
        } else if label.contains("used") || label.contains("pre-owned") || label.contains("preowned")
        {
            Some(Self::Used)
        } else if label.contains("new") {
            Some(Self::New)
        } else {
            None
        }
    }

    /// Stable lowercase label used in outbound query strings.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::LikeNew => "like_new",
            Self::Used => "used",
            Self::Refurbished => "refurbished",
            Self::ForParts => "for_parts",
        }
    }
}

impl fmt::Display for ItemCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordering of the merged result list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    /// Keep each source's own ranking
    #[default]
    Relevance,
    /// Cheapest first
    PriceAsc,
    /// Most expensive first
    PriceDesc,
    /// Most recently posted first
    Newest,
}

/// The query every adapter receives: keywords cleaned up, filters resolved,
/// result cap fixed.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedQuery {
    /// Keywords with surrounding whitespace trimmed and inner runs collapsed
    pub keywords: String,
    /// Filters from the request
    pub filters: SearchFilters,
    /// Maximum number of listings an adapter may return
    pub max_results: usize,
}

impl NormalizedQuery {
    /// Build the adapter-facing query from a request.
    #[must_use]
    pub fn from_request(request: &SearchRequest, default_max_results: usize) -> Self {
        Self {
            keywords: request.keywords.split_whitespace().collect::<Vec<_>>().join(" "),
            filters: request.filters.clone(),
            max_results: request
                .max_results_per_source
                .unwrap_or(default_max_results)
                .max(1),
        }
    }

    /// Keywords percent-encoded for use in a query string.
    #[must_use]
    pub fn encoded_keywords(&self) -> String {
        urlencoding::encode(&self.keywords).into_owned()
    }
}

/// Canonical, normalized listing.
///
/// Only ever a pointer to the original listing: `url` leads back to the
/// marketplace, nothing beyond these fields is copied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    /// Source the listing came from
    pub source_id: SourceId,
    /// The marketplace's own identifier for the listing
    pub external_id: String,
    /// Listing title (never blank)
    pub title: String,
    /// Asking price (never negative)
    pub price: Decimal,
    /// ISO 4217 currency code
    pub currency: String,
    /// Absolute URL of the original listing
    pub url: String,
    /// Absolute thumbnail URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    /// Item condition when the source reports one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<ItemCondition>,
    /// When the listing was posted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub posted_at: Option<DateTime<Utc>>,
}

/// Why a single source failed to contribute results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    /// No response within the source's time budget
    Timeout,
    /// The source needs credentials and none were configured
    AuthMissing,
    /// The source refused the configured credentials
    AuthRejected,
    /// The source (or the local governor) throttled the call
    RateLimited,
    /// The source answered with an error status or could not be reached
    UpstreamError,
    /// The response could not be parsed
    ParseError,
    /// The source cannot be automated
    Unavailable,
}

impl FailureKind {
    /// Whether a bounded retry within the same call may help.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited | Self::Timeout)
    }

    /// Human-readable explanation suitable for showing next to the source.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Timeout => "did not respond in time",
            Self::AuthMissing => "requires credentials, none configured",
            Self::AuthRejected => "credentials were rejected, they may be expired",
            Self::RateLimited => "rate limited, try again shortly",
            Self::UpstreamError => "marketplace returned an error",
            Self::ParseError => "marketplace response could not be read",
            Self::Unavailable => "source not automatable",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Timeout => "Timeout",
            Self::AuthMissing => "AuthMissing",
            Self::AuthRejected => "AuthRejected",
            Self::RateLimited => "RateLimited",
            Self::UpstreamError => "UpstreamError",
            Self::ParseError => "ParseError",
            Self::Unavailable => "Unavailable",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().expect("valid decimal literal")
    }

    fn result(price: &str, condition: Option<ItemCondition>) -> SearchResult {
        SearchResult {
            source_id: SourceId::new("ebay").expect("valid source id"),
            external_id: "1".to_string(),
            title: "Corsair Vengeance DDR4 16GB".to_string(),
            price: dec(price),
            currency: "USD".to_string(),
            url: "https://www.ebay.com/itm/1".to_string(),
            thumbnail_url: None,
            condition,
            posted_at: None,
        }
    }

    #[test]
    fn test_request_builder() {
        let request = SearchRequest::new("ddr4 ram", [SourceId::new("ebay").expect("valid")])
            .with_user(UserId::new("user-1").expect("valid"))
            .with_max_results(10);

        assert_eq!(request.keywords, "ddr4 ram");
        assert_eq!(request.sources.len(), 1);
        assert_eq!(request.max_results_per_source, Some(10));
        assert!(request.user_id.is_some());
    }

    #[test]
    fn test_request_deserializes_camel_case() {
        let json = r#"{
            "keywords": "ddr4 ram",
            "sources": ["ebay", "etsy", "ebay"],
            "filters": {"priceMin": "10", "priceMax": "80.50", "condition": "used", "sort": "price_asc"},
            "userId": "user-7"
        }"#;

        let request: SearchRequest = serde_json::from_str(json).expect("parse request");
        assert_eq!(request.sources.len(), 2);
        assert_eq!(request.filters.price_min, Some(dec("10")));
        assert_eq!(request.filters.price_max, Some(dec("80.50")));
        assert_eq!(request.filters.condition, Some(ItemCondition::Used));
        assert_eq!(request.filters.sort_order(), SortOrder::PriceAsc);
        assert_eq!(request.user_id.expect("user id").as_str(), "user-7");
    }

    #[test]
    fn test_normalized_query_collapses_whitespace() {
        let request = SearchRequest::new("  ddr4   ram \t 16gb ", []);
        let query = NormalizedQuery::from_request(&request, 25);

        assert_eq!(query.keywords, "ddr4 ram 16gb");
        assert_eq!(query.max_results, 25);
        assert_eq!(query.encoded_keywords(), "ddr4%20ram%2016gb");
    }

    #[test]
    fn test_normalized_query_cap_never_zero() {
        let request = SearchRequest::new("lamp", []).with_max_results(0);
        assert_eq!(NormalizedQuery::from_request(&request, 50).max_results, 1);
    }

    #[test]
    fn test_filters_admit_price_bounds() {
        let filters = SearchFilters {
            price_min: Some(dec("20")),
            price_max: Some(dec("60")),
            ..SearchFilters::default()
        };

        assert!(filters.admits(&result("20", None)));
        assert!(filters.admits(&result("60", None)));
        assert!(!filters.admits(&result("19.99", None)));
        assert!(!filters.admits(&result("60.01", None)));
    }

    #[test]
    fn test_filters_keep_unknown_condition() {
        let filters = SearchFilters {
            condition: Some(ItemCondition::New),
            ..SearchFilters::default()
        };

        assert!(filters.admits(&result("5", None)));
        assert!(filters.admits(&result("5", Some(ItemCondition::New))));
        assert!(!filters.admits(&result("5", Some(ItemCondition::Used))));
    }

    #[test]
    fn test_condition_from_label() {
        assert_eq!(ItemCondition::from_label("Brand New"), Some(ItemCondition::New));
        assert_eq!(ItemCondition::from_label("Pre-Owned"), Some(ItemCondition::Used));
        assert_eq!(ItemCondition::from_label("Open box"), Some(ItemCondition::LikeNew));
        assert_eq!(
            ItemCondition::from_label("Seller refurbished"),
            Some(ItemCondition::Refurbished)
        );
        assert_eq!(
            ItemCondition::from_label("For parts or not working"),
            Some(ItemCondition::ForParts)
        );
        assert_eq!(ItemCondition::from_label("mystery"), None);
        assert_eq!(ItemCondition::from_label(""), None);
    }

    #[test]
    fn test_failure_kind_retry_policy() {
        assert!(FailureKind::RateLimited.is_retryable());
        assert!(FailureKind::Timeout.is_retryable());
        assert!(!FailureKind::AuthRejected.is_retryable());
        assert!(!FailureKind::ParseError.is_retryable());
        assert!(!FailureKind::Unavailable.is_retryable());
    }

    #[test]
    fn test_failure_kind_serialization() {
        let json = serde_json::to_string(&FailureKind::UpstreamError).expect("serialize kind");
        assert_eq!(json, "\"UpstreamError\"");
        assert_eq!(FailureKind::AuthMissing.to_string(), "AuthMissing");
        assert_eq!(
            FailureKind::AuthMissing.description(),
            "requires credentials, none configured"
        );
    }
}
