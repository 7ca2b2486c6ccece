//! Bazaar Aggregator - Multi-marketplace search orchestration.
//!
//! This crate turns one search request into calls against many marketplaces
//! and assembles a single answer. It owns request validation, the per-source
//! rate governor, normalization of raw listings, and market intelligence.
//!
//! # Features
//!
//! - Concurrent fan-out bounded by a configurable ceiling
//! - Independent per-source timeouts and request-wide cancellation
//! - Token-bucket rate limiting with daily caps and retry backoff
//! - Exactly one typed outcome per requested source
//! - Price statistics and similar-listing clusters
//!
//! # Example
//!
//! ```rust,ignore
//! use bazaar_aggregator::SearchAggregator;
//! use bazaar_core::{SearchRequest, SourceId};
//!
//! let aggregator = SearchAggregator::new(registry, resolver, adapters, &config);
//! let request = SearchRequest::new("fender stratocaster", [SourceId::new("reverb")?]);
//!
//! let response = aggregator.search(request).await?;
//! println!("{} results from {} sources", response.results.len(), response.succeeded());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod aggregator;
pub mod error;
pub mod governor;
pub mod intelligence;
pub mod normalizer;
pub mod outcome;
pub mod request;

// Re-export commonly used types
pub use aggregator::{SearchAggregator, SourceSummary};
pub use error::{InvalidRequest, Result, SearchError};
pub use governor::{BackoffPolicy, RateGovernor};
pub use intelligence::{ListingRef, MarketIntelligence, PriceRange, SimilarCluster};
pub use normalizer::{normalize, normalize_batch, Rejection, SourceYield};
pub use outcome::{AggregateSearchResponse, SourceOutcome};
pub use request::{parse_source_ids, validate};
