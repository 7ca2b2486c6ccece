//! Bazaar Core - Foundation crate for the Bazaar marketplace search engine.
//!
//! This crate provides the shared types, error handling and configuration
//! management that every other Bazaar crate depends on.
//!
//! # Modules
//!
//! - [`error`] - Central error types using thiserror
//! - [`config`] - TOML-based configuration with XDG paths and env overrides
//! - [`types`] - Validated identifiers (`SourceId`, `UserId`, `RequestId`)
//! - [`model`] - The search domain model shared by adapters and the aggregator
//!
//! # Example
//!
//! ```rust
//! use bazaar_core::{AppConfig, SearchRequest, SourceId};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::default();
//! assert_eq!(config.search.max_concurrency, 8);
//!
//! let request = SearchRequest::new("ddr4 ram", [SourceId::new("ebay")?]);
//! assert_eq!(request.sources.len(), 1);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod config;
pub mod error;
pub mod model;
pub mod types;

// Re-export commonly used types
pub use config::{
    AppConfig, CredentialsConfig, GovernorConfig, IntelligenceConfig, SearchConfig, ServerConfig,
    SourcesConfig,
};
pub use error::{BazaarError, ConfigError, ConfigResult, Result};
pub use model::{
    FailureKind, ItemCondition, NormalizedQuery, SearchFilters, SearchRequest, SearchResult,
    SortOrder,
};
pub use types::{RequestId, SourceId, UserId};
