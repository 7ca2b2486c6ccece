//! Bazaar Adapters - One uniform interface over every automatable marketplace.
//!
//! Each source is reached through a [`SourceAdapter`]: official APIs (eBay,
//! Etsy) with typed wire formats, and public search pages driven entirely by
//! their definition (HTML selectors, JSON pointers, or JSON embedded in a page).
//!
//! Adapters never panic and never raise: every failure comes back as a
//! [`SourceFailure`] carrying a [`bazaar_core::FailureKind`]. Deadlines are
//! enforced by the caller; the [`TimeoutBudget`] only lets an adapter size its
//! HTTP timeouts and observe cancellation.
//!
//! # Example
//!
//! ```rust,no_run
//! use bazaar_adapters::AdapterSet;
//! use bazaar_core::SearchConfig;
//! use bazaar_source::{SourceLoader, SourceRegistry};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = SourceRegistry::load_from(&SourceLoader::with_default_dir()?)?;
//! let adapters = AdapterSet::from_registry(&registry, &SearchConfig::default())?;
//! println!("{} adapters ready", adapters.len());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod adapter;
pub mod error;
pub mod factory;
pub mod http;
pub mod providers;
pub mod template;

// Re-export commonly used types
pub use adapter::{AdapterResult, RawListing, RawPrice, SourceAdapter, TimeoutBudget};
pub use error::{AdapterError, Result, SourceFailure};
pub use factory::{build_adapter, AdapterSet};
pub use http::{build_http_client, AuthMode};
pub use providers::{EbayAdapter, EtsyAdapter, HtmlSearchAdapter, JsonSearchAdapter};
