//! Bazaar Source - Marketplace catalog for the Bazaar search engine.
//!
//! This crate provides the types and functionality for managing marketplace
//! definitions. It loads TOML definition files, validates them, and exposes a
//! read-only registry that the rest of the engine queries.
//!
//! # Architecture
//!
//! - **Definition Types** ([`definition`]): Strongly-typed source descriptors and access methods
//! - **Loader** ([`loader`]): TOML file loading from the `source-definitions/` directory
//! - **Registry** ([`registry`]): Immutable in-memory catalog with query support
//! - **Errors** ([`error`]): Registry-specific error types
//!
//! # Example
//!
//! ```rust,no_run
//! use bazaar_core::SourceId;
//! use bazaar_source::{SourceLoader, SourceRegistry};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load source definitions from the default directory
//! let loader = SourceLoader::with_default_dir()?;
//! let registry = SourceRegistry::load_from(&loader)?;
//!
//! // Query a specific source
//! let source_id = SourceId::new("ebay")?;
//! let descriptor = registry.lookup(&source_id)?;
//!
//! println!("Source: {}", descriptor.display_name());
//! println!("Capability: {}", descriptor.capability());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod definition;
pub mod error;
pub mod loader;
pub mod registry;

// Re-export commonly used types
pub use definition::{
    AccessMethod, ApiKind, Capability, CredentialShape, HtmlSelectors, JsonFieldMap,
    RateLimitPolicy, ResponseFormat, SourceCategory, SourceDescriptor, SourceMetadata,
};
pub use error::{RegistryError, Result};
pub use loader::SourceLoader;
pub use registry::SourceRegistry;
