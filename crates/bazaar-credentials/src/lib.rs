//! Bazaar Credentials - Read-only credential resolution.
//!
//! Given a source and an optional user, decides which credential bundle the
//! call runs with, or why none is available. The crate only ever reads from the
//! external store; it never writes, logs, or persists credential values.
//!
//! # Example
//!
//! ```rust,no_run
//! use bazaar_core::CredentialsConfig;
//! use bazaar_credentials::{CredentialResolver, InMemoryCredentialStore};
//! use std::sync::Arc;
//!
//! let store = Arc::new(InMemoryCredentialStore::new());
//! let resolver = CredentialResolver::new(store, &CredentialsConfig::default());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod bundle;
pub mod error;
pub mod resolver;
pub mod store;

pub use bundle::{CredentialBundle, CredentialScope};
pub use error::{CredentialError, CredentialUnavailable, Result};
pub use resolver::CredentialResolver;
pub use store::{CredentialFields, CredentialStore, InMemoryCredentialStore};
