//! Application state management.

use anyhow::Context;
use bazaar_adapters::AdapterSet;
use bazaar_aggregator::SearchAggregator;
use bazaar_core::AppConfig;
use bazaar_credentials::{CredentialResolver, InMemoryCredentialStore};
use bazaar_source::{SourceLoader, SourceRegistry};
use std::sync::Arc;

/// Global application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// The search engine
    pub aggregator: Arc<SearchAggregator>,
}

impl AppState {
    /// Wrap an already-built aggregator.
    pub fn new(aggregator: SearchAggregator) -> Self {
        Self {
            aggregator: Arc::new(aggregator),
        }
    }

    /// Build the registry, adapters and aggregator from configuration.
    ///
    /// App-level credentials come from the environment; no user credential
    /// store is wired into the standalone server.
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let loader =
            SourceLoader::from_config(&config.sources).context("locating source definitions")?;
        let registry = SourceRegistry::load_from(&loader).with_context(|| {
            format!(
                "loading source definitions from {}",
                loader.definitions_dir().display()
            )
        })?;

        let adapters =
            AdapterSet::from_registry(&registry, &config.search).context("building adapters")?;
        let resolver = CredentialResolver::new(
            Arc::new(InMemoryCredentialStore::new()),
            &config.credentials,
        );

        tracing::info!(
            sources = registry.count(),
            adapters = adapters.len(),
            capabilities = ?registry.count_by_capability(),
            "Search engine ready"
        );

        Ok(Self::new(SearchAggregator::new(
            registry, resolver, adapters, config,
        )))
    }
}
