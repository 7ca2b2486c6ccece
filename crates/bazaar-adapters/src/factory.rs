//! Builds one adapter per automatable source.

use crate::adapter::SourceAdapter;
use crate::error::{AdapterError, Result};
use crate::http::build_http_client;
use crate::providers::{EbayAdapter, EtsyAdapter, HtmlSearchAdapter, JsonSearchAdapter};
use bazaar_core::{SearchConfig, SourceId};
use bazaar_source::{AccessMethod, ApiKind, ResponseFormat, SourceDescriptor, SourceRegistry};
use reqwest::Client;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Adapters keyed by the source they serve.
///
/// Sources whose capability is `UNAVAILABLE` have no entry.
#[derive(Clone, Default)]
pub struct AdapterSet {
    adapters: HashMap<SourceId, Arc<dyn SourceAdapter>>,
}

impl AdapterSet {
    /// Empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build adapters for every automatable source in the registry.
    ///
    /// All adapters share one HTTP client identified by the configured user agent.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be built or a definition cannot
    /// be turned into an adapter.
    pub fn from_registry(registry: &SourceRegistry, config: &SearchConfig) -> Result<Self> {
        let client = build_http_client(&config.user_agent)?;
        let mut set = Self::new();

        for descriptor in registry.list() {
            match build_adapter(descriptor, client.clone())? {
                Some(adapter) => set.insert(adapter),
                None => debug!(source_id = %descriptor.id(), "no adapter for unavailable source"),
            }
        }

        info!(adapters = set.len(), sources = registry.count(), "built source adapters");
        Ok(set)
    }

    /// Add or replace the adapter for its source.
    pub fn insert(&mut self, adapter: Arc<dyn SourceAdapter>) {
        self.adapters.insert(adapter.source_id().clone(), adapter);
    }

    /// Adapter for a source, if it has one.
    #[must_use]
    pub fn get(&self, source_id: &SourceId) -> Option<Arc<dyn SourceAdapter>> {
        self.adapters.get(source_id).cloned()
    }

    /// Number of adapters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    /// Whether the set has no adapters.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

impl std::fmt::Debug for AdapterSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut ids: Vec<_> = self.adapters.keys().map(SourceId::as_str).collect();
        ids.sort_unstable();
        f.debug_struct("AdapterSet").field("sources", &ids).finish()
    }
}

/// Adapter for one descriptor, `None` when the source is not automatable.
///
/// # Errors
/// Returns error if the definition lacks what its access method needs.
pub fn build_adapter(
    descriptor: &SourceDescriptor,
    client: Client,
) -> Result<Option<Arc<dyn SourceAdapter>>> {
    let source_id = descriptor.id().clone();
    let unsupported = |reason: &str| AdapterError::Unsupported {
        source_id: source_id.to_string(),
        reason: reason.to_string(),
    };

    let adapter: Arc<dyn SourceAdapter> = match &descriptor.access {
        AccessMethod::Unavailable { .. } => return Ok(None),

        AccessMethod::Api {
            adapter: ApiKind::Ebay,
            endpoint,
            ..
        } => Arc::new(EbayAdapter::new(
            source_id.clone(),
            endpoint.clone(),
            descriptor.default_currency(),
            client,
        )),

        AccessMethod::Api {
            adapter: ApiKind::Etsy,
            endpoint,
            ..
        } => Arc::new(EtsyAdapter::new(source_id.clone(), endpoint.clone(), client)),

        AccessMethod::PublicSearch {
            template,
            format: ResponseFormat::Html,
            selectors,
            ..
        } => {
            let selectors = selectors
                .as_ref()
                .ok_or_else(|| unsupported("html format requires selectors"))?;
            Arc::new(HtmlSearchAdapter::new(
                source_id.clone(),
                descriptor.source.domain.clone(),
                template.clone(),
                selectors,
                client,
            )?)
        }

        AccessMethod::PublicSearch {
            template,
            format: ResponseFormat::Json,
            fields,
            ..
        } => {
            let fields = fields
                .clone()
                .ok_or_else(|| unsupported("json format requires fields"))?;
            Arc::new(JsonSearchAdapter::json(
                source_id.clone(),
                template.clone(),
                fields,
                client,
            ))
        }

        AccessMethod::PublicSearch {
            template,
            format: ResponseFormat::EmbeddedJson,
            fields,
            script_selector,
            ..
        } => {
            let fields = fields
                .clone()
                .ok_or_else(|| unsupported("embedded-json format requires fields"))?;
            let script = script_selector
                .as_deref()
                .ok_or_else(|| unsupported("embedded-json format requires script_selector"))?;
            Arc::new(JsonSearchAdapter::embedded(
                source_id.clone(),
                template.clone(),
                script,
                fields,
                client,
            )?)
        }
    };

    Ok(Some(adapter))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bazaar_source::SourceLoader;
    use std::path::PathBuf;

    fn definitions_registry() -> SourceRegistry {
        let dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../source-definitions");
        let loader = SourceLoader::new(dir).expect("definitions directory exists");
        SourceRegistry::load_from(&loader).expect("definitions load")
    }

    #[test]
    fn test_unavailable_sources_get_no_adapter() {
        let registry = definitions_registry();
        let set = AdapterSet::from_registry(&registry, &SearchConfig::default())
            .expect("adapters build");

        let facebook = SourceId::new("facebook-marketplace").expect("valid source id");
        let ebay = SourceId::new("ebay").expect("valid source id");
        let reverb = SourceId::new("reverb").expect("valid source id");

        assert!(set.get(&facebook).is_none());
        assert!(set.get(&ebay).is_some());
        assert!(set.get(&reverb).is_some());

        let unavailable = registry
            .count_by_capability()
            .get(&bazaar_source::Capability::Unavailable)
            .copied()
            .unwrap_or(0);
        let automatable = registry.count() - unavailable;
        assert_eq!(set.len(), automatable);
    }

    #[test]
    fn test_empty_set() {
        let set = AdapterSet::new();
        assert!(set.is_empty());
        assert!(set
            .get(&SourceId::new("ebay").expect("valid source id"))
            .is_none());
    }
}
