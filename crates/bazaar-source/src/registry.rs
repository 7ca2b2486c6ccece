//! In-memory source registry with query support.

use crate::{
    definition::{Capability, SourceDescriptor},
    error::{RegistryError, Result},
    loader::SourceLoader,
};
use bazaar_core::SourceId;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Read-only catalog of every supported marketplace.
///
/// Built once at startup and never mutated afterwards, so clones are cheap
/// and lookups need no locking.
#[derive(Debug, Clone, Default)]
pub struct SourceRegistry {
    /// Descriptors indexed (and ordered) by source ID
    descriptors: Arc<BTreeMap<SourceId, SourceDescriptor>>,
}

impl SourceRegistry {
    /// Build a registry from an explicit list of descriptors.
    ///
    /// # Errors
    /// Returns error if a descriptor fails validation or two share an ID.
    pub fn from_descriptors(descriptors: impl IntoIterator<Item = SourceDescriptor>) -> Result<Self> {
        let mut map = BTreeMap::new();

        for descriptor in descriptors {
            descriptor.validate()?;

            let source_id = descriptor.id().clone();
            if map.contains_key(&source_id) {
                return Err(RegistryError::DuplicateId {
                    source_id: source_id.to_string(),
                });
            }

            debug!(
                source_id = %source_id,
                capability = %descriptor.capability(),
                "registered source"
            );
            map.insert(source_id, descriptor);
        }

        Ok(Self {
            descriptors: Arc::new(map),
        })
    }

    /// Create a registry from every definition the loader finds.
    ///
    /// # Errors
    /// Returns error if loading fails or two files declare the same ID.
    pub fn load_from(loader: &SourceLoader) -> Result<Self> {
        let registry = Self::from_descriptors(loader.load_all()?)?;

        let counts = registry.count_by_capability();
        let count = |capability| counts.get(&capability).copied().unwrap_or(0);
        info!(
            count = registry.count(),
            api = count(Capability::Api),
            public_search = count(Capability::PublicSearch),
            unavailable = count(Capability::Unavailable),
            "source registry ready"
        );

        Ok(registry)
    }

    /// Look up a source by ID.
    ///
    /// # Errors
    /// Returns error if the source is not registered.
    pub fn lookup(&self, source_id: &SourceId) -> Result<&SourceDescriptor> {
        self.descriptors
            .get(source_id)
            .ok_or_else(|| RegistryError::NotFound {
                source_id: source_id.to_string(),
            })
    }

    /// All descriptors, ordered by ID.
    #[must_use]
    pub fn list(&self) -> Vec<&SourceDescriptor> {
        self.descriptors.values().collect()
    }

    /// Get the total number of sources in the registry.
    #[must_use]
    pub fn count(&self) -> usize {
        self.descriptors.len()
    }

    /// Check if a source exists in the registry.
    #[must_use]
    pub fn contains(&self, source_id: &SourceId) -> bool {
        self.descriptors.contains_key(source_id)
    }

    /// Source count per capability class, in capability order.
    #[must_use]
    pub fn count_by_capability(&self) -> BTreeMap<Capability, usize> {
        let mut counts: BTreeMap<Capability, usize> = BTreeMap::new();

        for descriptor in self.descriptors.values() {
            *counts.entry(descriptor.capability()).or_insert(0) += 1;
        }

        counts
    }
}
