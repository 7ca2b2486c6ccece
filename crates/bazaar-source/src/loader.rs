//! Source definition loading from TOML files.
//!
//! This module handles loading source descriptors from the `source-definitions/` directory.

use crate::{
    definition::SourceDescriptor,
    error::{RegistryError, Result},
};
use bazaar_core::SourcesConfig;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Loader for source definitions from TOML files.
pub struct SourceLoader {
    /// Base directory containing source definitions
    definitions_dir: PathBuf,
}

impl SourceLoader {
    /// Create a new loader with the given definitions directory.
    ///
    /// # Errors
    /// Returns error if the directory doesn't exist.
    pub fn new(definitions_dir: impl Into<PathBuf>) -> Result<Self> {
        let definitions_dir = definitions_dir.into();

        if !definitions_dir.is_dir() {
            return Err(RegistryError::DirectoryNotFound {
                path: definitions_dir.display().to_string(),
            });
        }

        Ok(Self { definitions_dir })
    }

    /// Create a loader using the default definitions directory.
    ///
    /// Looks for `source-definitions/` relative to the workspace root.
    ///
    /// # Errors
    /// Returns error if the default directory doesn't exist.
    pub fn with_default_dir() -> Result<Self> {
        // Find workspace root by looking for Cargo.toml with [workspace]
        let mut current_dir = std::env::current_dir()?;

        loop {
            let cargo_toml = current_dir.join("Cargo.toml");
            if cargo_toml.exists() {
                if let Ok(contents) = std::fs::read_to_string(&cargo_toml) {
                    if contents.contains("[workspace]") {
                        return Self::new(current_dir.join("source-definitions"));
                    }
                }
            }

            if let Some(parent) = current_dir.parent() {
                current_dir = parent.to_path_buf();
            } else {
                break;
            }
        }

        // Fallback: try relative path
        Self::new(PathBuf::from("source-definitions"))
    }

    /// Create a loader for the configured directory, or the default one when unset.
    pub fn from_config(config: &SourcesConfig) -> Result<Self> {
        match &config.definitions_dir {
            Some(dir) => Self::new(dir.clone()),
            None => Self::with_default_dir(),
        }
    }

    /// Directory this loader reads from.
    #[must_use]
    pub fn definitions_dir(&self) -> &Path {
        &self.definitions_dir
    }

    /// Load all source definitions from the definitions directory.
    ///
    /// Invalid definitions are logged as warnings and skipped.
    ///
    /// # Errors
    /// Returns error if the directory can't be read.
    pub fn load_all(&self) -> Result<Vec<SourceDescriptor>> {
        let mut descriptors = Vec::new();

        Self::walk_and_load_recursive(&self.definitions_dir, &mut descriptors)?;

        info!(
            count = descriptors.len(),
            dir = %self.definitions_dir.display(),
            "loaded source definitions"
        );

        Ok(descriptors)
    }

    /// Recursively walk directory and load all TOML files.
    fn walk_and_load_recursive(dir: &Path, descriptors: &mut Vec<SourceDescriptor>) -> Result<()> {
        let mut entries = std::fs::read_dir(dir)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<std::io::Result<Vec<_>>>()?;
        // Stable load order regardless of filesystem
        entries.sort();

        for path in entries {
            if path.is_dir() {
                Self::walk_and_load_recursive(&path, descriptors)?;
            } else if path.extension().and_then(|s| s.to_str()) == Some("toml") {
                match Self::load_from_path(&path) {
                    Ok(descriptor) => {
                        if let Err(e) = descriptor.validate() {
                            warn!(
                                path = %path.display(),
                                error = %e,
                                "skipping invalid source definition"
                            );
                            continue;
                        }
                        debug!(
                            source_id = %descriptor.id(),
                            path = %path.display(),
                            "loaded source definition"
                        );
                        descriptors.push(descriptor);
                    }
                    Err(e) => {
                        warn!(
                            path = %path.display(),
                            error = %e,
                            "failed to load source definition"
                        );
                    }
                }
            }
        }

        Ok(())
    }

    /// Load a source definition from a specific file path.
    fn load_from_path(path: &Path) -> Result<SourceDescriptor> {
        let contents = std::fs::read_to_string(path).map_err(|e| RegistryError::LoadError {
            path: path.display().to_string(),
            source: Box::new(e),
        })?;

        toml::from_str(&contents).map_err(|e| RegistryError::ParseError {
            path: path.display().to_string(),
            source: e,
        })
    }
}
