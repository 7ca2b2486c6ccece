//! Resolved credential bundles.

use bazaar_core::SourceId;
use bazaar_source::CredentialShape;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use zeroize::Zeroizing;

/// Where a bundle came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialScope {
    /// Stored for the end user running the search
    User,
    /// Shared application-level credential
    App,
    /// Process environment
    Env,
    /// No credential needed
    Anonymous,
}

impl fmt::Display for CredentialScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::User => "user",
            Self::App => "app",
            Self::Env => "env",
            Self::Anonymous => "anonymous",
        })
    }
}

/// One resolved set of credential fields for one source.
///
/// Values are wiped from memory on drop and never appear in `Debug` output.
#[derive(Clone)]
pub struct CredentialBundle {
    source_id: SourceId,
    scope: CredentialScope,
    fields: BTreeMap<String, Zeroizing<String>>,
}

impl CredentialBundle {
    /// Create a bundle from field name/value pairs.
    ///
    /// Values are moved, not copied, so a `Zeroizing` value from the store
    /// keeps its single buffer.
    #[must_use]
    pub fn new<I, V>(source_id: SourceId, scope: CredentialScope, fields: I) -> Self
    where
        I: IntoIterator<Item = (String, V)>,
        V: Into<Zeroizing<String>>,
    {
        Self {
            source_id,
            scope,
            fields: fields
                .into_iter()
                .map(|(name, value)| (name, value.into()))
                .collect(),
        }
    }

    /// Empty bundle for sources that need no credential.
    #[must_use]
    pub fn anonymous(source_id: SourceId) -> Self {
        Self {
            source_id,
            scope: CredentialScope::Anonymous,
            fields: BTreeMap::new(),
        }
    }

    /// Source this bundle belongs to.
    #[must_use]
    pub fn source_id(&self) -> &SourceId {
        &self.source_id
    }

    /// Tier the bundle was resolved from.
    #[must_use]
    pub fn scope(&self) -> CredentialScope {
        self.scope
    }

    /// Whether this bundle carries no credential.
    #[must_use]
    pub fn is_anonymous(&self) -> bool {
        self.scope == CredentialScope::Anonymous
    }

    /// Value of one field.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(|v| v.as_str())
    }

    /// Names of the fields present.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Whether every field of `shape` is present and non-blank.
    #[must_use]
    pub fn satisfies(&self, shape: &CredentialShape) -> bool {
        shape
            .fields()
            .iter()
            .all(|field| self.get(field).is_some_and(|v| !v.trim().is_empty()))
    }
}

impl fmt::Debug for CredentialBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialBundle")
            .field("source_id", &self.source_id)
            .field("scope", &self.scope)
            .field("fields", &self.fields.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ebay() -> SourceId {
        SourceId::new("ebay").expect("valid source id")
    }

    #[test]
    fn test_debug_redacts_values() {
        let bundle = CredentialBundle::new(
            ebay(),
            CredentialScope::App,
            [("client_secret".to_string(), "hunter2".to_string())],
        );
        let debug = format!("{bundle:?}");
        assert!(debug.contains("client_secret"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_satisfies_shape() {
        let shape = CredentialShape::new(["client_id", "client_secret"]);

        let full = CredentialBundle::new(
            ebay(),
            CredentialScope::User,
            [
                ("client_id".to_string(), "id".to_string()),
                ("client_secret".to_string(), "secret".to_string()),
            ],
        );
        assert!(full.satisfies(&shape));

        let partial = CredentialBundle::new(
            ebay(),
            CredentialScope::User,
            [
                ("client_id".to_string(), "id".to_string()),
                ("client_secret".to_string(), "  ".to_string()),
            ],
        );
        assert!(!partial.satisfies(&shape));
    }

    #[test]
    fn test_zeroizing_values_are_moved() {
        let secret = Zeroizing::new("hunter2".to_string());
        let buffer = secret.as_ptr();

        let bundle = CredentialBundle::new(
            ebay(),
            CredentialScope::User,
            [("client_secret".to_string(), secret)],
        );
        let value = bundle.get("client_secret").expect("field present");
        assert_eq!(value, "hunter2");
        assert_eq!(value.as_ptr(), buffer);
    }

    #[test]
    fn test_anonymous_bundle() {
        let bundle = CredentialBundle::anonymous(ebay());
        assert!(bundle.is_anonymous());
        assert_eq!(bundle.field_names().count(), 0);
        assert!(bundle.satisfies(&CredentialShape::default()));
        assert_eq!(bundle.scope().to_string(), "anonymous");
    }
}
