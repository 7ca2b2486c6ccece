//! Credential resolution with a fixed tier order.
//!
//! For a source that needs credentials the tiers are tried in this order and
//! the first complete bundle wins:
//!
//! 1. the end user's own credential, when the request names a user
//! 2. the shared application credential
//! 3. process environment variables `{PREFIX}_{SOURCE}_{FIELD}`

use crate::bundle::{CredentialBundle, CredentialScope};
use crate::error::CredentialUnavailable;
use crate::store::{CredentialFields, CredentialStore};
use bazaar_core::{CredentialsConfig, SourceId, UserId};
use bazaar_source::{AccessMethod, CredentialShape, SourceDescriptor};
use std::sync::Arc;
use tracing::{debug, warn};
use zeroize::Zeroizing;

type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Decides which credential bundle a source call runs with.
#[derive(Clone)]
pub struct CredentialResolver {
    store: Arc<dyn CredentialStore>,
    env_prefix: String,
    env: EnvLookup,
}

impl CredentialResolver {
    /// Create a resolver reading the real process environment.
    #[must_use]
    pub fn new(store: Arc<dyn CredentialStore>, config: &CredentialsConfig) -> Self {
        Self {
            store,
            env_prefix: config.env_prefix.clone(),
            env: Arc::new(|key| std::env::var(key).ok()),
        }
    }

    /// Replace the environment lookup.
    #[must_use]
    pub fn with_env_lookup(
        mut self,
        lookup: impl Fn(&str) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        self.env = Arc::new(lookup);
        self
    }

    /// Resolve the bundle for one call to `source`.
    pub async fn resolve(
        &self,
        source: &SourceDescriptor,
        user_id: Option<&UserId>,
    ) -> Result<CredentialBundle, CredentialUnavailable> {
        let shape = match &source.access {
            AccessMethod::Unavailable { reason, .. } => {
                return Err(CredentialUnavailable::NotAutomatable {
                    reason: reason.clone(),
                });
            }
            AccessMethod::PublicSearch { .. } => {
                return Ok(CredentialBundle::anonymous(source.id().clone()));
            }
            AccessMethod::Api { credentials, .. } if credentials.is_empty() => {
                return Ok(CredentialBundle::anonymous(source.id().clone()));
            }
            AccessMethod::Api { credentials, .. } => credentials,
        };
        let source_id = source.id();

        if let Some(user_id) = user_id {
            let fields = self.store.user_credential(user_id, source_id).await;
            if let Some(bundle) = Self::accept(source_id, CredentialScope::User, fields, shape) {
                return Ok(bundle);
            }
        }

        let fields = self.store.app_credential(source_id).await;
        if let Some(bundle) = Self::accept(source_id, CredentialScope::App, fields, shape) {
            return Ok(bundle);
        }

        if let Some(bundle) = self.from_env(source_id, shape) {
            return Ok(bundle);
        }

        debug!(source_id = %source_id, "no credential tier satisfied the source");
        Err(self.missing(source_id, shape))
    }

    /// Whether the source is runnable without a user credential.
    ///
    /// Checks the app and environment tiers only; used to tell callers which
    /// sources are selectable before they search.
    pub async fn preflight(&self, source: &SourceDescriptor) -> Result<CredentialScope, CredentialUnavailable> {
        self.resolve(source, None).await.map(|bundle| bundle.scope())
    }

    /// Environment variable consulted for one field of one source.
    #[must_use]
    pub fn env_var_name(&self, source_id: &SourceId, field: &str) -> String {
        format!("{}_{}_{}", self.env_prefix, source_id, field)
            .replace('-', "_")
            .to_uppercase()
    }

    fn accept(
        source_id: &SourceId,
        scope: CredentialScope,
        fields: crate::error::Result<Option<CredentialFields>>,
        shape: &CredentialShape,
    ) -> Option<CredentialBundle> {
        let fields = match fields {
            Ok(fields) => fields?,
            Err(e) => {
                warn!(
                    source_id = %source_id,
                    scope = %scope,
                    error = %e,
                    "credential store lookup failed, treating as not found"
                );
                return None;
            }
        };

        let bundle = CredentialBundle::new(source_id.clone(), scope, fields);
        if bundle.satisfies(shape) {
            debug!(source_id = %source_id, scope = %scope, "resolved credentials");
            Some(bundle)
        } else {
            debug!(
                source_id = %source_id,
                scope = %scope,
                "stored credential is incomplete, falling through"
            );
            None
        }
    }

    fn from_env(&self, source_id: &SourceId, shape: &CredentialShape) -> Option<CredentialBundle> {
        let mut fields = Vec::with_capacity(shape.fields().len());
        for field in shape.fields() {
            let value = (self.env)(&self.env_var_name(source_id, field))?;
            fields.push((field.clone(), Zeroizing::new(value)));
        }

        let bundle = CredentialBundle::new(source_id.clone(), CredentialScope::Env, fields);
        if bundle.satisfies(shape) {
            debug!(source_id = %source_id, scope = "env", "resolved credentials");
            Some(bundle)
        } else {
            None
        }
    }

    fn missing(&self, source_id: &SourceId, shape: &CredentialShape) -> CredentialUnavailable {
        CredentialUnavailable::Missing {
            fields: shape.fields().to_vec(),
            env_vars: shape
                .fields()
                .iter()
                .map(|field| self.env_var_name(source_id, field))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CredentialError, Result};
    use crate::store::InMemoryCredentialStore;
    use async_trait::async_trait;
    use bazaar_core::FailureKind;
    use bazaar_source::{
        ApiKind, HtmlSelectors, RateLimitPolicy, ResponseFormat, SourceCategory, SourceMetadata,
    };
    use std::collections::HashMap;

    fn descriptor(id: &str, access: AccessMethod) -> SourceDescriptor {
        SourceDescriptor {
            source: SourceMetadata {
                id: SourceId::new(id).expect("valid source id"),
                display_name: id.to_string(),
                url: "https://market.test".to_string(),
                domain: "market.test".to_string(),
                category: SourceCategory::General,
                currency: "USD".to_string(),
                timeout_ms: None,
                rate_limit: RateLimitPolicy::default(),
            },
            access,
        }
    }

    fn ebay() -> SourceDescriptor {
        descriptor(
            "ebay",
            AccessMethod::Api {
                adapter: ApiKind::Ebay,
                endpoint: "https://api.ebay.com".to_string(),
                credentials: CredentialShape::new(["client_id", "client_secret"]),
            },
        )
    }

    fn fields(pairs: &[(&str, &str)]) -> CredentialFields {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), Zeroizing::new((*v).to_string())))
            .collect()
    }

    fn resolver(store: InMemoryCredentialStore, env: &[(&str, &str)]) -> CredentialResolver {
        let env: HashMap<String, String> = env
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        CredentialResolver::new(Arc::new(store), &CredentialsConfig::default())
            .with_env_lookup(move |key| env.get(key).cloned())
    }

    fn user() -> UserId {
        UserId::new("user-1").expect("valid user id")
    }

    #[tokio::test]
    async fn test_user_tier_wins() {
        let store = InMemoryCredentialStore::new();
        let source = ebay();
        store.insert_user(
            user(),
            source.id().clone(),
            fields(&[("client_id", "u"), ("client_secret", "us")]),
        );
        store.insert_app(
            source.id().clone(),
            fields(&[("client_id", "a"), ("client_secret", "as")]),
        );
        let resolver = resolver(store, &[]);

        let bundle = resolver
            .resolve(&source, Some(&user()))
            .await
            .expect("resolve user credentials");
        assert_eq!(bundle.scope(), CredentialScope::User);
        assert_eq!(bundle.get("client_id"), Some("u"));

        // Without a user the app tier is used
        let bundle = resolver.resolve(&source, None).await.expect("resolve app");
        assert_eq!(bundle.scope(), CredentialScope::App);
    }

    #[tokio::test]
    async fn test_incomplete_user_bundle_falls_through() {
        let store = InMemoryCredentialStore::new();
        let source = ebay();
        store.insert_user(user(), source.id().clone(), fields(&[("client_id", "u")]));
        store.insert_app(
            source.id().clone(),
            fields(&[("client_id", "a"), ("client_secret", "as")]),
        );

        let bundle = resolver(store, &[])
            .resolve(&source, Some(&user()))
            .await
            .expect("resolve");
        assert_eq!(bundle.scope(), CredentialScope::App);
    }

    #[tokio::test]
    async fn test_env_tier_last() {
        let resolver = resolver(
            InMemoryCredentialStore::new(),
            &[
                ("BAZAAR_EBAY_CLIENT_ID", "e"),
                ("BAZAAR_EBAY_CLIENT_SECRET", "es"),
            ],
        );

        let bundle = resolver
            .resolve(&ebay(), Some(&user()))
            .await
            .expect("resolve env");
        assert_eq!(bundle.scope(), CredentialScope::Env);
        assert_eq!(bundle.get("client_secret"), Some("es"));
    }

    #[tokio::test]
    async fn test_missing_credentials() {
        let resolver = resolver(
            InMemoryCredentialStore::new(),
            &[("BAZAAR_EBAY_CLIENT_ID", "only-half")],
        );

        let err = resolver
            .resolve(&ebay(), None)
            .await
            .expect_err("no complete tier");
        assert_eq!(err.kind(), FailureKind::AuthMissing);
        assert_eq!(
            err,
            CredentialUnavailable::Missing {
                fields: vec!["client_id".to_string(), "client_secret".to_string()],
                env_vars: vec![
                    "BAZAAR_EBAY_CLIENT_ID".to_string(),
                    "BAZAAR_EBAY_CLIENT_SECRET".to_string()
                ],
            }
        );
    }

    #[tokio::test]
    async fn test_public_search_is_anonymous() {
        let source = descriptor(
            "craigslist-sfbay",
            AccessMethod::PublicSearch {
                template: "https://sfbay.craigslist.org/search/sss?query={keywords}".to_string(),
                format: ResponseFormat::Html,
                selectors: Some(HtmlSelectors {
                    item: "li".to_string(),
                    title: ".title".to_string(),
                    price: ".price".to_string(),
                    link: "a".to_string(),
                    id_attr: None,
                    thumbnail: None,
                    condition: None,
                    posted_at: None,
                    no_results: None,
                    blocked: None,
                }),
                fields: None,
                script_selector: None,
            },
        );

        let bundle = resolver(InMemoryCredentialStore::new(), &[])
            .resolve(&source, None)
            .await
            .expect("public search always resolves");
        assert!(bundle.is_anonymous());
    }

    #[tokio::test]
    async fn test_unavailable_never_resolves() {
        let source = descriptor(
            "facebook-marketplace",
            AccessMethod::Unavailable {
                reason: "login required".to_string(),
                url: None,
            },
        );
        let store = InMemoryCredentialStore::new();
        store.insert_app(source.id().clone(), fields(&[("token", "t")]));

        let err = resolver(store, &[])
            .resolve(&source, Some(&user()))
            .await
            .expect_err("unavailable");
        assert_eq!(err.kind(), FailureKind::Unavailable);
    }

    struct BrokenStore;

    #[async_trait]
    impl CredentialStore for BrokenStore {
        async fn user_credential(
            &self,
            _user_id: &UserId,
            _source_id: &SourceId,
        ) -> Result<Option<CredentialFields>> {
            Err(CredentialError::StoreUnavailable("connection refused".to_string()))
        }

        async fn app_credential(&self, _source_id: &SourceId) -> Result<Option<CredentialFields>> {
            Err(CredentialError::StoreUnavailable("connection refused".to_string()))
        }
    }

    #[tokio::test]
    async fn test_store_failure_treated_as_not_found() {
        let resolver = CredentialResolver::new(Arc::new(BrokenStore), &CredentialsConfig::default())
            .with_env_lookup(|key| match key {
                "BAZAAR_EBAY_CLIENT_ID" => Some("e".to_string()),
                "BAZAAR_EBAY_CLIENT_SECRET" => Some("es".to_string()),
                _ => None,
            });

        let bundle = resolver
            .resolve(&ebay(), Some(&user()))
            .await
            .expect("env tier still applies");
        assert_eq!(bundle.scope(), CredentialScope::Env);
    }

    #[tokio::test]
    async fn test_preflight_ignores_user_tier() {
        let store = InMemoryCredentialStore::new();
        let source = ebay();
        store.insert_user(
            user(),
            source.id().clone(),
            fields(&[("client_id", "u"), ("client_secret", "us")]),
        );

        let resolver = resolver(store, &[]);
        assert!(resolver.preflight(&source).await.is_err());
    }

    #[test]
    fn test_env_var_name() {
        let resolver = resolver(InMemoryCredentialStore::new(), &[]);
        let id = SourceId::new("shop-goodwill").expect("valid source id");
        assert_eq!(
            resolver.env_var_name(&id, "api_key"),
            "BAZAAR_SHOP_GOODWILL_API_KEY"
        );
    }
}
