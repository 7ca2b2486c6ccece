//! Source descriptor types and structures.
//!
//! This module defines the data structures for marketplace definitions loaded
//! from TOML files. A descriptor is immutable once loaded.

use crate::error::{RegistryError, Result};
use bazaar_core::SourceId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Complete source descriptor loaded from TOML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    /// Core source metadata
    pub source: SourceMetadata,

    /// How the source is reached
    pub access: AccessMethod,
}

impl SourceDescriptor {
    /// Get the source ID.
    #[must_use]
    pub fn id(&self) -> &SourceId {
        &self.source.id
    }

    /// Get the human-readable name.
    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.source.display_name
    }

    /// Get the source category.
    #[must_use]
    pub fn category(&self) -> SourceCategory {
        self.source.category
    }

    /// Capability class, derived from the access method.
    #[must_use]
    pub fn capability(&self) -> Capability {
        self.access.capability()
    }

    /// Credential fields the source needs, `None` when it needs none.
    #[must_use]
    pub fn credential_shape(&self) -> Option<&CredentialShape> {
        match &self.access {
            AccessMethod::Api { credentials, .. } => Some(credentials),
            _ => None,
        }
    }

    /// Rate limit policy.
    #[must_use]
    pub fn rate_limit(&self) -> &RateLimitPolicy {
        &self.source.rate_limit
    }

    /// Per-call timeout, falling back to `default` when the definition sets none.
    #[must_use]
    pub fn timeout_budget(&self, default: Duration) -> Duration {
        self.source
            .timeout_ms
            .map_or(default, Duration::from_millis)
    }

    /// Currency assumed when a listing does not state one.
    #[must_use]
    pub fn default_currency(&self) -> &str {
        &self.source.currency
    }

    /// Base URL that relative listing links are resolved against.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.source.url
    }

    /// Validate the descriptor for completeness and correctness.
    pub fn validate(&self) -> Result<()> {
        let id = &self.source.id;

        if self.source.display_name.trim().is_empty() {
            return Err(invalid(id, "display_name cannot be empty"));
        }

        if !is_http_url(&self.source.url) {
            return Err(invalid(id, "url must be an absolute http(s) URL"));
        }

        if self.source.domain.is_empty() {
            return Err(invalid(id, "domain cannot be empty"));
        }

        if self.source.currency.len() != 3
            || !self.source.currency.chars().all(|c| c.is_ascii_uppercase())
        {
            return Err(invalid(
                id,
                &format!(
                    "currency must be a 3-letter ISO 4217 code, got '{}'",
                    self.source.currency
                ),
            ));
        }

        if self.source.timeout_ms == Some(0) {
            return Err(invalid(id, "timeout_ms must be greater than 0"));
        }

        self.source.rate_limit.validate(id)?;
        self.access.validate(id)?;

        Ok(())
    }
}

fn invalid(id: &SourceId, reason: &str) -> RegistryError {
    RegistryError::ValidationError {
        source_id: id.to_string(),
        reason: reason.to_string(),
    }
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("https://") || url.starts_with("http://")
}

/// Core source metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceMetadata {
    /// Unique source identifier (e.g., "ebay", "shop-goodwill")
    pub id: SourceId,

    /// Human-readable marketplace name
    pub display_name: String,

    /// Marketplace website, also the base for relative links
    pub url: String,

    /// Marketplace domain (e.g., "ebay.com")
    pub domain: String,

    /// Source category
    #[serde(default)]
    pub category: SourceCategory,

    /// Currency assumed for listings that do not state one
    #[serde(default = "default_currency")]
    pub currency: String,

    /// Per-call timeout in milliseconds; the engine default applies when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,

    /// Outbound rate limit
    #[serde(default)]
    pub rate_limit: RateLimitPolicy,
}

fn default_currency() -> String {
    "USD".to_string()
}

/// Broad marketplace categories.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceCategory {
    /// Everything marketplaces (eBay and friends)
    #[default]
    General,
    /// Computer parts and electronics
    Electronics,
    /// Clothing and accessories
    Fashion,
    /// Collectibles, trading cards, antiques
    Collectibles,
    /// Handmade and vintage goods
    Handmade,
    /// Local classifieds
    Local,
    /// Auctions of donated or surplus goods
    Auction,
}

impl SourceCategory {
    /// Get a human-readable display name.
    #[must_use]
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::General => "General",
            Self::Electronics => "Electronics",
            Self::Fashion => "Fashion",
            Self::Collectibles => "Collectibles",
            Self::Handmade => "Handmade",
            Self::Local => "Local Classifieds",
            Self::Auction => "Auction",
        }
    }
}

/// Capability class of a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Capability {
    /// Official API, usually with credentials
    Api,
    /// Unauthenticated public search page or endpoint
    PublicSearch,
    /// Not automatable (login wall, no API, terms forbid it)
    Unavailable,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Api => "API",
            Self::PublicSearch => "PUBLIC_SEARCH",
            Self::Unavailable => "UNAVAILABLE",
        })
    }
}

/// Outbound rate limit for one source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimitPolicy {
    /// Sustained calls per second (fractional values allowed, e.g. 0.5)
    pub max_per_second: f64,

    /// Calls per UTC day
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_per_day: Option<u32>,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            max_per_second: 1.0,
            max_per_day: None,
        }
    }
}

impl RateLimitPolicy {
    fn validate(&self, id: &SourceId) -> Result<()> {
        if !self.max_per_second.is_finite() || self.max_per_second <= 0.0 {
            return Err(invalid(
                id,
                &format!(
                    "rate_limit.max_per_second must be positive, got {}",
                    self.max_per_second
                ),
            ));
        }
        if self.max_per_day == Some(0) {
            return Err(invalid(id, "rate_limit.max_per_day must be at least 1"));
        }
        Ok(())
    }
}

/// Names of the credential fields a source requires.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CredentialShape(Vec<String>);

impl CredentialShape {
    /// Create a shape from field names.
    #[must_use]
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(fields.into_iter().map(Into::into).collect())
    }

    /// Required field names.
    #[must_use]
    pub fn fields(&self) -> &[String] {
        &self.0
    }

    /// Whether the shape requires nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Which built-in API adapter drives an `Api` source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ApiKind {
    /// eBay Browse API (OAuth2 client credentials)
    Ebay,
    /// Etsy Open API v3 (API key header)
    Etsy,
}

/// Methods for reaching a source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "kebab-case")]
pub enum AccessMethod {
    /// Official API
    Api {
        /// Adapter implementation
        adapter: ApiKind,
        /// API base URL
        endpoint: String,
        /// Required credential fields
        #[serde(default)]
        credentials: CredentialShape,
    },

    /// Unauthenticated public search page
    PublicSearch {
        /// URL template with `{keywords}` and optional filter placeholders
        template: String,
        /// Shape of the response body
        format: ResponseFormat,
        /// CSS selectors, required for `html`
        #[serde(default, skip_serializing_if = "Option::is_none")]
        selectors: Option<HtmlSelectors>,
        /// Field map, required for `json` and `embedded-json`
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fields: Option<JsonFieldMap>,
        /// Selector of the `<script>` element carrying the JSON, required for `embedded-json`
        #[serde(default, skip_serializing_if = "Option::is_none")]
        script_selector: Option<String>,
    },

    /// Cannot be automated
    Unavailable {
        /// Why the source is not automatable
        reason: String,
        /// Where a human can search instead
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
    },
}

impl AccessMethod {
    /// Capability class of this access method.
    #[must_use]
    pub fn capability(&self) -> Capability {
        match self {
            Self::Api { .. } => Capability::Api,
            Self::PublicSearch { .. } => Capability::PublicSearch,
            Self::Unavailable { .. } => Capability::Unavailable,
        }
    }

    fn validate(&self, id: &SourceId) -> Result<()> {
        match self {
            Self::Api {
                endpoint,
                credentials,
                ..
            } => {
                if !is_http_url(endpoint) {
                    return Err(invalid(id, "api endpoint must be an absolute http(s) URL"));
                }
                if credentials.fields().iter().any(|f| f.trim().is_empty()) {
                    return Err(invalid(id, "credential field names cannot be blank"));
                }
            }
            Self::PublicSearch {
                template,
                format,
                selectors,
                fields,
                script_selector,
            } => {
                if !is_http_url(template) {
                    return Err(invalid(
                        id,
                        "search template must be an absolute http(s) URL",
                    ));
                }
                if !template.contains("{keywords}") {
                    return Err(invalid(
                        id,
                        "search template must contain a {keywords} placeholder",
                    ));
                }
                match format {
                    ResponseFormat::Html => {
                        let Some(selectors) = selectors else {
                            return Err(invalid(id, "html format requires [access.selectors]"));
                        };
                        selectors.validate(id)?;
                    }
                    ResponseFormat::Json | ResponseFormat::EmbeddedJson => {
                        let Some(fields) = fields else {
                            return Err(invalid(id, "json formats require [access.fields]"));
                        };
                        fields.validate(id)?;
                        if *format == ResponseFormat::EmbeddedJson
                            && script_selector.as_deref().map_or(true, str::is_empty)
                        {
                            return Err(invalid(id, "embedded-json requires script_selector"));
                        }
                    }
                }
            }
            Self::Unavailable { reason, .. } => {
                if reason.trim().is_empty() {
                    return Err(invalid(id, "unavailable sources must state a reason"));
                }
            }
        }
        Ok(())
    }
}

/// Body format of a public search response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResponseFormat {
    /// HTML result page parsed with CSS selectors
    Html,
    /// JSON document
    Json,
    /// JSON embedded in an HTML `<script>` element
    EmbeddedJson,
}

/// CSS selectors for extracting listings from an HTML result page.
///
/// Field selectors are evaluated relative to each `item` element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HtmlSelectors {
    /// Selector matching one listing
    pub item: String,

    /// Element holding the title text
    pub title: String,

    /// Element holding the price text
    pub price: String,

    /// Link to the listing (its `href` is used)
    pub link: String,

    /// Attribute on the item element carrying the listing ID; the link is used when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_attr: Option<String>,

    /// Image element (its `src` is used)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,

    /// Element holding the condition label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,

    /// Element whose `datetime` attribute (or text) holds the posting time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub posted_at: Option<String>,

    /// Present when the page says there are no matches
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub no_results: Option<String>,

    /// Present when the page is a block or challenge page instead of results
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocked: Option<String>,
}

impl HtmlSelectors {
    fn validate(&self, id: &SourceId) -> Result<()> {
        for (name, value) in [
            ("item", &self.item),
            ("title", &self.title),
            ("price", &self.price),
            ("link", &self.link),
        ] {
            if value.trim().is_empty() {
                return Err(invalid(id, &format!("selectors.{name} cannot be empty")));
            }
        }
        Ok(())
    }
}

/// JSON pointers (RFC 6901) locating listing fields in a JSON document.
///
/// `items` points at the array of listings; every other pointer is evaluated
/// relative to one element of that array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonFieldMap {
    /// Pointer to the array of listings (empty string for a top-level array)
    pub items: String,

    /// Listing ID
    pub id: String,

    /// Title
    pub title: String,

    /// Price, either a number or a display string
    pub price: String,

    /// Listing URL or path
    pub url: String,

    /// Currency code
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,

    /// Thumbnail URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,

    /// Condition label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,

    /// Posting time (RFC 3339 or Unix seconds)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub posted_at: Option<String>,

    /// Prices are integers in minor units (e.g. cents) divided by this value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_divisor: Option<u32>,
}

impl JsonFieldMap {
    fn validate(&self, id: &SourceId) -> Result<()> {
        if !self.items.is_empty() && !self.items.starts_with('/') {
            return Err(invalid(id, "fields.items must be a JSON pointer"));
        }

        let pointers = [
            Some(&self.id),
            Some(&self.title),
            Some(&self.price),
            Some(&self.url),
            self.currency.as_ref(),
            self.thumbnail.as_ref(),
            self.condition.as_ref(),
            self.posted_at.as_ref(),
        ];
        if pointers.into_iter().flatten().any(|p| !p.starts_with('/')) {
            return Err(invalid(
                id,
                "field pointers must start with '/' (RFC 6901 JSON pointer)",
            ));
        }

        if self.price_divisor == Some(0) {
            return Err(invalid(id, "fields.price_divisor must be at least 1"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(id: &str) -> SourceMetadata {
        SourceMetadata {
            id: SourceId::new(id).expect("valid source ID"),
            display_name: "Test Market".to_string(),
            url: "https://market.test".to_string(),
            domain: "market.test".to_string(),
            category: SourceCategory::General,
            currency: "USD".to_string(),
            timeout_ms: None,
            rate_limit: RateLimitPolicy::default(),
        }
    }

    fn html_access() -> AccessMethod {
        AccessMethod::PublicSearch {
            template: "https://market.test/search?q={keywords}".to_string(),
            format: ResponseFormat::Html,
            selectors: Some(HtmlSelectors {
                item: ".result".to_string(),
                title: ".title".to_string(),
                price: ".price".to_string(),
                link: "a".to_string(),
                id_attr: Some("data-pid".to_string()),
                thumbnail: None,
                condition: None,
                posted_at: None,
                no_results: None,
                blocked: None,
            }),
            fields: None,
            script_selector: None,
        }
    }

    #[test]
    fn test_capability_follows_access_method() {
        let descriptor = SourceDescriptor {
            source: metadata("test-market"),
            access: html_access(),
        };
        assert_eq!(descriptor.capability(), Capability::PublicSearch);
        assert!(descriptor.credential_shape().is_none());

        let descriptor = SourceDescriptor {
            source: metadata("test-api"),
            access: AccessMethod::Api {
                adapter: ApiKind::Ebay,
                endpoint: "https://api.market.test".to_string(),
                credentials: CredentialShape::new(["client_id", "client_secret"]),
            },
        };
        assert_eq!(descriptor.capability(), Capability::Api);
        assert_eq!(
            descriptor.credential_shape().map(CredentialShape::fields),
            Some(&["client_id".to_string(), "client_secret".to_string()][..])
        );
    }

    #[test]
    fn test_capability_serialization() {
        let json = serde_json::to_string(&Capability::PublicSearch).expect("serialize");
        assert_eq!(json, "\"PUBLIC_SEARCH\"");
        assert_eq!(Capability::Unavailable.to_string(), "UNAVAILABLE");
    }

    #[test]
    fn test_timeout_budget_default() {
        let mut descriptor = SourceDescriptor {
            source: metadata("test-market"),
            access: html_access(),
        };
        let default = Duration::from_secs(10);
        assert_eq!(descriptor.timeout_budget(default), default);

        descriptor.source.timeout_ms = Some(2500);
        assert_eq!(
            descriptor.timeout_budget(default),
            Duration::from_millis(2500)
        );
    }

    #[test]
    fn test_descriptor_validation() {
        let descriptor = SourceDescriptor {
            source: metadata("test-market"),
            access: html_access(),
        };
        assert!(descriptor.validate().is_ok());

        let mut invalid_def = descriptor.clone();
        invalid_def.source.display_name = String::new();
        assert!(invalid_def.validate().is_err());

        let mut invalid_def = descriptor.clone();
        invalid_def.source.currency = "usd".to_string();
        assert!(invalid_def.validate().is_err());

        let mut invalid_def = descriptor.clone();
        invalid_def.source.rate_limit.max_per_second = 0.0;
        assert!(invalid_def.validate().is_err());

        let mut invalid_def = descriptor;
        invalid_def.source.url = "market.test".to_string();
        assert!(invalid_def.validate().is_err());
    }

    #[test]
    fn test_public_search_validation() {
        let id = SourceId::new("test-market").expect("valid source ID");

        // Template without keywords placeholder
        let AccessMethod::PublicSearch {
            format,
            selectors,
            fields,
            script_selector,
            ..
        } = html_access()
        else {
            unreachable!()
        };
        let method = AccessMethod::PublicSearch {
            template: "https://market.test/search".to_string(),
            format,
            selectors: selectors.clone(),
            fields: fields.clone(),
            script_selector: script_selector.clone(),
        };
        assert!(method.validate(&id).is_err());

        // Html without selectors
        let method = AccessMethod::PublicSearch {
            template: "https://market.test/search?q={keywords}".to_string(),
            format: ResponseFormat::Html,
            selectors: None,
            fields: None,
            script_selector: None,
        };
        assert!(method.validate(&id).is_err());

        // Embedded json without script selector
        let method = AccessMethod::PublicSearch {
            template: "https://market.test/search?q={keywords}".to_string(),
            format: ResponseFormat::EmbeddedJson,
            selectors: None,
            fields: Some(JsonFieldMap {
                items: "/props/items".to_string(),
                id: "/id".to_string(),
                title: "/name".to_string(),
                price: "/price".to_string(),
                url: "/url".to_string(),
                currency: None,
                thumbnail: None,
                condition: None,
                posted_at: None,
                price_divisor: None,
            }),
            script_selector: None,
        };
        assert!(method.validate(&id).is_err());
    }

    #[test]
    fn test_json_field_map_requires_pointers() {
        let id = SourceId::new("test-market").expect("valid source ID");
        let mut fields = JsonFieldMap {
            items: "/items".to_string(),
            id: "/id".to_string(),
            title: "/title".to_string(),
            price: "/price".to_string(),
            url: "/url".to_string(),
            currency: None,
            thumbnail: None,
            condition: None,
            posted_at: None,
            price_divisor: Some(100),
        };
        assert!(fields.validate(&id).is_ok());

        fields.title = "title".to_string();
        assert!(fields.validate(&id).is_err());

        fields.title = "/title".to_string();
        fields.price_divisor = Some(0);
        assert!(fields.validate(&id).is_err());
    }

    #[test]
    fn test_unavailable_requires_reason() {
        let id = SourceId::new("test-market").expect("valid source ID");
        let method = AccessMethod::Unavailable {
            reason: "   ".to_string(),
            url: None,
        };
        assert!(method.validate(&id).is_err());
    }

    #[test]
    fn test_parse_toml_definition() {
        let toml_str = r#"
[source]
id = "shop-goodwill"
display_name = "ShopGoodwill"
url = "https://shopgoodwill.com"
domain = "shopgoodwill.com"
category = "auction"
timeout_ms = 8000

[source.rate_limit]
max_per_second = 0.5
max_per_day = 2000

[access]
method = "api"
adapter = "etsy"
endpoint = "https://openapi.etsy.com/v3"
credentials = ["api_key"]
"#;
        let descriptor: SourceDescriptor = toml::from_str(toml_str).expect("parse definition");
        assert_eq!(descriptor.id().as_str(), "shop-goodwill");
        assert_eq!(descriptor.category(), SourceCategory::Auction);
        assert_eq!(descriptor.default_currency(), "USD");
        assert_eq!(descriptor.rate_limit().max_per_day, Some(2000));
        assert!(descriptor.validate().is_ok());
    }
}
