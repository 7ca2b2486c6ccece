//! eBay Browse API adapter.

use crate::adapter::{AdapterResult, RawListing, RawPrice, SourceAdapter, TimeoutBudget};
use crate::error::SourceFailure;
use crate::http::{read_text, send, AuthMode};
use async_trait::async_trait;
use bazaar_core::{FailureKind, ItemCondition, NormalizedQuery, SearchFilters, SourceId};
use bazaar_credentials::CredentialBundle;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

const TOKEN_PATH: &str = "/identity/v1/oauth2/token";
const SEARCH_PATH: &str = "/buy/browse/v1/item_summary/search";
const TOKEN_REQUEST_BODY: &str =
    "grant_type=client_credentials&scope=https%3A%2F%2Fapi.ebay.com%2Foauth%2Fapi_scope";
const MARKETPLACE: &str = "EBAY_US";
/// Browse API page size ceiling.
const MAX_LIMIT: usize = 200;

/// eBay Browse API adapter.
///
/// Uses the client-credentials grant: every call exchanges the app's
/// `client_id`/`client_secret` for an access token, then searches with it.
pub struct EbayAdapter {
    source_id: SourceId,
    endpoint: String,
    currency: String,
    client: Client,
}

impl EbayAdapter {
    /// Create an adapter for the API rooted at `endpoint`.
    #[must_use]
    pub fn new(
        source_id: SourceId,
        endpoint: impl Into<String>,
        currency: impl Into<String>,
        client: Client,
    ) -> Self {
        Self {
            source_id,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            currency: currency.into(),
            client,
        }
    }

    async fn access_token(
        &self,
        credentials: &CredentialBundle,
        budget: &TimeoutBudget,
    ) -> Result<String, SourceFailure> {
        let (Some(client_id), Some(client_secret)) =
            (credentials.get("client_id"), credentials.get("client_secret"))
        else {
            return Err(SourceFailure::new(
                FailureKind::AuthMissing,
                "client_id and client_secret are required",
            ));
        };

        let request = self
            .client
            .post(format!("{}{TOKEN_PATH}", self.endpoint))
            .basic_auth(client_id, Some(client_secret))
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(TOKEN_REQUEST_BODY);

        let response = send(request, budget, AuthMode::Authenticated).await?;
        let body = read_text(response, budget).await?;
        let token: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| SourceFailure::parse(format!("malformed token response: {e}")))?;

        Ok(token.access_token)
    }

    /// Query parameters for the search call.
    fn search_params(&self, query: &NormalizedQuery) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("q", query.keywords.clone()),
            ("limit", query.max_results.min(MAX_LIMIT).to_string()),
        ];
        if let Some(filter) = self.filter_expression(&query.filters) {
            params.push(("filter", filter));
        }
        params
    }

    /// Browse API `filter` expression, if any filter applies.
    fn filter_expression(&self, filters: &SearchFilters) -> Option<String> {
        let mut parts = Vec::new();

        if filters.price_min.is_some() || filters.price_max.is_some() {
            let bound = |p: Option<rust_decimal::Decimal>| p.map(|p| p.to_string()).unwrap_or_default();
            parts.push(format!(
                "price:[{}..{}]",
                bound(filters.price_min),
                bound(filters.price_max)
            ));
            parts.push(format!("priceCurrency:{}", self.currency));
        }

        if let Some(condition) = filters.condition {
            let value = match condition {
                ItemCondition::New => "NEW",
                ItemCondition::LikeNew
                | ItemCondition::Used
                | ItemCondition::Refurbished
                | ItemCondition::ForParts => "USED",
            };
            parts.push(format!("conditions:{{{value}}}"));
        }

        if parts.is_empty() {
            None
        } else {
            Some(parts.join(","))
        }
    }

    /// Convert a search response body to raw listings.
    pub fn parse(body: &str, max_results: usize) -> AdapterResult {
        let response: SearchResponse = serde_json::from_str(body)
            .map_err(|e| SourceFailure::parse(format!("malformed search response: {e}")))?;

        Ok(response
            .item_summaries
            .unwrap_or_default()
            .into_iter()
            .take(max_results)
            .map(|item| RawListing {
                external_id: item.item_id,
                title: item.title,
                price: item.price.as_ref().and_then(|p| p.value.clone()).map(RawPrice::Text),
                currency: item.price.and_then(|p| p.currency),
                url: item.item_web_url,
                thumbnail_url: item.image.and_then(|i| i.image_url),
                condition: item.condition,
                posted_at: item.item_creation_date,
            })
            .collect())
    }
}

#[async_trait]
impl SourceAdapter for EbayAdapter {
    async fn execute(
        &self,
        query: &NormalizedQuery,
        credentials: &CredentialBundle,
        budget: &TimeoutBudget,
    ) -> AdapterResult {
        let token = self.access_token(credentials, budget).await?;
        debug!(source_id = %self.source_id, "obtained access token");

        let request = self
            .client
            .get(format!("{}{SEARCH_PATH}", self.endpoint))
            .query(&self.search_params(query))
            .bearer_auth(token)
            .header("X-EBAY-C-MARKETPLACE-ID", MARKETPLACE)
            .header(ACCEPT, "application/json");

        let response = send(request, budget, AuthMode::Authenticated).await?;
        let body = read_text(response, budget).await?;

        Self::parse(&body, query.max_results)
    }

    fn source_id(&self) -> &SourceId {
        &self.source_id
    }
}

// eBay API types

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponse {
    item_summaries: Option<Vec<ItemSummary>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ItemSummary {
    item_id: Option<String>,
    title: Option<String>,
    price: Option<Amount>,
    item_web_url: Option<String>,
    image: Option<Image>,
    condition: Option<String>,
    item_creation_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Amount {
    value: Option<String>,
    currency: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Image {
    image_url: Option<String>,
}
