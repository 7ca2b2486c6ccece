//! Etsy Open API v3 adapter.

use crate::adapter::{AdapterResult, RawListing, RawPrice, SourceAdapter, TimeoutBudget};
use crate::error::SourceFailure;
use crate::http::{read_text, send, AuthMode};
use async_trait::async_trait;
use bazaar_core::{FailureKind, NormalizedQuery, SourceId};
use bazaar_credentials::CredentialBundle;
use reqwest::header::ACCEPT;
use reqwest::Client;
use serde::Deserialize;

const SEARCH_PATH: &str = "/application/listings/active";
const MAX_LIMIT: usize = 100;

/// Etsy active-listings search, authenticated with an app key.
pub struct EtsyAdapter {
    source_id: SourceId,
    endpoint: String,
    client: Client,
}

impl EtsyAdapter {
    /// Create an adapter for the API rooted at `endpoint`.
    #[must_use]
    pub fn new(source_id: SourceId, endpoint: impl Into<String>, client: Client) -> Self {
        Self {
            source_id,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            client,
        }
    }

    fn search_params(query: &NormalizedQuery) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("keywords", query.keywords.clone()),
            ("limit", query.max_results.min(MAX_LIMIT).to_string()),
        ];
        if let Some(min) = query.filters.price_min {
            params.push(("min_price", min.to_string()));
        }
        if let Some(max) = query.filters.price_max {
            params.push(("max_price", max.to_string()));
        }
        params
    }

    /// Convert a listings response body to raw listings.
    pub fn parse(body: &str, max_results: usize) -> AdapterResult {
        let response: ListingsResponse = serde_json::from_str(body)
            .map_err(|e| SourceFailure::parse(format!("malformed listings response: {e}")))?;

        Ok(response
            .results
            .into_iter()
            .take(max_results)
            .map(|listing| {
                let (price, currency) = match listing.price {
                    Some(money) => (
                        Some(RawPrice::Minor {
                            amount: money.amount,
                            divisor: money.divisor,
                        }),
                        money.currency_code,
                    ),
                    None => (None, None),
                };

                RawListing {
                    external_id: Some(listing.listing_id.to_string()),
                    title: listing.title,
                    price,
                    currency,
                    url: listing.url,
                    thumbnail_url: None,
                    condition: None,
                    posted_at: listing.created_timestamp.map(|ts| ts.to_string()),
                }
            })
            .collect())
    }
}

#[async_trait]
impl SourceAdapter for EtsyAdapter {
    async fn execute(
        &self,
        query: &NormalizedQuery,
        credentials: &CredentialBundle,
        budget: &TimeoutBudget,
    ) -> AdapterResult {
        let api_key = credentials.get("api_key").ok_or_else(|| {
            SourceFailure::new(FailureKind::AuthMissing, "api_key is required")
        })?;

        let request = self
            .client
            .get(format!("{}{SEARCH_PATH}", self.endpoint))
            .query(&Self::search_params(query))
            .header("x-api-key", api_key)
            .header(ACCEPT, "application/json");

        let response = send(request, budget, AuthMode::Authenticated).await?;
        let body = read_text(response, budget).await?;

        Self::parse(&body, query.max_results)
    }

    fn source_id(&self) -> &SourceId {
        &self.source_id
    }
}

// Etsy API types

#[derive(Debug, Deserialize)]
struct ListingsResponse {
    #[serde(default)]
    results: Vec<Listing>,
}

#[derive(Debug, Deserialize)]
struct Listing {
    listing_id: u64,
    title: Option<String>,
    price: Option<Money>,
    url: Option<String>,
    created_timestamp: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct Money {
    amount: i64,
    divisor: u32,
    currency_code: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use bazaar_core::{SearchFilters, SearchRequest};

    #[test]
    fn test_search_params_include_price_bounds() {
        let filters = SearchFilters {
            price_min: Some("5".parse().expect("decimal")),
            price_max: Some("40.5".parse().expect("decimal")),
            ..SearchFilters::default()
        };
        let request = SearchRequest::new("ceramic mug", []).with_filters(filters);
        let query = NormalizedQuery::from_request(&request, 25);

        let params = EtsyAdapter::search_params(&query);
        assert_eq!(
            params,
            vec![
                ("keywords", "ceramic mug".to_string()),
                ("limit", "25".to_string()),
                ("min_price", "5".to_string()),
                ("max_price", "40.5".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_listings() {
        let body = r#"{
            "count": 1,
            "results": [{
                "listing_id": 1488023311,
                "title": "Handmade ceramic mug",
                "price": {"amount": 3200, "divisor": 100, "currency_code": "USD"},
                "url": "https://www.etsy.com/listing/1488023311",
                "created_timestamp": 1759300000
            }]
        }"#;

        let listings = EtsyAdapter::parse(body, 10).expect("parse");
        assert_eq!(listings.len(), 1);
        assert_eq!(listings[0].external_id.as_deref(), Some("1488023311"));
        assert_eq!(
            listings[0].price,
            Some(RawPrice::Minor {
                amount: 3200,
                divisor: 100
            })
        );
        assert_eq!(listings[0].currency.as_deref(), Some("USD"));
        assert_eq!(listings[0].posted_at.as_deref(), Some("1759300000"));
    }

    #[test]
    fn test_parse_malformed() {
        let failure = EtsyAdapter::parse(r#"{"results": "nope"}"#, 10).expect_err("bad shape");
        assert_eq!(failure.kind, FailureKind::ParseError);
    }
}
