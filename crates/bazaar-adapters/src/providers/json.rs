//! Public search adapter for JSON responses, plain or embedded in a page.

use crate::adapter::{AdapterResult, RawListing, RawPrice, SourceAdapter, TimeoutBudget};
use crate::error::{AdapterError, Result, SourceFailure};
use crate::http::{read_text, send, AuthMode};
use crate::template::build_search_url;
use async_trait::async_trait;
use bazaar_core::{NormalizedQuery, SourceId};
use bazaar_credentials::CredentialBundle;
use bazaar_source::JsonFieldMap;
use reqwest::header::ACCEPT;
use reqwest::Client;
use scraper::{Html, Selector};
use serde_json::Value;
use tracing::debug;

/// Where the JSON document lives in the response.
enum Envelope {
    /// The body is the document
    Body,
    /// The document is the text of the first element matching the selector
    Script(Selector),
}

/// Adapter that maps a JSON document to listings with JSON pointers.
pub struct JsonSearchAdapter {
    source_id: SourceId,
    template: String,
    client: Client,
    fields: JsonFieldMap,
    envelope: Envelope,
}

impl JsonSearchAdapter {
    /// Adapter for a JSON endpoint.
    #[must_use]
    pub fn json(
        source_id: SourceId,
        template: impl Into<String>,
        fields: JsonFieldMap,
        client: Client,
    ) -> Self {
        Self {
            source_id,
            template: template.into(),
            client,
            fields,
            envelope: Envelope::Body,
        }
    }

    /// Adapter for a page that embeds its JSON in a `<script>` element.
    ///
    /// # Errors
    /// Returns error if the script selector does not parse.
    pub fn embedded(
        source_id: SourceId,
        template: impl Into<String>,
        script_selector: &str,
        fields: JsonFieldMap,
        client: Client,
    ) -> Result<Self> {
        let selector =
            Selector::parse(script_selector).map_err(|e| AdapterError::InvalidSelector {
                source_id: source_id.to_string(),
                field: "script_selector".to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            source_id,
            template: template.into(),
            client,
            fields,
            envelope: Envelope::Script(selector),
        })
    }

    /// Extract at most `max_results` listings from a response body.
    pub fn parse(&self, body: &str, max_results: usize) -> AdapterResult {
        let document = match &self.envelope {
            Envelope::Body => body.to_string(),
            Envelope::Script(selector) => {
                let page = Html::parse_document(body);
                let script = page.select(selector).next().ok_or_else(|| {
                    SourceFailure::parse("embedded data element not found in page")
                })?;
                script.text().collect::<String>()
            }
        };

        let value: Value = serde_json::from_str(&document)
            .map_err(|e| SourceFailure::parse(format!("malformed JSON: {e}")))?;

        let items = value
            .pointer(&self.fields.items)
            .ok_or_else(|| {
                SourceFailure::parse(format!("no value at {}", pointer_label(&self.fields.items)))
            })?
            .as_array()
            .ok_or_else(|| {
                SourceFailure::parse(format!(
                    "value at {} is not an array",
                    pointer_label(&self.fields.items)
                ))
            })?;

        Ok(items
            .iter()
            .take(max_results)
            .map(|item| self.extract(item))
            .collect())
    }

    fn extract(&self, item: &Value) -> RawListing {
        let f = &self.fields;
        let text_at = |pointer: &str| item.pointer(pointer).and_then(scalar_text);
        let opt_text_at = |pointer: &Option<String>| pointer.as_deref().and_then(text_at);

        let price = item.pointer(&f.price).and_then(|value| match f.price_divisor {
            Some(divisor) => value
                .as_i64()
                .map(|amount| RawPrice::Minor { amount, divisor })
                .or_else(|| scalar_text(value).map(RawPrice::Text)),
            None => scalar_text(value).map(RawPrice::Text),
        });

        RawListing {
            external_id: text_at(&f.id),
            title: text_at(&f.title),
            price,
            currency: opt_text_at(&f.currency),
            url: text_at(&f.url),
            thumbnail_url: opt_text_at(&f.thumbnail),
            condition: opt_text_at(&f.condition),
            posted_at: opt_text_at(&f.posted_at),
        }
    }
}

/// Strings as-is, numbers in their JSON spelling, anything else absent.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn pointer_label(pointer: &str) -> &str {
    if pointer.is_empty() {
        "document root"
    } else {
        pointer
    }
}

#[async_trait]
impl SourceAdapter for JsonSearchAdapter {
    async fn execute(
        &self,
        query: &NormalizedQuery,
        _credentials: &CredentialBundle,
        budget: &TimeoutBudget,
    ) -> AdapterResult {
        let url = build_search_url(&self.template, query)?;
        debug!(source_id = %self.source_id, url = %url, "fetching public search data");

        let accept = match self.envelope {
            Envelope::Body => "application/json",
            Envelope::Script(_) => "text/html",
        };
        let request = self.client.get(url).header(ACCEPT, accept);
        let response = send(request, budget, AuthMode::Anonymous).await?;
        let body = read_text(response, budget).await?;

        self.parse(&body, query.max_results)
    }

    fn source_id(&self) -> &SourceId {
        &self.source_id
    }
}
