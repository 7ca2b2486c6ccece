//! Public search adapter for HTML result pages.

use crate::adapter::{AdapterResult, RawListing, RawPrice, SourceAdapter, TimeoutBudget};
use crate::error::{AdapterError, Result, SourceFailure};
use crate::http::{read_text, send, AuthMode};
use crate::template::build_search_url;
use async_trait::async_trait;
use bazaar_core::{NormalizedQuery, SourceId};
use bazaar_credentials::CredentialBundle;
use bazaar_source::HtmlSelectors;
use reqwest::header::ACCEPT;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

/// Adapter that fetches a search page and extracts listings with CSS selectors.
pub struct HtmlSearchAdapter {
    source_id: SourceId,
    domain: String,
    template: String,
    client: Client,
    selectors: CompiledSelectors,
}

struct CompiledSelectors {
    item: Selector,
    title: Selector,
    price: Selector,
    link: Selector,
    id_attr: Option<String>,
    thumbnail: Option<Selector>,
    condition: Option<Selector>,
    posted_at: Option<Selector>,
    no_results: Option<Selector>,
    blocked: Option<Selector>,
}

impl HtmlSearchAdapter {
    /// Create the adapter, compiling every selector up front.
    ///
    /// # Errors
    /// Returns error if any selector does not parse.
    pub fn new(
        source_id: SourceId,
        domain: impl Into<String>,
        template: impl Into<String>,
        selectors: &HtmlSelectors,
        client: Client,
    ) -> Result<Self> {
        let compile = |field: &str, css: &str| -> Result<Selector> {
            Selector::parse(css).map_err(|e| AdapterError::InvalidSelector {
                source_id: source_id.to_string(),
                field: field.to_string(),
                reason: e.to_string(),
            })
        };
        let compile_opt = |field: &str, css: Option<&String>| -> Result<Option<Selector>> {
            css.map(|css| compile(field, css)).transpose()
        };

        let selectors = CompiledSelectors {
            item: compile("item", &selectors.item)?,
            title: compile("title", &selectors.title)?,
            price: compile("price", &selectors.price)?,
            link: compile("link", &selectors.link)?,
            id_attr: selectors.id_attr.clone(),
            thumbnail: compile_opt("thumbnail", selectors.thumbnail.as_ref())?,
            condition: compile_opt("condition", selectors.condition.as_ref())?,
            posted_at: compile_opt("posted_at", selectors.posted_at.as_ref())?,
            no_results: compile_opt("no_results", selectors.no_results.as_ref())?,
            blocked: compile_opt("blocked", selectors.blocked.as_ref())?,
        };

        Ok(Self {
            source_id,
            domain: domain.into(),
            template: template.into(),
            client,
            selectors,
        })
    }

    /// Extract at most `max_results` listings from a result page.
    pub fn parse(&self, body: &str, max_results: usize) -> AdapterResult {
        let document = Html::parse_document(body);

        if let Some(blocked) = &self.selectors.blocked {
            if document.select(blocked).next().is_some() {
                return Err(SourceFailure::upstream(format!(
                    "{} served a block page instead of results",
                    self.domain
                )));
            }
        }

        let listings: Vec<RawListing> = document
            .select(&self.selectors.item)
            .take(max_results)
            .map(|item| self.extract(item))
            .collect();

        if listings.is_empty() {
            if let Some(no_results) = &self.selectors.no_results {
                if document.select(no_results).next().is_none() {
                    return Err(SourceFailure::parse(
                        "page has neither listings nor an empty-results marker, selectors may be outdated",
                    ));
                }
            }
        }

        Ok(listings)
    }

    fn extract(&self, item: ElementRef<'_>) -> RawListing {
        let s = &self.selectors;
        let link = item
            .select(&s.link)
            .next()
            .and_then(|el| el.value().attr("href"))
            .map(str::to_string);

        let external_id = s
            .id_attr
            .as_deref()
            .and_then(|attr| item.value().attr(attr))
            .map(str::to_string)
            .or_else(|| link.clone());

        let thumbnail_url = s.thumbnail.as_ref().and_then(|sel| {
            item.select(sel).next().and_then(|el| {
                el.value()
                    .attr("src")
                    .or_else(|| el.value().attr("data-src"))
                    .map(str::to_string)
            })
        });

        let posted_at = s.posted_at.as_ref().and_then(|sel| {
            item.select(sel).next().map(|el| {
                el.value()
                    .attr("datetime")
                    .map_or_else(|| element_text(el), str::to_string)
            })
        });

        RawListing {
            external_id,
            title: first_text(item, &s.title),
            price: first_text(item, &s.price).map(RawPrice::Text),
            currency: None,
            url: link,
            thumbnail_url,
            condition: s.condition.as_ref().and_then(|sel| first_text(item, sel)),
            posted_at,
        }
    }
}

fn first_text(item: ElementRef<'_>, selector: &Selector) -> Option<String> {
    item.select(selector).next().map(element_text)
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

#[async_trait]
impl SourceAdapter for HtmlSearchAdapter {
    async fn execute(
        &self,
        query: &NormalizedQuery,
        _credentials: &CredentialBundle,
        budget: &TimeoutBudget,
    ) -> AdapterResult {
        let url = build_search_url(&self.template, query)?;
        debug!(source_id = %self.source_id, url = %url, "fetching public search page");

        let request = self.client.get(url).header(ACCEPT, "text/html");
        let response = send(request, budget, AuthMode::Anonymous).await?;
        let body = read_text(response, budget).await?;

        self.parse(&body, query.max_results)
    }

    fn source_id(&self) -> &SourceId {
        &self.source_id
    }
}
