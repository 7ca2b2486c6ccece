//! Search aggregator: validates a request, fans it out to every selected
//! source under bounded concurrency, and assembles one response.
//!
//! Source calls are driven inside the request's own future set, never spawned,
//! so dropping the search future drops every outbound call with it.

use crate::error::Result;
use crate::governor::RateGovernor;
use crate::intelligence::MarketIntelligence;
use crate::normalizer::normalize_batch;
use crate::outcome::{AggregateSearchResponse, SourceOutcome};
use crate::request::validate;
use bazaar_adapters::{AdapterSet, SourceAdapter, SourceFailure, TimeoutBudget};
use bazaar_core::{
    AppConfig, FailureKind, IntelligenceConfig, NormalizedQuery, RequestId, SearchConfig,
    SearchRequest, SearchResult, SortOrder, SourceId,
};
use bazaar_credentials::{CredentialBundle, CredentialResolver};
use bazaar_source::{Capability, SourceDescriptor, SourceRegistry};
use futures::future::join_all;
use futures::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

/// A source that passed credential resolution and is ready to call.
struct Dispatch<'a> {
    descriptor: &'a SourceDescriptor,
    adapter: Arc<dyn SourceAdapter>,
    credentials: CredentialBundle,
}

/// One registry entry as offered to callers choosing sources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceSummary {
    /// Source ID
    pub id: SourceId,
    /// Human-readable name
    pub display_name: String,
    /// Capability class
    pub capability: Capability,
    /// Whether a search can use it right now without user credentials
    pub selectable: bool,
    /// Why it cannot, when it cannot
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Fans one request out to many marketplaces.
///
/// Cheap to share behind an `Arc`; all per-request state lives in the
/// search future.
pub struct SearchAggregator {
    registry: SourceRegistry,
    resolver: CredentialResolver,
    adapters: AdapterSet,
    governor: Arc<RateGovernor>,
    search: SearchConfig,
    intelligence: IntelligenceConfig,
}

impl SearchAggregator {
    /// Create an aggregator over a registry, credential resolver and adapters.
    #[must_use]
    pub fn new(
        registry: SourceRegistry,
        resolver: CredentialResolver,
        adapters: AdapterSet,
        config: &AppConfig,
    ) -> Self {
        Self {
            registry,
            resolver,
            adapters,
            governor: Arc::new(RateGovernor::new(&config.governor)),
            search: config.search.clone(),
            intelligence: config.intelligence.clone(),
        }
    }

    /// The source registry.
    #[must_use]
    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    /// Run a search.
    ///
    /// # Errors
    /// Returns `RequestInvalid` when the request fails validation; no source
    /// is contacted in that case. Source failures never fail the search.
    pub async fn search(&self, request: SearchRequest) -> Result<AggregateSearchResponse> {
        self.search_with_cancel(request, CancellationToken::new())
            .await
    }

    /// Run a search that stops when `cancel` fires.
    ///
    /// Sources still pending at cancellation are recorded as `Timeout` with
    /// detail "request cancelled".
    ///
    /// # Errors
    /// Returns `RequestInvalid` when the request fails validation.
    pub async fn search_with_cancel(
        &self,
        request: SearchRequest,
        cancel: CancellationToken,
    ) -> Result<AggregateSearchResponse> {
        let request_id = RequestId::generate();
        let span = info_span!("search", request_id = %request_id);
        self.run(request_id, request, cancel).instrument(span).await
    }

    async fn run(
        &self,
        request_id: RequestId,
        request: SearchRequest,
        cancel: CancellationToken,
    ) -> Result<AggregateSearchResponse> {
        let started = Instant::now();

        debug!(sources = request.sources.len(), "validating request");
        validate(&request, &self.registry).inspect_err(|e| {
            info!(code = e.code(), "rejected invalid request");
        })?;

        let query = NormalizedQuery::from_request(&request, self.search.max_results_per_source);
        let request_deadline = (self.search.request_deadline_ms > 0)
            .then(|| started + Duration::from_millis(self.search.request_deadline_ms));

        debug!("resolving credentials");
        let prepared = join_all(request.sources.iter().map(|source_id| {
            let request = &request;
            async move { (source_id, self.prepare(source_id, request).await) }
        }))
        .await;

        let mut outcomes = BTreeMap::new();
        let mut dispatches = Vec::new();
        for (source_id, prepared) in prepared {
            match prepared {
                Ok(dispatch) => dispatches.push(dispatch),
                Err(outcome) => {
                    outcomes.insert(source_id.clone(), outcome);
                }
            }
        }

        info!(
            dispatched = dispatches.len(),
            skipped = outcomes.len(),
            max_concurrency = self.search.max_concurrency,
            "dispatching search"
        );

        let limit = self.search.max_concurrency.max(1);
        let mut pending = dispatches.into_iter();
        let mut in_flight = FuturesUnordered::new();

        loop {
            while in_flight.len() < limit {
                let Some(dispatch) = pending.next() else {
                    break;
                };
                in_flight.push(self.call_source(dispatch, &query, request_deadline, &cancel));
            }

            let Some((source_id, outcome)) = in_flight.next().await else {
                break;
            };
            outcomes.insert(source_id, outcome);
        }

        let results = merge_results(&outcomes, query.filters.sort_order());
        let intelligence = MarketIntelligence::compute(&results, &self.intelligence);
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let response = AggregateSearchResponse {
            request_id,
            request,
            per_source_outcomes: outcomes,
            results,
            intelligence,
            elapsed_ms,
        };

        info!(
            succeeded = response.succeeded(),
            failed = response.failed(),
            results = response.results.len(),
            elapsed_ms,
            "search assembled"
        );
        Ok(response)
    }

    /// Resolve credentials and find the adapter, or record why the source is skipped.
    async fn prepare<'a>(
        &'a self,
        source_id: &SourceId,
        request: &SearchRequest,
    ) -> std::result::Result<Dispatch<'a>, SourceOutcome> {
        let descriptor = self
            .registry
            .lookup(source_id)
            .map_err(|e| SourceOutcome::failure(FailureKind::Unavailable, e.to_string()))?;

        let credentials = self
            .resolver
            .resolve(descriptor, request.user_id.as_ref())
            .await
            .map_err(|unavailable| {
                debug!(source_id = %source_id, kind = %unavailable.kind(), "source skipped");
                SourceOutcome::failure(unavailable.kind(), unavailable.to_string())
            })?;

        let adapter = self.adapters.get(source_id).ok_or_else(|| {
            warn!(source_id = %source_id, "no adapter built for source");
            SourceOutcome::failure(FailureKind::Unavailable, "no adapter configured for this source")
        })?;

        Ok(Dispatch {
            descriptor,
            adapter,
            credentials,
        })
    }

    /// Call one source under its own timeout and turn the answer into an outcome.
    async fn call_source(
        &self,
        dispatch: Dispatch<'_>,
        query: &NormalizedQuery,
        request_deadline: Option<Instant>,
        cancel: &CancellationToken,
    ) -> (SourceId, SourceOutcome) {
        let descriptor = dispatch.descriptor;
        let source_id = descriptor.id().clone();
        let timeout =
            descriptor.timeout_budget(Duration::from_millis(self.search.default_timeout_ms));

        let started = Instant::now();
        let mut deadline = started + timeout;
        if let Some(request_deadline) = request_deadline {
            deadline = deadline.min(request_deadline);
        }
        let allowed = deadline.saturating_duration_since(started);
        let budget = TimeoutBudget::until(deadline, cancel.child_token());

        let adapter = dispatch.adapter.as_ref();
        let credentials = &dispatch.credentials;
        let budget_ref = &budget;
        let call = self.governor.run(&source_id, descriptor.rate_limit(), budget_ref, move || {
            adapter.execute(query, credentials, budget_ref)
        });

        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => Err(SourceFailure::cancelled()),
            () = tokio::time::sleep_until(deadline) => Err(SourceFailure::timeout(format!(
                "no response within {} ms",
                allowed.as_millis()
            ))),
            result = call => result,
        };

        let outcome = match result {
            Ok(raw) => {
                let (results, source_yield) =
                    normalize_batch(descriptor, raw, &query.filters, query.max_results);
                debug!(
                    source_id = %source_id,
                    returned = source_yield.returned,
                    accepted = source_yield.accepted,
                    rejected = source_yield.rejected_total(),
                    filtered_out = source_yield.filtered_out,
                    "source answered"
                );
                SourceOutcome::success(results, source_yield)
            }
            Err(failure) => {
                info!(
                    source_id = %source_id,
                    kind = %failure.kind,
                    detail = %failure.detail,
                    "source failed"
                );
                SourceOutcome::failure(failure.kind, failure.detail)
            }
        };

        (source_id, outcome)
    }

    /// Every registered source with whether it can be searched right now.
    ///
    /// Only app-level and environment credentials are considered; a source
    /// that needs a user's own credentials reports why it is not selectable.
    pub async fn source_summaries(&self) -> Vec<SourceSummary> {
        let mut summaries = Vec::with_capacity(self.registry.count());

        for descriptor in self.registry.list() {
            let (selectable, reason) = match self.resolver.preflight(descriptor).await {
                Ok(_) if self.adapters.get(descriptor.id()).is_some() => (true, None),
                Ok(_) => (false, Some("no adapter configured for this source".to_string())),
                Err(unavailable) => (false, Some(unavailable.to_string())),
            };

            summaries.push(SourceSummary {
                id: descriptor.id().clone(),
                display_name: descriptor.display_name().to_string(),
                capability: descriptor.capability(),
                selectable,
                reason,
            });
        }

        summaries
    }
}

/// Union of successful results, sorted by the request's order.
///
/// Relevance keeps each source's own ranking with sources in ID order; the
/// other orders break ties by source ID, then listing ID.
fn merge_results(
    outcomes: &BTreeMap<SourceId, SourceOutcome>,
    order: SortOrder,
) -> Vec<SearchResult> {
    let mut results: Vec<SearchResult> = outcomes
        .values()
        .flat_map(|outcome| outcome.results().iter().cloned())
        .collect();

    let tie_break = |a: &SearchResult, b: &SearchResult| {
        a.source_id
            .cmp(&b.source_id)
            .then_with(|| a.external_id.cmp(&b.external_id))
    };

    match order {
        SortOrder::Relevance => {}
        SortOrder::PriceAsc => {
            results.sort_by(|a, b| a.price.cmp(&b.price).then_with(|| tie_break(a, b)));
        }
        SortOrder::PriceDesc => {
            results.sort_by(|a, b| b.price.cmp(&a.price).then_with(|| tie_break(a, b)));
        }
        SortOrder::Newest => results.sort_by(|a, b| {
            match (a.posted_at, b.posted_at) {
                (Some(x), Some(y)) => y.cmp(&x),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            }
            .then_with(|| tie_break(a, b))
        }),
    }

    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;

    fn result(source: &str, id: &str, price: i64, posted_day: Option<u32>) -> SearchResult {
        SearchResult {
            source_id: SourceId::new(source).expect("valid source id"),
            external_id: id.to_string(),
            title: format!("Item {id}"),
            price: Decimal::from(price),
            currency: "USD".to_string(),
            url: format!("https://{source}.test/{id}"),
            thumbnail_url: None,
            condition: None,
            posted_at: posted_day.and_then(|d| Utc.with_ymd_and_hms(2026, 10, d, 0, 0, 0).single()),
        }
    }

    fn outcomes() -> BTreeMap<SourceId, SourceOutcome> {
        let mut map = BTreeMap::new();
        map.insert(
            SourceId::new("zeta").expect("valid source id"),
            SourceOutcome::success(
                vec![result("zeta", "z1", 30, Some(2)), result("zeta", "z2", 10, None)],
                crate::normalizer::SourceYield::default(),
            ),
        );
        map.insert(
            SourceId::new("alpha").expect("valid source id"),
            SourceOutcome::success(
                vec![result("alpha", "a2", 30, Some(5)), result("alpha", "a1", 20, Some(1))],
                crate::normalizer::SourceYield::default(),
            ),
        );
        map.insert(
            SourceId::new("broken").expect("valid source id"),
            SourceOutcome::failure(FailureKind::ParseError, "malformed JSON"),
        );
        map
    }

    fn ids(results: &[SearchResult]) -> Vec<&str> {
        results.iter().map(|r| r.external_id.as_str()).collect()
    }

    #[test]
    fn test_relevance_keeps_source_order() {
        let results = merge_results(&outcomes(), SortOrder::Relevance);
        assert_eq!(ids(&results), vec!["a2", "a1", "z1", "z2"]);
    }

    #[test]
    fn test_price_sorts_break_ties() {
        let results = merge_results(&outcomes(), SortOrder::PriceAsc);
        assert_eq!(ids(&results), vec!["z2", "a1", "a2", "z1"]);

        let results = merge_results(&outcomes(), SortOrder::PriceDesc);
        assert_eq!(ids(&results), vec!["a2", "z1", "a1", "z2"]);
    }

    #[test]
    fn test_newest_puts_undated_last() {
        let results = merge_results(&outcomes(), SortOrder::Newest);
        assert_eq!(ids(&results), vec!["a2", "z1", "a1", "z2"]);
    }
}
