//! Search, source listing and health routes.

use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::Json;
use bazaar_aggregator::{parse_source_ids, AggregateSearchResponse, SourceSummary};
use bazaar_core::{SearchFilters, SearchRequest, UserId};
use bazaar_source::Capability;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Body of `POST /search`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchBody {
    /// Free-text query
    pub keywords: String,
    /// Source IDs to search
    #[serde(default)]
    pub platforms: Vec<String>,
    /// Optional filters
    #[serde(default)]
    pub filters: SearchFilters,
    /// Caller whose stored credentials may be used
    #[serde(default)]
    pub user_id: Option<String>,
    /// Per-source result cap
    #[serde(default)]
    pub max_results: Option<usize>,
}

impl SearchBody {
    fn into_request(self) -> Result<SearchRequest, ApiError> {
        let sources = parse_source_ids(&self.platforms)?;

        let mut request = SearchRequest::new(self.keywords, sources).with_filters(self.filters);
        if let Some(raw) = self.user_id {
            let user_id = UserId::new(raw)
                .map_err(|e| ApiError::bad_request("INVALID_USER_ID", e.to_string()))?;
            request = request.with_user(user_id);
        }
        if let Some(max) = self.max_results {
            request = request.with_max_results(max);
        }
        Ok(request)
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct Health {
    /// Always "ok" while the process serves requests
    pub status: &'static str,
    /// Server version
    pub version: &'static str,
    /// Registered sources
    pub sources: usize,
    /// Registered sources per capability class
    pub capabilities: BTreeMap<Capability, usize>,
}

/// Run a search across the requested platforms.
///
/// Dropping the connection drops this future and cancels every pending
/// source call.
pub async fn search(
    State(state): State<AppState>,
    body: Result<Json<SearchBody>, JsonRejection>,
) -> Result<Json<AggregateSearchResponse>, ApiError> {
    let Json(body) = body.map_err(|rejection| {
        ApiError::bad_request("MALFORMED_REQUEST", rejection.body_text())
    })?;
    let request = body.into_request()?;

    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    let response = state.aggregator.search_with_cancel(request, cancel).await?;
    info!(
        request_id = %response.request_id,
        results = response.results.len(),
        elapsed_ms = response.elapsed_ms,
        "Search completed"
    );
    Ok(Json(response))
}

/// List every registered source and whether it can be searched.
pub async fn list_sources(State(state): State<AppState>) -> Json<Vec<SourceSummary>> {
    Json(state.aggregator.source_summaries().await)
}

/// Health check.
pub async fn health(State(state): State<AppState>) -> Json<Health> {
    Json(Health {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        sources: state.aggregator.registry().count(),
        capabilities: state.aggregator.registry().count_by_capability(),
    })
}
