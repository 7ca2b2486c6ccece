//! HTTP plumbing shared by every adapter.
//!
//! All outbound requests go through [`send`] so that client identity, status
//! classification, `Retry-After` handling and cancellation behave the same
//! for every source.

use crate::adapter::TimeoutBudget;
use crate::error::{AdapterError, Result, SourceFailure};
use bazaar_core::FailureKind;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use std::time::Duration;
use tracing::debug;

/// Longest body excerpt kept in debug logs.
const BODY_LOG_LIMIT: usize = 200;

/// Whether a request carries credentials.
///
/// Decides how 401/403 are classified: a stale credential on an authenticated
/// call, a refusal of automated access on an anonymous one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    /// Request carries a credential
    Authenticated,
    /// Request carries none
    Anonymous,
}

/// Build the HTTP client shared by all adapters.
///
/// Every request identifies itself with `user_agent`; per-request timeouts are
/// set from each call's budget.
pub fn build_http_client(user_agent: &str) -> Result<Client> {
    Client::builder()
        .user_agent(user_agent)
        .connect_timeout(Duration::from_secs(5))
        .build()
        .map_err(|e| AdapterError::HttpClient(e.to_string()))
}

/// Send a request within the budget and classify the response status.
///
/// Returns the response only for 2xx statuses.
pub async fn send(
    request: RequestBuilder,
    budget: &TimeoutBudget,
    auth: AuthMode,
) -> std::result::Result<Response, SourceFailure> {
    let remaining = budget.remaining();
    if remaining.is_zero() {
        return Err(SourceFailure::timeout("time budget exhausted before sending"));
    }

    let response = tokio::select! {
        biased;
        () = budget.cancel_token().cancelled() => return Err(SourceFailure::cancelled()),
        result = request.timeout(remaining).send() => {
            result.map_err(|e| SourceFailure::from_transport(&e))?
        }
    };

    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let retry_after = parse_retry_after(response.headers());
    let body = read_text(response, budget).await.unwrap_or_default();
    debug!(
        status = status.as_u16(),
        body = %excerpt(&body),
        "source returned error status"
    );

    Err(classify_status(status, auth, retry_after))
}

/// Read the body as text, honouring cancellation.
pub async fn read_text(
    response: Response,
    budget: &TimeoutBudget,
) -> std::result::Result<String, SourceFailure> {
    tokio::select! {
        biased;
        () = budget.cancel_token().cancelled() => Err(SourceFailure::cancelled()),
        result = response.text() => result.map_err(|e| SourceFailure::from_transport(&e)),
    }
}

/// Map a non-success status to a failure.
#[must_use]
pub fn classify_status(
    status: StatusCode,
    auth: AuthMode,
    retry_after: Option<Duration>,
) -> SourceFailure {
    let detail = status.to_string();
    match status {
        StatusCode::TOO_MANY_REQUESTS => {
            let failure = SourceFailure::new(FailureKind::RateLimited, detail);
            match retry_after {
                Some(delay) => failure.with_retry_after(delay),
                None => failure,
            }
        }
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN if auth == AuthMode::Authenticated => {
            SourceFailure::new(FailureKind::AuthRejected, detail)
        }
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => SourceFailure::timeout(detail),
        _ => SourceFailure::upstream(detail),
    }
}

/// Parse a `Retry-After` header given as delta-seconds or an HTTP date.
#[must_use]
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let value = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();

    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    let when = chrono::DateTime::parse_from_rfc2822(value).ok()?;
    let delta = when.signed_duration_since(chrono::Utc::now());
    Some(delta.to_std().unwrap_or(Duration::ZERO))
}

fn excerpt(body: &str) -> &str {
    match body.char_indices().nth(BODY_LOG_LIMIT) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}
