//! Error responses for the HTTP surface.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use bazaar_aggregator::{InvalidRequest, SearchError};
use serde::Serialize;

/// Serializable error returned to HTTP callers.
#[derive(Debug, Serialize)]
pub struct ApiError {
    /// HTTP status, not part of the body
    #[serde(skip)]
    pub status: StatusCode,
    /// Error code for client handling (e.g., "UNKNOWN_SOURCE")
    pub code: String,
    /// User-friendly error message
    pub message: String,
    /// Optional context (never contains credentials)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a 400 error.
    pub fn bad_request(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    /// Attach details.
    #[must_use]
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// Convert InvalidRequest to ApiError, keeping its code.
impl From<InvalidRequest> for ApiError {
    fn from(err: InvalidRequest) -> Self {
        let details = match &err {
            InvalidRequest::InvalidSourceId { id } => Some(serde_json::json!({ "source": id })),
            InvalidRequest::UnknownSource { id } => Some(serde_json::json!({ "source": id })),
            _ => None,
        };
        let error = Self::bad_request(err.code(), err.to_string());
        match details {
            Some(details) => error.with_details(details),
            None => error,
        }
    }
}

/// Convert SearchError to ApiError.
impl From<SearchError> for ApiError {
    fn from(err: SearchError) -> Self {
        match err {
            SearchError::RequestInvalid(invalid) => invalid.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}
