//! Core source adapter trait and the raw listing type adapters produce.

use crate::error::SourceFailure;
use async_trait::async_trait;
use bazaar_core::{NormalizedQuery, SourceId};
use bazaar_credentials::CredentialBundle;
use rust_decimal::Decimal;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// What one adapter call produces.
pub type AdapterResult = std::result::Result<Vec<RawListing>, SourceFailure>;

/// Trait every marketplace adapter implements.
///
/// Implementations must be thread-safe (Send + Sync) and stateless between
/// calls. Every error condition is returned as a [`SourceFailure`]; an adapter
/// never panics past its own boundary.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Run one query against the source.
    ///
    /// The caller enforces the deadline externally. The budget lets the adapter
    /// size its HTTP timeouts and carries the cancellation signal, which must be
    /// checked at every I/O boundary. At most `query.max_results` listings are
    /// returned.
    async fn execute(
        &self,
        query: &NormalizedQuery,
        credentials: &CredentialBundle,
        budget: &TimeoutBudget,
    ) -> AdapterResult;

    /// Source this adapter serves.
    fn source_id(&self) -> &SourceId;
}

/// Time and cancellation envelope of one adapter call.
#[derive(Debug, Clone)]
pub struct TimeoutBudget {
    deadline: Instant,
    cancel: CancellationToken,
}

impl TimeoutBudget {
    /// Budget ending `timeout` from now.
    #[must_use]
    pub fn new(timeout: Duration, cancel: CancellationToken) -> Self {
        Self {
            deadline: Instant::now() + timeout,
            cancel,
        }
    }

    /// Budget ending at an absolute instant.
    #[must_use]
    pub fn until(deadline: Instant, cancel: CancellationToken) -> Self {
        Self { deadline, cancel }
    }

    /// When the call must be finished.
    #[must_use]
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Time left, zero once the deadline has passed.
    #[must_use]
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Whether `delay` still fits before the deadline.
    #[must_use]
    pub fn allows(&self, delay: Duration) -> bool {
        delay < self.remaining()
    }

    /// Cancellation signal of the parent request.
    #[must_use]
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Whether the parent request has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Price as a source expressed it, before normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawPrice {
    /// Display text such as `"$1,299.00"` or `"12,50 €"`
    Text(String),
    /// Already a decimal amount
    Decimal(Decimal),
    /// Integer amount in minor units: `amount / divisor`
    Minor {
        /// Amount in minor units
        amount: i64,
        /// Minor units per major unit (100 for cents)
        divisor: u32,
    },
}

/// One listing exactly as the source returned it.
///
/// Every field is optional; the normalizer decides what is usable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawListing {
    /// Marketplace listing ID
    pub external_id: Option<String>,
    /// Title text
    pub title: Option<String>,
    /// Price
    pub price: Option<RawPrice>,
    /// Currency code or symbol
    pub currency: Option<String>,
    /// Link to the listing, possibly relative
    pub url: Option<String>,
    /// Image link, possibly relative
    pub thumbnail_url: Option<String>,
    /// Condition label
    pub condition: Option<String>,
    /// Posting time (RFC 3339, `YYYY-MM-DD HH:MM`, or Unix seconds)
    pub posted_at: Option<String>,
}

impl RawListing {
    /// Listing with the four fields every source provides.
    #[must_use]
    pub fn new(
        external_id: impl Into<String>,
        title: impl Into<String>,
        price: RawPrice,
        url: impl Into<String>,
    ) -> Self {
        Self {
            external_id: Some(external_id.into()),
            title: Some(title.into()),
            price: Some(price),
            url: Some(url.into()),
            ..Self::default()
        }
    }

    /// Set the currency.
    #[must_use]
    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = Some(currency.into());
        self
    }

    /// Set the condition label.
    #[must_use]
    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    /// Set the thumbnail link.
    #[must_use]
    pub fn with_thumbnail(mut self, url: impl Into<String>) -> Self {
        self.thumbnail_url = Some(url.into());
        self
    }

    /// Set the posting time.
    #[must_use]
    pub fn with_posted_at(mut self, posted_at: impl Into<String>) -> Self {
        self.posted_at = Some(posted_at.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_listing_builder() {
        let listing = RawListing::new("42", "Vintage lamp", RawPrice::Text("$25".into()), "/i/42")
            .with_currency("USD")
            .with_condition("Used");

        assert_eq!(listing.external_id.as_deref(), Some("42"));
        assert_eq!(listing.currency.as_deref(), Some("USD"));
        assert_eq!(listing.condition.as_deref(), Some("Used"));
        assert!(listing.thumbnail_url.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_budget_remaining() {
        let budget = TimeoutBudget::new(Duration::from_secs(5), CancellationToken::new());
        assert!(budget.allows(Duration::from_secs(4)));

        tokio::time::advance(Duration::from_secs(3)).await;
        assert_eq!(budget.remaining(), Duration::from_secs(2));
        assert!(!budget.allows(Duration::from_secs(2)));

        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(budget.remaining(), Duration::ZERO);
    }

    #[test]
    fn test_budget_cancellation() {
        let token = CancellationToken::new();
        let budget = TimeoutBudget::new(Duration::from_secs(5), token.child_token());
        assert!(!budget.is_cancelled());
        token.cancel();
        assert!(budget.is_cancelled());
    }
}
