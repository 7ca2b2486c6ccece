//! Request validation, run before any source is contacted.

use crate::error::InvalidRequest;
use bazaar_core::{SearchRequest, SourceId};
use bazaar_source::SourceRegistry;
use rust_decimal::Decimal;
use std::collections::BTreeSet;

/// Check a request against the registry.
///
/// # Errors
/// Returns the first problem found: blank keywords, no sources, an unknown
/// source, a negative price bound, or `price_min > price_max`.
pub fn validate(request: &SearchRequest, registry: &SourceRegistry) -> Result<(), InvalidRequest> {
    if request.keywords.trim().is_empty() {
        return Err(InvalidRequest::EmptyKeywords);
    }

    if request.sources.is_empty() {
        return Err(InvalidRequest::NoSources);
    }

    if let Some(unknown) = request.sources.iter().find(|id| !registry.contains(id)) {
        return Err(InvalidRequest::UnknownSource { id: unknown.clone() });
    }

    let filters = &request.filters;
    let negative = |bound: Option<Decimal>| bound.is_some_and(|p| p.is_sign_negative() && !p.is_zero());
    if negative(filters.price_min) || negative(filters.price_max) {
        return Err(InvalidRequest::NegativePrice);
    }

    if let (Some(min), Some(max)) = (filters.price_min, filters.price_max) {
        if min > max {
            return Err(InvalidRequest::InvalidPriceRange { min, max });
        }
    }

    Ok(())
}

/// Parse caller-supplied source IDs.
///
/// Duplicates collapse; the first malformed ID is reported.
///
/// # Errors
/// Returns `InvalidSourceId` for an ID that does not match the ID format.
pub fn parse_source_ids<I, S>(raw: I) -> Result<BTreeSet<SourceId>, InvalidRequest>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    raw.into_iter()
        .map(|id| {
            let id = id.as_ref().trim();
            SourceId::new(id).map_err(|_| InvalidRequest::InvalidSourceId { id: id.to_string() })
        })
        .collect()
}
