//! Search URL templates for public search sources.
//!
//! Supported placeholders: `{keywords}`, `{price_min}`, `{price_max}`,
//! `{condition}`, `{item_type}` and `{max_results}`. Values are
//! percent-encoded; filters the query does not set become empty strings.

use crate::error::SourceFailure;
use bazaar_core::NormalizedQuery;
use url::Url;

/// Fill a template with the query's values.
pub fn build_search_url(template: &str, query: &NormalizedQuery) -> Result<Url, SourceFailure> {
    let filters = &query.filters;
    let encode = |value: Option<String>| {
        value
            .map(|v| urlencoding::encode(&v).into_owned())
            .unwrap_or_default()
    };

    let rendered = template
        .replace("{keywords}", &query.encoded_keywords())
        .replace("{price_min}", &encode(filters.price_min.map(|p| p.to_string())))
        .replace("{price_max}", &encode(filters.price_max.map(|p| p.to_string())))
        .replace(
            "{condition}",
            &encode(filters.condition.map(|c| c.as_str().to_string())),
        )
        .replace("{item_type}", &encode(filters.item_type.clone()))
        .replace("{max_results}", &query.max_results.to_string());

    Url::parse(&rendered).map_err(|e| SourceFailure::parse(format!("invalid search URL: {e}")))
}
