//! Turns raw listings into canonical [`SearchResult`]s.
//!
//! Prices become non-negative decimals, currencies ISO codes, links absolute
//! http(s) URLs. Listings that cannot meet those rules are rejected and
//! counted by reason; nothing is deduplicated across sources.

use bazaar_adapters::{RawListing, RawPrice};
use bazaar_core::{ItemCondition, SearchFilters, SearchResult};
use bazaar_source::SourceDescriptor;
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use url::Url;

/// Why a raw listing was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rejection {
    /// No title, or only whitespace
    MissingTitle,
    /// No price
    MissingPrice,
    /// Price text without a usable number
    InvalidPrice,
    /// Price below zero
    NegativePrice,
    /// No link to the listing
    MissingUrl,
    /// Link that does not parse, even relative to the source
    InvalidUrl,
    /// Link with a scheme other than http(s)
    UnsupportedScheme,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::MissingTitle => "missing title",
            Self::MissingPrice => "missing price",
            Self::InvalidPrice => "unreadable price",
            Self::NegativePrice => "negative price",
            Self::MissingUrl => "missing link",
            Self::InvalidUrl => "invalid link",
            Self::UnsupportedScheme => "link is not http(s)",
        };
        f.write_str(text)
    }
}

/// What happened to the listings one source returned.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceYield {
    /// Listings the adapter returned
    pub returned: usize,
    /// Listings kept in the response
    pub accepted: usize,
    /// Listings dropped during normalization, by reason
    pub rejected: BTreeMap<Rejection, usize>,
    /// Valid listings dropped by the request's filters or result cap
    pub filtered_out: usize,
}

impl SourceYield {
    /// Total rejected listings.
    #[must_use]
    pub fn rejected_total(&self) -> usize {
        self.rejected.values().sum()
    }
}

/// Normalize one raw listing from `source`.
///
/// # Errors
/// Returns the first rule the listing breaks.
pub fn normalize(source: &SourceDescriptor, raw: RawListing) -> Result<SearchResult, Rejection> {
    let title = raw
        .title
        .as_deref()
        .map(collapse_whitespace)
        .filter(|t| !t.is_empty())
        .ok_or(Rejection::MissingTitle)?;

    let (price, symbol_currency) = match raw.price {
        Some(RawPrice::Text(text)) => parse_price_text(&text)?,
        Some(RawPrice::Decimal(amount)) => (amount, None),
        Some(RawPrice::Minor { amount, divisor }) => {
            if divisor == 0 {
                return Err(Rejection::InvalidPrice);
            }
            (Decimal::from(amount) / Decimal::from(divisor), None)
        }
        None => return Err(Rejection::MissingPrice),
    };
    if price.is_sign_negative() && !price.is_zero() {
        return Err(Rejection::NegativePrice);
    }
    if price > max_price() {
        return Err(Rejection::InvalidPrice);
    }

    let base = Url::parse(source.base_url()).ok();
    let url = absolute_url(base.as_ref(), raw.url.as_deref().ok_or(Rejection::MissingUrl)?)?;

    let currency = raw
        .currency
        .as_deref()
        .and_then(currency_code)
        .or(symbol_currency)
        .unwrap_or_else(|| source.default_currency().to_string());

    let external_id = raw
        .external_id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| url.clone());

    Ok(SearchResult {
        source_id: source.id().clone(),
        external_id,
        title,
        price: price.normalize(),
        currency,
        url,
        thumbnail_url: raw
            .thumbnail_url
            .as_deref()
            .and_then(|t| absolute_url(base.as_ref(), t).ok()),
        condition: raw.condition.as_deref().and_then(ItemCondition::from_label),
        posted_at: raw.posted_at.as_deref().and_then(parse_posted_at),
    })
}

/// Normalize everything one source returned, then apply the request's filters
/// and result cap.
#[must_use]
pub fn normalize_batch(
    source: &SourceDescriptor,
    raw: Vec<RawListing>,
    filters: &SearchFilters,
    max_results: usize,
) -> (Vec<SearchResult>, SourceYield) {
    let mut source_yield = SourceYield {
        returned: raw.len(),
        ..SourceYield::default()
    };
    let mut results = Vec::with_capacity(raw.len().min(max_results));

    for listing in raw {
        match normalize(source, listing) {
            Ok(result) if filters.admits(&result) && results.len() < max_results => {
                results.push(result);
            }
            Ok(_) => source_yield.filtered_out += 1,
            Err(reason) => *source_yield.rejected.entry(reason).or_insert(0) += 1,
        }
    }

    source_yield.accepted = results.len();
    (results, source_yield)
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn absolute_url(base: Option<&Url>, link: &str) -> Result<String, Rejection> {
    let link = link.trim();
    if link.is_empty() {
        return Err(Rejection::MissingUrl);
    }

    let url = match Url::parse(link) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => base
            .ok_or(Rejection::InvalidUrl)?
            .join(link)
            .map_err(|_| Rejection::InvalidUrl)?,
        Err(_) => return Err(Rejection::InvalidUrl),
    };

    match url.scheme() {
        "http" | "https" => Ok(url.into()),
        _ => Err(Rejection::UnsupportedScheme),
    }
}

/// Largest price accepted from any source.
fn max_price() -> Decimal {
    Decimal::from(1_000_000_000_000_i64)
}

/// Currency symbols and the ISO code each one stands for.
const CURRENCY_SYMBOLS: &[(&str, &str)] = &[
    ("US$", "USD"),
    ("CA$", "CAD"),
    ("C$", "CAD"),
    ("A$", "AUD"),
    ("AU$", "AUD"),
    ("NZ$", "NZD"),
    ("HK$", "HKD"),
    ("R$", "BRL"),
    ("€", "EUR"),
    ("£", "GBP"),
    ("¥", "JPY"),
    ("₹", "INR"),
    ("₩", "KRW"),
    ("zł", "PLN"),
    ("$", "USD"),
];

/// ISO code for a currency given as a code or a symbol.
fn currency_code(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.len() == 3 && raw.chars().all(|c| c.is_ascii_alphabetic()) {
        return Some(raw.to_ascii_uppercase());
    }
    CURRENCY_SYMBOLS
        .iter()
        .find(|(symbol, _)| *symbol == raw)
        .map(|(_, code)| (*code).to_string())
}

/// ISO 4217 codes recognized inside free price text. Other capitalized
/// words such as "OBO" or "NEW" are not currencies.
const ISO_CODES: &[&str] = &[
    "AED", "ARS", "AUD", "BGN", "BRL", "CAD", "CHF", "CLP", "CNY", "COP", "CZK", "DKK", "EGP",
    "EUR", "GBP", "HKD", "HUF", "IDR", "ILS", "INR", "ISK", "JPY", "KRW", "MXN", "MYR", "NOK",
    "NZD", "PEN", "PHP", "PKR", "PLN", "RON", "RUB", "SAR", "SEK", "SGD", "THB", "TRY", "TWD",
    "UAH", "USD", "VND", "ZAR",
];

/// Currency named in price text, by ISO code or symbol.
fn detect_currency(text: &str) -> Option<String> {
    let code = text
        .split(|c: char| !c.is_ascii_alphabetic())
        .find(|word| ISO_CODES.contains(word));
    if let Some(code) = code {
        return Some(code.to_string());
    }

    // Longest first so `US$` wins over `$`
    let mut symbols: Vec<_> = CURRENCY_SYMBOLS.to_vec();
    symbols.sort_by_key(|(symbol, _)| std::cmp::Reverse(symbol.len()));
    symbols
        .into_iter()
        .find(|(symbol, _)| text.contains(symbol))
        .map(|(_, code)| code.to_string())
}

/// Parse display text such as `"$1,299.00"`, `"1.299,00 €"` or `"CHF 45"`.
///
/// Returns the amount and the currency the text names, if any. Only the
/// first number is read, so ranges resolve to their lower end.
fn parse_price_text(text: &str) -> Result<(Decimal, Option<String>), Rejection> {
    let text = text.trim();
    let start = text.find(|c: char| c.is_ascii_digit()).ok_or_else(|| {
        if text.is_empty() {
            Rejection::MissingPrice
        } else {
            Rejection::InvalidPrice
        }
    })?;

    let prefix = &text[..start];
    if prefix.contains('-') || prefix.contains('\u{2212}') || prefix.contains('(') {
        return Err(Rejection::NegativePrice);
    }

    let number = take_number(&text[start..]);
    let amount = parse_number(&number).ok_or(Rejection::InvalidPrice)?;
    Ok((amount, detect_currency(text)))
}

/// Characters of the leading number, grouping spaces and apostrophes removed.
fn take_number(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut number = String::new();

    for (i, &c) in chars.iter().enumerate() {
        match c {
            '0'..='9' | ',' | '.' => number.push(c),
            '\'' | '\u{a0}' | '\u{202f}' | ' ' => {
                // Grouping separator only when exactly three digits follow
                let group: String = chars[i + 1..].iter().take_while(|d| d.is_ascii_digit()).collect();
                if group.len() != 3 {
                    break;
                }
            }
            _ => break,
        }
    }

    number.trim_end_matches(['.', ',']).to_string()
}

/// Decide which of `,` and `.` is the decimal separator and parse.
fn parse_number(number: &str) -> Option<Decimal> {
    let commas = number.matches(',').count();
    let dots = number.matches('.').count();

    let canonical = match (commas, dots) {
        (0, 0) => number.to_string(),
        (_, 0) => {
            let decimals = number.rsplit(',').next().map_or(0, str::len);
            if commas == 1 && decimals != 3 {
                number.replace(',', ".")
            } else {
                number.replace(',', "")
            }
        }
        (0, _) => {
            if dots == 1 {
                number.to_string()
            } else {
                number.replace('.', "")
            }
        }
        _ => {
            let last_comma = number.rfind(',')?;
            let last_dot = number.rfind('.')?;
            if last_comma > last_dot {
                number.replace('.', "").replace(',', ".")
            } else {
                number.replace(',', "")
            }
        }
    };

    canonical.parse().ok()
}

/// Accepts RFC 3339, `YYYY-MM-DD HH:MM[:SS]`, `YYYY-MM-DD`, and Unix
/// timestamps in seconds or milliseconds.
fn parse_posted_at(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();

    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|naive| Utc.from_utc_datetime(&naive));
    }
    if let Ok(ts) = raw.parse::<i64>() {
        return if ts > 10_000_000_000 {
            Utc.timestamp_millis_opt(ts).single()
        } else {
            Utc.timestamp_opt(ts, 0).single()
        };
    }

    None
}
