//! Market intelligence derived from the merged result set.
//!
//! Everything here is a pure function of the results: nothing is cached or
//! carried between requests. Statistics cover the dominant currency only, so
//! prices in different currencies are never averaged together.

use bazaar_core::{IntelligenceConfig, SearchResult, SourceId};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

/// Words that carry no meaning for similarity.
const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "at", "by", "for", "from", "in", "is", "it", "of", "on", "or", "the", "to",
    "with", "w", "lot", "set", "pcs",
];

/// Price statistics, best value and clusters of similar listings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketIntelligence {
    /// Listings covered by the statistics (those in `currency`)
    pub count: usize,
    /// Dominant currency, absent when there are no results
    pub currency: Option<String>,
    /// Mean price, rounded to cents
    pub average_price: Option<Decimal>,
    /// Median price
    pub median_price: Option<Decimal>,
    /// Lowest and highest price
    pub price_range: Option<PriceRange>,
    /// Cheapest listing of the largest cluster, else the cheapest overall
    pub best_value: Option<ListingRef>,
    /// Groups of two or more listings with overlapping titles
    pub similar_clusters: Vec<SimilarCluster>,
    /// Listings left out because they are priced in another currency
    pub excluded_other_currency: usize,
}

/// Inclusive price bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PriceRange {
    /// Lowest price
    pub min: Decimal,
    /// Highest price
    pub max: Decimal,
}

/// Pointer to one listing in the results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingRef {
    /// Source of the listing
    pub source_id: SourceId,
    /// Marketplace listing ID
    pub external_id: String,
    /// Listing title
    pub title: String,
    /// Asking price
    pub price: Decimal,
    /// Link to the listing
    pub url: String,
}

impl From<&SearchResult> for ListingRef {
    fn from(result: &SearchResult) -> Self {
        Self {
            source_id: result.source_id.clone(),
            external_id: result.external_id.clone(),
            title: result.title.clone(),
            price: result.price,
            url: result.url.clone(),
        }
    }
}

/// Listings whose titles overlap, possibly across sources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimilarCluster {
    /// Members in result order
    pub listings: Vec<ListingRef>,
    /// Cheapest member
    pub best_value: ListingRef,
    /// Price bounds within the cluster
    pub price_range: PriceRange,
}

impl MarketIntelligence {
    /// Intelligence for an empty result set: no statistics, no clusters.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Derive intelligence from the final result list.
    #[must_use]
    pub fn compute(results: &[SearchResult], config: &IntelligenceConfig) -> Self {
        let Some(currency) = dominant_currency(results) else {
            return Self::empty();
        };

        let priced: Vec<&SearchResult> = results.iter().filter(|r| r.currency == currency).collect();
        let excluded_other_currency = results.len() - priced.len();

        let mut prices: Vec<Decimal> = priced.iter().map(|r| r.price).collect();
        prices.sort_unstable();

        let similar_clusters = cluster(&priced, config);
        // Clusters come largest first
        let best_value = similar_clusters
            .first()
            .map(|c| c.best_value.clone())
            .or_else(|| cheapest(priced.iter().copied()).map(ListingRef::from));

        Self {
            count: priced.len(),
            currency: Some(currency),
            average_price: mean(&prices),
            median_price: median(&prices),
            price_range: prices.first().zip(prices.last()).map(|(&min, &max)| PriceRange { min, max }),
            best_value,
            similar_clusters,
            excluded_other_currency,
        }
    }
}

/// Most frequent currency; ties go to the alphabetically first code.
fn dominant_currency(results: &[SearchResult]) -> Option<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for result in results {
        *counts.entry(result.currency.as_str()).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .max_by(|(a_code, a_n), (b_code, b_n)| a_n.cmp(b_n).then_with(|| b_code.cmp(a_code)))
        .map(|(code, _)| code.to_string())
}

fn mean(sorted: &[Decimal]) -> Option<Decimal> {
    if sorted.is_empty() {
        return None;
    }
    let mean = match sorted
        .iter()
        .try_fold(Decimal::ZERO, |total, price| total.checked_add(*price))
    {
        Some(total) => total / Decimal::from(sorted.len()),
        None => running_mean(sorted),
    };
    Some(mean.round_dp(2))
}

/// Mean without a full sum; stays within the price range.
fn running_mean(prices: &[Decimal]) -> Decimal {
    let mut mean = Decimal::ZERO;
    for (i, &price) in prices.iter().enumerate() {
        let step = (price - mean) / Decimal::from(i + 1);
        mean = mean.checked_add(step).unwrap_or(price);
    }
    mean
}

fn median(sorted: &[Decimal]) -> Option<Decimal> {
    let n = sorted.len();
    match n {
        0 => None,
        _ if n % 2 == 1 => Some(sorted[n / 2]),
        _ => {
            let (low, high) = (sorted[n / 2 - 1], sorted[n / 2]);
            Some(low.checked_add((high - low) / Decimal::from(2)).unwrap_or(high))
        }
    }
}

/// Cheapest listing, ties broken by source and listing ID.
fn cheapest<'a>(results: impl Iterator<Item = &'a SearchResult>) -> Option<&'a SearchResult> {
    results.min_by(|a, b| {
        a.price
            .cmp(&b.price)
            .then_with(|| a.source_id.cmp(&b.source_id))
            .then_with(|| a.external_id.cmp(&b.external_id))
    })
}

/// Normalized title tokens: lowercase alphanumeric words, stop words and
/// short tokens removed.
#[must_use]
pub fn title_tokens(title: &str, min_len: usize) -> BTreeSet<String> {
    title
        .split(|c: char| !c.is_alphanumeric())
        .map(str::to_lowercase)
        .filter(|t| t.chars().count() >= min_len && !STOP_WORDS.contains(&t.as_str()))
        .collect()
}

/// Jaccard overlap of two token sets, 0 when either is empty.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let shared = a.intersection(b).count();
    let union = a.len() + b.len() - shared;
    shared as f64 / union as f64
}

/// Single-link clustering: two listings share a cluster when a chain of
/// pairwise overlaps at or above the threshold connects them.
fn cluster(results: &[&SearchResult], config: &IntelligenceConfig) -> Vec<SimilarCluster> {
    let tokens: Vec<BTreeSet<String>> = results
        .iter()
        .map(|r| title_tokens(&r.title, config.min_token_len))
        .collect();

    let mut parent: Vec<usize> = (0..results.len()).collect();
    for i in 0..results.len() {
        for j in (i + 1)..results.len() {
            if jaccard(&tokens[i], &tokens[j]) >= config.similarity_threshold {
                let (root_i, root_j) = (find(&mut parent, i), find(&mut parent, j));
                if root_i != root_j {
                    parent[root_j.max(root_i)] = root_i.min(root_j);
                }
            }
        }
    }

    let mut groups: Vec<Vec<usize>> = Vec::new();
    let mut group_of_root: HashMap<usize, usize> = HashMap::new();
    for i in 0..results.len() {
        let root = find(&mut parent, i);
        let slot = *group_of_root.entry(root).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[slot].push(i);
    }

    let mut clusters: Vec<SimilarCluster> = groups
        .into_iter()
        .filter(|members| members.len() > 1)
        .filter_map(|members| {
            let listings: Vec<&SearchResult> = members.iter().map(|&i| results[i]).collect();
            let best = cheapest(listings.iter().copied())?;
            let min = best.price;
            let max = listings.iter().map(|r| r.price).max()?;
            Some(SimilarCluster {
                listings: listings.iter().map(|&r| ListingRef::from(r)).collect(),
                best_value: ListingRef::from(best),
                price_range: PriceRange { min, max },
            })
        })
        .collect();

    // Largest first; equal sizes keep first-appearance order
    clusters.sort_by(|a, b| b.listings.len().cmp(&a.listings.len()));
    clusters
}

fn find(parent: &mut [usize], mut i: usize) -> usize {
    while parent[i] != i {
        parent[i] = parent[parent[i]];
        i = parent[i];
    }
    i
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().expect("valid decimal literal")
    }

    fn result(source: &str, id: &str, title: &str, price: &str, currency: &str) -> SearchResult {
        SearchResult {
            source_id: SourceId::new(source).expect("valid source id"),
            external_id: id.to_string(),
            title: title.to_string(),
            price: dec(price),
            currency: currency.to_string(),
            url: format!("https://{source}.test/{id}"),
            thumbnail_url: None,
            condition: None,
            posted_at: None,
        }
    }

    #[test]
    fn test_empty_results() {
        let intel = MarketIntelligence::compute(&[], &IntelligenceConfig::default());
        assert_eq!(intel, MarketIntelligence::empty());
        assert_eq!(intel.count, 0);
        assert!(intel.average_price.is_none());
        assert!(intel.median_price.is_none());
        assert!(intel.similar_clusters.is_empty());
    }

    #[test]
    fn test_price_statistics() {
        let results = vec![
            result("ebay", "1", "Lamp one", "20", "USD"),
            result("ebay", "2", "Chair two", "30", "USD"),
            result("ebay", "3", "Desk three", "40", "USD"),
            result("ebay", "4", "Rug four", "50", "USD"),
        ];
        let intel = MarketIntelligence::compute(&results, &IntelligenceConfig::default());

        assert_eq!(intel.count, 4);
        assert_eq!(intel.currency.as_deref(), Some("USD"));
        assert_eq!(intel.average_price, Some(dec("35")));
        assert_eq!(intel.median_price, Some(dec("35")));
        assert_eq!(
            intel.price_range,
            Some(PriceRange {
                min: dec("20"),
                max: dec("50")
            })
        );
        assert!(intel.similar_clusters.is_empty());
        assert_eq!(intel.best_value.map(|b| b.external_id), Some("1".to_string()));
    }

    #[test]
    fn test_extreme_prices_do_not_overflow() {
        let max = "79228162514264337593543950335";
        let results = vec![
            result("alpha", "1", "Garbled listing", max, "USD"),
            result("bravo", "2", "Garbled entry", max, "USD"),
        ];

        let intel = MarketIntelligence::compute(&results, &IntelligenceConfig::default());
        assert_eq!(intel.count, 2);
        assert_eq!(intel.average_price, Some(Decimal::MAX));
        assert_eq!(intel.median_price, Some(Decimal::MAX));

        let results = vec![
            result("alpha", "1", "Cheap", "1", "USD"),
            result("bravo", "2", "Garbled", max, "USD"),
        ];
        let intel = MarketIntelligence::compute(&results, &IntelligenceConfig::default());
        let average = intel.average_price.expect("average");
        let median = intel.median_price.expect("median");
        assert!(average > Decimal::ONE && average < Decimal::MAX);
        assert!(median > Decimal::ONE && median < Decimal::MAX);
    }

    #[test]
    fn test_mean_rounds_to_cents() {
        assert_eq!(
            mean(&[dec("10"), dec("10"), dec("10.01")]),
            Some(dec("10.00"))
        );
    }

    #[test]
    fn test_dominant_currency_excludes_others() {
        let results = vec![
            result("ebay", "1", "Lamp", "20", "USD"),
            result("ebay", "2", "Lamp", "30", "USD"),
            result("vinted", "3", "Lamp", "5", "EUR"),
        ];
        let intel = MarketIntelligence::compute(&results, &IntelligenceConfig::default());

        assert_eq!(intel.currency.as_deref(), Some("USD"));
        assert_eq!(intel.count, 2);
        assert_eq!(intel.excluded_other_currency, 1);
        assert_eq!(intel.price_range.map(|r| r.min), Some(dec("20")));
    }

    #[test]
    fn test_currency_tie_is_deterministic() {
        let results = vec![
            result("ebay", "1", "Lamp", "20", "USD"),
            result("vinted", "2", "Lamp", "5", "EUR"),
        ];
        let intel = MarketIntelligence::compute(&results, &IntelligenceConfig::default());
        assert_eq!(intel.currency.as_deref(), Some("EUR"));
    }

    #[test]
    fn test_title_tokens() {
        let tokens = title_tokens("The Corsair DDR4-3200 RAM kit, for gaming!", 2);
        let expected: BTreeSet<String> = ["corsair", "ddr4", "3200", "ram", "kit", "gaming"]
            .iter()
            .map(|s| (*s).to_string())
            .collect();
        assert_eq!(tokens, expected);
    }

    #[test]
    fn test_jaccard() {
        let a = title_tokens("corsair ddr4 16gb", 2);
        let b = title_tokens("corsair ddr4 32gb", 2);
        assert!((jaccard(&a, &b) - 0.5).abs() < f64::EPSILON);
        assert!(jaccard(&a, &BTreeSet::new()).abs() < f64::EPSILON);
    }

    #[test]
    fn test_clusters_across_sources() {
        let results = vec![
            result("ebay", "1", "Corsair Vengeance DDR4 16GB", "45", "USD"),
            result("reverb", "2", "Fender Stratocaster guitar", "700", "USD"),
            result("craigslist-sfbay", "3", "Corsair Vengeance DDR4 32GB", "80", "USD"),
            result("etsy", "4", "Corsair Vengeance DDR4 RGB 16GB", "39", "USD"),
        ];
        let intel = MarketIntelligence::compute(&results, &IntelligenceConfig::default());

        assert_eq!(intel.similar_clusters.len(), 1);
        let cluster = &intel.similar_clusters[0];
        let ids: Vec<&str> = cluster.listings.iter().map(|l| l.external_id.as_str()).collect();
        assert_eq!(ids, vec!["1", "3", "4"]);
        assert_eq!(cluster.best_value.external_id, "4");
        assert_eq!(cluster.price_range.max, dec("80"));

        // Best value overall comes from the largest cluster
        assert_eq!(intel.best_value.map(|b| b.external_id), Some("4".to_string()));
    }

    #[test]
    fn test_single_link_chains() {
        // a~b and b~c overlap, a and c do not
        let results = vec![
            result("ebay", "a", "alpha beta gamma", "10", "USD"),
            result("ebay", "b", "beta gamma delta", "20", "USD"),
            result("ebay", "c", "gamma delta epsilon", "5", "USD"),
        ];
        let intel = MarketIntelligence::compute(&results, &IntelligenceConfig::default());
        assert_eq!(intel.similar_clusters.len(), 1);
        assert_eq!(intel.similar_clusters[0].listings.len(), 3);
    }

    #[test]
    fn test_deterministic() {
        let results = vec![
            result("ebay", "1", "Corsair Vengeance DDR4 16GB", "45", "USD"),
            result("etsy", "4", "Corsair Vengeance DDR4 RGB 16GB", "39", "USD"),
        ];
        let config = IntelligenceConfig::default();
        assert_eq!(
            MarketIntelligence::compute(&results, &config),
            MarketIntelligence::compute(&results, &config)
        );
    }
}
