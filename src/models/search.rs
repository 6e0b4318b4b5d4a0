use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::cache::keys;
use crate::config::SearchConfig;
use crate::models::service::{PriceTier, ServiceRecord};

pub const FILTER_CATEGORY: &str = "category";
pub const FILTER_LOCATION: &str = "location";
pub const FILTER_PRICE_TIER: &str = "price_tier";
pub const FILTER_MIN_RATING: &str = "min_rating";

const KNOWN_FILTERS: &[&str] = &[
    FILTER_CATEGORY,
    FILTER_LOCATION,
    FILTER_PRICE_TIER,
    FILTER_MIN_RATING,
];

/// A search request after normalization. Two requests that differ only in
/// letter case, whitespace, filter order or blank filters normalize equal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub text: String,
    pub filters: BTreeMap<String, String>,
    pub page: u64,
    pub limit: u64,
}

impl SearchQuery {
    pub fn new<I, K, V>(text: &str, filters: I, page: u64, limit: u64) -> Self
    where
        I: IntoIterator<Item = (K, Option<V>)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        Self {
            text: keys::normalize_text(text),
            filters: keys::normalize_filters(filters),
            page,
            limit,
        }
    }

    #[must_use]
    pub fn cache_key(&self) -> String {
        keys::search(&self.text, &self.filters, self.page, self.limit)
    }

    /// Rejects out-of-range paging, query length, and malformed filters.
    pub fn validate(&self, config: &SearchConfig) -> Result<SearchFilters, String> {
        let len = self.text.chars().count();
        if len < config.min_query_length {
            return Err(format!(
                "Search query must be at least {} characters",
                config.min_query_length
            ));
        }
        if len > config.max_query_length {
            return Err(format!(
                "Search query must be {} characters or less",
                config.max_query_length
            ));
        }
        if self.page < 1 {
            return Err("Page must be 1 or greater".to_string());
        }
        if !(1..=config.max_limit).contains(&self.limit) {
            return Err(format!(
                "Invalid limit: {}. Limit must be between 1 and {}",
                self.limit, config.max_limit
            ));
        }
        if page_offset(self.page, self.limit).is_none() {
            return Err(format!("Page {} is out of range", self.page));
        }

        SearchFilters::parse(&self.filters)
    }

    #[must_use]
    pub fn offset(&self) -> u64 {
        self.page.saturating_sub(1).saturating_mul(self.limit)
    }
}

/// Row offset of `page` (1-based), or `None` when it does not fit a signed
/// 64-bit SQL offset.
#[must_use]
pub fn page_offset(page: u64, limit: u64) -> Option<u64> {
    page.checked_sub(1)?
        .checked_mul(limit)
        .filter(|offset| i64::try_from(*offset).is_ok())
}

/// Typed view of the filter map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchFilters {
    pub category_id: Option<i32>,
    pub location: Option<String>,
    pub price_tier: Option<PriceTier>,
    pub min_rating: Option<f64>,
}

impl SearchFilters {
    pub fn parse(filters: &BTreeMap<String, String>) -> Result<Self, String> {
        let mut parsed = Self::default();

        for (name, value) in filters {
            match name.as_str() {
                FILTER_CATEGORY => {
                    let id = value
                        .parse::<i32>()
                        .ok()
                        .filter(|id| *id > 0)
                        .ok_or_else(|| format!("Invalid category filter '{value}'"))?;
                    parsed.category_id = Some(id);
                }
                FILTER_LOCATION => {
                    if value.chars().count() > 100 {
                        return Err("Location filter must be 100 characters or less".to_string());
                    }
                    parsed.location = Some(value.clone());
                }
                FILTER_PRICE_TIER => {
                    let tier = value.parse::<PriceTier>()?;
                    if tier == PriceTier::Unspecified {
                        return Err(format!("Invalid price tier filter '{value}'"));
                    }
                    parsed.price_tier = Some(tier);
                }
                FILTER_MIN_RATING => {
                    let rating = value
                        .parse::<f64>()
                        .ok()
                        .filter(|r| (0.0..=5.0).contains(r))
                        .ok_or_else(|| {
                            format!("Invalid min_rating '{value}'. Must be a number between 0 and 5")
                        })?;
                    parsed.min_rating = Some(rating);
                }
                other => {
                    return Err(format!(
                        "Unknown filter '{other}'. Supported filters: {}",
                        KNOWN_FILTERS.join(", ")
                    ));
                }
            }
        }

        Ok(parsed)
    }
}

/// One cached page of results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResultSet {
    pub records: Vec<ServiceRecord>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
}

impl SearchResultSet {
    #[cfg(test)]
    #[must_use]
    pub const fn empty(page: u64, limit: u64) -> Self {
        Self {
            records: Vec::new(),
            total: 0,
            page,
            limit,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub records: Vec<ServiceRecord>,
    pub page: u64,
    pub limit: u64,
    pub total: u64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl From<SearchResultSet> for SearchResponse {
    fn from(set: SearchResultSet) -> Self {
        let has_next = set.page.saturating_mul(set.limit) < set.total;
        Self {
            has_prev: set.page > 1,
            has_next,
            records: set.records,
            page: set.page,
            limit: set.limit,
            total: set.total,
        }
    }
}
