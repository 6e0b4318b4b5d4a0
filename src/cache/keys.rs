//! Canonical cache keys.
//!
//! Every component that reads or invalidates a cached resource derives the key
//! through these functions, so the formats here are the contract between write
//! paths and the search path.

use std::collections::BTreeMap;
use std::fmt;

/// Key namespace; the first `:`-separated segment of every key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    Categories,
    Services,
    Search,
    User,
    Other,
}

impl Namespace {
    #[must_use]
    pub fn of(key: &str) -> Self {
        match key.split(':').next().unwrap_or_default() {
            "categories" => Self::Categories,
            "services" => Self::Services,
            "search" => Self::Search,
            "user" => Self::User,
            _ => Self::Other,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Categories => "categories",
            Self::Services => "services",
            Self::Search => "search",
            Self::User => "user",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserSubtype {
    Profile,
    Transactions,
    RecentSearches,
}

impl UserSubtype {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Profile => "profile",
            Self::Transactions => "transactions",
            Self::RecentSearches => "recent-searches",
        }
    }
}

/// Lowercases, trims and collapses internal whitespace runs to one space.
#[must_use]
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Drops absent or blank values and normalizes names and values.
///
/// The result is ordered by filter name, so two maps that differ only in
/// insertion order normalize to the same value.
pub fn normalize_filters<I, K, V>(filters: I) -> BTreeMap<String, String>
where
    I: IntoIterator<Item = (K, Option<V>)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    filters
        .into_iter()
        .filter_map(|(name, value)| {
            let name = normalize_text(name.as_ref());
            let value = normalize_text(value?.as_ref());
            (!name.is_empty() && !value.is_empty()).then_some((name, value))
        })
        .collect()
}

#[must_use]
pub fn category(id: i32) -> String {
    format!("categories:{id}")
}

#[must_use]
pub fn all_categories() -> String {
    "categories:all".to_string()
}

#[must_use]
pub fn categories_pattern() -> String {
    "categories:*".to_string()
}

#[must_use]
pub fn service(id: i32) -> String {
    format!("services:id:{id}")
}

#[must_use]
pub fn services_by_category(category_id: i32, page: u64, limit: u64) -> String {
    format!("services:category:{category_id}:page:{page}:limit:{limit}")
}

#[must_use]
pub fn services_by_category_pattern(category_id: i32) -> String {
    format!("services:category:{category_id}:*")
}

#[must_use]
pub fn all_services(page: u64, limit: u64) -> String {
    format!("services:all:page:{page}:limit:{limit}")
}

#[must_use]
pub fn all_services_pattern() -> String {
    "services:all:*".to_string()
}

#[must_use]
pub fn featured_services(limit: u64) -> String {
    format!("services:featured:limit:{limit}")
}

#[must_use]
pub fn featured_services_pattern() -> String {
    "services:featured:*".to_string()
}

/// `search:q:<query>[:filters:<name:value>|...]`. Expects already-normalized input.
#[must_use]
pub fn search_base(normalized_query: &str, filters: &BTreeMap<String, String>) -> String {
    let mut key = format!("search:q:{normalized_query}");
    if !filters.is_empty() {
        let joined = filters
            .iter()
            .map(|(name, value)| format!("{name}:{value}"))
            .collect::<Vec<_>>()
            .join("|");
        key.push_str(":filters:");
        key.push_str(&joined);
    }
    key
}

/// Key of one cached result page.
#[must_use]
pub fn search(
    normalized_query: &str,
    filters: &BTreeMap<String, String>,
    page: u64,
    limit: u64,
) -> String {
    format!(
        "{}:page:{page}:limit:{limit}",
        search_base(normalized_query, filters)
    )
}

#[must_use]
pub fn user(user_id: i32, subtype: UserSubtype) -> String {
    format!("user:{user_id}:{}", subtype.as_str())
}

#[must_use]
pub fn user_pattern(user_id: i32) -> String {
    format!("user:{user_id}:*")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key_for(query: &str, filters: &[(&str, Option<&str>)]) -> String {
        let filters = normalize_filters(filters.iter().copied());
        search(&normalize_text(query), &filters, 1, 20)
    }

    #[test]
    fn test_resource_keys() {
        assert_eq!(category(4), "categories:4");
        assert_eq!(all_categories(), "categories:all");
        assert_eq!(service(9), "services:id:9");
        assert_eq!(
            services_by_category(3, 2, 10),
            "services:category:3:page:2:limit:10"
        );
        assert_eq!(all_services(1, 20), "services:all:page:1:limit:20");
        assert_eq!(featured_services(6), "services:featured:limit:6");
        assert_eq!(user(7, UserSubtype::Profile), "user:7:profile");
        assert_eq!(
            user(7, UserSubtype::RecentSearches),
            "user:7:recent-searches"
        );
    }

    #[test]
    fn test_search_key_ignores_case_and_whitespace() {
        let a = key_for("  Emergency   Plumber ", &[]);
        let b = key_for("emergency plumber", &[]);
        let c = key_for("EMERGENCY\tplumber", &[]);
        assert_eq!(a, b);
        assert_eq!(b, c);
        assert_eq!(a, "search:q:emergency plumber:page:1:limit:20");
    }

    #[test]
    fn test_search_key_ignores_filter_order_and_empty_values() {
        let a = key_for(
            "plumber",
            &[("location", Some("Austin")), ("category", Some("3"))],
        );
        let b = key_for(
            "plumber",
            &[
                ("category", Some("3")),
                ("price_tier", None),
                ("min_rating", Some("  ")),
                ("location", Some("austin ")),
            ],
        );
        assert_eq!(a, b);
        assert_eq!(
            a,
            "search:q:plumber:filters:category:3|location:austin:page:1:limit:20"
        );
    }

    #[test]
    fn test_search_key_without_filters_has_no_filter_segment() {
        let key = key_for("tutor", &[("location", Some(""))]);
        assert!(!key.contains(":filters:"));
    }

    #[test]
    fn test_namespace_of() {
        assert_eq!(Namespace::of("categories:all"), Namespace::Categories);
        assert_eq!(Namespace::of("services:id:1"), Namespace::Services);
        assert_eq!(Namespace::of("search:q:x"), Namespace::Search);
        assert_eq!(Namespace::of("user:1:profile"), Namespace::User);
        assert_eq!(Namespace::of("sessions:abc"), Namespace::Other);
        assert_eq!(Namespace::of(""), Namespace::Other);
    }
}
