use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Contact value shown in place of the real contact details of a premium
/// listing the caller has not unlocked.
pub const REDACTED_CONTACT: &str = "Premium content - complete payment to view contact details";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceTier {
    Free,
    Low,
    Medium,
    High,
    Premium,
    #[default]
    Unspecified,
}

impl PriceTier {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Premium => "premium",
            Self::Unspecified => "unspecified",
        }
    }

    /// Best-effort mapping of the remote service's free-form price text.
    ///
    /// Accepts a tier name, or an amount such as `"$120"` / `"80-150 USD"`
    /// whose first number decides the tier.
    #[must_use]
    pub fn from_remote(price: Option<&str>) -> Self {
        let Some(price) = price.map(str::trim).filter(|p| !p.is_empty()) else {
            return Self::Unspecified;
        };

        if let Ok(tier) = price.parse::<Self>() {
            return tier;
        }

        let amount: String = price
            .chars()
            .skip_while(|c| !c.is_ascii_digit())
            .take_while(|c| c.is_ascii_digit() || *c == '.')
            .collect();

        match amount.parse::<f64>() {
            Ok(v) if v <= 0.0 => Self::Free,
            Ok(v) if v < 50.0 => Self::Low,
            Ok(v) if v < 200.0 => Self::Medium,
            Ok(_) => Self::High,
            Err(_) if price.eq_ignore_ascii_case("free") => Self::Free,
            Err(_) => Self::Unspecified,
        }
    }
}

impl fmt::Display for PriceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PriceTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "free" => Ok(Self::Free),
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "premium" => Ok(Self::Premium),
            "unspecified" => Ok(Self::Unspecified),
            other => Err(format!(
                "Unknown price tier '{other}'. Expected one of: free, low, medium, high, premium"
            )),
        }
    }
}

/// Canonical listing shape. Every record, whether it was found locally or
/// ingested from the remote service, is normalized into this before merging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceRecord {
    pub id: i32,
    pub title: String,
    pub description: String,
    pub keywords: BTreeSet<String>,
    pub category_id: i32,
    pub price_tier: PriceTier,
    pub location: Option<String>,
    pub rating: f64,
    pub relevance: Option<f64>,
    pub premium_only: bool,
    pub source_url: Option<String>,
    pub verified: bool,
    pub contact_info: Option<String>,
    pub image_url: Option<String>,
    pub featured: bool,
    pub view_count: i64,
    pub last_scraped: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl ServiceRecord {
    /// Replaces the contact details with [`REDACTED_CONTACT`].
    pub fn redact_contact(&mut self) {
        self.contact_info = Some(REDACTED_CONTACT.to_string());
    }

    #[must_use]
    pub fn is_redacted(&self) -> bool {
        self.contact_info.as_deref() == Some(REDACTED_CONTACT)
    }
}

/// One page of a plain listing (no text query).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServicePage {
    pub records: Vec<ServiceRecord>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
}

/// A candidate listing as returned by the remote search service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RemoteCandidate {
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub price: Option<String>,
    pub location: Option<String>,
    pub rating: Option<f64>,
    pub relevance: Option<f64>,
    pub keywords: Vec<String>,
    pub contact_info: Option<String>,
    pub image_url: Option<String>,
    pub source_url: Option<String>,
}

/// Where a record entering the merge came from.
#[derive(Debug, Clone)]
pub enum SourcedRecord {
    Local(ServiceRecord),
    Remote(RemoteCandidate),
}

/// Fields for inserting or replacing a listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceInput {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    pub category_id: i32,
    #[serde(default)]
    pub price_tier: PriceTier,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub relevance: Option<f64>,
    #[serde(default)]
    pub premium_only: bool,
    #[serde(default)]
    pub source_url: Option<String>,
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub contact_info: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub featured: bool,
    #[serde(default)]
    pub last_scraped: Option<String>,
}

impl ServiceInput {
    /// Listing for a remote candidate nobody has vetted yet: premium-only,
    /// unverified, scores taken from the remote metadata or zero.
    #[must_use]
    pub fn from_remote(candidate: &RemoteCandidate, category_id: i32, now: &str) -> Self {
        Self {
            title: candidate.title.trim().to_string(),
            description: candidate.description.clone().unwrap_or_default(),
            keywords: candidate.keywords.clone(),
            category_id,
            price_tier: PriceTier::from_remote(candidate.price.as_deref()),
            location: candidate.location.clone(),
            rating: clamp_rating(candidate.rating.unwrap_or(0.0)),
            relevance: Some(clamp_relevance(candidate.relevance.unwrap_or(0.0))),
            premium_only: true,
            source_url: candidate
                .source_url
                .as_deref()
                .map(str::trim)
                .filter(|u| !u.is_empty())
                .map(str::to_string),
            verified: false,
            contact_info: candidate.contact_info.clone(),
            image_url: candidate.image_url.clone(),
            featured: false,
            last_scraped: Some(now.to_string()),
        }
    }

    /// Checks the invariants the store relies on.
    pub fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("Service title cannot be empty".to_string());
        }
        if self.title.len() > 200 {
            return Err("Service title must be 200 characters or less".to_string());
        }
        if !(0.0..=5.0).contains(&self.rating) {
            return Err(format!("Rating {} must be between 0 and 5", self.rating));
        }
        if let Some(relevance) = self.relevance
            && !(0.0..=100.0).contains(&relevance)
        {
            return Err(format!("Relevance {relevance} must be between 0 and 100"));
        }
        Ok(())
    }
}

/// Fields the remote service can refresh for an existing listing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EnrichedFields {
    pub description: Option<String>,
    pub rating: Option<f64>,
    pub relevance: Option<f64>,
    pub keywords: Option<Vec<String>>,
    pub contact_info: Option<String>,
    pub image_url: Option<String>,
    pub location: Option<String>,
}

impl EnrichedFields {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

#[must_use]
pub fn clamp_rating(rating: f64) -> f64 {
    if rating.is_nan() {
        0.0
    } else {
        rating.clamp(0.0, 5.0)
    }
}

#[must_use]
pub fn clamp_relevance(relevance: f64) -> f64 {
    if relevance.is_nan() {
        0.0
    } else {
        relevance.clamp(0.0, 100.0)
    }
}

/// Lowercased, trimmed, de-duplicated keyword set.
#[must_use]
pub fn normalize_keywords<I, S>(keywords: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    keywords
        .into_iter()
        .map(|k| k.as_ref().trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_tier_from_remote() {
        assert_eq!(PriceTier::from_remote(None), PriceTier::Unspecified);
        assert_eq!(PriceTier::from_remote(Some("  ")), PriceTier::Unspecified);
        assert_eq!(PriceTier::from_remote(Some("High")), PriceTier::High);
        assert_eq!(PriceTier::from_remote(Some("$0")), PriceTier::Free);
        assert_eq!(PriceTier::from_remote(Some("$35/hr")), PriceTier::Low);
        assert_eq!(PriceTier::from_remote(Some("80-150 USD")), PriceTier::Medium);
        assert_eq!(PriceTier::from_remote(Some("$1200")), PriceTier::High);
        assert_eq!(PriceTier::from_remote(Some("ask")), PriceTier::Unspecified);
    }

    #[test]
    fn test_from_remote_defaults() {
        let candidate = RemoteCandidate {
            title: "  Austin Pipe Pros ".to_string(),
            source_url: Some("https://example.com/pipe-pros".to_string()),
            ..Default::default()
        };
        let input = ServiceInput::from_remote(&candidate, 3, "2026-01-01T00:00:00Z");
        assert_eq!(input.title, "Austin Pipe Pros");
        assert!(input.premium_only);
        assert!(!input.verified);
        assert_eq!(input.rating, 0.0);
        assert_eq!(input.relevance, Some(0.0));
        assert_eq!(input.last_scraped.as_deref(), Some("2026-01-01T00:00:00Z"));
        assert!(input.validate().is_ok());
    }

    #[test]
    fn test_from_remote_clamps_scores() {
        let candidate = RemoteCandidate {
            title: "x".to_string(),
            rating: Some(9.0),
            relevance: Some(-3.0),
            source_url: Some("   ".to_string()),
            ..Default::default()
        };
        let input = ServiceInput::from_remote(&candidate, 1, "now");
        assert_eq!(input.rating, 5.0);
        assert_eq!(input.relevance, Some(0.0));
        assert!(input.source_url.is_none());
    }

    #[test]
    fn test_normalize_keywords() {
        let set = normalize_keywords(["Plumbing", " plumbing ", "", "Leaks"]);
        assert_eq!(
            set.into_iter().collect::<Vec<_>>(),
            vec!["leaks".to_string(), "plumbing".to_string()]
        );
    }

    #[test]
    fn test_remote_candidate_wire_names() {
        let json = serde_json::json!({
            "title": "Tutor",
            "contactInfo": "555-0100",
            "sourceUrl": "https://x.test/t",
            "imageUrl": null,
            "rating": 4.5
        });
        let candidate: RemoteCandidate = serde_json::from_value(json).unwrap();
        assert_eq!(candidate.contact_info.as_deref(), Some("555-0100"));
        assert_eq!(candidate.source_url.as_deref(), Some("https://x.test/t"));
        assert_eq!(candidate.rating, Some(4.5));
        assert!(candidate.keywords.is_empty());
    }
}
