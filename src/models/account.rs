use serde::{Deserialize, Serialize};

pub const MAX_RECENT_SEARCHES: usize = 10;

/// Identity of the account issuing a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub user_id: i32,
    pub verified: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentSearch {
    pub query: String,
    pub searched_at: String,
}

/// Returns the history with `query` prepended, trimmed to
/// [`MAX_RECENT_SEARCHES`]. Repeated queries are kept.
#[must_use]
pub fn push_recent_search(history: &[RecentSearch], query: &str, now: &str) -> Vec<RecentSearch> {
    std::iter::once(RecentSearch {
        query: query.to_string(),
        searched_at: now.to_string(),
    })
    .chain(history.iter().cloned())
    .take(MAX_RECENT_SEARCHES)
    .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: i32,
    pub username: String,
    pub verified: bool,
    pub created_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Completed,
}

impl PaymentStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Self {
        if s == "completed" {
            Self::Completed
        } else {
            Self::Pending
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i32,
    pub service_id: i32,
    pub amount_cents: i64,
    pub status: PaymentStatus,
    pub created_at: String,
    pub completed_at: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history(n: usize) -> Vec<RecentSearch> {
        (0..n)
            .map(|i| RecentSearch {
                query: format!("q{i}"),
                searched_at: format!("t{i}"),
            })
            .collect()
    }

    #[test]
    fn test_push_prepends() {
        let updated = push_recent_search(&history(2), "plumber", "now");
        assert_eq!(updated.len(), 3);
        assert_eq!(updated[0].query, "plumber");
        assert_eq!(updated[0].searched_at, "now");
        assert_eq!(updated[1].query, "q0");
    }

    #[test]
    fn test_push_caps_at_max() {
        let updated = push_recent_search(&history(MAX_RECENT_SEARCHES), "new", "now");
        assert_eq!(updated.len(), MAX_RECENT_SEARCHES);
        assert_eq!(updated[0].query, "new");
        assert_eq!(updated.last().unwrap().query, "q8");
    }

    #[test]
    fn test_push_keeps_duplicates() {
        let once = push_recent_search(&[], "tutor", "t1");
        let twice = push_recent_search(&once, "tutor", "t2");
        assert_eq!(twice.len(), 2);
        assert!(twice.iter().all(|s| s.query == "tutor"));
    }
}
