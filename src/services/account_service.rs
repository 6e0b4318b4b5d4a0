//! Domain service for caller accounts: profile, purchases, search history.

use thiserror::Error;

use crate::models::account::{Caller, RecentSearch, Transaction, UserProfile};

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<sea_orm::DbErr> for AccountError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for AccountError {
    fn from(err: anyhow::Error) -> Self {
        Self::Database(err.to_string())
    }
}

#[async_trait::async_trait]
pub trait AccountService: Send + Sync {
    /// Resolves an API key to the calling account, if any.
    async fn authenticate(&self, api_key: &str) -> Result<Option<Caller>, AccountError>;

    /// Creates an account and returns it with its API key.
    async fn create_user(
        &self,
        username: &str,
        verified: bool,
    ) -> Result<(UserProfile, String), AccountError>;

    async fn profile(&self, user_id: i32) -> Result<UserProfile, AccountError>;

    async fn transactions(&self, user_id: i32) -> Result<Vec<Transaction>, AccountError>;

    async fn recent_searches(&self, user_id: i32) -> Result<Vec<RecentSearch>, AccountError>;

    /// Prepends `query` to the bounded history.
    async fn record_search(&self, user_id: i32, query: &str) -> Result<(), AccountError>;

    async fn clear_recent_searches(&self, user_id: i32) -> Result<(), AccountError>;

    /// Records a settled payment, unlocking the listing's contact details.
    async fn complete_payment(
        &self,
        user_id: i32,
        service_id: i32,
        amount_cents: i64,
    ) -> Result<Transaction, AccountError>;
}
