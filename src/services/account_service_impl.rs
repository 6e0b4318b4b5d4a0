//! `SeaORM` implementation of the `AccountService` trait.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

use crate::cache::CacheStore;
use crate::cache::keys::{self, UserSubtype};
use crate::db::Store;
use crate::models::account::{
    Caller, RecentSearch, Transaction, UserProfile, push_recent_search,
};
use crate::services::account_service::{AccountError, AccountService};

pub struct SeaOrmAccountService {
    store: Store,
    cache: Arc<CacheStore>,
    /// Serializes read-modify-write of the recent-search column.
    history_lock: Mutex<()>,
}

impl SeaOrmAccountService {
    #[must_use]
    pub fn new(store: Store, cache: Arc<CacheStore>) -> Self {
        Self {
            store,
            cache,
            history_lock: Mutex::new(()),
        }
    }

    async fn require_user(&self, user_id: i32) -> Result<(), AccountError> {
        if self.store.get_user(user_id).await?.is_none() {
            return Err(AccountError::NotFound(format!("User {user_id}")));
        }
        Ok(())
    }
}

#[async_trait]
impl AccountService for SeaOrmAccountService {
    async fn authenticate(&self, api_key: &str) -> Result<Option<Caller>, AccountError> {
        let user = self.store.get_user_by_api_key(api_key).await?;
        Ok(user.map(|u| Caller {
            user_id: u.id,
            verified: u.verified,
        }))
    }

    async fn create_user(
        &self,
        username: &str,
        verified: bool,
    ) -> Result<(UserProfile, String), AccountError> {
        let username = username.trim();
        if username.is_empty() || username.len() > 64 {
            return Err(AccountError::Validation(
                "Username must be between 1 and 64 characters".to_string(),
            ));
        }

        let (user, api_key) = self.store.create_user(username, verified).await?;
        info!(user_id = user.id, username = %user.username, "Created user");
        Ok((user.into(), api_key))
    }

    async fn profile(&self, user_id: i32) -> Result<UserProfile, AccountError> {
        let key = keys::user(user_id, UserSubtype::Profile);
        if let Some(profile) = self.cache.get::<UserProfile>(&key).await {
            return Ok(profile);
        }

        let user = self
            .store
            .get_user(user_id)
            .await?
            .ok_or_else(|| AccountError::NotFound(format!("User {user_id}")))?;

        let profile = UserProfile::from(user);
        self.cache.set(&key, &profile, None).await;
        Ok(profile)
    }

    async fn transactions(&self, user_id: i32) -> Result<Vec<Transaction>, AccountError> {
        let key = keys::user(user_id, UserSubtype::Transactions);
        if let Some(list) = self.cache.get::<Vec<Transaction>>(&key).await {
            return Ok(list);
        }

        self.require_user(user_id).await?;
        let list = self.store.list_transactions(user_id).await?;
        self.cache.set(&key, &list, None).await;
        Ok(list)
    }

    async fn recent_searches(&self, user_id: i32) -> Result<Vec<RecentSearch>, AccountError> {
        let key = keys::user(user_id, UserSubtype::RecentSearches);
        if let Some(history) = self.cache.get::<Vec<RecentSearch>>(&key).await {
            return Ok(history);
        }

        let history = self
            .store
            .get_recent_searches(user_id)
            .await?
            .ok_or_else(|| AccountError::NotFound(format!("User {user_id}")))?;

        self.cache.set(&key, &history, None).await;
        Ok(history)
    }

    async fn record_search(&self, user_id: i32, query: &str) -> Result<(), AccountError> {
        let _guard = self.history_lock.lock().await;
        let history = self
            .store
            .get_recent_searches(user_id)
            .await?
            .ok_or_else(|| AccountError::NotFound(format!("User {user_id}")))?;

        let now = chrono::Utc::now().to_rfc3339();
        let updated = push_recent_search(&history, query, &now);
        self.store.save_recent_searches(user_id, &updated).await?;

        self.cache
            .delete(&keys::user(user_id, UserSubtype::RecentSearches))
            .await;
        Ok(())
    }

    async fn clear_recent_searches(&self, user_id: i32) -> Result<(), AccountError> {
        let _guard = self.history_lock.lock().await;
        if !self.store.save_recent_searches(user_id, &[]).await? {
            return Err(AccountError::NotFound(format!("User {user_id}")));
        }

        self.cache
            .delete(&keys::user(user_id, UserSubtype::RecentSearches))
            .await;
        Ok(())
    }

    async fn complete_payment(
        &self,
        user_id: i32,
        service_id: i32,
        amount_cents: i64,
    ) -> Result<Transaction, AccountError> {
        if amount_cents < 0 {
            return Err(AccountError::Validation(
                "Amount cannot be negative".to_string(),
            ));
        }
        self.require_user(user_id).await?;
        if self.store.get_service(service_id).await?.is_none() {
            return Err(AccountError::NotFound(format!("Service {service_id}")));
        }

        let transaction = self
            .store
            .complete_payment(user_id, service_id, amount_cents)
            .await?;

        let removed = self.cache.invalidate_pattern(&keys::user_pattern(user_id)).await;
        info!(
            user_id,
            service_id,
            amount_cents,
            invalidated = removed,
            "Payment completed"
        );
        Ok(transaction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;
    use crate::models::account::MAX_RECENT_SEARCHES;
    use crate::models::service::{PriceTier, ServiceInput};

    async fn service() -> (SeaOrmAccountService, Arc<CacheStore>, Store) {
        let store = Store::new("sqlite::memory:").await.unwrap();
        let cache = Arc::new(CacheStore::new(CacheConfig::default()));
        (
            SeaOrmAccountService::new(store.clone(), cache.clone()),
            cache,
            store,
        )
    }

    #[tokio::test]
    async fn test_authenticate() {
        let (accounts, _, _) = service().await;
        let (profile, key) = accounts.create_user("ada", true).await.unwrap();

        let caller = accounts.authenticate(&key).await.unwrap().unwrap();
        assert_eq!(caller.user_id, profile.id);
        assert!(caller.verified);
        assert!(accounts.authenticate("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_record_search_keeps_every_entry() {
        let (accounts, _, _) = service().await;
        let accounts = Arc::new(accounts);
        let (profile, _) = accounts.create_user("ada", false).await.unwrap();

        let tasks: Vec<_> = (0..8)
            .map(|i| {
                let accounts = accounts.clone();
                tokio::spawn(async move {
                    accounts
                        .record_search(profile.id, &format!("query {i}"))
                        .await
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let history = accounts.recent_searches(profile.id).await.unwrap();
        assert_eq!(history.len(), 8);
        for i in 0..8 {
            let query = format!("query {i}");
            assert!(history.iter().any(|entry| entry.query == query), "{query}");
        }
    }

    #[tokio::test]
    async fn test_history_is_bounded_and_invalidated() {
        let (accounts, cache, _) = service().await;
        let (profile, _) = accounts.create_user("ada", false).await.unwrap();

        assert!(accounts.recent_searches(profile.id).await.unwrap().is_empty());

        for i in 0..12 {
            accounts
                .record_search(profile.id, &format!("query {i}"))
                .await
                .unwrap();
        }

        let history = accounts.recent_searches(profile.id).await.unwrap();
        assert_eq!(history.len(), MAX_RECENT_SEARCHES);
        assert_eq!(history[0].query, "query 11");
        assert_eq!(history[9].query, "query 2");

        accounts.clear_recent_searches(profile.id).await.unwrap();
        assert!(accounts.recent_searches(profile.id).await.unwrap().is_empty());

        let key = keys::user(profile.id, UserSubtype::RecentSearches);
        let cached: Option<Vec<RecentSearch>> = cache.get(&key).await;
        assert_eq!(cached, Some(vec![]));
    }

    #[tokio::test]
    async fn test_payment_invalidates_user_keys() {
        let (accounts, cache, store) = service().await;
        let (profile, _) = accounts.create_user("ada", true).await.unwrap();
        let record = store
            .create_service(&ServiceInput {
                title: "Pipe Pros".to_string(),
                description: String::new(),
                keywords: vec![],
                category_id: 1,
                price_tier: PriceTier::High,
                location: None,
                rating: 4.0,
                relevance: None,
                premium_only: true,
                source_url: None,
                verified: true,
                contact_info: Some("555-0100".to_string()),
                image_url: None,
                featured: false,
                last_scraped: None,
            })
            .await
            .unwrap();

        assert!(accounts.transactions(profile.id).await.unwrap().is_empty());
        accounts.profile(profile.id).await.unwrap();
        assert_eq!(cache.stats().await.entries, 2);

        accounts
            .complete_payment(profile.id, record.id, 1500)
            .await
            .unwrap();
        assert_eq!(cache.stats().await.entries, 0);
        assert_eq!(accounts.transactions(profile.id).await.unwrap().len(), 1);

        assert!(matches!(
            accounts.complete_payment(profile.id, 999, 100).await,
            Err(AccountError::NotFound(_))
        ));
        assert!(matches!(
            accounts.complete_payment(profile.id, record.id, -1).await,
            Err(AccountError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_user() {
        let (accounts, _, _) = service().await;
        assert!(matches!(
            accounts.profile(42).await,
            Err(AccountError::NotFound(_))
        ));
        assert!(matches!(
            accounts.record_search(42, "x").await,
            Err(AccountError::NotFound(_))
        ));
    }
}
