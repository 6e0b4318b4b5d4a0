use anyhow::Result;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::models::account::{RecentSearch, Transaction};
use crate::models::category::{Category, CategoryInput};
use crate::models::service::{EnrichedFields, ServiceInput, ServiceRecord};

pub mod migrator;
pub mod repositories;

pub use repositories::category::DEFAULT_CATEGORY_SLUG;
pub use repositories::service::{InsertOutcome, TextQuery, rank_order};
pub use repositories::user::User;

#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    pub async fn new(db_url: &str) -> Result<Self> {
        Self::with_pool_options(db_url, 5, 1).await
    }

    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        if !db_url.contains(":memory:") {
            let path_str = db_url.trim_start_matches("sqlite:");
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(600))
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self { conn })
    }

    pub async fn ping(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        self.conn
            .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
            .await?;
        Ok(())
    }

    fn category_repo(&self) -> repositories::category::CategoryRepository {
        repositories::category::CategoryRepository::new(self.conn.clone())
    }

    fn service_repo(&self) -> repositories::service::ServiceRepository {
        repositories::service::ServiceRepository::new(self.conn.clone())
    }

    fn user_repo(&self) -> repositories::user::UserRepository {
        repositories::user::UserRepository::new(self.conn.clone())
    }

    fn payment_repo(&self) -> repositories::payment::PaymentRepository {
        repositories::payment::PaymentRepository::new(self.conn.clone())
    }

    // Categories

    pub async fn list_categories(&self) -> Result<Vec<Category>> {
        self.category_repo().list().await
    }

    pub async fn get_category(&self, id: i32) -> Result<Option<Category>> {
        self.category_repo().get(id).await
    }

    pub async fn find_category_by_name(&self, name: &str) -> Result<Option<Category>> {
        self.category_repo().find_by_name(name).await
    }

    pub async fn default_category(&self) -> Result<Option<Category>> {
        self.category_repo().get_default().await
    }

    pub async fn create_category(&self, input: &CategoryInput) -> Result<Category> {
        self.category_repo().create(input).await
    }

    pub async fn update_category(
        &self,
        id: i32,
        input: &CategoryInput,
    ) -> Result<Option<Category>> {
        self.category_repo().update(id, input).await
    }

    pub async fn delete_category(&self, id: i32) -> Result<bool> {
        self.category_repo().delete(id).await
    }

    pub async fn count_services_in_category(&self, category_id: i32) -> Result<u64> {
        self.service_repo().count_in_category(category_id).await
    }

    // Services

    pub async fn get_service(&self, id: i32) -> Result<Option<ServiceRecord>> {
        self.service_repo().get(id).await
    }

    pub async fn get_services(&self, ids: &[i32]) -> Result<Vec<ServiceRecord>> {
        self.service_repo().get_many(ids).await
    }

    pub async fn list_services(&self, page: u64, limit: u64) -> Result<(Vec<ServiceRecord>, u64)> {
        self.service_repo().list(page, limit).await
    }

    pub async fn list_services_by_category(
        &self,
        category_id: i32,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<ServiceRecord>, u64)> {
        self.service_repo()
            .list_by_category(category_id, page, limit)
            .await
    }

    pub async fn featured_services(&self, limit: u64) -> Result<Vec<ServiceRecord>> {
        self.service_repo().featured(limit).await
    }

    pub async fn create_service(&self, input: &ServiceInput) -> Result<ServiceRecord> {
        self.service_repo().create(input).await
    }

    pub async fn insert_service_if_absent(&self, input: &ServiceInput) -> Result<InsertOutcome> {
        self.service_repo().insert_if_absent(input).await
    }

    pub async fn update_service(
        &self,
        id: i32,
        input: &ServiceInput,
    ) -> Result<Option<ServiceRecord>> {
        self.service_repo().update(id, input).await
    }

    pub async fn apply_enrichment(
        &self,
        id: i32,
        fields: &EnrichedFields,
    ) -> Result<Option<ServiceRecord>> {
        self.service_repo().apply_enrichment(id, fields).await
    }

    pub async fn delete_service(&self, id: i32) -> Result<Option<ServiceRecord>> {
        self.service_repo().delete(id).await
    }

    pub async fn increment_service_views(&self, id: i32) -> Result<()> {
        self.service_repo().increment_views(id).await
    }

    pub async fn find_service_by_source_url(
        &self,
        source_url: &str,
    ) -> Result<Option<ServiceRecord>> {
        self.service_repo().find_by_source_url(source_url).await
    }

    pub async fn find_service_by_title_prefix(
        &self,
        category_id: i32,
        prefix: &str,
    ) -> Result<Option<ServiceRecord>> {
        self.service_repo()
            .find_by_title_prefix(category_id, prefix)
            .await
    }

    pub async fn search_services(&self, query: &TextQuery<'_>) -> Result<(Vec<ServiceRecord>, u64)> {
        self.service_repo().text_search(query).await
    }

    // Users

    pub async fn get_user(&self, id: i32) -> Result<Option<User>> {
        self.user_repo().get_by_id(id).await
    }

    pub async fn get_user_by_api_key(&self, api_key: &str) -> Result<Option<User>> {
        self.user_repo().get_by_api_key(api_key).await
    }

    pub async fn create_user(&self, username: &str, verified: bool) -> Result<(User, String)> {
        self.user_repo().create(username, verified).await
    }

    pub async fn set_user_verified(&self, id: i32, verified: bool) -> Result<bool> {
        self.user_repo().set_verified(id, verified).await
    }

    pub async fn get_recent_searches(&self, user_id: i32) -> Result<Option<Vec<RecentSearch>>> {
        self.user_repo().recent_searches(user_id).await
    }

    pub async fn save_recent_searches(
        &self,
        user_id: i32,
        history: &[RecentSearch],
    ) -> Result<bool> {
        self.user_repo()
            .save_recent_searches(user_id, history)
            .await
    }

    // Payments

    pub async fn complete_payment(
        &self,
        user_id: i32,
        service_id: i32,
        amount_cents: i64,
    ) -> Result<Transaction> {
        self.payment_repo()
            .complete(user_id, service_id, amount_cents)
            .await
    }

    pub async fn list_transactions(&self, user_id: i32) -> Result<Vec<Transaction>> {
        self.payment_repo().list_for_user(user_id).await
    }

    pub async fn paid_service_ids(&self, user_id: i32, service_ids: &[i32]) -> Result<Vec<i32>> {
        self.payment_repo()
            .paid_service_ids(user_id, service_ids)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::search::SearchFilters;
    use crate::models::service::PriceTier;

    async fn store() -> Store {
        Store::new("sqlite::memory:").await.unwrap()
    }

    fn input(title: &str, category_id: i32) -> ServiceInput {
        ServiceInput {
            title: title.to_string(),
            description: String::new(),
            keywords: vec![],
            category_id,
            price_tier: PriceTier::Low,
            location: None,
            rating: 3.0,
            relevance: None,
            premium_only: false,
            source_url: None,
            verified: true,
            contact_info: Some("555-0100".to_string()),
            image_url: None,
            featured: false,
            last_scraped: None,
        }
    }

    #[tokio::test]
    async fn test_default_category_is_seeded() {
        let store = store().await;
        let other = store.default_category().await.unwrap().unwrap();
        assert_eq!(other.slug, DEFAULT_CATEGORY_SLUG);
        assert_eq!(
            store.find_category_by_name("OTHER").await.unwrap().unwrap().id,
            other.id
        );
    }

    #[tokio::test]
    async fn test_duplicate_source_url_is_reported() {
        let store = store().await;
        let mut first = input("Pipe Pros", 1);
        first.source_url = Some("https://example.com/pipe-pros".to_string());

        let InsertOutcome::Inserted(record) = store.insert_service_if_absent(&first).await.unwrap()
        else {
            panic!("first insert should succeed");
        };
        assert!(matches!(
            store.insert_service_if_absent(&first).await.unwrap(),
            InsertOutcome::Duplicate
        ));

        let found = store
            .find_service_by_source_url("https://example.com/pipe-pros")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, record.id);
    }

    #[tokio::test]
    async fn test_increment_views() {
        let store = store().await;
        let record = store.create_service(&input("Tutor", 1)).await.unwrap();
        store.increment_service_views(record.id).await.unwrap();
        store.increment_service_views(record.id).await.unwrap();
        let record = store.get_service(record.id).await.unwrap().unwrap();
        assert_eq!(record.view_count, 2);
    }

    #[tokio::test]
    async fn test_title_prefix_lookup_is_case_insensitive() {
        let store = store().await;
        let record = store
            .create_service(&input("Austin Emergency Plumbing Co", 1))
            .await
            .unwrap();

        let found = store
            .find_service_by_title_prefix(1, "austin emergency plumbin")
            .await
            .unwrap();
        assert_eq!(found.map(|r| r.id), Some(record.id));

        let other_category = store
            .find_service_by_title_prefix(2, "austin emergency plumbin")
            .await
            .unwrap();
        assert!(other_category.is_none());
    }

    #[tokio::test]
    async fn test_text_search_filters_and_premium() {
        let store = store().await;
        store.create_service(&input("Plumber Joe", 1)).await.unwrap();
        let mut premium = input("Premium Plumber", 1);
        premium.premium_only = true;
        store.create_service(&premium).await.unwrap();
        store.create_service(&input("Math Tutor", 1)).await.unwrap();

        let filters = SearchFilters::default();
        let mut query = TextQuery {
            text: "plumber",
            filters: &filters,
            include_premium: false,
            offset: 0,
            limit: 20,
        };

        let (records, total) = store.search_services(&query).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(records[0].title, "Plumber Joe");

        query.include_premium = true;
        let (_, total) = store.search_services(&query).await.unwrap();
        assert_eq!(total, 2);
    }

    #[tokio::test]
    async fn test_text_search_folds_non_ascii_case() {
        let store = store().await;
        let mut electrician = input("ÉLECTRICIEN Montréal", 1);
        electrician.location = Some("Montréal".to_string());
        let record = store.create_service(&electrician).await.unwrap();

        let filters = SearchFilters {
            location: Some("MONTRÉAL".to_string()),
            ..SearchFilters::default()
        };
        for text in ["électricien", "ÉLECTRICIEN", "montréal"] {
            let query = TextQuery {
                text,
                filters: &filters,
                include_premium: false,
                offset: 0,
                limit: 20,
            };
            let (records, total) = store.search_services(&query).await.unwrap();
            assert_eq!(total, 1, "{text}");
            assert_eq!(records[0].id, record.id);
        }

        let found = store
            .find_service_by_title_prefix(1, "électricien mon")
            .await
            .unwrap();
        assert_eq!(found.map(|r| r.id), Some(record.id));
    }

    #[tokio::test]
    async fn test_text_search_treats_wildcards_literally() {
        let store = store().await;
        let discount = store
            .create_service(&input("50% off cleaning", 1))
            .await
            .unwrap();
        store.create_service(&input("500 offers", 1)).await.unwrap();
        store.create_service(&input("Garden_Care", 1)).await.unwrap();
        store.create_service(&input("Garden Care", 1)).await.unwrap();

        let filters = SearchFilters::default();
        let query = |text| TextQuery {
            text,
            filters: &filters,
            include_premium: false,
            offset: 0,
            limit: 20,
        };

        let (records, total) = store.search_services(&query("50%")).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(records[0].id, discount.id);

        let (records, total) = store.search_services(&query("n_c")).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(records[0].title, "Garden_Care");

        assert!(
            store
                .find_service_by_title_prefix(1, "5_%")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_enrichment_refreshes_search_text() {
        let store = store().await;
        let record = store.create_service(&input("Pipe Pros", 1)).await.unwrap();
        let fields = EnrichedFields {
            keywords: Some(vec!["Débouchage".to_string()]),
            ..EnrichedFields::default()
        };
        store
            .apply_enrichment(record.id, &fields)
            .await
            .unwrap()
            .unwrap();

        let filters = SearchFilters::default();
        let query = TextQuery {
            text: "DÉBOUCHAGE",
            filters: &filters,
            include_premium: false,
            offset: 0,
            limit: 20,
        };
        let (records, _) = store.search_services(&query).await.unwrap();
        assert_eq!(records.iter().map(|r| r.id).collect::<Vec<_>>(), vec![record.id]);
    }

    #[tokio::test]
    async fn test_paid_service_ids() {
        let store = store().await;
        let (user, _) = store.create_user("ada", true).await.unwrap();
        let a = store.create_service(&input("A", 1)).await.unwrap();
        let b = store.create_service(&input("B", 1)).await.unwrap();

        store.complete_payment(user.id, a.id, 500).await.unwrap();

        let paid = store.paid_service_ids(user.id, &[a.id, b.id]).await.unwrap();
        assert_eq!(paid, vec![a.id]);
        assert_eq!(store.list_transactions(user.id).await.unwrap().len(), 1);
    }
}
