//! `SeaORM` implementation of the `CatalogService` trait.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

use crate::cache::CacheStore;
use crate::cache::keys;
use crate::clients::EnrichmentSource;
use crate::config::SearchConfig;
use crate::db::Store;
use crate::models::account::Caller;
use crate::models::category::{Category, CategoryInput};
use crate::models::search::page_offset;
use crate::models::service::{ServiceInput, ServicePage, ServiceRecord};
use crate::services::catalog_service::{CatalogError, CatalogService};
use crate::services::redaction;

pub struct SeaOrmCatalogService {
    store: Store,
    cache: Arc<CacheStore>,
    remote: Arc<dyn EnrichmentSource>,
    max_limit: u64,
}

impl SeaOrmCatalogService {
    #[must_use]
    pub fn new(
        store: Store,
        cache: Arc<CacheStore>,
        remote: Arc<dyn EnrichmentSource>,
        config: &SearchConfig,
    ) -> Self {
        Self {
            store,
            cache,
            remote,
            max_limit: config.max_limit,
        }
    }

    fn validate_paging(&self, page: u64, limit: u64) -> Result<(), CatalogError> {
        if page < 1 {
            return Err(CatalogError::Validation(
                "Page must be 1 or greater".to_string(),
            ));
        }
        if !(1..=self.max_limit).contains(&limit) {
            return Err(CatalogError::Validation(format!(
                "Invalid limit: {limit}. Limit must be between 1 and {}",
                self.max_limit
            )));
        }
        if page_offset(page, limit).is_none() {
            return Err(CatalogError::Validation(format!(
                "Page {page} is out of range"
            )));
        }
        Ok(())
    }

    async fn require_category(&self, id: i32) -> Result<Category, CatalogError> {
        self.store
            .get_category(id)
            .await?
            .ok_or_else(|| CatalogError::NotFound(format!("Category {id}")))
    }

    async fn visible(
        &self,
        mut records: Vec<ServiceRecord>,
        caller: Option<Caller>,
    ) -> Vec<ServiceRecord> {
        redaction::restore_paid_contacts(&self.store, &mut records, caller).await;
        records
    }

    async fn invalidate_category(&self, id: i32) {
        let categories = self.cache.invalidate_pattern(&keys::categories_pattern()).await;
        let services = self
            .cache
            .invalidate_pattern(&keys::services_by_category_pattern(id))
            .await;
        debug!(category_id = id, removed = categories + services, "Invalidated category keys");
    }

    async fn invalidate_service(&self, id: i32, category_ids: &[i32]) {
        let mut removed = self.cache.delete(&keys::service(id)).await;
        for category_id in category_ids {
            removed += self
                .cache
                .invalidate_pattern(&keys::services_by_category_pattern(*category_id))
                .await;
        }
        removed += self
            .cache
            .invalidate_pattern(&keys::featured_services_pattern())
            .await;
        removed += self
            .cache
            .invalidate_pattern(&keys::all_services_pattern())
            .await;
        debug!(service_id = id, removed, "Invalidated service keys");
    }

    async fn validate_service(&self, input: &ServiceInput) -> Result<(), CatalogError> {
        input.validate().map_err(CatalogError::Validation)?;
        if self.store.get_category(input.category_id).await?.is_none() {
            return Err(CatalogError::Validation(format!(
                "Category {} does not exist",
                input.category_id
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl CatalogService for SeaOrmCatalogService {
    async fn list_categories(&self) -> Result<Vec<Category>, CatalogError> {
        let key = keys::all_categories();
        if let Some(list) = self.cache.get::<Vec<Category>>(&key).await {
            return Ok(list);
        }

        let list = self.store.list_categories().await?;
        self.cache.set(&key, &list, None).await;
        Ok(list)
    }

    async fn get_category(&self, id: i32) -> Result<Category, CatalogError> {
        let key = keys::category(id);
        if let Some(category) = self.cache.get::<Category>(&key).await {
            return Ok(category);
        }

        let category = self.require_category(id).await?;
        self.cache.set(&key, &category, None).await;
        Ok(category)
    }

    async fn create_category(&self, input: CategoryInput) -> Result<Category, CatalogError> {
        input.validate().map_err(CatalogError::Validation)?;
        if self.store.find_category_by_name(&input.name).await?.is_some() {
            return Err(CatalogError::Validation(format!(
                "Category '{}' already exists",
                input.name.trim()
            )));
        }

        let category = self.store.create_category(&input).await?;
        self.invalidate_category(category.id).await;
        info!(id = category.id, name = %category.name, "Created category");
        Ok(category)
    }

    async fn update_category(
        &self,
        id: i32,
        input: CategoryInput,
    ) -> Result<Category, CatalogError> {
        input.validate().map_err(CatalogError::Validation)?;
        if let Some(existing) = self.store.find_category_by_name(&input.name).await?
            && existing.id != id
        {
            return Err(CatalogError::Validation(format!(
                "Category '{}' already exists",
                input.name.trim()
            )));
        }

        let category = self
            .store
            .update_category(id, &input)
            .await?
            .ok_or_else(|| CatalogError::NotFound(format!("Category {id}")))?;
        self.invalidate_category(id).await;
        Ok(category)
    }

    async fn delete_category(&self, id: i32) -> Result<(), CatalogError> {
        let category = self.require_category(id).await?;
        if category.slug == crate::db::DEFAULT_CATEGORY_SLUG {
            return Err(CatalogError::Validation(
                "The default category cannot be deleted".to_string(),
            ));
        }

        let in_use = self.store.count_services_in_category(id).await?;
        if in_use > 0 {
            return Err(CatalogError::Validation(format!(
                "Category {id} still has {in_use} service(s)"
            )));
        }

        self.store.delete_category(id).await?;
        self.invalidate_category(id).await;
        info!(id, "Deleted category");
        Ok(())
    }

    async fn get_service(
        &self,
        id: i32,
        caller: Option<Caller>,
    ) -> Result<ServiceRecord, CatalogError> {
        let key = keys::service(id);
        let record = match self.cache.get::<ServiceRecord>(&key).await {
            Some(record) => record,
            None => {
                let mut record = self
                    .store
                    .get_service(id)
                    .await?
                    .ok_or_else(|| CatalogError::NotFound(format!("Service {id}")))?;
                redaction::redact_premium(std::slice::from_mut(&mut record));
                self.cache.set(&key, &record, None).await;
                record
            }
        };

        self.store.increment_service_views(id).await?;

        let mut records = self.visible(vec![record], caller).await;
        records
            .pop()
            .ok_or_else(|| CatalogError::NotFound(format!("Service {id}")))
    }

    async fn list_services(
        &self,
        page: u64,
        limit: u64,
        caller: Option<Caller>,
    ) -> Result<ServicePage, CatalogError> {
        self.validate_paging(page, limit)?;
        let key = keys::all_services(page, limit);

        let mut listing = match self.cache.get::<ServicePage>(&key).await {
            Some(listing) => listing,
            None => {
                let (mut records, total) = self.store.list_services(page, limit).await?;
                redaction::redact_premium(&mut records);
                let listing = ServicePage {
                    records,
                    total,
                    page,
                    limit,
                };
                self.cache.set(&key, &listing, None).await;
                listing
            }
        };

        listing.records = self.visible(listing.records, caller).await;
        Ok(listing)
    }

    async fn list_by_category(
        &self,
        category_id: i32,
        page: u64,
        limit: u64,
        caller: Option<Caller>,
    ) -> Result<ServicePage, CatalogError> {
        self.validate_paging(page, limit)?;
        let key = keys::services_by_category(category_id, page, limit);

        let mut listing = match self.cache.get::<ServicePage>(&key).await {
            Some(listing) => listing,
            None => {
                self.require_category(category_id).await?;
                let (mut records, total) = self
                    .store
                    .list_services_by_category(category_id, page, limit)
                    .await?;
                redaction::redact_premium(&mut records);
                let listing = ServicePage {
                    records,
                    total,
                    page,
                    limit,
                };
                self.cache.set(&key, &listing, None).await;
                listing
            }
        };

        listing.records = self.visible(listing.records, caller).await;
        Ok(listing)
    }

    async fn featured(
        &self,
        limit: u64,
        caller: Option<Caller>,
    ) -> Result<Vec<ServiceRecord>, CatalogError> {
        self.validate_paging(1, limit)?;
        let key = keys::featured_services(limit);

        let records = match self.cache.get::<Vec<ServiceRecord>>(&key).await {
            Some(records) => records,
            None => {
                let mut records = self.store.featured_services(limit).await?;
                redaction::redact_premium(&mut records);
                self.cache.set(&key, &records, None).await;
                records
            }
        };

        Ok(self.visible(records, caller).await)
    }

    async fn create_service(&self, input: ServiceInput) -> Result<ServiceRecord, CatalogError> {
        self.validate_service(&input).await?;
        if let Some(url) = input.source_url.as_deref()
            && self.store.find_service_by_source_url(url).await?.is_some()
        {
            return Err(CatalogError::Validation(format!(
                "A service with source URL '{url}' already exists"
            )));
        }

        let record = self.store.create_service(&input).await?;
        self.invalidate_service(record.id, &[record.category_id]).await;
        info!(id = record.id, title = %record.title, "Created service");
        Ok(record)
    }

    async fn update_service(
        &self,
        id: i32,
        input: ServiceInput,
    ) -> Result<ServiceRecord, CatalogError> {
        self.validate_service(&input).await?;
        let previous = self
            .store
            .get_service(id)
            .await?
            .ok_or_else(|| CatalogError::NotFound(format!("Service {id}")))?;

        let record = self
            .store
            .update_service(id, &input)
            .await?
            .ok_or_else(|| CatalogError::NotFound(format!("Service {id}")))?;

        self.invalidate_service(id, &[previous.category_id, record.category_id])
            .await;
        Ok(record)
    }

    async fn delete_service(&self, id: i32) -> Result<(), CatalogError> {
        let record = self
            .store
            .delete_service(id)
            .await?
            .ok_or_else(|| CatalogError::NotFound(format!("Service {id}")))?;

        self.invalidate_service(id, &[record.category_id]).await;
        info!(id, title = %record.title, "Deleted service");
        Ok(())
    }

    async fn enrich_service(&self, id: i32) -> Result<ServiceRecord, CatalogError> {
        let record = self
            .store
            .get_service(id)
            .await?
            .ok_or_else(|| CatalogError::NotFound(format!("Service {id}")))?;

        let fields = self
            .remote
            .enrich(&record)
            .await
            .map_err(|e| CatalogError::Remote(e.to_string()))?;

        let mut updated = self
            .store
            .apply_enrichment(id, &fields)
            .await?
            .ok_or_else(|| CatalogError::NotFound(format!("Service {id}")))?;

        self.invalidate_service(id, &[updated.category_id]).await;
        info!(id, changed = !fields.is_empty(), "Enriched service");

        redaction::redact_premium(std::slice::from_mut(&mut updated));
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::EnrichmentError;
    use crate::config::CacheConfig;
    use crate::models::service::{
        EnrichedFields, PriceTier, REDACTED_CONTACT, RemoteCandidate,
    };

    struct FixedSource {
        fields: Option<EnrichedFields>,
    }

    #[async_trait]
    impl EnrichmentSource for FixedSource {
        async fn search(
            &self,
            _query: &str,
            _caller_id: Option<i32>,
        ) -> Result<Vec<RemoteCandidate>, EnrichmentError> {
            Ok(vec![])
        }

        async fn enrich(&self, _record: &ServiceRecord) -> Result<EnrichedFields, EnrichmentError> {
            self.fields.clone().ok_or(EnrichmentError::Unavailable {
                attempts: 3,
                message: "connection refused".to_string(),
            })
        }

        async fn health_check(&self) -> bool {
            true
        }
    }

    async fn catalog(fields: Option<EnrichedFields>) -> (SeaOrmCatalogService, Arc<CacheStore>) {
        let store = Store::new("sqlite::memory:").await.unwrap();
        let cache = Arc::new(CacheStore::new(CacheConfig::default()));
        let service = SeaOrmCatalogService::new(
            store,
            cache.clone(),
            Arc::new(FixedSource { fields }),
            &SearchConfig::default(),
        );
        (service, cache)
    }

    fn input(title: &str, category_id: i32) -> ServiceInput {
        ServiceInput {
            title: title.to_string(),
            description: "Weekly lawn care".to_string(),
            keywords: vec!["lawn".to_string()],
            category_id,
            price_tier: PriceTier::Low,
            location: None,
            rating: 4.0,
            relevance: None,
            premium_only: false,
            source_url: None,
            verified: true,
            contact_info: Some("555-0100".to_string()),
            image_url: None,
            featured: true,
            last_scraped: None,
        }
    }

    fn category(name: &str) -> CategoryInput {
        CategoryInput {
            name: name.to_string(),
            description: None,
        }
    }

    #[tokio::test]
    async fn test_service_write_invalidates_listing_keys() {
        let (catalog, cache) = catalog(None).await;
        let garden = catalog.create_category(category("Garden")).await.unwrap();
        let first = catalog.create_service(input("Mow Co", garden.id)).await.unwrap();

        catalog.get_service(first.id, None).await.unwrap();
        catalog.list_services(1, 20, None).await.unwrap();
        catalog.list_by_category(garden.id, 1, 20, None).await.unwrap();
        catalog.list_by_category(1, 1, 20, None).await.unwrap();
        catalog.featured(5, None).await.unwrap();
        cache.set("search:q:mow", &"kept", None).await;
        assert_eq!(cache.stats().await.entries, 6);

        catalog
            .update_service(first.id, input("Mow Co Deluxe", garden.id))
            .await
            .unwrap();

        // Other categories' pages and search entries survive.
        assert_eq!(cache.stats().await.entries, 2);
        let kept: Option<String> = cache.get("search:q:mow").await;
        assert_eq!(kept.as_deref(), Some("kept"));

        let page = catalog.list_by_category(garden.id, 1, 20, None).await.unwrap();
        assert_eq!(page.records[0].title, "Mow Co Deluxe");
    }

    #[tokio::test]
    async fn test_category_write_invalidates_category_keys() {
        let (catalog, cache) = catalog(None).await;
        let garden = catalog.create_category(category("Garden")).await.unwrap();
        assert_eq!(catalog.list_categories().await.unwrap().len(), 2);
        catalog.get_category(garden.id).await.unwrap();

        catalog
            .update_category(garden.id, category("Gardening"))
            .await
            .unwrap();
        assert_eq!(cache.stats().await.entries, 0);

        let names: Vec<String> = catalog
            .list_categories()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["Gardening".to_string(), "Other".to_string()]);
    }

    #[tokio::test]
    async fn test_category_delete_rules() {
        let (catalog, _) = catalog(None).await;
        let garden = catalog.create_category(category("Garden")).await.unwrap();
        let record = catalog.create_service(input("Mow Co", garden.id)).await.unwrap();

        assert!(matches!(
            catalog.delete_category(garden.id).await,
            Err(CatalogError::Validation(_))
        ));
        assert!(matches!(
            catalog.delete_category(1).await,
            Err(CatalogError::Validation(_))
        ));
        assert!(matches!(
            catalog.create_category(category("garden")).await,
            Err(CatalogError::Validation(_))
        ));

        catalog.delete_service(record.id).await.unwrap();
        catalog.delete_category(garden.id).await.unwrap();
        assert!(matches!(
            catalog.get_category(garden.id).await,
            Err(CatalogError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_get_service_counts_views_and_redacts() {
        let (catalog, _) = catalog(None).await;
        let mut premium = input("Private Chef", 1);
        premium.premium_only = true;
        let record = catalog.create_service(premium).await.unwrap();

        let seen = catalog.get_service(record.id, None).await.unwrap();
        assert_eq!(seen.contact_info.as_deref(), Some(REDACTED_CONTACT));
        catalog.get_service(record.id, None).await.unwrap();

        let stored = catalog.store.get_service(record.id).await.unwrap().unwrap();
        assert_eq!(stored.view_count, 2);
        assert_eq!(stored.contact_info.as_deref(), Some("555-0100"));
    }

    #[tokio::test]
    async fn test_enrich_applies_remote_fields() {
        let (catalog, _) = catalog(Some(EnrichedFields {
            rating: Some(4.9),
            description: Some("Now with weekend hours".to_string()),
            ..Default::default()
        }))
        .await;
        let record = catalog.create_service(input("Mow Co", 1)).await.unwrap();

        let updated = catalog.enrich_service(record.id).await.unwrap();
        assert_eq!(updated.rating, 4.9);
        assert_eq!(updated.description, "Now with weekend hours");
        assert!(updated.last_scraped.is_some());
    }

    #[tokio::test]
    async fn test_enrich_surfaces_remote_errors() {
        let (catalog, _) = catalog(None).await;
        let record = catalog.create_service(input("Mow Co", 1)).await.unwrap();
        assert!(matches!(
            catalog.enrich_service(record.id).await,
            Err(CatalogError::Remote(_))
        ));
        assert!(matches!(
            catalog.enrich_service(999).await,
            Err(CatalogError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_paging_is_validated() {
        let (catalog, _) = catalog(None).await;
        assert!(matches!(
            catalog.list_services(0, 20, None).await,
            Err(CatalogError::Validation(_))
        ));
        assert!(matches!(
            catalog.list_services(1, 51, None).await,
            Err(CatalogError::Validation(_))
        ));
        assert!(matches!(
            catalog.list_services(u64::MAX, 50, None).await,
            Err(CatalogError::Validation(_))
        ));
        assert!(matches!(
            catalog.list_by_category(1, u64::MAX, 20, None).await,
            Err(CatalogError::Validation(_))
        ));
    }
}
