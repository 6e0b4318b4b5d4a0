//! Domain service for categories and service listings.
//!
//! Reads are served through the cache; every write invalidates the key
//! families that could hold the changed rows.

use thiserror::Error;

use crate::models::account::Caller;
use crate::models::category::{Category, CategoryInput};
use crate::models::service::{ServiceInput, ServicePage, ServiceRecord};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Remote service error: {0}")]
    Remote(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<sea_orm::DbErr> for CatalogError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for CatalogError {
    fn from(err: anyhow::Error) -> Self {
        Self::Database(err.to_string())
    }
}

#[async_trait::async_trait]
pub trait CatalogService: Send + Sync {
    // Categories

    async fn list_categories(&self) -> Result<Vec<Category>, CatalogError>;

    async fn get_category(&self, id: i32) -> Result<Category, CatalogError>;

    async fn create_category(&self, input: CategoryInput) -> Result<Category, CatalogError>;

    async fn update_category(
        &self,
        id: i32,
        input: CategoryInput,
    ) -> Result<Category, CatalogError>;

    /// Refused while listings still reference the category.
    async fn delete_category(&self, id: i32) -> Result<(), CatalogError>;

    // Listings

    /// Fetches one listing and counts the view.
    async fn get_service(
        &self,
        id: i32,
        caller: Option<Caller>,
    ) -> Result<ServiceRecord, CatalogError>;

    async fn list_services(
        &self,
        page: u64,
        limit: u64,
        caller: Option<Caller>,
    ) -> Result<ServicePage, CatalogError>;

    async fn list_by_category(
        &self,
        category_id: i32,
        page: u64,
        limit: u64,
        caller: Option<Caller>,
    ) -> Result<ServicePage, CatalogError>;

    async fn featured(
        &self,
        limit: u64,
        caller: Option<Caller>,
    ) -> Result<Vec<ServiceRecord>, CatalogError>;

    async fn create_service(&self, input: ServiceInput) -> Result<ServiceRecord, CatalogError>;

    async fn update_service(
        &self,
        id: i32,
        input: ServiceInput,
    ) -> Result<ServiceRecord, CatalogError>;

    async fn delete_service(&self, id: i32) -> Result<(), CatalogError>;

    /// Refreshes one listing from the remote service.
    async fn enrich_service(&self, id: i32) -> Result<ServiceRecord, CatalogError>;
}
