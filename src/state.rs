use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::info;

use crate::cache::CacheStore;
use crate::clients::{EnrichmentClient, EnrichmentSource};
use crate::config::Config;
use crate::db::Store;
use crate::services::{
    AccountService, CatalogService, SeaOrmAccountService, SeaOrmCatalogService, SearchService,
};

/// Process-wide context, built once. Owns the single cache every component
/// reads and invalidates.
#[derive(Clone)]
pub struct SharedState {
    pub config: Arc<RwLock<Config>>,

    pub store: Store,

    pub cache: Arc<CacheStore>,

    pub remote: Arc<dyn EnrichmentSource>,

    pub search_service: Arc<SearchService>,

    pub catalog_service: Arc<dyn CatalogService>,

    pub account_service: Arc<dyn AccountService>,

    sweeper: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl SharedState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let remote = Arc::new(EnrichmentClient::new(config.remote.clone()));
        Self::with_remote(config, remote).await
    }

    /// Builds the state around a caller-supplied remote source.
    pub async fn with_remote(
        config: Config,
        remote: Arc<dyn EnrichmentSource>,
    ) -> anyhow::Result<Self> {
        let store = Store::with_pool_options(
            &config.general.database_path,
            config.general.max_db_connections,
            config.general.min_db_connections,
        )
        .await?;

        let cache = Arc::new(CacheStore::new(config.cache.clone()));
        let sweeper = cache.spawn_sweeper(Duration::from_secs(
            config.cache.sweep_interval_seconds.max(1),
        ));

        let account_service = Arc::new(SeaOrmAccountService::new(store.clone(), cache.clone()))
            as Arc<dyn AccountService>;

        let catalog_service = Arc::new(SeaOrmCatalogService::new(
            store.clone(),
            cache.clone(),
            remote.clone(),
            &config.search,
        )) as Arc<dyn CatalogService>;

        let search_service = Arc::new(SearchService::new(
            store.clone(),
            cache.clone(),
            remote.clone(),
            account_service.clone(),
            config.search.clone(),
        ));

        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            store,
            cache,
            remote,
            search_service,
            catalog_service,
            account_service,
            sweeper: Arc::new(Mutex::new(Some(sweeper))),
        })
    }

    /// Stops the cache sweeper and drops every cached entry.
    pub async fn shutdown(&self) {
        let handle = self
            .sweeper
            .lock()
            .map(|mut guard| guard.take())
            .unwrap_or_default();
        if let Some(handle) = handle {
            handle.abort();
        }

        self.cache.clear().await;
        info!("Shared state shut down");
    }
}
