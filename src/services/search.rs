//! Hybrid search: cached, local-first, with a remote fallback for sparse
//! results.
//!
//! A request is validated, looked up in the cache, and on a miss answered
//! from the local store. When the local answer is thin, candidates from the
//! remote service are reconciled against existing listings (inserting the new
//! ones), merged with the local matches, ranked, redacted and cached.

use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::cache::CacheStore;
use crate::clients::EnrichmentSource;
use crate::config::SearchConfig;
use crate::db::{InsertOutcome, Store, TextQuery, rank_order};
use crate::models::account::Caller;
use crate::models::search::{SearchFilters, SearchQuery, SearchResponse, SearchResultSet};
use crate::models::service::{RemoteCandidate, ServiceInput, ServiceRecord, SourcedRecord};
use crate::services::account_service::AccountService;
use crate::services::redaction;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),
}

impl From<sea_orm::DbErr> for SearchError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::StoreUnavailable(err.to_string())
    }
}

impl From<anyhow::Error> for SearchError {
    fn from(err: anyhow::Error) -> Self {
        Self::StoreUnavailable(err.to_string())
    }
}

pub struct SearchService {
    store: Store,
    cache: Arc<CacheStore>,
    remote: Arc<dyn EnrichmentSource>,
    accounts: Arc<dyn AccountService>,
    config: SearchConfig,
}

impl SearchService {
    #[must_use]
    pub fn new(
        store: Store,
        cache: Arc<CacheStore>,
        remote: Arc<dyn EnrichmentSource>,
        accounts: Arc<dyn AccountService>,
        config: SearchConfig,
    ) -> Self {
        Self {
            store,
            cache,
            remote,
            accounts,
            config,
        }
    }

    pub async fn search(
        &self,
        query: &SearchQuery,
        caller: Option<Caller>,
    ) -> Result<SearchResponse, SearchError> {
        let started = Instant::now();
        let filters = query
            .validate(&self.config)
            .map_err(SearchError::Validation)?;

        let key = query.cache_key();
        let (mut set, outcome) = match self.cache.get::<SearchResultSet>(&key).await {
            Some(cached) => {
                debug!(key = %key, "Search served from cache");
                (cached, "hit")
            }
            None => {
                let set = self.execute(query, &filters, caller).await?;
                self.cache.set(&key, &set, None).await;
                (set, "miss")
            }
        };

        redaction::restore_paid_contacts(&self.store, &mut set.records, caller).await;

        if let Some(caller) = caller
            && let Err(e) = self.accounts.record_search(caller.user_id, &query.text).await
        {
            warn!(user_id = caller.user_id, error = %e, "Failed to record search history");
        }

        metrics::counter!("search_requests_total", "cache" => outcome).increment(1);
        metrics::histogram!("search_duration_seconds").record(started.elapsed().as_secs_f64());

        Ok(set.into())
    }

    /// The miss path: local query, optional remote fallback, merge, redaction.
    async fn execute(
        &self,
        query: &SearchQuery,
        filters: &SearchFilters,
        caller: Option<Caller>,
    ) -> Result<SearchResultSet, SearchError> {
        let include_premium = caller.is_some_and(|c| c.verified);
        let (local, local_total) = self
            .local_query(
                query,
                filters,
                include_premium,
                query.offset(),
                query.limit,
            )
            .await?;

        if self.is_sufficient(local.len(), local_total) {
            debug!(
                query = %query.text,
                page_results = local.len(),
                total = local_total,
                "Local results sufficient"
            );
            return Ok(finalize(local, local_total, query));
        }

        metrics::counter!("search_remote_fallback_total").increment(1);
        let candidates = match self
            .remote
            .search(&query.text, caller.map(|c| c.user_id))
            .await
        {
            Ok(candidates) => candidates,
            Err(e) => {
                metrics::counter!("search_remote_failures_total").increment(1);
                warn!(query = %query.text, error = %e, "Remote search failed, serving local results");
                Vec::new()
            }
        };

        if candidates.is_empty() {
            return Ok(finalize(local, local_total, query));
        }

        // Sparse by definition here, so the whole local match set is small.
        let local = if u64::try_from(local.len()).unwrap_or(u64::MAX) < local_total {
            self.local_query(query, filters, include_premium, 0, local_total)
                .await?
                .0
        } else {
            local
        };

        let ingested = self.reconcile(candidates, filters).await;
        info!(
            query = %query.text,
            local = local.len(),
            remote = ingested.len(),
            "Merged remote candidates"
        );

        let local_ids: HashSet<i32> = local.iter().map(|r| r.id).collect();
        let added = ingested
            .iter()
            .map(|r| r.id)
            .filter(|id| !local_ids.contains(id))
            .collect::<HashSet<_>>()
            .len();
        let total = local_total + u64::try_from(added).unwrap_or(0);

        let mut merged: HashMap<i32, ServiceRecord> = HashMap::new();
        for record in local.into_iter().chain(ingested) {
            merged.insert(record.id, record);
        }
        let mut records: Vec<ServiceRecord> = merged.into_values().collect();
        records.sort_by(rank_order);

        let page = records
            .into_iter()
            .skip(usize::try_from(query.offset()).unwrap_or(usize::MAX))
            .take(usize::try_from(query.limit).unwrap_or(usize::MAX))
            .collect();

        Ok(finalize(page, total, query))
    }

    async fn local_query(
        &self,
        query: &SearchQuery,
        filters: &SearchFilters,
        include_premium: bool,
        offset: u64,
        limit: u64,
    ) -> Result<(Vec<ServiceRecord>, u64), SearchError> {
        let text_query = TextQuery {
            text: &query.text,
            filters,
            include_premium,
            offset,
            limit,
        };

        let timeout = Duration::from_secs(self.config.local_query_timeout_seconds);
        tokio::time::timeout(timeout, self.store.search_services(&text_query))
            .await
            .map_err(|_| SearchError::StoreUnavailable("Local search timed out".to_string()))?
            .map_err(SearchError::from)
    }

    fn is_sufficient(&self, page_results: usize, total: u64) -> bool {
        page_results >= self.config.min_page_results || total >= self.config.min_total_results
    }

    /// Resolves each remote candidate to a stored listing, inserting the ones
    /// not already known. Candidates that fail are skipped.
    async fn reconcile(
        &self,
        candidates: Vec<RemoteCandidate>,
        filters: &SearchFilters,
    ) -> Vec<ServiceRecord> {
        let now = Utc::now().to_rfc3339();
        let mut categories: HashMap<String, i32> = HashMap::new();
        let mut records = Vec::with_capacity(candidates.len());

        for candidate in candidates {
            if candidate.title.trim().is_empty() {
                debug!("Skipping remote candidate without a title");
                continue;
            }

            let sourced = SourcedRecord::Remote(candidate);
            match self.resolve(sourced, filters, &now, &mut categories).await {
                Ok(Some(SourcedRecord::Local(record))) => records.push(record),
                Ok(_) => {}
                Err(e) => warn!(error = %e, "Skipping remote candidate"),
            }
        }

        records
    }

    async fn resolve(
        &self,
        sourced: SourcedRecord,
        filters: &SearchFilters,
        now: &str,
        categories: &mut HashMap<String, i32>,
    ) -> anyhow::Result<Option<SourcedRecord>> {
        let candidate = match sourced {
            SourcedRecord::Local(record) => return Ok(Some(SourcedRecord::Local(record))),
            SourcedRecord::Remote(candidate) => candidate,
        };

        let category_id = self
            .resolve_category(candidate.category.as_deref(), filters, categories)
            .await?;
        let input = ServiceInput::from_remote(&candidate, category_id, now);

        if let Some(source_url) = input.source_url.as_deref()
            && let Some(existing) = self.store.find_service_by_source_url(source_url).await?
        {
            debug!(id = existing.id, source_url, "Remote candidate matched by source URL");
            return Ok(Some(SourcedRecord::Local(existing)));
        }

        let prefix: String = input
            .title
            .chars()
            .take(self.config.dedup_title_prefix)
            .collect();
        if let Some(existing) = self
            .store
            .find_service_by_title_prefix(category_id, &prefix)
            .await?
        {
            debug!(id = existing.id, title = %input.title, "Remote candidate matched by title");
            return Ok(Some(SourcedRecord::Local(existing)));
        }

        match self.store.insert_service_if_absent(&input).await? {
            InsertOutcome::Inserted(record) => {
                debug!(id = record.id, title = %record.title, "Ingested remote listing");
                Ok(Some(SourcedRecord::Local(record)))
            }
            InsertOutcome::Duplicate => {
                // Lost an insert race on the source URL
                let Some(source_url) = input.source_url.as_deref() else {
                    return Ok(None);
                };
                Ok(self
                    .store
                    .find_service_by_source_url(source_url)
                    .await?
                    .map(SourcedRecord::Local))
            }
        }
    }

    /// Remote category name, else the request's category filter, else the
    /// catch-all category.
    async fn resolve_category(
        &self,
        name: Option<&str>,
        filters: &SearchFilters,
        resolved: &mut HashMap<String, i32>,
    ) -> anyhow::Result<i32> {
        let name = name.map(str::trim).unwrap_or_default().to_lowercase();
        if let Some(id) = resolved.get(&name) {
            return Ok(*id);
        }

        let id = match self.store.find_category_by_name(&name).await? {
            Some(category) => category.id,
            None => match filters.category_id {
                Some(id) => id,
                None => {
                    self.store
                        .default_category()
                        .await?
                        .ok_or_else(|| anyhow::anyhow!("Default category is missing"))?
                        .id
                }
            },
        };

        resolved.insert(name, id);
        Ok(id)
    }
}

/// Builds the cacheable set, redacting every premium contact.
fn finalize(mut records: Vec<ServiceRecord>, total: u64, query: &SearchQuery) -> SearchResultSet {
    redaction::redact_premium(&mut records);
    SearchResultSet {
        records,
        total,
        page: query.page,
        limit: query.limit,
    }
}
