use axum::{
    Json,
    extract::State,
};
use std::sync::Arc;
use tracing::info;

use super::{ApiError, ApiResponse, AppState, HealthDto, MessageResponse};
use crate::cache::CacheStats;

pub async fn cache_stats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<CacheStats>>, ApiError> {
    let stats = state.shared.cache.stats().await;
    Ok(Json(ApiResponse::success(stats)))
}

pub async fn clear_cache(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    let entries = state.shared.cache.stats().await.entries;
    state.shared.cache.clear().await;
    state.shared.cache.reset_stats();
    info!(entries, "Cache cleared via API");
    Ok(Json(ApiResponse::success(MessageResponse {
        message: format!("Cleared {entries} cache entries"),
    })))
}

pub async fn health(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<HealthDto>>, ApiError> {
    let database = state.store().ping().await.is_ok();
    let remote = state.shared.remote.health_check().await;

    let status = match (database, remote) {
        (true, true) => "ok",
        (true, false) => "degraded",
        (false, _) => "unavailable",
    };

    Ok(Json(ApiResponse::success(HealthDto {
        status: status.to_string(),
        database,
        remote,
        uptime_seconds: state.start_time.elapsed().as_secs(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })))
}
