use axum::{
    Json,
    extract::{Query, State},
};
use std::sync::Arc;

use super::auth::MaybeCaller;
use super::{ApiError, ApiResponse, AppState, SearchParams};
use crate::models::search::{
    FILTER_CATEGORY, FILTER_LOCATION, FILTER_MIN_RATING, FILTER_PRICE_TIER, SearchQuery,
    SearchResponse,
};

/// GET /search
pub async fn search(
    State(state): State<Arc<AppState>>,
    MaybeCaller(caller): MaybeCaller,
    Query(params): Query<SearchParams>,
) -> Result<Json<ApiResponse<SearchResponse>>, ApiError> {
    let default_limit = state.config().read().await.search.default_limit;

    let filters = [
        (FILTER_CATEGORY, params.category),
        (FILTER_LOCATION, params.location),
        (FILTER_PRICE_TIER, params.price_tier),
        (FILTER_MIN_RATING, params.min_rating),
    ];
    let query = SearchQuery::new(
        &params.q,
        filters,
        params.page.unwrap_or(1),
        params.limit.unwrap_or(default_limit),
    );

    let response = state.search_service().search(&query, caller).await?;
    Ok(Json(ApiResponse::success(response)))
}
