use axum::{
    Json,
    extract::{Path, Query, State},
};
use std::sync::Arc;

use super::auth::MaybeCaller;
use super::{ApiError, ApiResponse, AppState, LimitParams, MessageResponse, PageParams};
use crate::models::category::{Category, CategoryInput};
use crate::models::service::{ServiceInput, ServicePage, ServiceRecord};

async fn paging(state: &AppState, params: &PageParams) -> (u64, u64) {
    let default_limit = state.config().read().await.search.default_limit;
    (
        params.page.unwrap_or(1),
        params.limit.unwrap_or(default_limit),
    )
}

// Categories

pub async fn list_categories(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<Category>>>, ApiError> {
    let categories = state.catalog().list_categories().await?;
    Ok(Json(ApiResponse::success(categories)))
}

pub async fn get_category(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<Category>>, ApiError> {
    let category = state.catalog().get_category(id).await?;
    Ok(Json(ApiResponse::success(category)))
}

pub async fn create_category(
    State(state): State<Arc<AppState>>,
    Json(input): Json<CategoryInput>,
) -> Result<Json<ApiResponse<Category>>, ApiError> {
    let category = state.catalog().create_category(input).await?;
    Ok(Json(ApiResponse::success(category)))
}

pub async fn update_category(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    Json(input): Json<CategoryInput>,
) -> Result<Json<ApiResponse<Category>>, ApiError> {
    let category = state.catalog().update_category(id, input).await?;
    Ok(Json(ApiResponse::success(category)))
}

pub async fn delete_category(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    state.catalog().delete_category(id).await?;
    Ok(Json(ApiResponse::success(MessageResponse {
        message: format!("Category {id} deleted"),
    })))
}

pub async fn list_category_services(
    State(state): State<Arc<AppState>>,
    MaybeCaller(caller): MaybeCaller,
    Path(id): Path<i32>,
    Query(params): Query<PageParams>,
) -> Result<Json<ApiResponse<ServicePage>>, ApiError> {
    let (page, limit) = paging(&state, &params).await;
    let listing = state
        .catalog()
        .list_by_category(id, page, limit, caller)
        .await?;
    Ok(Json(ApiResponse::success(listing)))
}

// Services

pub async fn list_services(
    State(state): State<Arc<AppState>>,
    MaybeCaller(caller): MaybeCaller,
    Query(params): Query<PageParams>,
) -> Result<Json<ApiResponse<ServicePage>>, ApiError> {
    let (page, limit) = paging(&state, &params).await;
    let listing = state.catalog().list_services(page, limit, caller).await?;
    Ok(Json(ApiResponse::success(listing)))
}

pub async fn featured_services(
    State(state): State<Arc<AppState>>,
    MaybeCaller(caller): MaybeCaller,
    Query(params): Query<LimitParams>,
) -> Result<Json<ApiResponse<Vec<ServiceRecord>>>, ApiError> {
    let records = state
        .catalog()
        .featured(params.limit.unwrap_or(10), caller)
        .await?;
    Ok(Json(ApiResponse::success(records)))
}

pub async fn get_service(
    State(state): State<Arc<AppState>>,
    MaybeCaller(caller): MaybeCaller,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<ServiceRecord>>, ApiError> {
    let record = state.catalog().get_service(id, caller).await?;
    Ok(Json(ApiResponse::success(record)))
}

pub async fn create_service(
    State(state): State<Arc<AppState>>,
    Json(input): Json<ServiceInput>,
) -> Result<Json<ApiResponse<ServiceRecord>>, ApiError> {
    let record = state.catalog().create_service(input).await?;
    Ok(Json(ApiResponse::success(record)))
}

pub async fn update_service(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    Json(input): Json<ServiceInput>,
) -> Result<Json<ApiResponse<ServiceRecord>>, ApiError> {
    let record = state.catalog().update_service(id, input).await?;
    Ok(Json(ApiResponse::success(record)))
}

pub async fn delete_service(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    state.catalog().delete_service(id).await?;
    Ok(Json(ApiResponse::success(MessageResponse {
        message: format!("Service {id} deleted"),
    })))
}

pub async fn enrich_service(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<ServiceRecord>>, ApiError> {
    let record = state.catalog().enrich_service(id).await?;
    Ok(Json(ApiResponse::success(record)))
}
