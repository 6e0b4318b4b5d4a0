use axum::{
    Json,
    extract::State,
};
use std::sync::Arc;

use super::auth::RequireCaller;
use super::{ApiError, ApiResponse, AppState, MessageResponse, PaymentRequest};
use crate::models::account::{RecentSearch, Transaction, UserProfile};

pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    RequireCaller(caller): RequireCaller,
) -> Result<Json<ApiResponse<UserProfile>>, ApiError> {
    let profile = state.accounts().profile(caller.user_id).await?;
    Ok(Json(ApiResponse::success(profile)))
}

pub async fn get_transactions(
    State(state): State<Arc<AppState>>,
    RequireCaller(caller): RequireCaller,
) -> Result<Json<ApiResponse<Vec<Transaction>>>, ApiError> {
    let transactions = state.accounts().transactions(caller.user_id).await?;
    Ok(Json(ApiResponse::success(transactions)))
}

pub async fn get_recent_searches(
    State(state): State<Arc<AppState>>,
    RequireCaller(caller): RequireCaller,
) -> Result<Json<ApiResponse<Vec<RecentSearch>>>, ApiError> {
    let history = state.accounts().recent_searches(caller.user_id).await?;
    Ok(Json(ApiResponse::success(history)))
}

pub async fn clear_recent_searches(
    State(state): State<Arc<AppState>>,
    RequireCaller(caller): RequireCaller,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    state.accounts().clear_recent_searches(caller.user_id).await?;
    Ok(Json(ApiResponse::success(MessageResponse {
        message: "Search history cleared".to_string(),
    })))
}

/// POST /payments
pub async fn complete_payment(
    State(state): State<Arc<AppState>>,
    RequireCaller(caller): RequireCaller,
    Json(request): Json<PaymentRequest>,
) -> Result<Json<ApiResponse<Transaction>>, ApiError> {
    let transaction = state
        .accounts()
        .complete_payment(caller.user_id, request.service_id, request.amount_cents)
        .await?;
    Ok(Json(ApiResponse::success(transaction)))
}
