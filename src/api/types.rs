use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub const fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub category: Option<String>,
    pub location: Option<String>,
    pub price_tier: Option<String>,
    pub min_rating: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PageParams {
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct LimitParams {
    pub limit: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct PaymentRequest {
    pub service_id: i32,
    #[serde(default)]
    pub amount_cents: i64,
}

#[derive(Debug, Serialize)]
pub struct HealthDto {
    pub status: String,
    pub database: bool,
    pub remote: bool,
    pub uptime_seconds: u64,
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}
