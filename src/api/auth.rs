use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, request::Parts},
};
use std::sync::Arc;

use super::{ApiError, AppState};
use crate::models::account::Caller;

/// Caller resolved from the request's API key, if one was sent.
/// A key that matches no account is rejected rather than ignored.
pub struct MaybeCaller(pub Option<Caller>);

/// Caller that must be authenticated.
pub struct RequireCaller(pub Caller);

impl FromRequestParts<Arc<AppState>> for MaybeCaller {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let Some(key) = extract_api_key(&parts.headers) else {
            return Ok(Self(None));
        };

        match state.shared.account_service.authenticate(&key).await? {
            Some(caller) => {
                tracing::Span::current().record("user_id", caller.user_id);
                Ok(Self(Some(caller)))
            }
            None => Err(ApiError::Unauthorized("Invalid API key".to_string())),
        }
    }
}

impl FromRequestParts<Arc<AppState>> for RequireCaller {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let MaybeCaller(caller) = MaybeCaller::from_request_parts(parts, state).await?;
        caller.map(Self).ok_or_else(ApiError::unauthorized)
    }
}

/// `X-Api-Key` header, else `Authorization: Bearer <key>`.
fn extract_api_key(headers: &HeaderMap) -> Option<String> {
    if let Some(api_key) = headers.get("X-Api-Key")
        && let Ok(key_str) = api_key.to_str()
    {
        return Some(key_str.to_string());
    }

    if let Some(auth_header) = headers.get("Authorization")
        && let Ok(auth_str) = auth_header.to_str()
        && let Some(token) = auth_str.strip_prefix("Bearer ")
    {
        return Some(token.trim().to_string());
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_extract_api_key() {
        let mut headers = HeaderMap::new();
        assert!(extract_api_key(&headers).is_none());

        headers.insert("Authorization", HeaderValue::from_static("Bearer  abc "));
        assert_eq!(extract_api_key(&headers).as_deref(), Some("abc"));

        headers.insert("X-Api-Key", HeaderValue::from_static("xyz"));
        assert_eq!(extract_api_key(&headers).as_deref(), Some("xyz"));
    }
}
