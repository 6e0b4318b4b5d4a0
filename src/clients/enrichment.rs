use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::RemoteConfig;
use crate::models::service::{EnrichedFields, RemoteCandidate, ServiceRecord};

#[derive(Debug, Error)]
pub enum EnrichmentError {
    #[error("Remote service unreachable after {attempts} attempt(s): {message}")]
    Unavailable { attempts: u32, message: String },

    #[error("Remote service rejected the request ({status}): {message}")]
    Application { status: u16, message: String },

    #[error("Unexpected response from remote service: {0}")]
    Decode(String),

    #[error("Remote service is disabled")]
    Disabled,
}

/// Source of externally discovered listings.
#[async_trait]
pub trait EnrichmentSource: Send + Sync {
    async fn search(
        &self,
        query: &str,
        caller_id: Option<i32>,
    ) -> Result<Vec<RemoteCandidate>, EnrichmentError>;

    async fn enrich(&self, record: &ServiceRecord) -> Result<EnrichedFields, EnrichmentError>;

    /// Never fails; any problem reads as unhealthy.
    async fn health_check(&self) -> bool;
}

#[derive(Debug, Deserialize)]
struct SearchEnvelope {
    success: bool,
    #[serde(default)]
    results: Vec<RemoteCandidate>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EnrichEnvelope {
    success: bool,
    #[serde(default)]
    data: Option<EnrichedFields>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Clone)]
pub struct EnrichmentClient {
    client: Client,
    config: RemoteConfig,
}

impl EnrichmentClient {
    #[must_use]
    pub fn new(config: RemoteConfig) -> Self {
        let client = Client::builder()
            .user_agent(concat!("svcdex/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self { client, config }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.config.base_url.trim_end_matches('/'))
    }

    fn backoff(&self, attempt: u32) -> Duration {
        Duration::from_millis(
            self.config
                .backoff_base_ms
                .saturating_mul(2u64.saturating_pow(attempt)),
        )
    }

    /// Sends the request built by `build`, retrying only when the transport
    /// fails (connect error, timeout, dropped body). Any HTTP response that
    /// is not a success is returned as [`EnrichmentError::Application`] at once.
    async fn send_with_retry<F>(&self, op: &'static str, build: F) -> Result<String, EnrichmentError>
    where
        F: Fn() -> RequestBuilder + Send + Sync,
    {
        let max_attempts = self.config.max_attempts.max(1);
        let timeout = Duration::from_secs(self.config.request_timeout_seconds);
        let mut last_error = String::new();

        for attempt in 1..=max_attempts {
            debug!(op, attempt, "Calling remote service");
            metrics::counter!("remote_request_attempts_total", "op" => op).increment(1);
            let started = Instant::now();

            let outcome = match build().timeout(timeout).send().await {
                Ok(response) => {
                    let status = response.status();
                    if !status.is_success() {
                        let message = response.text().await.unwrap_or_default();
                        return Err(EnrichmentError::Application {
                            status: status.as_u16(),
                            message: if message.is_empty() {
                                status.to_string()
                            } else {
                                message
                            },
                        });
                    }
                    response.text().await
                }
                Err(e) => Err(e),
            };

            metrics::histogram!("remote_request_duration_seconds", "op" => op)
                .record(started.elapsed().as_secs_f64());

            match outcome {
                Ok(body) => return Ok(body),
                Err(e) => {
                    last_error = e.to_string();
                    warn!(
                        op,
                        attempt,
                        timeout = e.is_timeout(),
                        error = %e,
                        "Remote call attempt failed"
                    );

                    if attempt < max_attempts {
                        let delay = self.backoff(attempt);
                        debug!(delay = ?delay, "Waiting before retry");
                        sleep(delay).await;
                    }
                }
            }
        }

        Err(EnrichmentError::Unavailable {
            attempts: max_attempts,
            message: last_error,
        })
    }

    fn decode<T: DeserializeOwned>(body: &str) -> Result<T, EnrichmentError> {
        serde_json::from_str(body).map_err(|e| EnrichmentError::Decode(e.to_string()))
    }
}

#[async_trait]
impl EnrichmentSource for EnrichmentClient {
    async fn search(
        &self,
        query: &str,
        caller_id: Option<i32>,
    ) -> Result<Vec<RemoteCandidate>, EnrichmentError> {
        if !self.config.enabled {
            return Err(EnrichmentError::Disabled);
        }

        let url = self.endpoint("search");
        let body = json!({ "query": query, "callerId": caller_id });
        let text = self
            .send_with_retry("search", || self.client.post(&url).json(&body))
            .await?;

        let envelope: SearchEnvelope = Self::decode(&text)?;
        if !envelope.success {
            return Err(EnrichmentError::Application {
                status: 200,
                message: envelope
                    .error
                    .unwrap_or_else(|| "search was not successful".to_string()),
            });
        }

        debug!(query, count = envelope.results.len(), "Remote search returned");
        Ok(envelope.results)
    }

    async fn enrich(&self, record: &ServiceRecord) -> Result<EnrichedFields, EnrichmentError> {
        if !self.config.enabled {
            return Err(EnrichmentError::Disabled);
        }

        let url = self.endpoint("enrich");
        let body = json!({
            "serviceId": record.id,
            "title": record.title,
            "sourceUrl": record.source_url,
        });
        let text = self
            .send_with_retry("enrich", || self.client.post(&url).json(&body))
            .await?;

        let envelope: EnrichEnvelope = Self::decode(&text)?;
        if !envelope.success {
            return Err(EnrichmentError::Application {
                status: 200,
                message: envelope
                    .error
                    .unwrap_or_else(|| "enrichment was not successful".to_string()),
            });
        }

        Ok(envelope.data.unwrap_or_default())
    }

    async fn health_check(&self) -> bool {
        if !self.config.enabled {
            return false;
        }

        match self
            .client
            .get(self.endpoint("health"))
            .timeout(Duration::from_secs(self.config.request_timeout_seconds))
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!(error = %e, "Remote health check failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::State;
    use axum::http::StatusCode;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    type Hits = Arc<AtomicUsize>;

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn client(base_url: String, timeout_secs: u64) -> EnrichmentClient {
        EnrichmentClient::new(RemoteConfig {
            enabled: true,
            base_url,
            request_timeout_seconds: timeout_secs,
            max_attempts: 3,
            backoff_base_ms: 1,
        })
    }

    fn record() -> ServiceRecord {
        ServiceRecord {
            id: 7,
            title: "Pipe Pros".to_string(),
            description: String::new(),
            keywords: Default::default(),
            category_id: 1,
            price_tier: Default::default(),
            location: None,
            rating: 0.0,
            relevance: None,
            premium_only: true,
            source_url: Some("https://example.com/pipe-pros".to_string()),
            verified: false,
            contact_info: None,
            image_url: None,
            featured: false,
            view_count: 0,
            last_scraped: None,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    #[tokio::test]
    async fn test_search_decodes_candidates() {
        async fn handler(Json(body): Json<serde_json::Value>) -> Json<serde_json::Value> {
            assert_eq!(body["query"], "plumber");
            assert_eq!(body["callerId"], 4);
            Json(json!({
                "success": true,
                "results": [
                    { "title": "Pipe Pros", "sourceUrl": "https://example.com/p", "rating": 4.2 }
                ]
            }))
        }

        let base = serve(Router::new().route("/search", post(handler))).await;
        let results = client(base, 5).search("plumber", Some(4)).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].source_url.as_deref(), Some("https://example.com/p"));
    }

    #[tokio::test]
    async fn test_error_status_is_not_retried() {
        async fn handler(State(hits): State<Hits>) -> StatusCode {
            hits.fetch_add(1, Ordering::SeqCst);
            StatusCode::INTERNAL_SERVER_ERROR
        }

        let hits = Hits::default();
        let app = Router::new()
            .route("/search", post(handler))
            .with_state(hits.clone());
        let base = serve(app).await;

        let err = client(base, 5).search("plumber", None).await.unwrap_err();
        assert!(matches!(err, EnrichmentError::Application { status: 500, .. }));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unsuccessful_envelope_is_application_error() {
        async fn handler() -> Json<serde_json::Value> {
            Json(json!({ "success": false, "error": "quota exceeded" }))
        }

        let base = serve(Router::new().route("/search", post(handler))).await;
        let err = client(base, 5).search("plumber", None).await.unwrap_err();
        match err {
            EnrichmentError::Application { message, .. } => assert_eq!(message, "quota exceeded"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_timeouts_are_retried_until_exhausted() {
        async fn handler(State(hits): State<Hits>) -> Json<serde_json::Value> {
            hits.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_secs(5)).await;
            Json(json!({ "success": true, "results": [] }))
        }

        let hits = Hits::default();
        let app = Router::new()
            .route("/search", post(handler))
            .with_state(hits.clone());
        let base = serve(app).await;

        let err = client(base, 1).search("plumber", None).await.unwrap_err();
        assert!(matches!(err, EnrichmentError::Unavailable { attempts: 3, .. }));
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_connection_refused_is_unavailable() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = client(format!("http://{addr}"), 1)
            .search("plumber", None)
            .await
            .unwrap_err();
        assert!(matches!(err, EnrichmentError::Unavailable { attempts: 3, .. }));
    }

    #[tokio::test]
    async fn test_malformed_body_is_decode_error() {
        async fn handler() -> &'static str {
            "not json"
        }

        let base = serve(Router::new().route("/enrich", post(handler))).await;
        let err = client(base, 5).enrich(&record()).await.unwrap_err();
        assert!(matches!(err, EnrichmentError::Decode(_)));
    }

    #[tokio::test]
    async fn test_enrich_returns_fields() {
        async fn handler(Json(body): Json<serde_json::Value>) -> Json<serde_json::Value> {
            assert_eq!(body["serviceId"], 7);
            Json(json!({
                "success": true,
                "data": { "rating": 4.8, "contactInfo": "555-0199" }
            }))
        }

        let base = serve(Router::new().route("/enrich", post(handler))).await;
        let fields = client(base, 5).enrich(&record()).await.unwrap();
        assert_eq!(fields.rating, Some(4.8));
        assert_eq!(fields.contact_info.as_deref(), Some("555-0199"));
    }

    #[tokio::test]
    async fn test_health_check() {
        let base = serve(Router::new().route("/health", get(|| async { "ok" }))).await;
        assert!(client(base, 5).health_check().await);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        assert!(!client(format!("http://{addr}"), 1).health_check().await);
    }

    #[tokio::test]
    async fn test_disabled_client() {
        let client = EnrichmentClient::new(RemoteConfig {
            enabled: false,
            ..RemoteConfig::default()
        });
        assert!(matches!(
            client.search("plumber", None).await,
            Err(EnrichmentError::Disabled)
        ));
        assert!(!client.health_check().await);
    }

    #[test]
    fn test_backoff_doubles() {
        let client = EnrichmentClient::new(RemoteConfig {
            backoff_base_ms: 1000,
            ..RemoteConfig::default()
        });
        assert_eq!(client.backoff(1), Duration::from_secs(2));
        assert_eq!(client.backoff(2), Duration::from_secs(4));
    }
}
