//! Upstream catalog client


use crate::error::{GatewayError, GatewayResult};
use crate::observability::Metrics;
use crate::types::{Endpoint, Record};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Source of catalog JSON documents
#[async_trait]
pub trait Upstream: Send + Sync {
    /// GET `url` with `query` appended; non-2xx answers are errors
    async fn fetch(&self, url: &str, query: &[(String, String)]) -> GatewayResult<Value>;
}

/// `{base}/{endpoint}`
pub fn collection_url(base_url: &str, endpoint: Endpoint) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), endpoint)
}

/// `{base}/{endpoint}/{id}`
pub fn item_url(base_url: &str, endpoint: Endpoint, id: &str) -> String {
    format!("{}/{}/{}", base_url.trim_end_matches('/'), endpoint, id)
}

/// One page of a collection listing
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub items: Vec<Record>,
    pub next: Option<String>,
}

impl Page {
    /// Accepts `{results: [...], next}` or a bare array; non-object items are skipped
    pub fn from_value(value: Value) -> GatewayResult<Self> {
        let (results, next) = match value {
            Value::Array(items) => (items, None),
            Value::Object(mut map) => {
                let next = match map.remove("next") {
                    Some(Value::String(link)) if !link.is_empty() => Some(link),
                    _ => None,
                };
                match map.remove("results") {
                    Some(Value::Array(items)) => (items, next),
                    _ => {
                        return Err(GatewayError::Serialization(
                            "collection response has no results array".to_string(),
                        ))
                    }
                }
            }
            _ => {
                return Err(GatewayError::Serialization(
                    "collection response is neither a list nor an object".to_string(),
                ))
            }
        };

        let items = results
            .into_iter()
            .filter_map(|item| match item {
                Value::Object(record) => Some(record),
                other => {
                    warn!("Skipping non-object collection item: {}", other);
                    None
                }
            })
            .collect();

        Ok(Page { items, next })
    }
}

/// reqwest-backed upstream client
pub struct HttpUpstream {
    client: Client,
    metrics: Option<Arc<Metrics>>,
}

impl HttpUpstream {
    pub fn new(timeout: Duration) -> GatewayResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("swapi-gateway/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| GatewayError::ConfigError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, metrics: None })
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    fn record(&self, outcome: &str, started: Instant) {
        if let Some(metrics) = &self.metrics {
            metrics.upstream_requests_total.with_label_values(&[outcome]).inc();
            metrics
                .upstream_request_duration_seconds
                .observe(started.elapsed().as_secs_f64());
        }
    }
}

#[async_trait]
impl Upstream for HttpUpstream {
    async fn fetch(&self, url: &str, query: &[(String, String)]) -> GatewayResult<Value> {
        let started = Instant::now();
        debug!(url, params = query.len(), "upstream request");

        let response = match self.client.get(url).query(query).send().await {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                self.record("timeout", started);
                warn!(url, "upstream request timed out");
                return Err(GatewayError::Timeout);
            }
            Err(e) => {
                self.record("transport_error", started);
                warn!(url, "upstream request failed: {}", e);
                return Err(GatewayError::UpstreamTransport(e.to_string()));
            }
        };

        let status = response.status();
        if !status.is_success() {
            self.record("http_error", started);
            let body = response.text().await.unwrap_or_default();
            let message = if body.is_empty() {
                status.canonical_reason().unwrap_or("upstream error").to_string()
            } else {
                body.chars().take(200).collect()
            };
            warn!(url, status = status.as_u16(), "upstream returned error status");
            return Err(GatewayError::UpstreamStatus {
                status: status.as_u16(),
                message,
            });
        }

        let value = response.json::<Value>().await.map_err(|e| {
            if e.is_timeout() {
                GatewayError::Timeout
            } else {
                GatewayError::Serialization(format!("Invalid JSON from {}: {}", url, e))
            }
        });
        self.record(if value.is_ok() { "ok" } else { "decode_error" }, started);
        value
    }
}
