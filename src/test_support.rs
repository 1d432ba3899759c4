//! Fakes shared by unit tests across modules.

use crate::cache::{CacheClient, MemoryBackend};
use crate::error::{GatewayError, GatewayResult};
use crate::retry::RetryConfig;
use crate::upstream::Upstream;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Canned upstream keyed by exact URL; unknown URLs answer 404
#[derive(Default)]
pub struct FakeUpstream {
    responses: Mutex<HashMap<String, GatewayResult<Value>>>,
    calls: Mutex<Vec<(String, Vec<(String, String)>)>>,
}

impl FakeUpstream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, url: &str, body: Value) -> Self {
        self.responses.lock().unwrap().insert(url.to_string(), Ok(body));
        self
    }

    pub fn fail(self, url: &str, error: GatewayError) -> Self {
        self.responses.lock().unwrap().insert(url.to_string(), Err(error));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls_to(&self, url: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|(u, _)| u == url).count()
    }

    /// Query pairs of the most recent call to `url`
    pub fn last_query_to(&self, url: &str) -> Option<Vec<(String, String)>> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(u, _)| u == url)
            .map(|(_, q)| q.clone())
    }
}

#[async_trait]
impl Upstream for FakeUpstream {
    async fn fetch(&self, url: &str, query: &[(String, String)]) -> GatewayResult<Value> {
        self.calls.lock().unwrap().push((url.to_string(), query.to_vec()));
        let response = self.responses.lock().unwrap().get(url).cloned();
        response.unwrap_or_else(|| {
            Err(GatewayError::UpstreamStatus {
                status: 404,
                message: format!("no canned response for {}", url),
            })
        })
    }
}

pub fn fast_retry() -> RetryConfig {
    RetryConfig {
        max_retries: 2,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(2),
        jitter_factor: 0.0,
    }
}

/// A connected-by-construction cache client over a fresh memory backend
pub fn memory_cache() -> (Arc<MemoryBackend>, Arc<CacheClient>) {
    let backend = Arc::new(MemoryBackend::new());
    let client = Arc::new(CacheClient::new(backend.clone(), fast_retry()));
    (backend, client)
}
