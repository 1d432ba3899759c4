//! Cache tier
//!
//! `CacheClient` is the only type the rest of the crate talks to. Every method
//! returns a plain `Option`/`bool`: backend failures are logged and counted, never
//! propagated, so a cache outage degrades request serving to always-miss.
//! Only `connect` reports failure, after exhausting its retry budget.

pub mod keys;
pub mod memory;
pub mod redis_client;


pub use memory::MemoryBackend;
pub use redis_client::RedisBackend;

use crate::config::RedisConfig;
use crate::error::{GatewayError, GatewayResult};
use crate::retry::{RetryConfig, RetryExecutor};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Key-value store with per-key expiry
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn connect(&self) -> GatewayResult<()>;
    async fn disconnect(&self) -> GatewayResult<()>;
    async fn get(&self, key: &str) -> GatewayResult<Option<String>>;
    /// Store `value`; a `ttl_secs` of 0 means no expiry
    async fn set(&self, key: &str, value: String, ttl_secs: u64) -> GatewayResult<()>;
    async fn exists(&self, key: &str) -> GatewayResult<bool>;
    async fn ping(&self) -> GatewayResult<()>;
}

/// A value as it crosses the cache boundary
#[derive(Debug, Clone, PartialEq)]
pub enum CachePayload {
    /// Stored verbatim
    Text(String),
    /// Stored as a JSON document
    Json(Value),
}

impl CachePayload {
    fn encode(self) -> GatewayResult<String> {
        match self {
            CachePayload::Text(s) => Ok(s),
            CachePayload::Json(value) => Ok(serde_json::to_string(&value)?),
        }
    }

    /// Decode a stored string: JSON when it parses, raw text otherwise
    fn decode(raw: String) -> Self {
        match serde_json::from_str::<Value>(&raw) {
            Ok(value) => CachePayload::Json(value),
            Err(_) => CachePayload::Text(raw),
        }
    }

    /// The payload as a display string, `None` for null or empty values
    pub fn into_text(self) -> Option<String> {
        let text = match self {
            CachePayload::Text(s) => s,
            CachePayload::Json(Value::String(s)) => s,
            CachePayload::Json(Value::Null) => return None,
            CachePayload::Json(other) => other.to_string(),
        };
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }

    /// The payload as a JSON value; raw text becomes a JSON string
    pub fn into_json(self) -> Value {
        match self {
            CachePayload::Text(s) => Value::String(s),
            CachePayload::Json(value) => value,
        }
    }
}

impl From<Value> for CachePayload {
    fn from(value: Value) -> Self {
        CachePayload::Json(value)
    }
}

impl From<String> for CachePayload {
    fn from(value: String) -> Self {
        CachePayload::Text(value)
    }
}

impl From<&str> for CachePayload {
    fn from(value: &str) -> Self {
        CachePayload::Text(value.to_string())
    }
}

#[derive(Debug, Default)]
struct CacheStatsInternal {
    hits: AtomicU64,
    misses: AtomicU64,
    errors: AtomicU64,
    writes: AtomicU64,
    write_failures: AtomicU64,
}

impl CacheStatsInternal {
    fn to_cache_stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            write_failures: self.write_failures.load(Ordering::Relaxed),
        }
    }
}

/// Cache statistics for monitoring hit/miss ratios
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Failed reads, pings and existence checks
    pub errors: u64,
    pub writes: u64,
    pub write_failures: u64,
}

impl CacheStats {
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Typed, failure-tolerant wrapper over a `CacheBackend`
pub struct CacheClient {
    backend: Arc<dyn CacheBackend>,
    connected: Mutex<bool>,
    retry: RetryExecutor,
    stats: CacheStatsInternal,
}

impl CacheClient {
    pub fn new(backend: Arc<dyn CacheBackend>, retry: RetryConfig) -> Self {
        Self {
            backend,
            connected: Mutex::new(false),
            retry: RetryExecutor::new(retry),
            stats: CacheStatsInternal::default(),
        }
    }

    /// Pick a backend from the configured URL: `memory://` or a Redis URL
    pub fn from_config(config: &RedisConfig) -> GatewayResult<Self> {
        let backend: Arc<dyn CacheBackend> = if config.url == "memory://" {
            info!("Using in-process memory cache backend");
            Arc::new(MemoryBackend::new())
        } else {
            Arc::new(RedisBackend::new(config.clone())?)
        };
        Ok(Self::new(backend, RetryConfig::with_attempts(config.connect_attempts)))
    }

    /// Establish the pooled connection. Repeated calls after success are no-ops.
    pub async fn connect(&self) -> GatewayResult<()> {
        let mut connected = self.connected.lock().await;
        if *connected {
            return Ok(());
        }

        let backend = self.backend.clone();
        self.retry
            .execute(|| {
                let backend = backend.clone();
                async move {
                    backend.connect().await?;
                    backend.ping().await
                }
            })
            .await
            .map_err(|e| GatewayError::CacheConnection(e.to_string()))?;

        *connected = true;
        info!("Cache connection established");
        Ok(())
    }

    /// Release the pooled connection. Safe to call when not connected.
    pub async fn disconnect(&self) {
        let mut connected = self.connected.lock().await;
        if !*connected {
            return;
        }
        if let Err(e) = self.backend.disconnect().await {
            warn!("Cache disconnect failed: {}", e);
        }
        *connected = false;
        info!("Cache connection released");
    }

    pub async fn is_connected(&self) -> bool {
        *self.connected.lock().await
    }

    /// Read and decode a value; `None` on miss or on any backend error
    pub async fn get(&self, key: &str) -> Option<CachePayload> {
        match self.backend.get(key).await {
            Ok(Some(raw)) => {
                self.stats.hits.fetch_add(1, Ordering::Relaxed);
                debug!(key, "cache hit");
                Some(CachePayload::decode(raw))
            }
            Ok(None) => {
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                debug!(key, "cache miss");
                None
            }
            Err(e) => {
                self.stats.errors.fetch_add(1, Ordering::Relaxed);
                warn!(key, "cache read failed, treating as miss: {}", e);
                None
            }
        }
    }

    /// Read a value as JSON
    pub async fn get_json(&self, key: &str) -> Option<Value> {
        self.get(key).await.map(CachePayload::into_json)
    }

    /// Store a value; `false` when the write failed
    pub async fn set(&self, key: &str, value: impl Into<CachePayload>, ttl_secs: u64) -> bool {
        match self.try_set(key, value.into(), ttl_secs).await {
            Ok(()) => true,
            Err(e) => {
                warn!(key, "cache write failed: {}", e);
                false
            }
        }
    }

    /// Store any serializable value as JSON
    pub async fn set_json<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl_secs: u64) -> bool {
        match serde_json::to_value(value) {
            Ok(json) => self.set(key, CachePayload::Json(json), ttl_secs).await,
            Err(e) => {
                self.stats.write_failures.fetch_add(1, Ordering::Relaxed);
                warn!(key, "cache value could not be serialized: {}", e);
                false
            }
        }
    }

    /// Like `set`, but surfaces the failure so callers can retry it
    pub async fn try_set(&self, key: &str, value: CachePayload, ttl_secs: u64) -> GatewayResult<()> {
        let encoded = value.encode();
        let result = match encoded {
            Ok(encoded) => self.backend.set(key, encoded, ttl_secs).await,
            Err(e) => Err(e),
        };
        match &result {
            Ok(()) => self.stats.writes.fetch_add(1, Ordering::Relaxed),
            Err(_) => self.stats.write_failures.fetch_add(1, Ordering::Relaxed),
        };
        result
    }

    pub async fn exists(&self, key: &str) -> bool {
        match self.backend.exists(key).await {
            Ok(found) => found,
            Err(e) => {
                self.stats.errors.fetch_add(1, Ordering::Relaxed);
                warn!(key, "cache exists check failed: {}", e);
                false
            }
        }
    }

    pub async fn ping(&self) -> bool {
        match self.backend.ping().await {
            Ok(()) => true,
            Err(e) => {
                self.stats.errors.fetch_add(1, Ordering::Relaxed);
                warn!("cache ping failed: {}", e);
                false
            }
        }
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.to_cache_stats()
    }
}
