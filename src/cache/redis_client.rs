use crate::cache::CacheBackend;
use crate::config::RedisConfig;
use crate::error::{GatewayError, GatewayResult};
use async_trait::async_trait;
use fred::{
    clients::RedisPool,
    interfaces::{ClientLike, KeysInterface},
    types::{Builder, Expiration, RedisConfig as FredRedisConfig},
};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, error, info};

/// Redis backend over a fred connection pool
pub struct RedisBackend {
    /// Fred Redis client with connection pooling
    client: RedisPool,
    /// Configuration
    config: RedisConfig,
}

impl RedisBackend {
    /// Build the pool. No connection is opened until `connect`.
    pub fn new(config: RedisConfig) -> GatewayResult<Self> {
        info!("Initializing Redis client with URL: {}", redact_url(&config.url));

        let redis_config = FredRedisConfig::from_url(&config.url)
            .map_err(|e| GatewayError::ConfigError(format!("Invalid Redis URL: {}", e)))?;

        let timeout_secs = config.connection_timeout_secs;
        let client = Builder::from_config(redis_config)
            .with_connection_config(|conn_config| {
                conn_config.connection_timeout = Duration::from_secs(timeout_secs);
            })
            .with_performance_config(|perf_config| {
                perf_config.auto_pipeline = true;
                perf_config.default_command_timeout = Duration::from_secs(timeout_secs);
            })
            .build_pool(config.max_connections.max(1) as usize)
            .map_err(|e| GatewayError::ConfigError(format!("Failed to create Redis pool: {}", e)))?;

        Ok(RedisBackend { client, config })
    }

    fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.config.connection_timeout_secs.max(1))
    }
}

#[async_trait]
impl CacheBackend for RedisBackend {
    async fn connect(&self) -> GatewayResult<()> {
        let _ = self.client.connect();

        match timeout(self.connect_timeout(), self.client.wait_for_connect()).await {
            Ok(Ok(())) => {
                info!("Redis client connected successfully");
                Ok(())
            }
            Ok(Err(e)) => {
                error!("Failed to connect to Redis: {}", e);
                Err(GatewayError::Cache(format!("Failed to connect to Redis: {}", e)))
            }
            Err(_) => {
                error!("Redis connection timed out");
                Err(GatewayError::Cache("Redis connection timed out".to_string()))
            }
        }
    }

    async fn disconnect(&self) -> GatewayResult<()> {
        self.client
            .quit()
            .await
            .map_err(|e| GatewayError::Cache(format!("Failed to close Redis connection: {}", e)))
    }

    async fn get(&self, key: &str) -> GatewayResult<Option<String>> {
        self.client
            .get::<Option<String>, _>(key)
            .await
            .map_err(|e| GatewayError::Cache(format!("GET {} failed: {}", key, e)))
    }

    async fn set(&self, key: &str, value: String, ttl_secs: u64) -> GatewayResult<()> {
        let expiration = if ttl_secs > 0 {
            Some(Expiration::EX(ttl_secs as i64))
        } else {
            None
        };

        debug!("Storing {} ({} bytes, ttl {}s)", key, value.len(), ttl_secs);

        let _: () = self
            .client
            .set(key, value, expiration, None, false)
            .await
            .map_err(|e| GatewayError::Cache(format!("SET {} failed: {}", key, e)))?;
        Ok(())
    }

    async fn exists(&self, key: &str) -> GatewayResult<bool> {
        let count: i64 = self
            .client
            .exists(key)
            .await
            .map_err(|e| GatewayError::Cache(format!("EXISTS {} failed: {}", key, e)))?;
        Ok(count > 0)
    }

    async fn ping(&self) -> GatewayResult<()> {
        match timeout(self.connect_timeout(), self.client.ping::<String>()).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(GatewayError::Cache(format!("Health check failed: {}", e))),
            Err(_) => Err(GatewayError::Cache("Health check timed out".to_string())),
        }
    }
}

/// Strip credentials from a connection URL before logging it
fn redact_url(raw: &str) -> String {
    match url::Url::parse(raw) {
        Ok(mut parsed) if parsed.password().is_some() => {
            let _ = parsed.set_password(Some("****"));
            parsed.to_string()
        }
        Ok(parsed) => parsed.to_string(),
        Err(_) => "<invalid url>".to_string(),
    }
}
