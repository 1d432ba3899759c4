use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{GatewayError, GatewayResult};
use crate::types::Endpoint;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,
    /// Redis configuration
    pub redis: RedisConfig,
    /// Upstream catalog configuration
    pub upstream: UpstreamConfig,
    /// Cache tier TTLs and resolver settings
    pub cache: CacheConfig,
    /// Warm-up configuration
    pub warmup: WarmupConfig,
    /// Bearer token configuration
    pub auth: AuthConfig,
    /// Log output format
    pub log_format: LogFormat,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Request timeout in milliseconds
    pub request_timeout_ms: u64,
    /// Maximum request body size in bytes
    pub max_request_size: usize,
}

/// Redis configuration
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Redis connection URL, `memory://` selects the in-process backend
    pub url: String,
    /// Maximum Redis connections
    pub max_connections: u32,
    /// Connection and command timeout in seconds
    pub connection_timeout_secs: u64,
    /// Connection attempts before `connect` gives up
    pub connect_attempts: u32,
}

/// Upstream catalog configuration
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    /// Base URL, without trailing slash
    pub base_url: String,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// TTL of raw upstream payloads
    pub raw_ttl_secs: u64,
    /// TTL of sorted and resolved payloads
    pub processed_ttl_secs: u64,
    /// TTL of `name:{url}` entries and raw resources fetched by the resolver
    pub name_ttl_secs: u64,
    /// Reference URLs resolved concurrently per batch
    pub resolve_concurrency: usize,
}

/// Warm-up configuration
#[derive(Debug, Clone)]
pub struct WarmupConfig {
    pub endpoints: Vec<Endpoint>,
    /// Concurrent item writes
    pub concurrency: usize,
    /// Delay between page requests
    pub page_delay_ms: u64,
    pub max_retries: u32,
    pub retry_base_ms: u64,
    pub retry_max_ms: u64,
    /// Run a warm-up in the background at startup
    pub on_startup: bool,
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// HS256 signing secret
    pub jwt_secret: String,
    /// Token lifetime in seconds
    pub token_ttl_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl FromStr for LogFormat {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" | "text" => Ok(LogFormat::Pretty),
            other => Err(GatewayError::ConfigError(format!("Invalid LOG_FORMAT: {}", other))),
        }
    }
}

/// Read an environment variable, falling back to `default` when unset
fn var_or<T>(name: &str, default: &str) -> GatewayResult<T>
where
    T: FromStr,
    T::Err: Display,
{
    env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .map_err(|e| GatewayError::ConfigError(format!("Invalid {}: {}", name, e)))
}

fn parse_endpoints(raw: &str) -> GatewayResult<Vec<Endpoint>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<Endpoint>()
                .map_err(|_| GatewayError::ConfigError(format!("Invalid WARMUP_ENDPOINTS entry: {}", s)))
        })
        .collect()
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> GatewayResult<Self> {
        // Load .env file if it exists
        if let Err(e) = dotenvy::dotenv() {
            tracing::warn!("Could not load .env file: {}", e);
        }

        let config = Config {
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: var_or("SERVER_PORT", "8080")?,
                request_timeout_ms: var_or("REQUEST_TIMEOUT_MS", "30000")?,
                max_request_size: var_or("MAX_REQUEST_SIZE", "16384")?,
            },
            redis: RedisConfig {
                url: env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string()),
                max_connections: var_or("REDIS_MAX_CONNECTIONS", "10")?,
                connection_timeout_secs: var_or("REDIS_CONNECTION_TIMEOUT_SECS", "2")?,
                connect_attempts: var_or("REDIS_CONNECT_ATTEMPTS", "3")?,
            },
            upstream: UpstreamConfig {
                base_url: env::var("SWAPI_BASE_URL")
                    .unwrap_or_else(|_| "https://swapi.info/api".to_string())
                    .trim_end_matches('/')
                    .to_string(),
                timeout_secs: var_or("UPSTREAM_TIMEOUT_SECS", "10")?,
            },
            cache: CacheConfig {
                raw_ttl_secs: var_or("CACHE_RAW_TTL_SECS", "3600")?,
                processed_ttl_secs: var_or("CACHE_PROCESSED_TTL_SECS", "1800")?,
                name_ttl_secs: var_or("CACHE_NAME_TTL_SECS", "3600")?,
                resolve_concurrency: var_or("RESOLVE_CONCURRENCY", "8")?,
            },
            warmup: WarmupConfig {
                endpoints: match env::var("WARMUP_ENDPOINTS") {
                    Ok(raw) => parse_endpoints(&raw)?,
                    Err(_) => Endpoint::ALL.to_vec(),
                },
                concurrency: var_or("WARMUP_CONCURRENCY", "5")?,
                page_delay_ms: var_or("WARMUP_PAGE_DELAY_MS", "500")?,
                max_retries: var_or("WARMUP_MAX_RETRIES", "3")?,
                retry_base_ms: var_or("WARMUP_RETRY_BASE_MS", "100")?,
                retry_max_ms: var_or("WARMUP_RETRY_MAX_MS", "2000")?,
                on_startup: var_or("WARMUP_ON_STARTUP", "true")?,
            },
            auth: AuthConfig {
                jwt_secret: env::var("JWT_SECRET_KEY")
                    .map_err(|_| GatewayError::ConfigError("JWT_SECRET_KEY is required".to_string()))?,
                token_ttl_secs: var_or("JWT_TTL_SECS", "3600")?,
            },
            log_format: var_or("LOG_FORMAT", "json")?,
        };

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> GatewayResult<()> {
        if self.server.port == 0 {
            return Err(GatewayError::ConfigError("Server port cannot be 0".to_string()));
        }

        if self.server.request_timeout_ms == 0 {
            return Err(GatewayError::ConfigError("Request timeout must be greater than 0".to_string()));
        }

        if !self.redis.url.starts_with("redis://")
            && !self.redis.url.starts_with("rediss://")
            && self.redis.url != "memory://"
        {
            return Err(GatewayError::ConfigError(
                "REDIS_URL must start with redis:// or rediss://, or be memory://".to_string(),
            ));
        }

        if self.redis.connect_attempts == 0 {
            return Err(GatewayError::ConfigError("REDIS_CONNECT_ATTEMPTS must be greater than 0".to_string()));
        }

        if !self.upstream.base_url.starts_with("http://") && !self.upstream.base_url.starts_with("https://") {
            return Err(GatewayError::ConfigError("SWAPI_BASE_URL must be an http(s) URL".to_string()));
        }

        if self.upstream.timeout_secs == 0 {
            return Err(GatewayError::ConfigError("Upstream timeout must be greater than 0".to_string()));
        }

        if self.cache.resolve_concurrency == 0 || self.warmup.concurrency == 0 {
            return Err(GatewayError::ConfigError("Concurrency limits must be greater than 0".to_string()));
        }

        if self.auth.jwt_secret.is_empty() {
            return Err(GatewayError::ConfigError("JWT_SECRET_KEY cannot be empty".to_string()));
        }

        Ok(())
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream.timeout_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
                request_timeout_ms: 30_000,
                max_request_size: 16 * 1024,
            },
            redis: RedisConfig {
                url: "redis://localhost:6379".to_string(),
                max_connections: 10,
                connection_timeout_secs: 2,
                connect_attempts: 3,
            },
            upstream: UpstreamConfig {
                base_url: "https://swapi.info/api".to_string(),
                timeout_secs: 10,
            },
            cache: CacheConfig {
                raw_ttl_secs: 3600,
                processed_ttl_secs: 1800,
                name_ttl_secs: 3600,
                resolve_concurrency: 8,
            },
            warmup: WarmupConfig {
                endpoints: Endpoint::ALL.to_vec(),
                concurrency: 5,
                page_delay_ms: 500,
                max_retries: 3,
                retry_base_ms: 100,
                retry_max_ms: 2000,
                on_startup: true,
            },
            auth: AuthConfig {
                jwt_secret: "change-me".to_string(),
                token_ttl_secs: 3600,
            },
            log_format: LogFormat::Json,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();

        config.redis.url = "http://localhost:6379".to_string();
        assert!(config.validate().is_err());

        config.redis.url = "memory://".to_string();
        assert!(config.validate().is_ok());

        config.upstream.base_url = "ftp://swapi".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.warmup.concurrency = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.auth.jwt_secret.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_ttl_defaults() {
        let config = Config::default();
        assert_eq!(config.cache.raw_ttl_secs, 3600);
        assert_eq!(config.cache.processed_ttl_secs, 1800);
        assert_eq!(config.warmup.concurrency, 5);
        assert_eq!(config.warmup.endpoints.len(), 6);
    }

    #[test]
    fn test_parse_endpoints() {
        let endpoints = parse_endpoints("people, films,,planets").unwrap();
        assert_eq!(endpoints, vec![Endpoint::People, Endpoint::Films, Endpoint::Planets]);
        assert!(parse_endpoints("people,droids").is_err());
    }

    #[test]
    fn test_log_format_parsing() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("pretty".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert!("xml".parse::<LogFormat>().is_err());
    }
}
