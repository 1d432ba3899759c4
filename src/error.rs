use thiserror::Error;

/// Main error type for the gateway
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// Invalid request parameters
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Missing or rejected bearer token
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Unknown endpoint or resource
    #[error("Not found: {0}")]
    NotFound(String),

    /// Upstream answered with a non-2xx status
    #[error("Resource fetch failed with status {status}: {message}")]
    UpstreamStatus { status: u16, message: String },

    /// Upstream could not be reached
    #[error("Upstream transport error: {0}")]
    UpstreamTransport(String),

    /// Request timeout
    #[error("Request timeout")]
    Timeout,

    /// Cache could not be connected after exhausting retries
    #[error("Cache connection failed: {0}")]
    CacheConnection(String),

    /// Cache operation error
    #[error("Cache error: {0}")]
    Cache(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Check if error originates from the cache tier
    pub fn is_cache_error(&self) -> bool {
        matches!(self, GatewayError::Cache(_) | GatewayError::CacheConnection(_))
    }

    /// Check if error originates from the upstream catalog
    pub fn is_upstream_error(&self) -> bool {
        matches!(
            self,
            GatewayError::UpstreamStatus { .. } | GatewayError::UpstreamTransport(_) | GatewayError::Timeout
        )
    }

    /// Whether a retry loop should try the operation again
    pub fn is_retryable(&self) -> bool {
        match self {
            GatewayError::Cache(_) => true,
            GatewayError::CacheConnection(_) => true,
            GatewayError::UpstreamTransport(_) => true,
            GatewayError::Timeout => true,
            GatewayError::Internal(_) => true,
            GatewayError::UpstreamStatus { status, .. } => *status >= 500 || *status == 429,

            GatewayError::InvalidRequest(_) => false,
            GatewayError::Unauthorized(_) => false,
            GatewayError::NotFound(_) => false,
            GatewayError::Serialization(_) => false,
            GatewayError::ConfigError(_) => false,
        }
    }

    /// Get HTTP status code for the error
    pub fn status_code(&self) -> u16 {
        match self {
            GatewayError::InvalidRequest(_) => 400,
            GatewayError::Unauthorized(_) => 401,
            GatewayError::NotFound(_) => 404,
            GatewayError::UpstreamStatus { status, .. } => *status,
            GatewayError::UpstreamTransport(_) => 502,
            GatewayError::Timeout => 504,
            GatewayError::CacheConnection(_) => 503,
            GatewayError::Cache(_) => 500,
            GatewayError::Serialization(_) => 500,
            GatewayError::ConfigError(_) => 500,
            GatewayError::Internal(_) => 500,
        }
    }

    /// Short machine-readable name, used as a log field
    pub fn error_type(&self) -> &'static str {
        match self {
            GatewayError::InvalidRequest(_) => "invalid_request",
            GatewayError::Unauthorized(_) => "unauthorized",
            GatewayError::NotFound(_) => "not_found",
            GatewayError::UpstreamStatus { .. } => "upstream_status",
            GatewayError::UpstreamTransport(_) => "upstream_transport",
            GatewayError::Timeout => "timeout",
            GatewayError::CacheConnection(_) => "cache_connection",
            GatewayError::Cache(_) => "cache",
            GatewayError::Serialization(_) => "serialization",
            GatewayError::ConfigError(_) => "config",
            GatewayError::Internal(_) => "internal",
        }
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        GatewayError::Serialization(err.to_string())
    }
}

/// Result type alias for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;
