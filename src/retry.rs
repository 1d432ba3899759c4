//! Retry logic with exponential backoff
//!
//! Used for cache connection setup and for warm-up writes. Request-serving paths
//! never retry: an upstream failure there is returned to the caller as-is.

use crate::error::{GatewayError, GatewayResult};
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Retry configuration
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts after the first try
    pub max_retries: u32,
    /// Base delay for exponential backoff
    pub base_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Jitter factor (0.0 to 1.0) to add randomness
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(100), // 100ms, 200ms, 400ms
            max_delay: Duration::from_millis(2000),
            jitter_factor: 0.1,
        }
    }
}

impl RetryConfig {
    /// Total attempts expressed as a retry config: `attempts` tries in all
    pub fn with_attempts(attempts: u32) -> Self {
        Self {
            max_retries: attempts.saturating_sub(1),
            ..Default::default()
        }
    }
}

/// Executes fallible async operations under a retry policy
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    config: RetryConfig,
}

impl RetryExecutor {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Execute an operation with retry logic
    pub async fn execute<F, Fut, T>(&self, operation: F) -> GatewayResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = GatewayResult<T>>,
    {
        let config = &self.config;
        let mut last_error = None;

        for attempt in 0..=config.max_retries {
            match operation().await {
                Ok(result) => {
                    if attempt > 0 {
                        debug!("Operation succeeded after {} retries", attempt);
                    }
                    return Ok(result);
                }
                Err(error) => {
                    if !error.is_retryable() {
                        debug!("Not retrying error: {}", error);
                        return Err(error);
                    }

                    if attempt < config.max_retries {
                        let delay = self.calculate_delay(attempt);
                        warn!(
                            "Operation failed (attempt {}/{}), retrying in {:?}: {}",
                            attempt + 1,
                            config.max_retries + 1,
                            delay,
                            error
                        );
                        sleep(delay).await;
                    } else {
                        warn!("Operation failed after {} attempts: {}", config.max_retries + 1, error);
                    }
                    last_error = Some(error);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| GatewayError::Internal("Retry logic error: no attempts made".to_string())))
    }

    /// Exponential backoff delay with jitter
    fn calculate_delay(&self, attempt: u32) -> Duration {
        let config = &self.config;
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        let exponential = (config.base_delay.as_millis() as u64).saturating_mul(factor);
        let capped = std::cmp::min(Duration::from_millis(exponential), config.max_delay);

        if config.jitter_factor > 0.0 {
            let jitter_range = (capped.as_millis() as f64 * config.jitter_factor) as u64;
            let jitter = rand::thread_rng().gen_range(0..=jitter_range);
            capped + Duration::from_millis(jitter)
        } else {
            capped
        }
    }
}
