use prometheus::{Encoder, Histogram, HistogramOpts, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::Arc;
use crate::error::{GatewayError, GatewayResult};

/// Prometheus metrics registry and collectors
#[derive(Clone)]
pub struct MetricsRegistry {
    registry: Arc<Registry>,
    pub metrics: Arc<Metrics>,
}

/// All application metrics
pub struct Metrics {
    // Cache metrics, labelled by tier (raw, processed, name, resource)
    pub cache_hits_total: IntCounterVec,
    pub cache_misses_total: IntCounterVec,

    // Upstream metrics
    pub upstream_requests_total: IntCounterVec,
    pub upstream_request_duration_seconds: Histogram,

    // Warm-up metrics
    pub warmup_items_total: IntCounterVec,
    pub warmup_runs_total: IntCounterVec,

    // HTTP metrics
    pub http_requests_total: IntCounterVec,
}

impl MetricsRegistry {
    /// Create a new metrics registry with all collectors
    pub fn new() -> GatewayResult<Self> {
        let registry = Arc::new(Registry::new());
        let metrics = Arc::new(Metrics::new(&registry)?);

        Ok(Self { registry, metrics })
    }

    /// Get metrics in Prometheus text format
    pub fn gather(&self) -> GatewayResult<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();

        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|e| GatewayError::Internal(format!("Failed to encode metrics: {}", e)))?;

        String::from_utf8(buffer)
            .map_err(|e| GatewayError::Internal(format!("Failed to convert metrics to string: {}", e)))
    }
}

fn counter_vec(registry: &Registry, name: &str, help: &str, labels: &[&str]) -> GatewayResult<IntCounterVec> {
    let counter = IntCounterVec::new(Opts::new(name, help), labels)
        .map_err(|e| GatewayError::Internal(format!("Failed to create {} metric: {}", name, e)))?;
    registry
        .register(Box::new(counter.clone()))
        .map_err(|e| GatewayError::Internal(format!("Failed to register {}: {}", name, e)))?;
    Ok(counter)
}

impl Metrics {
    fn new(registry: &Registry) -> GatewayResult<Self> {
        let cache_hits_total = counter_vec(registry, "cache_hits_total", "Cache hits by tier", &["tier"])?;
        let cache_misses_total = counter_vec(registry, "cache_misses_total", "Cache misses by tier", &["tier"])?;

        let upstream_requests_total = counter_vec(
            registry,
            "upstream_requests_total",
            "Requests sent to the upstream catalog by outcome",
            &["outcome"],
        )?;

        let upstream_request_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "upstream_request_duration_seconds",
                "Duration of upstream catalog requests in seconds",
            )
            .buckets(vec![0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        )
        .map_err(|e| GatewayError::Internal(format!("Failed to create upstream_request_duration_seconds metric: {}", e)))?;
        registry
            .register(Box::new(upstream_request_duration_seconds.clone()))
            .map_err(|e| GatewayError::Internal(format!("Failed to register upstream_request_duration_seconds: {}", e)))?;

        let warmup_items_total = counter_vec(
            registry,
            "warmup_items_total",
            "Items processed by cache warm-up by outcome",
            &["outcome"],
        )?;
        let warmup_runs_total = counter_vec(registry, "warmup_runs_total", "Warm-up runs by status", &["status"])?;
        let http_requests_total = counter_vec(registry, "http_requests_total", "HTTP requests by status", &["status"])?;

        Ok(Self {
            cache_hits_total,
            cache_misses_total,
            upstream_requests_total,
            upstream_request_duration_seconds,
            warmup_items_total,
            warmup_runs_total,
            http_requests_total,
        })
    }

    /// Record a lookup against one cache tier
    pub fn record_cache_lookup(&self, tier: &str, hit: bool) {
        if hit {
            self.cache_hits_total.with_label_values(&[tier]).inc();
        } else {
            self.cache_misses_total.with_label_values(&[tier]).inc();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gather_contains_recorded_metrics() {
        let registry = MetricsRegistry::new().unwrap();
        registry.metrics.record_cache_lookup("processed", true);
        registry.metrics.record_cache_lookup("raw", false);
        registry.metrics.upstream_requests_total.with_label_values(&["ok"]).inc();
        registry.metrics.upstream_request_duration_seconds.observe(0.12);
        registry.metrics.warmup_runs_total.with_label_values(&["success"]).inc();

        let output = registry.gather().unwrap();
        assert!(output.contains(r#"cache_hits_total{tier="processed"} 1"#));
        assert!(output.contains(r#"cache_misses_total{tier="raw"} 1"#));
        assert!(output.contains(r#"upstream_requests_total{outcome="ok"} 1"#));
        assert!(output.contains("upstream_request_duration_seconds_bucket"));
        assert!(output.contains(r#"warmup_runs_total{status="success"} 1"#));
    }

    #[test]
    fn test_registries_are_independent() {
        let a = MetricsRegistry::new().unwrap();
        let b = MetricsRegistry::new().unwrap();
        a.metrics.http_requests_total.with_label_values(&["200"]).inc();

        assert!(!b.gather().unwrap().contains(r#"http_requests_total{status="200"}"#));
    }
}
