//! Cache warm-up
//!
//! Walks every page of each configured collection, caches the union of the pages
//! under the collection's raw key and every record under its own `url`. Record
//! writes run concurrently behind a semaphore and are retried with backoff.

use crate::cache::{keys, CacheClient, CachePayload};
use crate::config::WarmupConfig;
use crate::error::{GatewayError, GatewayResult};
use crate::observability::Metrics;
use crate::retry::{RetryConfig, RetryExecutor};
use crate::types::{Endpoint, EndpointWarmup, FailedEndpoint, Record, WarmupReport, WarmupStatus};
use crate::upstream::{collection_url, Page, Upstream};
use futures::future::join_all;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};


/// Upper bound on pages followed for one collection
const MAX_PAGES: usize = 100;

/// Proactively populates the cache from the upstream catalog
pub struct WarmupOrchestrator {
    cache: Arc<CacheClient>,
    upstream: Arc<dyn Upstream>,
    base_url: String,
    endpoints: Vec<Endpoint>,
    page_delay: Duration,
    ttl_secs: u64,
    limiter: Arc<Semaphore>,
    retry: RetryExecutor,
    metrics: Option<Arc<Metrics>>,
}

/// Outcome of caching the records of one collection
struct ItemOutcome {
    cached: usize,
    failed: usize,
}

impl WarmupOrchestrator {
    pub fn new(
        cache: Arc<CacheClient>,
        upstream: Arc<dyn Upstream>,
        base_url: impl Into<String>,
        config: &WarmupConfig,
        ttl_secs: u64,
    ) -> Self {
        let retry = RetryConfig {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.retry_base_ms),
            max_delay: Duration::from_millis(config.retry_max_ms),
            ..Default::default()
        };

        Self {
            cache,
            upstream,
            base_url: base_url.into(),
            endpoints: config.endpoints.clone(),
            page_delay: Duration::from_millis(config.page_delay_ms),
            ttl_secs,
            limiter: Arc::new(Semaphore::new(config.concurrency.max(1))),
            retry: RetryExecutor::new(retry),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }

    /// Warm every configured collection; never fails, the report carries the outcome
    #[instrument(skip_all, fields(endpoints = self.endpoints.len()))]
    pub async fn warm_all(&self) -> WarmupReport {
        let started = Instant::now();

        if !self.cache.ping().await {
            error!("Cache warm-up aborted: cache is unreachable");
            self.record_run(WarmupStatus::Error);
            return WarmupReport::error("cache connection failed");
        }

        info!("Starting cache warm-up for {} endpoints", self.endpoints.len());
        let mut endpoints = BTreeMap::new();
        let mut failed_endpoints = Vec::new();

        for &endpoint in &self.endpoints {
            match self.warm_endpoint(endpoint).await {
                Ok(counts) => {
                    endpoints.insert(endpoint, counts);
                }
                Err(e) => {
                    warn!(endpoint = %endpoint, "Warm-up failed for endpoint: {}", e);
                    endpoints.insert(endpoint, EndpointWarmup::default());
                    failed_endpoints.push(FailedEndpoint {
                        endpoint,
                        error: e.to_string(),
                    });
                }
            }
        }

        let total_items = endpoints.values().map(|c| c.fetched).sum();
        let cached_items = endpoints.values().map(|c| c.cached).sum();
        let item_failures: usize = endpoints.values().map(|c| c.failed).sum();

        let (status, message) = if failed_endpoints.is_empty() && item_failures == 0 {
            (WarmupStatus::Success, format!("Cached {} items", cached_items))
        } else {
            (
                WarmupStatus::Partial,
                format!(
                    "Cached {} of {} items; {} endpoints failed",
                    cached_items,
                    total_items,
                    failed_endpoints.len()
                ),
            )
        };

        self.record_run(status);
        info!(
            status = status.as_str(),
            cached_items, total_items, "Cache warm-up finished"
        );

        WarmupReport {
            status,
            message,
            cached_items,
            total_items,
            endpoints,
            failed_endpoints,
            duration_ms: started.elapsed().as_millis() as u64,
        }
    }

    /// Warm one collection: all pages, the page union, then each record
    #[instrument(skip_all, fields(endpoint = %endpoint))]
    pub async fn warm_endpoint(&self, endpoint: Endpoint) -> GatewayResult<EndpointWarmup> {
        let (items, pages) = self.fetch_all_pages(endpoint).await?;
        let fetched = items.len();
        debug!(pages, fetched, "collection fetched");

        let union: Vec<Value> = items.iter().cloned().map(Value::Object).collect();
        let raw_key = keys::raw_key(endpoint, None, None);
        self.write_with_retry(&raw_key, CachePayload::Json(Value::Array(union)))
            .await
            .map_err(|e| GatewayError::Cache(format!("Failed to cache {} collection: {}", endpoint, e)))?;

        let outcome = self.cache_items(items).await;
        info!(
            pages,
            fetched,
            cached = outcome.cached,
            failed = outcome.failed,
            "Endpoint warmed"
        );

        Ok(EndpointWarmup {
            pages,
            fetched,
            cached: outcome.cached,
            failed: outcome.failed,
        })
    }

    async fn fetch_all_pages(&self, endpoint: Endpoint) -> GatewayResult<(Vec<Record>, usize)> {
        let mut url = collection_url(&self.base_url, endpoint);
        let mut seen = HashSet::new();
        let mut items = Vec::new();
        let mut pages = 0;

        loop {
            seen.insert(url.clone());
            let body = self.retry.execute(|| self.upstream.fetch(&url, &[])).await?;
            let page = Page::from_value(body)?;
            pages += 1;
            items.extend(page.items);

            match page.next {
                None => break,
                Some(next) if seen.contains(&next) => {
                    warn!(next = %next, "Pagination loops back, stopping");
                    break;
                }
                Some(_) if pages >= MAX_PAGES => {
                    warn!(pages, "Pagination limit reached, stopping");
                    break;
                }
                Some(next) => {
                    sleep(self.page_delay).await;
                    url = next;
                }
            }
        }

        Ok((items, pages))
    }

    async fn cache_items(&self, items: Vec<Record>) -> ItemOutcome {
        let writes = items.into_iter().map(|item| self.cache_item(item));
        let results = join_all(writes).await;

        let cached = results.iter().filter(|ok| **ok).count();
        ItemOutcome {
            cached,
            failed: results.len() - cached,
        }
    }

    async fn cache_item(&self, item: Record) -> bool {
        let url = match item.get("url").and_then(Value::as_str) {
            Some(url) if !url.is_empty() => url.to_string(),
            _ => {
                debug!("Record has no url, not cached");
                self.record_item("skipped");
                return false;
            }
        };

        let _permit = match self.limiter.acquire().await {
            Ok(permit) => permit,
            Err(e) => {
                warn!("Warm-up limiter closed: {}", e);
                self.record_item("failed");
                return false;
            }
        };

        let key = keys::resource_key(&url);
        match self.write_with_retry(&key, CachePayload::Json(Value::Object(item))).await {
            Ok(()) => {
                self.record_item("cached");
                true
            }
            Err(e) => {
                warn!(url = %url, "Failed to cache record: {}", e);
                self.record_item("failed");
                false
            }
        }
    }

    async fn write_with_retry(&self, key: &str, payload: CachePayload) -> GatewayResult<()> {
        self.retry
            .execute(|| self.cache.try_set(key, payload.clone(), self.ttl_secs))
            .await
    }

    fn record_item(&self, outcome: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.warmup_items_total.with_label_values(&[outcome]).inc();
        }
    }

    fn record_run(&self, status: WarmupStatus) {
        if let Some(metrics) = &self.metrics {
            metrics.warmup_runs_total.with_label_values(&[status.as_str()]).inc();
        }
    }
}
