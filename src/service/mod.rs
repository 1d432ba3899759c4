//! Read-through resource service
//!
//! Serves catalog listings and records from a processed cache tier, falling back
//! to a raw tier and finally the upstream catalog. Fresh results are sorted,
//! reference fields are rewritten to names, and both tiers are populated.

use crate::cache::{keys, CacheClient};
use crate::config::CacheConfig;
use crate::error::GatewayResult;
use crate::observability::Metrics;
use crate::resolve::{resolve_fields, resolve_records, NameLookup};
use crate::sorting::sort_records;
use crate::types::{Endpoint, Filters, SortOrder};
use crate::upstream::{collection_url, item_url, Page, Upstream};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, info, instrument};

#[cfg(test)]
mod tests;

/// Cache-aware access to the upstream catalog
pub struct ResourceService {
    cache: Arc<CacheClient>,
    upstream: Arc<dyn Upstream>,
    names: Arc<dyn NameLookup>,
    base_url: String,
    raw_ttl_secs: u64,
    processed_ttl_secs: u64,
    metrics: Option<Arc<Metrics>>,
}

impl ResourceService {
    pub fn new(
        cache: Arc<CacheClient>,
        upstream: Arc<dyn Upstream>,
        names: Arc<dyn NameLookup>,
        base_url: impl Into<String>,
        ttls: &CacheConfig,
    ) -> Self {
        Self {
            cache,
            upstream,
            names,
            base_url: base_url.into(),
            raw_ttl_secs: ttls.raw_ttl_secs,
            processed_ttl_secs: ttls.processed_ttl_secs,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Reference fields resolved for records of `endpoint`
    pub fn endpoint_fields(&self, endpoint: Endpoint) -> &'static [&'static str] {
        endpoint.reference_fields()
    }

    /// List a collection, optionally filtered and sorted
    #[instrument(skip_all, fields(endpoint = %endpoint, sort_by = ?sort_by, order = order.as_str()))]
    pub async fn list_resources(
        &self,
        endpoint: Endpoint,
        filters: Option<&Filters>,
        sort_by: Option<&str>,
        order: SortOrder,
    ) -> GatewayResult<Value> {
        let processed_key = keys::processed_list_key(endpoint, filters, sort_by, order);
        if let Some(cached) = self.lookup("processed", &processed_key).await {
            return Ok(cached);
        }

        let raw_key = keys::raw_key(endpoint, None, filters);
        let query = filters.map(Filters::to_query_pairs).unwrap_or_default();
        let raw = self
            .read_through(&raw_key, &collection_url(&self.base_url, endpoint), &query)
            .await?;

        let processed = self.process(endpoint, raw, sort_by, order).await?;
        self.cache.set(&processed_key, processed.clone(), self.processed_ttl_secs).await;
        Ok(processed)
    }

    /// Fetch a single record by id
    #[instrument(skip_all, fields(endpoint = %endpoint, id = %id))]
    pub async fn get_resource(&self, endpoint: Endpoint, id: &str) -> GatewayResult<Value> {
        let processed_key = keys::processed_item_key(endpoint, id);
        if let Some(cached) = self.lookup("processed", &processed_key).await {
            return Ok(cached);
        }

        let raw_key = keys::raw_key(endpoint, Some(id), None);
        let raw = self
            .read_through(&raw_key, &item_url(&self.base_url, endpoint, id), &[])
            .await?;

        let processed = match raw {
            Value::Object(record) => {
                Value::Object(resolve_fields(record, self.endpoint_fields(endpoint), self.names.as_ref()).await)
            }
            other => other,
        };
        self.cache.set(&processed_key, processed.clone(), self.processed_ttl_secs).await;
        Ok(processed)
    }

    async fn lookup(&self, tier: &str, key: &str) -> Option<Value> {
        let cached = self.cache.get_json(key).await;
        if let Some(metrics) = &self.metrics {
            metrics.record_cache_lookup(tier, cached.is_some());
        }
        cached
    }

    /// Raw tier first, then upstream; a fresh body is stored in the raw tier
    async fn read_through(&self, key: &str, url: &str, query: &[(String, String)]) -> GatewayResult<Value> {
        if let Some(cached) = self.lookup("raw", key).await {
            debug!(key, "serving from raw tier");
            return Ok(cached);
        }

        let body = self.upstream.fetch(url, query).await.map_err(|e| {
            error!(url, "Resource fetch failed: {}", e);
            e
        })?;
        self.cache.set(key, body.clone(), self.raw_ttl_secs).await;
        info!(url, "fetched from upstream");
        Ok(body)
    }

    /// Sort and resolve listings; resolve single records
    async fn process(
        &self,
        endpoint: Endpoint,
        raw: Value,
        sort_by: Option<&str>,
        order: SortOrder,
    ) -> GatewayResult<Value> {
        let fields = self.endpoint_fields(endpoint);
        let is_listing = match &raw {
            Value::Array(_) => true,
            Value::Object(map) => map.contains_key("results"),
            _ => false,
        };

        if is_listing {
            let page = Page::from_value(raw)?;
            let sorted = sort_records(page.items, sort_by, order);
            let resolved = resolve_records(sorted, fields, self.names.as_ref()).await;
            return Ok(Value::Array(resolved.into_iter().map(Value::Object).collect()));
        }

        match raw {
            Value::Object(record) => Ok(Value::Object(resolve_fields(record, fields, self.names.as_ref()).await)),
            other => Ok(other),
        }
    }
}
