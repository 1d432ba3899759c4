use crate::cache::{keys, CacheClient, CachePayload};
use crate::observability::Metrics;
use crate::resolve::NameLookup;
use crate::upstream::Upstream;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// Resolves reference URLs to names: name cache, then raw resource cache, then upstream
pub struct NameResolver {
    cache: Arc<CacheClient>,
    upstream: Arc<dyn Upstream>,
    ttl_secs: u64,
    concurrency: usize,
    metrics: Option<Arc<Metrics>>,
}

impl NameResolver {
    pub fn new(cache: Arc<CacheClient>, upstream: Arc<dyn Upstream>, ttl_secs: u64, concurrency: usize) -> Self {
        Self {
            cache,
            upstream,
            ttl_secs,
            concurrency: concurrency.max(1),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    fn record_lookup(&self, tier: &str, hit: bool) {
        if let Some(metrics) = &self.metrics {
            metrics.record_cache_lookup(tier, hit);
        }
    }

    /// Resolve a single URL; failures yield `None` and are never raised
    pub async fn resolve_one(&self, url: &str) -> Option<String> {
        if !url.starts_with("http") {
            debug!(url, "not a reference URL");
            return None;
        }

        let name_key = keys::name_key(url);

        if let Some(name) = self.cache.get(&name_key).await.and_then(CachePayload::into_text) {
            self.record_lookup("name", true);
            return Some(name);
        }
        self.record_lookup("name", false);

        if let Some(resource) = self.cache.get_json(&keys::resource_key(url)).await {
            self.record_lookup("resource", true);
            let name = extract_name(&resource);
            match &name {
                Some(name) => {
                    self.cache.set(&name_key, Value::String(name.clone()), self.ttl_secs).await;
                }
                None => debug!(url, "cached resource has no name or title"),
            }
            return name;
        }
        self.record_lookup("resource", false);

        match self.upstream.fetch(url, &[]).await {
            Ok(body) => {
                let name = extract_name(&body);
                self.cache.set(&keys::resource_key(url), body, self.ttl_secs).await;
                match &name {
                    Some(name) => {
                        self.cache.set(&name_key, Value::String(name.clone()), self.ttl_secs).await;
                    }
                    None => debug!(url, "fetched resource has no name or title"),
                }
                name
            }
            Err(e) => {
                warn!(url, "reference could not be resolved: {}", e);
                None
            }
        }
    }
}

#[async_trait]
impl NameLookup for NameResolver {
    async fn resolve_names(&self, urls: &[String]) -> Vec<Option<String>> {
        let lookups: Vec<_> = urls.iter().map(|url| self.resolve_one(url)).collect();
        stream::iter(lookups)
            .buffered(self.concurrency)
            .collect()
            .await
    }
}

/// `name`, or `title` for films; empty strings count as missing
pub fn extract_name(resource: &Value) -> Option<String> {
    ["name", "title"]
        .iter()
        .filter_map(|field| resource.get(*field).and_then(Value::as_str))
        .find(|s| !s.is_empty())
        .map(str::to_string)
}
