//! Reference resolution
//!
//! Catalog records link to each other by URL. `NameResolver` turns those URLs
//! into display names through a two-tier cache, and `resolve_fields` rewrites
//! the reference fields of a record in place.

pub mod fields;
pub mod names;

#[cfg(test)]
mod tests;

pub use fields::{resolve_fields, resolve_records};
pub use names::NameResolver;

use async_trait::async_trait;

/// Maps reference URLs to display names
#[async_trait]
pub trait NameLookup: Send + Sync {
    /// One entry per input URL, in input order; `None` where resolution failed
    async fn resolve_names(&self, urls: &[String]) -> Vec<Option<String>>;
}
