//! Cache key construction for the raw, processed and name tiers.

use crate::types::{Endpoint, Filters, SortOrder};

/// Raw tier: `endpoint[:id][:filters]` holding the unprocessed upstream body
pub fn raw_key(endpoint: Endpoint, id: Option<&str>, filters: Option<&Filters>) -> String {
    let mut key = endpoint.as_str().to_string();
    if let Some(id) = id {
        key.push(':');
        key.push_str(id);
    }
    if let Some(fragment) = filters.and_then(Filters::cache_fragment) {
        key.push(':');
        key.push_str(&fragment);
    }
    key
}

/// Processed tier for listings: `endpoint_processed[:filters][:sort:field:order]`
pub fn processed_list_key(
    endpoint: Endpoint,
    filters: Option<&Filters>,
    sort_by: Option<&str>,
    order: SortOrder,
) -> String {
    let mut key = format!("{}_processed", endpoint);
    if let Some(fragment) = filters.and_then(Filters::cache_fragment) {
        key.push(':');
        key.push_str(&fragment);
    }
    if let Some(field) = sort_by.filter(|f| !f.is_empty()) {
        key.push_str(&format!(":sort:{}:{}", field, order.as_str()));
    }
    key
}

/// Processed tier for single records: `endpoint_id_processed`
pub fn processed_item_key(endpoint: Endpoint, id: &str) -> String {
    format!("{}_{}_processed", endpoint, id)
}

/// Resolved display name of a referenced record
pub fn name_key(url: &str) -> String {
    format!("name:{}", url)
}

/// Raw body of a referenced record, keyed by its canonical URL
pub fn resource_key(url: &str) -> String {
    url.to_string()
}
