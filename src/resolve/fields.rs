use crate::resolve::NameLookup;
use crate::types::Record;
use serde_json::Value;

fn is_reference(value: &Value) -> Option<&str> {
    value.as_str().filter(|s| s.starts_with("http"))
}

/// Where a resolved name goes back into the record
enum Slot {
    Single(String),
    Element(String, usize),
}

/// Rewrite reference fields from URLs to names.
///
/// A string field holding a URL becomes the resolved name (or null). A list field
/// is resolved as a whole and becomes a list of the same length, with null
/// wherever an element could not be resolved. Absent fields, and values that are
/// neither lists nor URLs, are left alone.
/// All URLs of the record are resolved in a single batch.
pub async fn resolve_fields(mut record: Record, fields: &[&str], lookup: &dyn NameLookup) -> Record {
    let mut slots = Vec::new();
    let mut urls = Vec::new();

    for field in fields {
        match record.get(*field) {
            Some(Value::Array(items)) => {
                for (index, item) in items.iter().enumerate() {
                    slots.push(Slot::Element(field.to_string(), index));
                    urls.push(match item {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    });
                }
            }
            Some(value) => {
                if let Some(url) = is_reference(value) {
                    slots.push(Slot::Single(field.to_string()));
                    urls.push(url.to_string());
                }
            }
            None => {}
        }
    }

    if urls.is_empty() {
        return record;
    }

    let names = lookup.resolve_names(&urls).await;
    for (slot, name) in slots.into_iter().zip(names) {
        let resolved = name.map(Value::String).unwrap_or(Value::Null);
        match slot {
            Slot::Single(field) => {
                record.insert(field, resolved);
            }
            Slot::Element(field, index) => {
                if let Some(Value::Array(items)) = record.get_mut(&field) {
                    if let Some(item) = items.get_mut(index) {
                        *item = resolved;
                    }
                }
            }
        }
    }

    record
}

/// Apply `resolve_fields` to every record, preserving order
pub async fn resolve_records(records: Vec<Record>, fields: &[&str], lookup: &dyn NameLookup) -> Vec<Record> {
    let mut resolved = Vec::with_capacity(records.len());
    for record in records {
        resolved.push(resolve_fields(record, fields, lookup).await);
    }
    resolved
}
