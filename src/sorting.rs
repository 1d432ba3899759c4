//! Type-aware stable sorting of catalog records.
//!
//! Numeric-looking values compare as numbers and always precede non-numeric
//! values, in both directions. Within each group the direction applies and
//! records with equal keys keep their input order.

use regex::Regex;
use serde_json::Value;
use std::cmp::Ordering;
use std::sync::OnceLock;

use crate::types::{Record, SortOrder};

fn numeric_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[+-]?(\d+\.?\d*|\.\d+)([eE][+-]?\d+)?$").expect("numeric pattern is valid")
    })
}

#[derive(Debug, Clone, PartialEq)]
enum SortKey {
    Number(f64),
    Text(String),
}

fn text_key(s: &str) -> SortKey {
    let trimmed = s.trim();
    if numeric_pattern().is_match(trimmed) {
        if let Ok(n) = trimmed.parse::<f64>() {
            return SortKey::Number(n);
        }
    }
    SortKey::Text(s.to_string())
}

fn sort_key(record: &Record, field: &str) -> SortKey {
    match record.get(field) {
        None | Some(Value::Null) => SortKey::Text(String::new()),
        Some(Value::Number(n)) => n.as_f64().map(SortKey::Number).unwrap_or_else(|| SortKey::Text(n.to_string())),
        Some(Value::String(s)) => text_key(s),
        Some(other) => SortKey::Text(other.to_string()),
    }
}

fn compare(a: &SortKey, b: &SortKey, order: SortOrder) -> Ordering {
    let directed = |ord: Ordering| match order {
        SortOrder::Asc => ord,
        SortOrder::Desc => ord.reverse(),
    };
    match (a, b) {
        (SortKey::Number(x), SortKey::Number(y)) => directed(x.total_cmp(y)),
        (SortKey::Text(x), SortKey::Text(y)) => directed(x.cmp(y)),
        (SortKey::Number(_), SortKey::Text(_)) => Ordering::Less,
        (SortKey::Text(_), SortKey::Number(_)) => Ordering::Greater,
    }
}

/// Sort `records` by `sort_by`; without a field the input is returned untouched
pub fn sort_records(records: Vec<Record>, sort_by: Option<&str>, order: SortOrder) -> Vec<Record> {
    let field = match sort_by {
        Some(field) if !field.is_empty() => field,
        _ => return records,
    };

    let mut keyed: Vec<(SortKey, Record)> = records
        .into_iter()
        .map(|record| (sort_key(&record, field), record))
        .collect();
    keyed.sort_by(|a, b| compare(&a.0, &b.0, order));
    keyed.into_iter().map(|(_, record)| record).collect()
}
