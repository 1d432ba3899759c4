use super::*;
use crate::cache::keys;
use crate::error::GatewayError;
use crate::test_support::{memory_cache, FakeUpstream};
use crate::types::Record;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

const PLANET_1: &str = "https://swapi.info/api/planets/1";
const FILM_1: &str = "https://swapi.info/api/films/1";
const FILM_2: &str = "https://swapi.info/api/films/2";

/// Name lookup backed by a fixed table
struct StubLookup(HashMap<String, String>);

impl StubLookup {
    fn new(entries: &[(&str, &str)]) -> Self {
        Self(entries.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect())
    }
}

#[async_trait]
impl NameLookup for StubLookup {
    async fn resolve_names(&self, urls: &[String]) -> Vec<Option<String>> {
        urls.iter().map(|url| self.0.get(url).cloned()).collect()
    }
}

fn record(value: Value) -> Record {
    value.as_object().unwrap().clone()
}

#[tokio::test]
async fn test_name_round_trip_fetches_once() {
    let (_, cache) = memory_cache();
    let upstream = Arc::new(FakeUpstream::new().respond(PLANET_1, json!({"name": "Tatooine"})));
    let resolver = NameResolver::new(cache.clone(), upstream.clone(), 3600, 4);

    assert_eq!(resolver.resolve_one(PLANET_1).await.as_deref(), Some("Tatooine"));
    assert_eq!(resolver.resolve_one(PLANET_1).await.as_deref(), Some("Tatooine"));
    assert_eq!(upstream.calls(), 1);

    let cached = cache.get(&keys::name_key(PLANET_1)).await.and_then(|p| p.into_text());
    assert_eq!(cached.as_deref(), Some("Tatooine"));
    assert!(cache.exists(&keys::resource_key(PLANET_1)).await);
}

#[tokio::test]
async fn test_batch_preserves_order_and_failures() {
    let (_, cache) = memory_cache();
    let upstream = Arc::new(
        FakeUpstream::new()
            .respond(FILM_1, json!({"title": "A New Hope"}))
            .fail(FILM_2, GatewayError::Timeout),
    );
    let resolver = NameResolver::new(cache, upstream, 3600, 2);

    let urls = vec![FILM_2.to_string(), FILM_1.to_string(), "https://swapi.info/api/films/99".to_string()];
    let names = resolver.resolve_names(&urls).await;
    assert_eq!(names, vec![None, Some("A New Hope".to_string()), None]);
}

#[tokio::test]
async fn test_json_looking_names_survive_the_name_tier() {
    let (_, cache) = memory_cache();
    let upstream = Arc::new(
        FakeUpstream::new()
            .respond(PLANET_1, json!({"name": "null"}))
            .respond(FILM_1, json!({"title": "1e3"})),
    );
    let resolver = NameResolver::new(cache, upstream.clone(), 3600, 4);
    let urls = vec![PLANET_1.to_string(), FILM_1.to_string()];

    let expected = vec![Some("null".to_string()), Some("1e3".to_string())];
    assert_eq!(resolver.resolve_names(&urls).await, expected);
    assert_eq!(resolver.resolve_names(&urls).await, expected);
    assert_eq!(upstream.calls(), 2);
}

#[tokio::test]
async fn test_resolves_from_cached_resource_without_fetch() {
    let (_, cache) = memory_cache();
    cache
        .set(&keys::resource_key(PLANET_1), json!({"name": "Tatooine", "climate": "arid"}), 60)
        .await;
    let upstream = Arc::new(FakeUpstream::new());
    let resolver = NameResolver::new(cache.clone(), upstream.clone(), 3600, 4);

    assert_eq!(resolver.resolve_one(PLANET_1).await.as_deref(), Some("Tatooine"));
    assert_eq!(upstream.calls(), 0);
    assert!(cache.exists(&keys::name_key(PLANET_1)).await);
}

#[tokio::test]
async fn test_nameless_resource_is_not_cached_as_name() {
    let (_, cache) = memory_cache();
    let upstream = Arc::new(FakeUpstream::new().respond(PLANET_1, json!({"climate": "arid"})));
    let resolver = NameResolver::new(cache.clone(), upstream, 3600, 4);

    assert_eq!(resolver.resolve_one(PLANET_1).await, None);
    assert!(!cache.exists(&keys::name_key(PLANET_1)).await);
}

#[tokio::test]
async fn test_non_url_is_unresolved_without_fetch() {
    let (_, cache) = memory_cache();
    let upstream = Arc::new(FakeUpstream::new());
    let resolver = NameResolver::new(cache, upstream.clone(), 3600, 4);

    let names = resolver.resolve_names(&["Tatooine".to_string(), "42".to_string()]).await;
    assert_eq!(names, vec![None, None]);
    assert_eq!(upstream.calls(), 0);
}

#[tokio::test]
async fn test_resolves_during_cache_outage() {
    let (backend, cache) = memory_cache();
    backend.set_available(false);
    let upstream = Arc::new(FakeUpstream::new().respond(PLANET_1, json!({"name": "Tatooine"})));
    let resolver = NameResolver::new(cache, upstream.clone(), 3600, 4);

    assert_eq!(resolver.resolve_one(PLANET_1).await.as_deref(), Some("Tatooine"));
    assert_eq!(resolver.resolve_one(PLANET_1).await.as_deref(), Some("Tatooine"));
    assert_eq!(upstream.calls(), 2);
}

#[test]
fn test_extract_name_prefers_name_then_title() {
    assert_eq!(names::extract_name(&json!({"name": "Luke"})).as_deref(), Some("Luke"));
    assert_eq!(names::extract_name(&json!({"title": "A New Hope"})).as_deref(), Some("A New Hope"));
    assert_eq!(names::extract_name(&json!({"name": "", "title": "Fallback"})).as_deref(), Some("Fallback"));
    assert_eq!(names::extract_name(&json!({"url": "x"})), None);
}

#[tokio::test]
async fn test_resolve_fields_rewrites_references() {
    let lookup = StubLookup::new(&[
        (PLANET_1, "Tatooine"),
        (FILM_1, "A New Hope"),
        (FILM_2, "The Empire Strikes Back"),
    ]);
    let input = record(json!({
        "name": "Luke Skywalker",
        "homeworld": PLANET_1,
        "films": [FILM_1, FILM_2],
    }));

    let resolved = resolve_fields(input, &["homeworld", "films"], &lookup).await;
    assert_eq!(resolved["name"], json!("Luke Skywalker"));
    assert_eq!(resolved["homeworld"], json!("Tatooine"));
    assert_eq!(resolved["films"], json!(["A New Hope", "The Empire Strikes Back"]));
}

#[tokio::test]
async fn test_resolve_fields_lists_resolve_positionally() {
    let lookup = StubLookup::new(&[(FILM_1, "A New Hope")]);
    let input = record(json!({
        "films": [FILM_1, "already a name", FILM_2],
        "homeworld": "unknown",
        "species": [],
    }));

    let resolved = resolve_fields(input, &["films", "homeworld", "species", "vehicles"], &lookup).await;
    assert_eq!(resolved["films"], json!(["A New Hope", null, null]));
    assert_eq!(resolved["homeworld"], json!("unknown"));
    assert_eq!(resolved["species"], json!([]));
    assert!(!resolved.contains_key("vehicles"));
}

#[tokio::test]
async fn test_unresolvable_single_reference_becomes_null() {
    let lookup = StubLookup::new(&[]);
    let input = record(json!({"homeworld": PLANET_1}));
    let resolved = resolve_fields(input, &["homeworld"], &lookup).await;
    assert_eq!(resolved["homeworld"], Value::Null);
}

#[tokio::test]
async fn test_resolve_records_preserves_order() {
    let lookup = StubLookup::new(&[(PLANET_1, "Tatooine")]);
    let records = vec![
        record(json!({"name": "Luke", "homeworld": PLANET_1})),
        record(json!({"name": "Leia", "homeworld": "https://swapi.info/api/planets/2"})),
    ];
    let resolved = resolve_records(records, &["homeworld"], &lookup).await;
    assert_eq!(resolved[0]["name"], json!("Luke"));
    assert_eq!(resolved[0]["homeworld"], json!("Tatooine"));
    assert_eq!(resolved[1]["homeworld"], Value::Null);
}
