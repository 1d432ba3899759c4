use super::*;
use crate::cache::MemoryBackend;
use crate::config::Config;
use crate::error::GatewayError;
use crate::resolve::NameResolver;
use crate::test_support::{memory_cache, FakeUpstream};
use crate::types::FilterValue;
use serde_json::json;

const BASE: &str = "https://swapi.info/api";

fn service(upstream: Arc<FakeUpstream>) -> (Arc<MemoryBackend>, Arc<CacheClient>, ResourceService) {
    let (backend, cache) = memory_cache();
    let config = Config::default().cache;
    let names = Arc::new(NameResolver::new(cache.clone(), upstream.clone(), config.name_ttl_secs, 4));
    let service = ResourceService::new(cache.clone(), upstream, names, BASE, &config);
    (backend, cache, service)
}

fn people_listing() -> Value {
    json!({
        "next": null,
        "results": [
            {"name": "Luke Skywalker", "height": "172", "homeworld": "https://swapi.info/api/planets/1"},
            {"name": "R2-D2", "height": "96", "homeworld": "https://swapi.info/api/planets/8"},
            {"name": "Chewbacca", "height": "unknown", "homeworld": "https://swapi.info/api/planets/14"},
        ]
    })
}

fn catalog() -> FakeUpstream {
    FakeUpstream::new()
        .respond(&format!("{}/people", BASE), people_listing())
        .respond(&format!("{}/people/1", BASE), json!({
            "name": "Luke Skywalker",
            "homeworld": "https://swapi.info/api/planets/1",
            "films": ["https://swapi.info/api/films/1"],
        }))
        .respond("https://swapi.info/api/planets/1", json!({"name": "Tatooine"}))
        .respond("https://swapi.info/api/planets/8", json!({"name": "Naboo"}))
        .respond("https://swapi.info/api/planets/14", json!({"name": "Kashyyyk"}))
        .respond("https://swapi.info/api/films/1", json!({"title": "A New Hope"}))
}

#[tokio::test]
async fn test_get_resource_processed_hit_skips_upstream() {
    let upstream = Arc::new(FakeUpstream::new());
    let (_, cache, service) = service(upstream.clone());
    let processed = json!({"name": "Luke Skywalker", "homeworld": "Tatooine"});
    cache.set(&keys::processed_item_key(Endpoint::People, "1"), processed.clone(), 60).await;

    let result = service.get_resource(Endpoint::People, "1").await.unwrap();
    assert_eq!(result, processed);
    assert_eq!(upstream.calls(), 0);
}

#[tokio::test]
async fn test_get_resource_resolves_and_populates_both_tiers() {
    let upstream = Arc::new(catalog());
    let (_, cache, service) = service(upstream.clone());

    let result = service.get_resource(Endpoint::People, "1").await.unwrap();
    assert_eq!(result["name"], json!("Luke Skywalker"));
    assert_eq!(result["homeworld"], json!("Tatooine"));
    assert_eq!(result["films"], json!(["A New Hope"]));

    let raw = cache.get_json(&keys::raw_key(Endpoint::People, Some("1"), None)).await.unwrap();
    assert_eq!(raw["homeworld"], json!("https://swapi.info/api/planets/1"));
    assert!(cache.exists(&keys::processed_item_key(Endpoint::People, "1")).await);

    let calls = upstream.calls();
    let again = service.get_resource(Endpoint::People, "1").await.unwrap();
    assert_eq!(again, result);
    assert_eq!(upstream.calls(), calls);
}

#[tokio::test]
async fn test_list_sorts_then_resolves() {
    let upstream = Arc::new(catalog());
    let (_, _, service) = service(upstream);

    let result = service
        .list_resources(Endpoint::People, None, Some("height"), SortOrder::Asc)
        .await
        .unwrap();
    let names: Vec<&str> = result
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["R2-D2", "Luke Skywalker", "Chewbacca"]);
    assert_eq!(result[0]["homeworld"], json!("Naboo"));
}

#[tokio::test]
async fn test_list_reuses_raw_tier_across_sort_orders() {
    let upstream = Arc::new(catalog());
    let (_, _, service) = service(upstream.clone());
    let listing_url = format!("{}/people", BASE);

    service.list_resources(Endpoint::People, None, Some("height"), SortOrder::Asc).await.unwrap();
    let desc = service
        .list_resources(Endpoint::People, None, Some("height"), SortOrder::Desc)
        .await
        .unwrap();

    assert_eq!(desc[0]["name"], json!("Luke Skywalker"));
    assert_eq!(upstream.calls_to(&listing_url), 1);
}

#[tokio::test]
async fn test_list_sends_filters_upstream() {
    let upstream = Arc::new(catalog());
    let (_, cache, service) = service(upstream.clone());
    let filters = Filters::new().with("name", Some(FilterValue::Text("Luke".to_string())));

    service
        .list_resources(Endpoint::People, Some(&filters), None, SortOrder::Asc)
        .await
        .unwrap();

    let query = upstream
        .last_query_to(&format!("{}/people", BASE))
        .unwrap();
    assert_eq!(query, vec![("name".to_string(), "Luke".to_string())]);
    assert!(cache.exists(&keys::raw_key(Endpoint::People, None, Some(&filters))).await);
}

#[tokio::test]
async fn test_cache_outage_still_serves() {
    let upstream = Arc::new(catalog());
    let (backend, _, service) = service(upstream);
    backend.set_available(false);

    let result = service.get_resource(Endpoint::People, "1").await.unwrap();
    assert_eq!(result["homeworld"], json!("Tatooine"));
}

#[tokio::test]
async fn test_upstream_error_propagates_status() {
    let upstream = Arc::new(FakeUpstream::new());
    let (_, cache, service) = service(upstream);

    let err = service.get_resource(Endpoint::Planets, "999").await.unwrap_err();
    assert!(matches!(err, GatewayError::UpstreamStatus { status: 404, .. }));
    assert_eq!(err.status_code(), 404);
    assert!(!cache.exists(&keys::processed_item_key(Endpoint::Planets, "999")).await);
}

#[tokio::test]
async fn test_bare_array_listing() {
    let upstream = Arc::new(
        FakeUpstream::new().respond(
            &format!("{}/films", BASE),
            json!([{"title": "B", "episode_id": 5}, {"title": "A", "episode_id": 4}]),
        ),
    );
    let (_, _, service) = service(upstream);

    let result = service
        .list_resources(Endpoint::Films, None, Some("episode_id"), SortOrder::Asc)
        .await
        .unwrap();
    assert_eq!(result, json!([{"title": "A", "episode_id": 4}, {"title": "B", "episode_id": 5}]));
}
