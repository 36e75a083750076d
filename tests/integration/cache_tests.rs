//! Edge cache integration tests.
//!
//! Tests verify:
//! - Entries are keyed by full URL and never carry CORS headers
//! - One entry serves several origins, each with its own CORS header
//! - Uncacheable responses and errors are never stored
//! - HEAD requests bypass the cache
//! - Entries are not served past their max-age

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use axum::Router;

use tile_gateway::{create_router, Backends, MemoryEdgeCache, OriginPatterns, RouterConfig};

use super::test_utils::{
    body_bytes, get, header, parks_store, request, send, MemoryObjectStore, MockArchiveOpener,
};

const TILE: &str = "/parks/10/512/340.mvt";
const TILE_URL: &str = "http://tiles.example.com/parks/10/512/340.mvt";

fn cached_router(store: MemoryObjectStore, cache: Arc<MemoryEdgeCache>, config: RouterConfig) -> Router {
    let config = config
        .with_allowed_origins(OriginPatterns::parse("https://*.example.com"))
        .with_tracing(false);
    let backends = Backends::new(Arc::new(store), Arc::new(MockArchiveOpener::new()))
        .with_edge_cache(cache);
    create_router(backends, config)
}

/// Wait for a detached store to land.
async fn wait_for_entry(cache: &MemoryEdgeCache, url: &str) {
    for _ in 0..100 {
        if cache.contains(url).await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("no cache entry for {}", url);
}

#[tokio::test]
async fn test_entry_has_no_cors_header() {
    let cache = Arc::new(MemoryEdgeCache::new());
    let router = cached_router(parks_store(), cache.clone(), RouterConfig::new());

    let response = send(&router, get(TILE, &[("origin", "https://a.example.com")])).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        header(&response, "access-control-allow-origin"),
        Some("https://a.example.com")
    );

    wait_for_entry(&cache, TILE_URL).await;
    let entry = cache.peek(TILE_URL).await.unwrap();
    assert!(entry.headers.get("access-control-allow-origin").is_none());
    assert_eq!(&entry.body[..], b"parks-tile");
}

#[tokio::test]
async fn test_two_origins_share_one_entry() {
    let store = parks_store();
    let cache = Arc::new(MemoryEdgeCache::new());
    let router = cached_router(store.clone(), cache.clone(), RouterConfig::new());

    let first = send(&router, get(TILE, &[("origin", "https://a.example.com")])).await;
    assert_eq!(first.status(), StatusCode::OK);
    wait_for_entry(&cache, TILE_URL).await;

    store.reset_tracking();

    let second = send(&router, get(TILE, &[("origin", "https://b.example.com")])).await;
    assert_eq!(second.status(), StatusCode::OK);
    assert_eq!(
        header(&second, "access-control-allow-origin"),
        Some("https://b.example.com")
    );
    assert_eq!(header(&second, "vary"), Some("Origin"));
    assert_eq!(&body_bytes(second).await[..], b"parks-tile");

    // Served from the edge cache
    assert_eq!(store.lookup_count(), 0);
    assert_eq!(cache.len().await, 1);
}

#[tokio::test]
async fn test_forwarded_proto_and_query_are_part_of_key() {
    let cache = Arc::new(MemoryEdgeCache::new());
    let router = cached_router(parks_store(), cache.clone(), RouterConfig::new());

    send(
        &router,
        get(
            "/parks/10/512/340.mvt?v=2",
            &[("origin", "https://a.example.com"), ("x-forwarded-proto", "https")],
        ),
    )
    .await;

    wait_for_entry(&cache, "https://tiles.example.com/parks/10/512/340.mvt?v=2").await;
    assert!(!cache.contains(TILE_URL).await);
}

#[tokio::test]
async fn test_no_store_responses_never_persisted() {
    let cache = Arc::new(MemoryEdgeCache::new());
    let router = cached_router(
        parks_store(),
        cache.clone(),
        RouterConfig::new().with_cache_control("no-store"),
    );

    let response = send(&router, get(TILE, &[("origin", "https://a.example.com")])).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, "cache-control"), Some("no-store"));

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(cache.is_empty().await);
}

#[tokio::test]
async fn test_errors_never_persisted() {
    let cache = Arc::new(MemoryEdgeCache::new());
    let router = cached_router(parks_store(), cache.clone(), RouterConfig::new());

    for uri in ["/parks/99/0/0.mvt", "/parks/10/512/340.png", "/missing.txt"] {
        let response = send(&router, get(uri, &[("origin", "https://a.example.com")])).await;
        assert!(response.status().is_client_error(), "{}", uri);
    }

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(cache.is_empty().await);
}

#[tokio::test]
async fn test_no_content_tiles_are_cached() {
    let cache = Arc::new(MemoryEdgeCache::new());
    let router = cached_router(parks_store(), cache.clone(), RouterConfig::new());

    let response = send(
        &router,
        get("/parks/10/0/0.mvt", &[("origin", "https://a.example.com")]),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    wait_for_entry(&cache, "http://tiles.example.com/parks/10/0/0.mvt").await;
}

#[tokio::test]
async fn test_head_bypasses_cache() {
    let store = MemoryObjectStore::new().with_object("static/app.js", "console.log(1)", Some("text/javascript"));
    let cache = Arc::new(MemoryEdgeCache::new());
    let router = cached_router(store.clone(), cache.clone(), RouterConfig::new());

    let response = send(
        &router,
        request("HEAD", "/app.js", &[("origin", "https://a.example.com")]),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, "content-type"), Some("text/javascript"));
    assert_eq!(header(&response, "content-length"), Some("14"));
    assert!(body_bytes(response).await.is_empty());

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(cache.is_empty().await);
    assert_eq!(store.lookup_count(), 1);
}

#[tokio::test]
async fn test_expired_entry_refetched() {
    let store = parks_store();
    let cache = Arc::new(MemoryEdgeCache::new());
    let router = cached_router(
        store.clone(),
        cache.clone(),
        RouterConfig::new().with_cache_control("public, max-age=1"),
    );

    let first = send(&router, get(TILE, &[("origin", "https://a.example.com")])).await;
    assert_eq!(first.status(), StatusCode::OK);
    wait_for_entry(&cache, TILE_URL).await;

    store.reset_tracking();
    tokio::time::sleep(Duration::from_millis(1100)).await;

    let second = send(&router, get(TILE, &[("origin", "https://a.example.com")])).await;
    assert_eq!(second.status(), StatusCode::OK);
    assert_eq!(&body_bytes(second).await[..], b"parks-tile");

    // Served from storage again
    assert!(store.lookup_count() > 0);
}
