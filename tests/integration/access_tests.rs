//! Access control integration tests.
//!
//! Tests verify:
//! - Wildcard and catch-all origin patterns
//! - Rejection of unlisted and missing origins
//! - Rejected requests never reach storage and carry no CORS headers

use std::sync::Arc;

use axum::http::StatusCode;
use axum::Router;

use tile_gateway::{create_router, Backends, OriginPatterns, RouterConfig};

use super::test_utils::{body_bytes, get, header, parks_store, send, MemoryObjectStore, MockArchiveOpener};

fn router_allowing(patterns: &str, store: MemoryObjectStore) -> Router {
    let config = RouterConfig::new()
        .with_allowed_origins(OriginPatterns::parse(patterns))
        .with_tracing(false);
    let backends = Backends::new(Arc::new(store), Arc::new(MockArchiveOpener::new()));
    create_router(backends, config)
}

#[tokio::test]
async fn test_wildcard_subdomain_allowed() {
    let router = router_allowing("https://*.example.com", parks_store());

    let response = send(
        &router,
        get("/parks/10/512/340.mvt", &[("origin", "https://a.example.com")]),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        header(&response, "access-control-allow-origin"),
        Some("https://a.example.com")
    );
}

#[tokio::test]
async fn test_embedded_allowed_origin_rejected() {
    let store = parks_store();
    let router = router_allowing("https://*.example.com", store.clone());

    let response = send(
        &router,
        get(
            "/parks/10/512/340.mvt",
            &[("origin", "https://evil.com/https://x.example.com")],
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(header(&response, "access-control-allow-origin").is_none());
    assert_eq!(store.lookup_count(), 0);
}

#[tokio::test]
async fn test_unlisted_origin_rejected() {
    let router = router_allowing("https://maps.test\nhttps://*.example.com", parks_store());

    let response = send(
        &router,
        get("/parks/10/512/340.mvt", &[("origin", "https://other.test")]),
    )
    .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(
        header(&response, "cache-control"),
        Some("public, max-age=60")
    );
    assert_eq!(&body_bytes(response).await[..], b"Origin not allowed");
}

#[tokio::test]
async fn test_missing_origin_rejected_without_catch_all() {
    let store = parks_store();
    let router = router_allowing("https://*.example.com", store.clone());

    let response = send(&router, get("/parks/10/512/340.mvt", &[])).await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(store.lookup_count(), 0);
}

#[tokio::test]
async fn test_catch_all_admits_any_origin() {
    let router = router_allowing("*", parks_store());

    let response = send(
        &router,
        get("/parks/10/512/340.mvt", &[("origin", "https://anything.test")]),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(&router, get("/parks/10/512/340.mvt", &[])).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(header(&response, "access-control-allow-origin").is_none());
    assert_eq!(header(&response, "vary"), Some("Origin"));
}

#[tokio::test]
async fn test_empty_allow_list_rejects_everything() {
    let router = router_allowing("", parks_store());

    let response = send(
        &router,
        get("/parks/10/512/340.mvt", &[("origin", "https://a.example.com")]),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_errors_after_access_check_carry_cors() {
    let router = router_allowing("https://*.example.com", parks_store());

    let response = send(
        &router,
        get("/parks/10/512/340.png", &[("origin", "https://a.example.com")]),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        header(&response, "access-control-allow-origin"),
        Some("https://a.example.com")
    );
}
