//! API integration tests for tile and TileJSON retrieval.
//!
//! Tests verify:
//! - Tile retrieval end to end, including subdirectories and path templates
//! - Zoom bounds, extension checks and empty tiles
//! - Method handling
//! - TileJSON base URLs

use std::sync::Arc;

use axum::http::StatusCode;
use axum::Router;

use tile_gateway::{create_router, Backends, OriginPatterns, RouterConfig};

use super::test_utils::{
    body_bytes, get, header, parks_store, request, send, MemoryObjectStore, MockArchive,
    MockArchiveOpener,
};

const MAPS_ORIGIN: &str = "https://maps.example.com";

fn router_config() -> RouterConfig {
    RouterConfig::new()
        .with_allowed_origins(OriginPatterns::parse("https://*.example.com"))
        .with_tracing(false)
}

fn router_with(store: MemoryObjectStore, config: RouterConfig) -> Router {
    let backends = Backends::new(Arc::new(store), Arc::new(MockArchiveOpener::new()));
    create_router(backends, config)
}

fn parks_router() -> Router {
    router_with(parks_store(), router_config())
}

// =============================================================================
// Tile Retrieval
// =============================================================================

#[tokio::test]
async fn test_parks_tile_end_to_end() {
    let router = parks_router();

    let response = send(
        &router,
        get("/parks/10/512/340.mvt", &[("origin", MAPS_ORIGIN)]),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        header(&response, "content-type"),
        Some("application/x-protobuf")
    );
    assert_eq!(
        header(&response, "cache-control"),
        Some("public, max-age=86400")
    );
    assert_eq!(
        header(&response, "access-control-allow-origin"),
        Some(MAPS_ORIGIN)
    );
    assert_eq!(header(&response, "vary"), Some("Origin"));

    let body = body_bytes(response).await;
    assert_eq!(&body[..], b"parks-tile");
}

#[tokio::test]
async fn test_tile_in_subdirectory() {
    let imagery = MockArchive::new("imagery", "png", 0, 5).with_tile(3, 1, 2, b"png-bytes");
    let store = MemoryObjectStore::new().with_archive("raster/imagery.pmtiles", &imagery);
    let router = router_with(store, router_config());

    let response = send(
        &router,
        get("/raster/imagery/3/1/2.png", &[("origin", MAPS_ORIGIN)]),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, "content-type"), Some("image/png"));
    assert_eq!(&body_bytes(response).await[..], b"png-bytes");
}

#[tokio::test]
async fn test_archive_path_template() {
    let parks = MockArchive::new("parks", "mvt", 0, 14).with_tile(1, 0, 0, b"t");
    let store = MemoryObjectStore::new().with_archive("archives/parks-v2.pmtiles", &parks);
    let config = router_config().with_archive_path("archives/{name}-v2.pmtiles");
    let router = router_with(store.clone(), config);

    let response = send(&router, get("/parks/1/0/0.mvt", &[("origin", MAPS_ORIGIN)])).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(store.lookups(), vec!["archives/parks-v2.pmtiles".to_string(); 2]);
}

#[tokio::test]
async fn test_missing_archive_is_not_found() {
    let router = parks_router();

    let response = send(&router, get("/lakes/1/0/0.mvt", &[("origin", MAPS_ORIGIN)])).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        header(&response, "cache-control"),
        Some("public, max-age=60")
    );
}

// =============================================================================
// Coordinate and Extension Checks
// =============================================================================

#[tokio::test]
async fn test_zoom_outside_bounds_is_not_found() {
    let store = parks_store();
    let router = router_with(store.clone(), router_config());

    for uri in ["/parks/15/0/0.mvt", "/parks/99/512/340.mvt"] {
        store.reset_tracking();
        let response = send(&router, get(uri, &[("origin", MAPS_ORIGIN)])).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{}", uri);

        // Header read only, no tile read
        assert_eq!(store.lookups(), vec!["parks.pmtiles".to_string()], "{}", uri);
    }
}

#[tokio::test]
async fn test_zoom_below_minimum_is_not_found() {
    let archive = MockArchive::new("detail", "mvt", 8, 14);
    let store = MemoryObjectStore::new().with_archive("detail.pmtiles", &archive);
    let router = router_with(store.clone(), router_config());

    let response = send(&router, get("/detail/7/0/0.mvt", &[("origin", MAPS_ORIGIN)])).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(store.lookup_count(), 1);
}

#[tokio::test]
async fn test_extension_mismatch_is_bad_request() {
    let router = parks_router();

    let response = send(&router, get("/parks/10/512/340.png", &[("origin", MAPS_ORIGIN)])).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        header(&response, "content-type"),
        Some("text/plain; charset=utf-8")
    );
    let body = body_bytes(response).await;
    assert!(String::from_utf8_lossy(&body).contains(".mvt"));
}

#[tokio::test]
async fn test_legacy_pbf_extension_accepted() {
    let router = parks_router();

    let response = send(&router, get("/parks/10/512/340.pbf", &[("origin", MAPS_ORIGIN)])).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(&body_bytes(response).await[..], b"parks-tile");
}

#[tokio::test]
async fn test_legacy_pbf_extension_can_be_disabled() {
    let router = router_with(parks_store(), router_config().with_legacy_pbf_extension(false));

    let response = send(&router, get("/parks/10/512/340.pbf", &[("origin", MAPS_ORIGIN)])).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_tile_type_accepts_any_extension() {
    let archive = MockArchive::new("blobs", "unknown", 0, 4).with_tile(0, 0, 0, b"blob");
    let store = MemoryObjectStore::new().with_archive("blobs.pmtiles", &archive);
    let router = router_with(store, router_config());

    let response = send(&router, get("/blobs/0/0/0.bin", &[("origin", MAPS_ORIGIN)])).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        header(&response, "content-type"),
        Some("application/octet-stream")
    );
}

#[tokio::test]
async fn test_malformed_tile_name_is_bad_request() {
    let store = parks_store();
    let router = router_with(store.clone(), router_config());

    for uri in ["/parks/10/512/340.MVT", "/parks/10/512/abc.mvt", "/parks/10/512/340"] {
        let response = send(&router, get(uri, &[("origin", MAPS_ORIGIN)])).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", uri);
    }

    // Rejected before the archive is opened
    assert_eq!(store.lookup_count(), 0);
}

#[tokio::test]
async fn test_empty_tile_is_no_content() {
    let router = parks_router();

    let response = send(&router, get("/parks/10/0/0.mvt", &[("origin", MAPS_ORIGIN)])).await;

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(body_bytes(response).await.is_empty());
}

// =============================================================================
// Methods
// =============================================================================

#[tokio::test]
async fn test_non_get_tile_request_is_method_not_allowed() {
    let store = parks_store();
    let router = router_with(store.clone(), router_config());

    for method in ["POST", "HEAD", "DELETE"] {
        let response = send(
            &router,
            request(method, "/parks/10/512/340.mvt", &[("origin", MAPS_ORIGIN)]),
        )
        .await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED, "{}", method);
        assert_eq!(header(&response, "allow"), Some("GET"));
    }

    assert_eq!(store.lookup_count(), 0);
}

#[tokio::test]
async fn test_method_checked_before_origin() {
    let router = parks_router();

    let response = send(
        &router,
        request("PUT", "/parks.json", &[("origin", "https://evil.test")]),
    )
    .await;

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

// =============================================================================
// TileJSON
// =============================================================================

#[tokio::test]
async fn test_tileset_uses_request_host() {
    let router = parks_router();

    let response = send(&router, get("/parks.json", &[("origin", MAPS_ORIGIN)])).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, "content-type"), Some("application/json"));

    let body = body_bytes(response).await;
    let tilejson: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(
        tilejson["tiles"][0],
        "https://tiles.example.com/parks/{z}/{x}/{y}.mvt"
    );
}

#[tokio::test]
async fn test_tileset_public_hostname_and_subdirectory() {
    let archive = MockArchive::new("parks", "mvt", 0, 14);
    let store = MemoryObjectStore::new().with_archive("vector/parks.pmtiles", &archive);
    let config = router_config().with_public_hostname("cdn.example.org");
    let router = router_with(store, config);

    let response = send(
        &router,
        get("/vector/parks.json", &[("origin", MAPS_ORIGIN)]),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let tilejson: serde_json::Value =
        serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(
        tilejson["tiles"][0],
        "https://cdn.example.org/vector/parks/{z}/{x}/{y}.mvt"
    );
}

#[tokio::test]
async fn test_tileset_strips_port_from_host() {
    let router = parks_router();

    let mut request = get("/parks.json", &[("origin", MAPS_ORIGIN)]);
    request
        .headers_mut()
        .insert("host", "tiles.example.com:8443".parse().unwrap());

    let response = send(&router, request).await;
    let tilejson: serde_json::Value =
        serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(
        tilejson["tiles"][0],
        "https://tiles.example.com/parks/{z}/{x}/{y}.mvt"
    );
}

#[tokio::test]
async fn test_tileset_missing_archive() {
    let router = parks_router();

    let response = send(&router, get("/lakes.json", &[("origin", MAPS_ORIGIN)])).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
