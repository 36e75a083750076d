//! Routing and the request pipeline.
//!
//! Every request goes through a single dispatch handler installed as the
//! router's fallback. It parses the percent-decoded path into a [`Route`]
//! and drives the pipeline stages in a fixed order:
//!
//! ```text
//! method check ─> AccessControl ─> QuotaEnforcer ─> EdgeCache lookup
//!                                                        │ miss
//!                                                        v
//!           client <─ CORS annotate <─ EdgeCache store <─ route handler
//! ```
//!
//! Any stage can end the request early with a [`GatewayError`], which the
//! [`ErrorResponder`] renders. Error responses are never stored in the edge
//! cache, and only get CORS headers once the Origin has passed access
//! control.
//!
//! # Route Structure
//!
//! ```text
//! /{name}/{z}/{x}/{y}.{ext}                  - Tile (GET)
//! /{vector|raster}/{name}/{z}/{x}/{y}.{ext}  - Tile in a subdirectory (GET)
//! /{name}.json                               - TileJSON (GET)
//! /{vector|raster}/{name}.json               - TileJSON in a subdirectory (GET)
//! /fonts/{stack}/{range}.pbf                 - Glyphs (GET, HEAD)
//! /*                                         - Static assets (GET, HEAD)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use tile_gateway::server::routes::{create_router, Backends, RouterConfig};
//!
//! let backends = Backends::new(store, opener);
//! let config = RouterConfig::new()
//!     .with_allowed_origins(OriginPatterns::parse("https://*.example.com"));
//!
//! let router = create_router(backends, config);
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//! axum::serve(listener, router).await?;
//! ```

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::response::{IntoResponse, Response};
use axum::Router;
use bytes::Bytes;
use http::header::{HeaderValue, ACCEPT, ALLOW, CONTENT_LENGTH, HOST, ORIGIN};
use http::request::Parts;
use http::{HeaderMap, Method, StatusCode};
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use super::access::{AccessControl, OriginPatterns};
use super::cache::{spawn_store, EdgeCache, MemoryEdgeCache};
use super::cors;
use super::errors::{ErrorResponder, DEFAULT_ERROR_MAX_AGE};
use super::handlers::{
    font_handler, static_handler, tile_handler, tileset_handler, AppState, FontPathParams,
    HandlerSettings, TilePathParams, TilesetPathParams, DEFAULT_CACHE_CONTROL,
};
use super::quota::{GovernorLimiter, QuotaEnforcer, RateLimiter, Unlimited};
use super::response::EdgeResponse;
use crate::archive::{native_decompress, ArchiveOpener, Subdirectory};
use crate::config::GatewayConfig;
use crate::error::{GatewayError, ServeError};
use crate::store::{create_s3_client, ObjectStore, S3ObjectStore};

/// Default header carrying the client's address.
pub const DEFAULT_CLIENT_ADDRESS_HEADER: &str = "cf-connecting-ip";

/// Header naming the scheme the client used to reach the edge.
const FORWARDED_PROTO: &str = "x-forwarded-proto";

const GET_ONLY: &[Method] = &[Method::GET];
const GET_AND_HEAD: &[Method] = &[Method::GET, Method::HEAD];

// =============================================================================
// Routes
// =============================================================================

/// A parsed request path. Exactly one handler runs per route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Tile(TilePathParams),
    Tileset(TilesetPathParams),
    Font(FontPathParams),
    /// Fallback: the decoded path, served from the static prefix
    Static(String),
}

fn is_digits(segment: &str) -> bool {
    !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit())
}

impl Route {
    /// Percent-decode a raw request path and parse it.
    pub fn from_raw_path(raw_path: &str) -> Result<Self, GatewayError> {
        let decoded = urlencoding::decode(raw_path)
            .map_err(|_| GatewayError::BadRequest("Bad request: invalid path encoding".to_string()))?;
        Ok(Self::parse(&decoded))
    }

    /// Parse a decoded path. The first matching route wins, in the order
    /// tile, tileset, font, static.
    pub fn parse(path: &str) -> Self {
        let segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();

        if let Some(route) = Self::parse_tile(&segments) {
            return route;
        }
        if let Some(route) = Self::parse_tileset(&segments) {
            return route;
        }
        if let Some(route) = Self::parse_font(&segments) {
            return route;
        }

        Route::Static(path.to_string())
    }

    fn parse_tile(segments: &[&str]) -> Option<Self> {
        let (subdirectory, rest) = match segments.len() {
            4 => (None, segments),
            5 => (Some(Subdirectory::parse(segments[0])?), &segments[1..]),
            _ => return None,
        };

        let [name, z, x, filename] = rest else {
            return None;
        };
        if name.is_empty() || !is_digits(z) || !is_digits(x) {
            return None;
        }

        Some(Route::Tile(TilePathParams {
            name: name.to_string(),
            subdirectory,
            z: z.to_string(),
            x: x.to_string(),
            filename: filename.to_string(),
        }))
    }

    fn parse_tileset(segments: &[&str]) -> Option<Self> {
        let (subdirectory, file) = match segments {
            [file] => (None, *file),
            [subdir, file] => (Some(Subdirectory::parse(subdir)?), *file),
            _ => return None,
        };

        let name = file.strip_suffix(".json").filter(|n| !n.is_empty())?;
        Some(Route::Tileset(TilesetPathParams {
            name: name.to_string(),
            subdirectory,
        }))
    }

    fn parse_font(segments: &[&str]) -> Option<Self> {
        let ["fonts", stack, file] = segments else {
            return None;
        };
        let range = file.strip_suffix(".pbf").filter(|r| !r.is_empty())?;
        if stack.is_empty() {
            return None;
        }

        Some(Route::Font(FontPathParams {
            stack: stack.to_string(),
            range: range.to_string(),
        }))
    }

    /// Methods this route accepts.
    pub fn allowed_methods(&self) -> &'static [Method] {
        match self {
            Route::Tile(_) | Route::Tileset(_) => GET_ONLY,
            Route::Font(_) | Route::Static(_) => GET_AND_HEAD,
        }
    }

    pub fn allows(&self, method: &Method) -> bool {
        self.allowed_methods().contains(method)
    }

    /// Short identifier used in log fields.
    pub fn name(&self) -> &'static str {
        match self {
            Route::Tile(_) => "tile",
            Route::Tileset(_) => "tileset",
            Route::Font(_) => "font",
            Route::Static(_) => "static",
        }
    }
}

// =============================================================================
// Request Context
// =============================================================================

/// The parts of a request the pipeline looks at.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub method: Method,

    /// Path as received, still percent-encoded
    pub raw_path: String,

    pub origin: Option<String>,
    pub client_address: Option<String>,
    pub accept: Option<String>,

    /// Host header value, possibly with a port
    pub host: String,

    /// Full request URL, used as the edge cache key
    pub url: String,
}

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

impl RequestContext {
    /// Extract the context from request parts.
    pub fn from_parts(parts: &Parts, client_address_header: &str) -> Self {
        let headers = &parts.headers;

        let host = header_str(headers, HOST.as_str())
            .or_else(|| parts.uri.authority().map(|a| a.to_string()))
            .unwrap_or_else(|| "localhost".to_string());

        let proto = header_str(headers, FORWARDED_PROTO)
            .and_then(|p| p.split(',').next().map(|s| s.trim().to_ascii_lowercase()))
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| "http".to_string());

        let path_and_query = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");

        Self {
            method: parts.method.clone(),
            raw_path: parts.uri.path().to_string(),
            origin: header_str(headers, ORIGIN.as_str()),
            client_address: header_str(headers, client_address_header),
            accept: header_str(headers, ACCEPT.as_str()),
            url: format!("{}://{}{}", proto, host, path_and_query),
            host,
        }
    }
}

// =============================================================================
// Pipeline
// =============================================================================

fn method_not_allowed(route: &Route) -> EdgeResponse {
    let allow = route
        .allowed_methods()
        .iter()
        .map(Method::as_str)
        .collect::<Vec<_>>()
        .join(", ");

    EdgeResponse::new(StatusCode::METHOD_NOT_ALLOWED)
        .with_header(ALLOW, &allow)
        .with_content_type("text/plain; charset=utf-8")
        .with_body("Method not allowed")
}

/// Run a request through every stage and produce the final response.
pub async fn run_pipeline(state: &AppState, ctx: &RequestContext) -> EdgeResponse {
    let accept = ctx.accept.as_deref();

    let route = match Route::from_raw_path(&ctx.raw_path) {
        Ok(route) => route,
        Err(e) => return state.errors.respond(&e, accept).await,
    };

    if !route.allows(&ctx.method) {
        debug!(route = route.name(), method = %ctx.method, "Method not allowed");
        return method_not_allowed(&route);
    }

    let origin = ctx.origin.as_deref();
    if let Err(e) = state.access.check(origin) {
        return state.errors.respond(&e, accept).await;
    }

    let response = match serve_route(state, ctx, &route).await {
        Ok(response) => response,
        Err(e) => state.errors.respond(&e, accept).await,
    };

    let mut response = cors::annotate(response, origin);
    if ctx.method == Method::HEAD {
        // Report the length a GET would have returned
        response
            .headers
            .insert(CONTENT_LENGTH, HeaderValue::from(response.body.len()));
        response.body = Bytes::new();
    }
    response
}

/// Quota, edge cache and handler stages.
async fn serve_route(
    state: &AppState,
    ctx: &RequestContext,
    route: &Route,
) -> Result<EdgeResponse, GatewayError> {
    state
        .quota
        .check(ctx.client_address.as_deref(), ctx.origin.as_deref())
        .await?;

    let use_cache = ctx.method == Method::GET;
    if use_cache {
        if let Some(hit) = state.edge_cache.lookup(&ctx.url).await {
            debug!(url = %ctx.url, "Edge cache hit");
            return Ok(hit);
        }
    }

    let response = match route {
        Route::Tile(params) => tile_handler(state, params).await?,
        Route::Tileset(params) => tileset_handler(state, params, &ctx.host).await?,
        Route::Font(params) => font_handler(state, params).await?,
        Route::Static(path) => static_handler(state, path).await?,
    };

    if use_cache {
        spawn_store(Arc::clone(&state.edge_cache), ctx.url.clone(), &response);
    }

    Ok(response)
}

/// Single entry point for every request.
async fn dispatch(State(state): State<AppState>, request: Request) -> Response {
    let (parts, _body) = request.into_parts();
    let ctx = RequestContext::from_parts(&parts, &state.client_address_header);
    run_pipeline(&state, &ctx).await.into_response()
}

// =============================================================================
// Router Configuration
// =============================================================================

/// Configuration for the HTTP router.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Origins allowed to use the gateway (empty = none)
    pub allowed_origins: OriginPatterns,

    /// Origins exempt from the per-origin rate limit
    pub favored_origins: OriginPatterns,

    /// Cache-Control for tiles, metadata and static assets
    pub cache_control: String,

    /// Hostname used in TileJSON URLs
    pub public_hostname: Option<String>,

    /// Archive key template with a `{name}` token
    pub archive_path: Option<String>,

    /// Header carrying the client's address
    pub client_address_header: String,

    /// Max-age in seconds for cacheable error responses
    pub error_max_age: u32,

    /// Accept `.pbf` for vector tiles
    pub legacy_pbf_extension: bool,

    /// Whether to enable request tracing
    pub enable_tracing: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl RouterConfig {
    /// Create a router configuration.
    ///
    /// By default:
    /// - No origin is allowed
    /// - No origin is favored
    /// - Cache-Control is `public, max-age=86400`
    /// - `.pbf` is accepted for vector tiles
    /// - Tracing is enabled
    pub fn new() -> Self {
        Self {
            allowed_origins: OriginPatterns::empty(),
            favored_origins: OriginPatterns::empty(),
            cache_control: DEFAULT_CACHE_CONTROL.to_string(),
            public_hostname: None,
            archive_path: None,
            client_address_header: DEFAULT_CLIENT_ADDRESS_HEADER.to_string(),
            error_max_age: DEFAULT_ERROR_MAX_AGE,
            legacy_pbf_extension: true,
            enable_tracing: true,
        }
    }

    pub fn with_allowed_origins(mut self, patterns: OriginPatterns) -> Self {
        self.allowed_origins = patterns;
        self
    }

    pub fn with_favored_origins(mut self, patterns: OriginPatterns) -> Self {
        self.favored_origins = patterns;
        self
    }

    pub fn with_cache_control(mut self, cache_control: impl Into<String>) -> Self {
        self.cache_control = cache_control.into();
        self
    }

    pub fn with_public_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.public_hostname = Some(hostname.into());
        self
    }

    /// Set the archive key template, e.g. `tiles/{name}.pmtiles`.
    pub fn with_archive_path(mut self, template: impl Into<String>) -> Self {
        self.archive_path = Some(template.into());
        self
    }

    pub fn with_client_address_header(mut self, header: impl Into<String>) -> Self {
        self.client_address_header = header.into().to_ascii_lowercase();
        self
    }

    pub fn with_error_max_age(mut self, seconds: u32) -> Self {
        self.error_max_age = seconds;
        self
    }

    pub fn with_legacy_pbf_extension(mut self, enabled: bool) -> Self {
        self.legacy_pbf_extension = enabled;
        self
    }

    /// Enable or disable request tracing.
    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.enable_tracing = enabled;
        self
    }

    fn handler_settings(&self) -> HandlerSettings {
        HandlerSettings {
            cache_control: self.cache_control.clone(),
            public_hostname: self.public_hostname.clone(),
            archive_path: self.archive_path.clone(),
            legacy_pbf_extension: self.legacy_pbf_extension,
        }
    }
}

// =============================================================================
// Router Builder
// =============================================================================

/// External collaborators the gateway talks to.
#[derive(Clone)]
pub struct Backends {
    pub store: Arc<dyn ObjectStore>,
    pub archives: Arc<dyn ArchiveOpener>,
    pub edge_cache: Arc<dyn EdgeCache>,
    pub per_ip_limiter: Arc<dyn RateLimiter>,
    pub per_origin_limiter: Arc<dyn RateLimiter>,
}

impl Backends {
    /// Backends with an in-memory edge cache and no rate limits.
    pub fn new(store: Arc<dyn ObjectStore>, archives: Arc<dyn ArchiveOpener>) -> Self {
        Self {
            store,
            archives,
            edge_cache: Arc::new(MemoryEdgeCache::new()),
            per_ip_limiter: Arc::new(Unlimited),
            per_origin_limiter: Arc::new(Unlimited),
        }
    }

    pub fn with_edge_cache(mut self, cache: Arc<dyn EdgeCache>) -> Self {
        self.edge_cache = cache;
        self
    }

    pub fn with_rate_limiters(
        mut self,
        per_ip: Arc<dyn RateLimiter>,
        per_origin: Arc<dyn RateLimiter>,
    ) -> Self {
        self.per_ip_limiter = per_ip;
        self.per_origin_limiter = per_origin;
        self
    }
}

/// Build the application state from backends and configuration.
pub fn build_state(backends: Backends, config: &RouterConfig) -> AppState {
    let quota = QuotaEnforcer::new(
        backends.per_ip_limiter,
        backends.per_origin_limiter,
        Arc::new(config.favored_origins.clone()),
    );

    AppState {
        errors: ErrorResponder::new(Arc::clone(&backends.store), config.error_max_age),
        store: backends.store,
        archives: backends.archives,
        decompress: Arc::new(native_decompress),
        edge_cache: backends.edge_cache,
        access: Arc::new(AccessControl::new(config.allowed_origins.clone())),
        quota,
        settings: Arc::new(config.handler_settings()),
        client_address_header: Arc::from(config.client_address_header.to_ascii_lowercase()),
    }
}

/// Create the application router.
///
/// All paths go to one dispatch handler; see the module docs for the stage
/// order.
pub fn create_router(backends: Backends, config: RouterConfig) -> Router {
    let state = build_state(backends, &config);

    let router = Router::new().fallback(dispatch).with_state(state);

    if config.enable_tracing {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

// =============================================================================
// Server
// =============================================================================

/// Wire S3, rate limiters and the edge cache from `config`, then serve
/// until the listener fails.
pub async fn serve(config: GatewayConfig, archives: Arc<dyn ArchiveOpener>) -> Result<(), ServeError> {
    config.validate().map_err(ServeError::Config)?;

    info!("Configuration:");
    info!("  S3 bucket: {}", config.s3_bucket);
    if let Some(ref endpoint) = config.s3_endpoint {
        info!("  S3 endpoint: {}", endpoint);
    }
    info!("  S3 region: {}", config.s3_region);
    info!(
        "  Rate limits: per-IP {}, per-origin {}",
        describe_limit(config.per_ip_limit),
        describe_limit(config.per_origin_limit)
    );
    info!("  Edge cache: {}MB", config.edge_cache_bytes / (1024 * 1024));

    let client = create_s3_client(config.s3_endpoint.as_deref(), &config.s3_region).await;
    let store: Arc<dyn ObjectStore> = Arc::new(S3ObjectStore::new(client, config.s3_bucket.clone()));

    let backends = Backends::new(store, archives)
        .with_edge_cache(Arc::new(MemoryEdgeCache::with_capacity(config.edge_cache_bytes)))
        .with_rate_limiters(
            GovernorLimiter::from_limit(config.per_ip_limit),
            GovernorLimiter::from_limit(config.per_origin_limit),
        );

    let router = create_router(backends, config.router_config());

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| ServeError::Bind(addr.clone(), e))?;

    info!("Server listening on: http://{}", addr);

    axum::serve(listener, router).await.map_err(ServeError::Io)
}

fn describe_limit(limit: Option<u32>) -> String {
    match limit {
        Some(n) => format!("{}/min", n),
        None => "unlimited".to_string(),
    }
}

// =============================================================================
// Tests
// =============================================================================
