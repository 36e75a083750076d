//! Route handlers for the tile gateway.
//!
//! Each handler turns one parsed route into an [`EdgeResponse`] or a
//! [`GatewayError`]. Access control, quotas, caching and CORS have already
//! been dealt with by the time a handler runs.
//!
//! # Endpoints
//!
//! - `GET /{name}/{z}/{x}/{y}.{ext}` - Serve a tile
//! - `GET /{vector|raster}/{name}/{z}/{x}/{y}.{ext}` - Serve a tile from a subdirectory
//! - `GET /{name}.json` - TileJSON metadata
//! - `GET /fonts/{id1,id2,...}/{range}.pbf` - Glyph range
//! - `GET /*` - Static asset

use std::sync::Arc;

use tracing::debug;

use super::access::AccessControl;
use super::cache::EdgeCache;
use super::errors::ErrorResponder;
use super::quota::QuotaEnforcer;
use super::response::EdgeResponse;
use crate::archive::{ArchiveLocator, ArchiveOpener, ArchiveReader, Decompressor, StoreRangeSource, Subdirectory, TileType};
use crate::error::{GatewayError, StoreError};
use crate::store::ObjectStore;

/// Default Cache-Control for tiles, metadata and static assets (1 day).
pub const DEFAULT_CACHE_CONTROL: &str = "public, max-age=86400";

/// Cache-Control for glyph ranges (30 days).
pub const FONT_CACHE_CONTROL: &str = "public, max-age=2592000";

/// Maximum number of fonts in one glyph request.
pub const MAX_FONTSTACK_SIZE: usize = 8;

/// Storage prefix of static assets.
pub const STATIC_PREFIX: &str = "static/";

/// Document served for empty and directory paths.
pub const INDEX_DOCUMENT: &str = "index.html";

/// Storage prefix of glyph ranges.
pub const FONTS_PREFIX: &str = "fonts/";

/// Legacy extension accepted for vector tiles while
/// [`HandlerSettings::legacy_pbf_extension`] is enabled.
pub const LEGACY_VECTOR_EXTENSION: &str = "pbf";

// =============================================================================
// Application State
// =============================================================================

/// Settings consumed by the handlers.
#[derive(Debug, Clone)]
pub struct HandlerSettings {
    /// Cache-Control applied to tiles, metadata and static assets
    pub cache_control: String,

    /// Hostname used in TileJSON URLs instead of the request's own host
    pub public_hostname: Option<String>,

    /// Archive key template with a `{name}` token
    pub archive_path: Option<String>,

    /// Accept `.pbf` for vector tiles.
    ///
    /// Deprecated: clients should request `.mvt`. Kept until the remaining
    /// `.pbf` users have migrated.
    pub legacy_pbf_extension: bool,
}

impl Default for HandlerSettings {
    fn default() -> Self {
        Self {
            cache_control: DEFAULT_CACHE_CONTROL.to_string(),
            public_hostname: None,
            archive_path: None,
            legacy_pbf_extension: true,
        }
    }
}

/// Shared application state.
///
/// Every collaborator is behind an `Arc`, so cloning is cheap and each
/// request task gets its own handle.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ObjectStore>,
    pub archives: Arc<dyn ArchiveOpener>,
    pub decompress: Decompressor,
    pub edge_cache: Arc<dyn EdgeCache>,
    pub access: Arc<AccessControl>,
    pub quota: QuotaEnforcer,
    pub errors: ErrorResponder,
    pub settings: Arc<HandlerSettings>,

    /// Header carrying the client's address
    pub client_address_header: Arc<str>,
}

impl AppState {
    /// Open the archive at `locator`.
    pub fn open_archive(&self, locator: &ArchiveLocator) -> Box<dyn ArchiveReader> {
        let source = StoreRangeSource::new(Arc::clone(&self.store), locator.storage_key.clone());
        self.archives
            .open(Arc::new(source), Arc::clone(&self.decompress))
    }
}

// =============================================================================
// Request Parameters
// =============================================================================

/// Path parameters for tile requests.
///
/// Extracted from `/{subdirectory?}/{name}/{z}/{x}/{filename}` where
/// filename is `{y}.{ext}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TilePathParams {
    pub name: String,
    pub subdirectory: Option<Subdirectory>,
    pub z: String,
    pub x: String,
    pub filename: String,
}

/// A validated tile coordinate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileCoord {
    pub z: u32,
    pub x: u64,
    pub y: u64,
    pub ext: String,
}

impl TilePathParams {
    /// Validate and parse the coordinate.
    ///
    /// The filename must be digits, a dot, then lowercase ASCII letters.
    pub fn coord(&self) -> Result<TileCoord, GatewayError> {
        let (y, ext) = self
            .filename
            .split_once('.')
            .filter(|(y, ext)| {
                !y.is_empty()
                    && y.bytes().all(|b| b.is_ascii_digit())
                    && !ext.is_empty()
                    && ext.bytes().all(|b| b.is_ascii_lowercase())
            })
            .ok_or_else(|| {
                GatewayError::BadRequest(format!("Bad request: invalid tile name {}", self.filename))
            })?;

        let invalid = |what: &str| GatewayError::BadRequest(format!("Bad request: invalid {} coordinate", what));

        Ok(TileCoord {
            z: self.z.parse().map_err(|_| invalid("z"))?,
            x: self.x.parse().map_err(|_| invalid("x"))?,
            y: y.parse().map_err(|_| invalid("y"))?,
            ext: ext.to_string(),
        })
    }
}

/// Path parameters for tileset metadata requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TilesetPathParams {
    pub name: String,
    pub subdirectory: Option<Subdirectory>,
}

/// Path parameters for glyph requests: `/fonts/{stack}/{range}.pbf`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontPathParams {
    /// Comma-separated font identifiers, in preference order
    pub stack: String,

    /// Glyph range, e.g. `0-255`
    pub range: String,
}

impl FontPathParams {
    /// Split the stack into font identifiers.
    pub fn font_ids(&self) -> Vec<&str> {
        self.stack
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .collect()
    }

    fn is_valid_range(&self) -> bool {
        match self.range.split_once('-') {
            Some((start, end)) => {
                !start.is_empty()
                    && !end.is_empty()
                    && start.bytes().all(|b| b.is_ascii_digit())
                    && end.bytes().all(|b| b.is_ascii_digit())
            }
            None => false,
        }
    }
}

// =============================================================================
// Tile Handler
// =============================================================================

/// Check the requested extension against the archive's tile type.
pub fn check_extension(tile_type: TileType, ext: &str, legacy_pbf: bool) -> Result<(), GatewayError> {
    let Some(expected) = tile_type.extension() else {
        return Ok(());
    };

    if ext == expected {
        return Ok(());
    }

    if tile_type == TileType::Mvt && legacy_pbf && ext == LEGACY_VECTOR_EXTENSION {
        return Ok(());
    }

    Err(GatewayError::BadRequest(format!(
        "Bad request: requested .{} but archive has type .{}",
        ext, expected
    )))
}

/// Serve one tile.
///
/// # Response
///
/// - `200 OK`: tile bytes with a type-derived `Content-Type`
/// - `204 No Content`: valid coordinate, no tile stored there
/// - `400 Bad Request`: malformed coordinate or extension mismatch
/// - `404 Not Found`: unknown archive or zoom outside the archive's bounds
pub async fn tile_handler(
    state: &AppState,
    params: &TilePathParams,
) -> Result<EdgeResponse, GatewayError> {
    let coord = params.coord()?;

    let locator = ArchiveLocator::resolve(
        &params.name,
        params.subdirectory,
        state.settings.archive_path.as_deref(),
    );
    let archive = state.open_archive(&locator);
    let header = archive.header().await?;

    if !header.contains_zoom(coord.z) {
        return Err(GatewayError::NotFound(format!(
            "Zoom {} outside archive bounds {}-{}",
            coord.z, header.min_zoom, header.max_zoom
        )));
    }

    check_extension(
        header.tile_type,
        &coord.ext,
        state.settings.legacy_pbf_extension,
    )?;

    // contains_zoom() bounds z by the header's u8 zoom levels
    let z = u8::try_from(coord.z)
        .map_err(|_| GatewayError::NotFound(format!("Zoom {} out of range", coord.z)))?;

    let response = match archive.tile(z, coord.x, coord.y).await? {
        Some(data) => EdgeResponse::ok(data),
        None => {
            debug!(
                archive = %locator.name,
                z = z,
                x = coord.x,
                y = coord.y,
                "No tile at coordinate"
            );
            EdgeResponse::new(http::StatusCode::NO_CONTENT)
        }
    };

    Ok(response
        .with_content_type(header.tile_type.content_type())
        .with_cache_control(&state.settings.cache_control))
}

// =============================================================================
// Tileset Handler
// =============================================================================

/// Strip any port from a Host header value.
pub fn hostname_of(host: &str) -> &str {
    if host.starts_with('[') {
        // IPv6 literal, keep the brackets
        return match host.find(']') {
            Some(end) => &host[..=end],
            None => host,
        };
    }
    match host.rsplit_once(':') {
        Some((name, port)) if port.bytes().all(|b| b.is_ascii_digit()) => name,
        _ => host,
    }
}

/// Serve TileJSON metadata for an archive.
///
/// Tile URLs in the document are rooted at
/// `https://{public_hostname or request host}/{subdirectory/}{name}`.
pub async fn tileset_handler(
    state: &AppState,
    params: &TilesetPathParams,
    request_host: &str,
) -> Result<EdgeResponse, GatewayError> {
    let locator = ArchiveLocator::resolve(
        &params.name,
        params.subdirectory,
        state.settings.archive_path.as_deref(),
    );

    let host = state
        .settings
        .public_hostname
        .as_deref()
        .unwrap_or_else(|| hostname_of(request_host));
    let base_url = format!("https://{}/{}", host, locator.public_path());

    let archive = state.open_archive(&locator);
    let tilejson = archive.tilejson(&base_url).await?;

    let body = serde_json::to_vec(&tilejson)
        .map_err(|e| GatewayError::Internal(format!("Failed to serialize TileJSON: {}", e)))?;

    Ok(EdgeResponse::ok(body)
        .with_content_type("application/json")
        .with_cache_control(&state.settings.cache_control))
}

// =============================================================================
// Font Handler
// =============================================================================

/// Serve a glyph range from the first font in the stack that has it.
///
/// Stacks longer than [`MAX_FONTSTACK_SIZE`] are rejected before any
/// storage lookup.
pub async fn font_handler(
    state: &AppState,
    params: &FontPathParams,
) -> Result<EdgeResponse, GatewayError> {
    let ids = params.font_ids();

    if ids.len() > MAX_FONTSTACK_SIZE {
        return Err(GatewayError::BadRequest(format!(
            "Bad request: at most {} fonts per request",
            MAX_FONTSTACK_SIZE
        )));
    }
    if ids.is_empty() {
        return Err(GatewayError::BadRequest(
            "Bad request: empty font stack".to_string(),
        ));
    }
    if !params.is_valid_range() {
        return Err(GatewayError::BadRequest(format!(
            "Bad request: invalid glyph range {}",
            params.range
        )));
    }

    for id in ids {
        let key = format!("{}{}/{}.pbf", FONTS_PREFIX, id, params.range);
        match state.store.get(&key, None, None).await {
            Ok(object) => {
                return Ok(EdgeResponse::ok(object.data)
                    .with_content_type("application/x-protobuf")
                    .with_cache_control(FONT_CACHE_CONTROL));
            }
            Err(StoreError::NotFound(_)) => {
                debug!(font = id, range = %params.range, "Font missing, trying next");
            }
            Err(e) => return Err(e.into()),
        }
    }

    Err(GatewayError::NotFound("Font not found".to_string()))
}

// =============================================================================
// Static File Handler
// =============================================================================

/// Storage key for a static request path.
pub fn static_key(path: &str) -> String {
    let relative = path.trim_start_matches('/');
    if relative.is_empty() || relative.ends_with('/') {
        format!("{}{}{}", STATIC_PREFIX, relative, INDEX_DOCUMENT)
    } else {
        format!("{}{}", STATIC_PREFIX, relative)
    }
}

/// Serve a static asset with its stored content type.
pub async fn static_handler(state: &AppState, path: &str) -> Result<EdgeResponse, GatewayError> {
    let key = static_key(path);
    let object = state.store.get(&key, None, None).await?;

    let content_type = object
        .content_type
        .as_deref()
        .unwrap_or("application/octet-stream");

    Ok(EdgeResponse::ok(object.data)
        .with_content_type(content_type)
        .with_cache_control(&state.settings.cache_control))
}

// =============================================================================
// Tests
// =============================================================================
