//! Tile archive abstraction layer.
//!
//! The archive binary format lives outside this crate. The gateway talks to
//! it through [`ArchiveOpener`] / [`ArchiveReader`] and hands it everything
//! it needs to read bytes: a [`RangeSource`] over the object store and a
//! decompression callback.
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │              HTTP Handlers              │
//! └────────────────────┬────────────────────┘
//!                      │ ArchiveLocator (name → storage key)
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │       ArchiveOpener / ArchiveReader     │
//! │   (external: header, tilejson, tiles)   │
//! └──────────┬─────────────────────┬────────┘
//!            │                     │
//!            ▼                     ▼
//! ┌────────────────────┐  ┌─────────────────┐
//! │  StoreRangeSource  │  │  Decompressor   │
//! │ (ranged, etag'd)   │  │ (gzip / none)   │
//! └─────────┬──────────┘  └─────────────────┘
//!           ▼
//! ┌─────────────────────────────────────────┐
//! │               ObjectStore               │
//! └─────────────────────────────────────────┘
//! ```

mod decompress;
mod locator;
mod source;

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::ArchiveError;

pub use decompress::{native_decompress, Compression, Decompressor};
pub use locator::{ArchiveLocator, Subdirectory, DEFAULT_ARCHIVE_SUFFIX};
pub use source::{RangeResponse, RangeSource, StoreRangeSource};

// =============================================================================
// Tile Types
// =============================================================================

/// Type of the tiles stored in an archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileType {
    Unknown,
    Mvt,
    Png,
    Jpeg,
    Webp,
    Avif,
}

impl TileType {
    /// The one file extension clients must use for this tile type.
    ///
    /// `None` for archives of unknown type, which accept any extension.
    pub fn extension(&self) -> Option<&'static str> {
        match self {
            TileType::Unknown => None,
            TileType::Mvt => Some("mvt"),
            TileType::Png => Some("png"),
            TileType::Jpeg => Some("jpg"),
            TileType::Webp => Some("webp"),
            TileType::Avif => Some("avif"),
        }
    }

    /// HTTP content type for tiles of this type.
    pub fn content_type(&self) -> &'static str {
        match self {
            TileType::Unknown => "application/octet-stream",
            TileType::Mvt => "application/x-protobuf",
            TileType::Png => "image/png",
            TileType::Jpeg => "image/jpeg",
            TileType::Webp => "image/webp",
            TileType::Avif => "image/avif",
        }
    }
}

// =============================================================================
// Archive Header
// =============================================================================

/// The parts of an archive header the gateway makes decisions on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveHeader {
    pub min_zoom: u8,
    pub max_zoom: u8,
    pub tile_type: TileType,
}

impl ArchiveHeader {
    /// Whether `z` lies within the archive's declared zoom bounds.
    pub fn contains_zoom(&self, z: u32) -> bool {
        z >= u32::from(self.min_zoom) && z <= u32::from(self.max_zoom)
    }
}

// =============================================================================
// Reader Traits
// =============================================================================

/// An opened archive.
///
/// Every method may hit storage; a missing archive object surfaces as
/// [`ArchiveError::NotFound`] from whichever call first reads it.
#[async_trait]
pub trait ArchiveReader: Send + Sync {
    /// Read the archive header.
    async fn header(&self) -> Result<ArchiveHeader, ArchiveError>;

    /// Build the TileJSON document for this archive, with tile URLs rooted
    /// at `base_url`.
    async fn tilejson(&self, base_url: &str) -> Result<serde_json::Value, ArchiveError>;

    /// Read the tile at `(z, x, y)`. `Ok(None)` means the coordinate is
    /// valid but the archive holds no tile there.
    async fn tile(&self, z: u8, x: u64, y: u64) -> Result<Option<Bytes>, ArchiveError>;
}

/// Opens archives over a byte source.
pub trait ArchiveOpener: Send + Sync {
    fn open(
        &self,
        source: Arc<dyn RangeSource>,
        decompress: Decompressor,
    ) -> Box<dyn ArchiveReader>;
}
