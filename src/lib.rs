//! # Tile Gateway
//!
//! An edge gateway serving map tiles out of single-file tile archives stored
//! in S3-compatible object storage.
//!
//! Every request passes origin-based access control and per-IP / per-origin
//! rate limits before anything is read. Successful responses are kept in a
//! URL-keyed edge cache that is shared across origins, with CORS headers
//! added per request on the way out.
//!
//! ## Features
//!
//! - **Tiles**: `/{name}/{z}/{x}/{y}.{ext}`, with zoom bounds and extension
//!   checked against the archive header
//! - **TileJSON**: `/{name}.json`, with tile URLs rooted at a public hostname
//! - **Glyphs**: `/fonts/{stack}/{range}.pbf`, first available font wins
//! - **Static assets**: everything else, served from the `static/` prefix
//!
//! ## Architecture
//!
//! - [`store`] - Object storage contract and the S3 implementation
//! - [`archive`] - Archive reader contract, key resolution and byte sources
//! - [`server`] - Pipeline stages, handlers and the Axum router
//! - [`config`] - CLI and configuration types
//! - [`telemetry`] - Logging setup
//!
//! The archive format itself is not parsed here: an [`ArchiveOpener`]
//! supplied by the embedding binary turns a byte source into an
//! [`ArchiveReader`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use clap::Parser;
//! use tile_gateway::{init_logging, serve, ArchiveOpener, GatewayConfig};
//!
//! # fn opener() -> Arc<dyn ArchiveOpener> { unimplemented!() }
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = GatewayConfig::parse();
//!     init_logging(config.verbose);
//!
//!     serve(config, opener()).await?;
//!     Ok(())
//! }
//! ```

pub mod archive;
pub mod config;
pub mod error;
pub mod server;
pub mod store;
pub mod telemetry;

pub use archive::{
    native_decompress, ArchiveHeader, ArchiveLocator, ArchiveOpener, ArchiveReader, Compression,
    Decompressor, RangeResponse, RangeSource, StoreRangeSource, Subdirectory, TileType,
};
pub use config::GatewayConfig;
pub use error::{ArchiveError, CacheError, ErrorKind, GatewayError, ServeError, StoreError};
pub use server::{
    create_router, serve, AccessControl, Backends, EdgeCache, EdgeResponse, GovernorLimiter,
    MemoryEdgeCache, OriginPatterns, QuotaEnforcer, RateLimiter, RouterConfig, Unlimited,
};
pub use store::{create_s3_client, ByteRange, ObjectStore, S3ObjectStore, StoredObject};
pub use telemetry::init_logging;
