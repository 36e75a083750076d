//! Configuration for the tile gateway.
//!
//! Options come from command-line arguments via clap, with every option
//! also readable from a `TILEGATE_` environment variable.
//!
//! # Example
//!
//! ```ignore
//! use clap::Parser;
//! use tile_gateway::config::GatewayConfig;
//!
//! let config = GatewayConfig::parse();
//! config.validate()?;
//! let router_config = config.router_config();
//! ```
//!
//! # Environment Variables
//!
//! - `TILEGATE_HOST` - Server bind address (default: 0.0.0.0)
//! - `TILEGATE_PORT` - Server port (default: 3000)
//! - `TILEGATE_S3_BUCKET` - Bucket holding archives, fonts and static files (required)
//! - `TILEGATE_S3_ENDPOINT` - Custom S3 endpoint for S3-compatible services
//! - `TILEGATE_S3_REGION` - AWS region (default: us-east-1)
//! - `TILEGATE_ALLOWED_ORIGINS` - Newline-separated origin globs allowed to use the gateway
//! - `TILEGATE_FAVORED_ORIGINS` - Newline-separated origin globs exempt from the per-origin limit
//! - `TILEGATE_CACHE_CONTROL` - Cache-Control for tiles and metadata (default: public, max-age=86400)
//! - `TILEGATE_PUBLIC_HOSTNAME` - Hostname used in TileJSON tile URLs
//! - `TILEGATE_ARCHIVE_PATH` - Archive key template with a `{name}` token
//! - `TILEGATE_CLIENT_ADDRESS_HEADER` - Header carrying the client address (default: cf-connecting-ip)
//! - `TILEGATE_PER_IP_LIMIT` - Requests per minute per client address (default: unlimited)
//! - `TILEGATE_PER_ORIGIN_LIMIT` - Requests per minute per Origin (default: unlimited)
//! - `TILEGATE_EDGE_CACHE_BYTES` - Edge cache capacity in bytes (default: 256MB)
//! - `TILEGATE_ERROR_MAX_AGE` - max-age for cacheable error responses (default: 60)
//! - `TILEGATE_LEGACY_PBF_EXTENSION` - Accept `.pbf` for vector tiles (default: true)

use clap::{ArgAction, Parser};

use crate::server::access::OriginPatterns;
use crate::server::cache::DEFAULT_EDGE_CACHE_CAPACITY;
use crate::server::errors::DEFAULT_ERROR_MAX_AGE;
use crate::server::handlers::DEFAULT_CACHE_CONTROL;
use crate::server::routes::{RouterConfig, DEFAULT_CLIENT_ADDRESS_HEADER};

// =============================================================================
// Default Values
// =============================================================================

/// Default server host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_PORT: u16 = 3000;

/// Default AWS region.
pub const DEFAULT_REGION: &str = "us-east-1";

// =============================================================================
// CLI Arguments
// =============================================================================

/// Tile Gateway - an edge gateway for map-tile archives.
///
/// Serves tiles, TileJSON, glyphs and static assets out of S3 or
/// S3-compatible storage, with origin checks, rate limits and an edge cache.
#[derive(Parser, Debug, Clone)]
#[command(name = "tile-gateway")]
#[command(author, version, about, long_about = None)]
pub struct GatewayConfig {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "TILEGATE_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "TILEGATE_PORT")]
    pub port: u16,

    // =========================================================================
    // S3 Configuration
    // =========================================================================
    /// S3 bucket holding archives, fonts and static files.
    #[arg(long, env = "TILEGATE_S3_BUCKET")]
    pub s3_bucket: String,

    /// Custom S3 endpoint URL for S3-compatible services (MinIO, R2, etc.).
    ///
    /// If not specified, uses the default AWS S3 endpoint.
    #[arg(long, env = "TILEGATE_S3_ENDPOINT")]
    pub s3_endpoint: Option<String>,

    /// AWS region for S3.
    #[arg(long, default_value = DEFAULT_REGION, env = "TILEGATE_S3_REGION")]
    pub s3_region: String,

    // =========================================================================
    // Access Configuration
    // =========================================================================
    /// Origins allowed to use the gateway, one glob per line.
    ///
    /// `*` matches any run of characters. A lone `*` also admits requests
    /// without an Origin header. Nothing is allowed when unset.
    #[arg(long, default_value = "", env = "TILEGATE_ALLOWED_ORIGINS")]
    pub allowed_origins: String,

    /// Origins exempt from the per-origin rate limit, one glob per line.
    #[arg(long, default_value = "", env = "TILEGATE_FAVORED_ORIGINS")]
    pub favored_origins: String,

    /// Header carrying the client's address.
    #[arg(long, default_value = DEFAULT_CLIENT_ADDRESS_HEADER, env = "TILEGATE_CLIENT_ADDRESS_HEADER")]
    pub client_address_header: String,

    /// Requests per minute allowed per client address.
    #[arg(long, env = "TILEGATE_PER_IP_LIMIT")]
    pub per_ip_limit: Option<u32>,

    /// Requests per minute allowed per Origin.
    #[arg(long, env = "TILEGATE_PER_ORIGIN_LIMIT")]
    pub per_origin_limit: Option<u32>,

    // =========================================================================
    // Response Configuration
    // =========================================================================
    /// Cache-Control for tiles, TileJSON and static files.
    #[arg(long, default_value = DEFAULT_CACHE_CONTROL, env = "TILEGATE_CACHE_CONTROL")]
    pub cache_control: String,

    /// Hostname used in TileJSON tile URLs instead of the request's Host.
    #[arg(long, env = "TILEGATE_PUBLIC_HOSTNAME")]
    pub public_hostname: Option<String>,

    /// Archive key template, e.g. `tiles/{name}.pmtiles`.
    ///
    /// If not specified, archives are read from `{name}.pmtiles`.
    #[arg(long, env = "TILEGATE_ARCHIVE_PATH")]
    pub archive_path: Option<String>,

    /// max-age in seconds for 400, 403 and 404 responses.
    #[arg(long, default_value_t = DEFAULT_ERROR_MAX_AGE, env = "TILEGATE_ERROR_MAX_AGE")]
    pub error_max_age: u32,

    /// Accept the deprecated `.pbf` extension for vector tiles.
    #[arg(
        long,
        default_value_t = true,
        action = ArgAction::Set,
        env = "TILEGATE_LEGACY_PBF_EXTENSION"
    )]
    pub legacy_pbf_extension: bool,

    // =========================================================================
    // Cache Configuration
    // =========================================================================
    /// Edge cache capacity in bytes.
    #[arg(long, default_value_t = DEFAULT_EDGE_CACHE_CAPACITY, env = "TILEGATE_EDGE_CACHE_BYTES")]
    pub edge_cache_bytes: usize,

    // =========================================================================
    // Logging Configuration
    // =========================================================================
    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Disable request tracing.
    #[arg(long, default_value_t = false)]
    pub no_tracing: bool,
}

impl GatewayConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.s3_bucket.is_empty() {
            return Err(
                "S3 bucket name is required. Set --s3-bucket or TILEGATE_S3_BUCKET".to_string(),
            );
        }

        if self.per_ip_limit == Some(0) {
            return Err("per_ip_limit must be greater than 0 (omit it for no limit)".to_string());
        }
        if self.per_origin_limit == Some(0) {
            return Err(
                "per_origin_limit must be greater than 0 (omit it for no limit)".to_string(),
            );
        }

        if self.edge_cache_bytes == 0 {
            return Err("edge_cache_bytes must be greater than 0".to_string());
        }

        if let Some(ref template) = self.archive_path {
            if !template.contains("{name}") {
                return Err("archive_path must contain a {name} token".to_string());
            }
        }

        if self.client_address_header.trim().is_empty() {
            return Err("client_address_header must not be empty".to_string());
        }

        Ok(())
    }

    /// Get the server bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Build the router configuration, compiling the origin globs.
    pub fn router_config(&self) -> RouterConfig {
        let mut config = RouterConfig::new()
            .with_allowed_origins(OriginPatterns::parse(&self.allowed_origins))
            .with_favored_origins(OriginPatterns::parse(&self.favored_origins))
            .with_cache_control(self.cache_control.clone())
            .with_client_address_header(self.client_address_header.trim())
            .with_error_max_age(self.error_max_age)
            .with_legacy_pbf_extension(self.legacy_pbf_extension)
            .with_tracing(!self.no_tracing);

        if let Some(ref hostname) = self.public_hostname {
            config = config.with_public_hostname(hostname.clone());
        }
        if let Some(ref template) = self.archive_path {
            config = config.with_archive_path(template.clone());
        }

        config
    }
}

// =============================================================================
// Tests
// =============================================================================
