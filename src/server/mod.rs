//! HTTP server layer for the tile gateway.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         HTTP Layer                              │
//! │     GET /{name}/{z}/{x}/{y}.{ext}   GET /fonts/{stack}/{range}  │
//! │                                                                 │
//! │  ┌──────────┐  ┌──────────┐  ┌──────────┐  ┌──────────────────┐ │
//! │  │  access  │─>│  quota   │─>│  cache   │─>│     handlers     │ │
//! │  │ (origin) │  │ (limits) │  │  (edge)  │  │ (tile/font/...)  │ │
//! │  └──────────┘  └──────────┘  └──────────┘  └──────────────────┘ │
//! │                                                                 │
//! │  ┌──────────┐  ┌──────────┐  ┌───────────────────────────────┐  │
//! │  │   cors   │  │  errors  │  │  routes (dispatch, pipeline)  │  │
//! │  └──────────┘  └──────────┘  └───────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod access;
pub mod cache;
pub mod cors;
pub mod errors;
pub mod handlers;
pub mod quota;
pub mod response;
pub mod routes;

pub use access::{AccessControl, OriginPatterns};
pub use cache::{spawn_store, EdgeCache, MemoryEdgeCache, DEFAULT_EDGE_CACHE_CAPACITY};
pub use errors::{ErrorResponder, DEFAULT_ERROR_MAX_AGE, NOT_FOUND_PAGE_KEY};
pub use handlers::{
    font_handler, static_handler, tile_handler, tileset_handler, AppState, FontPathParams,
    HandlerSettings, TilePathParams, TilesetPathParams, DEFAULT_CACHE_CONTROL, MAX_FONTSTACK_SIZE,
};
pub use quota::{GovernorLimiter, QuotaEnforcer, RateLimiter, Unlimited};
pub use response::EdgeResponse;
pub use routes::{
    build_state, create_router, run_pipeline, serve, Backends, RequestContext, Route,
    RouterConfig, DEFAULT_CLIENT_ADDRESS_HEADER,
};
