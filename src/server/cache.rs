//! Edge response cache.
//!
//! Entries are keyed by the full request URL and shared by every origin that
//! requests that URL. For that to be safe an entry must never carry an
//! `Access-Control-Allow-Origin` header: CORS headers are added per request
//! after the cache, on hits and misses alike.
//!
//! # Storage Rules
//!
//! A response is stored only when it has a `Cache-Control` header that does
//! not contain `no-cache` or `no-store`. Stores run as detached tasks: the
//! client's response never waits on them, and a failed store is logged and
//! forgotten.
//!
//! # Expiry
//!
//! An entry lives for the `s-maxage` (or, failing that, `max-age`) of its
//! stored Cache-Control value. Expired entries are dropped on lookup and
//! reported as misses. Entries without either directive live until evicted.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use lru::LruCache;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::response::EdgeResponse;
use crate::error::CacheError;

/// Default cache capacity: 256MB
pub const DEFAULT_EDGE_CACHE_CAPACITY: usize = 256 * 1024 * 1024;

/// Default maximum number of entries (to bound LRU overhead)
const DEFAULT_MAX_ENTRIES: usize = 100_000;

// =============================================================================
// Cache Contract
// =============================================================================

/// A URL-keyed whole-response store.
#[async_trait]
pub trait EdgeCache: Send + Sync {
    /// Find the stored response for `url`.
    async fn lookup(&self, url: &str) -> Option<EdgeResponse>;

    /// Store `response` under `url`, replacing any previous entry.
    async fn store(&self, url: &str, response: EdgeResponse) -> Result<(), CacheError>;
}

/// Whether a response with this Cache-Control value may be stored.
pub fn is_storable(cache_control: Option<&str>) -> bool {
    match cache_control {
        None => false,
        Some(value) => {
            let value = value.to_ascii_lowercase();
            !value.contains("no-cache") && !value.contains("no-store")
        }
    }
}

/// Freshness lifetime declared by a Cache-Control value.
///
/// `s-maxage` takes precedence over `max-age`, as for any shared cache.
pub fn freshness_lifetime(cache_control: Option<&str>) -> Option<Duration> {
    let value = cache_control?.to_ascii_lowercase();
    let directive = |name: &str| {
        value.split(',').find_map(|part| {
            let (key, seconds) = part.trim().split_once('=')?;
            if key.trim() != name {
                return None;
            }
            seconds.trim().trim_matches('"').parse::<u64>().ok()
        })
    };

    directive("s-maxage")
        .or_else(|| directive("max-age"))
        .map(Duration::from_secs)
}

/// Store a CORS-free copy of `response` in the background.
///
/// Returns immediately. Storage failures are logged and never retried.
pub fn spawn_store(cache: Arc<dyn EdgeCache>, url: String, response: &EdgeResponse) {
    if !is_storable(response.cache_control()) {
        debug!(url = %url, "Response not cacheable, skipping edge cache");
        return;
    }

    let entry = response.without_cors();
    tokio::spawn(async move {
        if let Err(e) = cache.store(&url, entry).await {
            warn!(url = %url, "Edge cache store failed: {}", e);
        }
    });
}

// =============================================================================
// In-Memory Cache
// =============================================================================

/// A stored response with its expiry.
#[derive(Debug, Clone)]
struct CacheEntry {
    response: EdgeResponse,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn new(response: EdgeResponse) -> Self {
        let expires_at = freshness_lifetime(response.cache_control())
            .and_then(|ttl| Instant::now().checked_add(ttl));
        Self {
            response,
            expires_at,
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }

    fn size(&self) -> usize {
        self.response.body.len()
    }
}

/// In-process LRU edge cache with a byte capacity.
///
/// Entry size is the length of the response body. Least-recently-used
/// entries are evicted once the total exceeds the capacity.
pub struct MemoryEdgeCache {
    cache: RwLock<LruCache<String, CacheEntry>>,

    /// Maximum total size in bytes
    max_size: usize,

    /// Current total size in bytes
    current_size: RwLock<usize>,
}

impl MemoryEdgeCache {
    /// Create a cache with default capacity (256MB).
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_EDGE_CACHE_CAPACITY)
    }

    /// Create a cache holding at most `max_size` bytes of response bodies.
    pub fn with_capacity(max_size: usize) -> Self {
        Self::with_capacity_and_entries(max_size, DEFAULT_MAX_ENTRIES)
    }

    /// Create a cache with a byte capacity and an entry-count limit.
    pub fn with_capacity_and_entries(max_size: usize, max_entries: usize) -> Self {
        let entries = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: RwLock::new(LruCache::new(entries)),
            max_size,
            current_size: RwLock::new(0),
        }
    }

    /// Check for an entry without updating LRU order.
    pub async fn contains(&self, url: &str) -> bool {
        self.cache.read().await.contains(url)
    }

    /// Read an entry without updating LRU order.
    pub async fn peek(&self, url: &str) -> Option<EdgeResponse> {
        self.cache
            .read()
            .await
            .peek(url)
            .map(|entry| entry.response.clone())
    }

    /// Number of cached responses.
    pub async fn len(&self) -> usize {
        self.cache.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.cache.read().await.is_empty()
    }

    /// Total size of cached bodies in bytes.
    pub async fn size(&self) -> usize {
        *self.current_size.read().await
    }

    /// Maximum capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.max_size
    }

    /// Drop every entry.
    pub async fn clear(&self) {
        let mut cache = self.cache.write().await;
        let mut current_size = self.current_size.write().await;
        cache.clear();
        *current_size = 0;
    }
}

impl Default for MemoryEdgeCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EdgeCache for MemoryEdgeCache {
    async fn lookup(&self, url: &str) -> Option<EdgeResponse> {
        let mut cache = self.cache.write().await;
        match cache.get(url) {
            Some(entry) if entry.is_expired(Instant::now()) => {}
            Some(entry) => return Some(entry.response.clone()),
            None => return None,
        }

        // Expired
        if let Some(stale) = cache.pop(url) {
            let mut current_size = self.current_size.write().await;
            *current_size = current_size.saturating_sub(stale.size());
            debug!(url = %url, "Edge cache entry expired");
        }
        None
    }

    async fn store(&self, url: &str, response: EdgeResponse) -> Result<(), CacheError> {
        let entry = CacheEntry::new(response);
        let entry_size = entry.size();
        if entry_size > self.max_size {
            return Err(CacheError::TooLarge {
                size: entry_size,
                capacity: self.max_size,
            });
        }

        let mut cache = self.cache.write().await;
        let mut current_size = self.current_size.write().await;

        if let Some(old) = cache.peek(url) {
            *current_size = current_size.saturating_sub(old.size());
        }

        // push() hands back whatever the entry limit pushed out
        if let Some((evicted_url, evicted)) = cache.push(url.to_string(), entry) {
            if evicted_url != url {
                *current_size = current_size.saturating_sub(evicted.size());
            }
        }
        *current_size += entry_size;

        while *current_size > self.max_size {
            match cache.pop_lru() {
                Some((_, evicted)) => {
                    *current_size = current_size.saturating_sub(evicted.size());
                }
                None => break,
            }
        }

        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
