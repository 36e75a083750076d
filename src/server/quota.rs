//! Quota enforcement.
//!
//! Every admitted request passes two limiter checks:
//!
//! 1. **Per-IP**, keyed by the client address header. Always evaluated.
//! 2. **Per-origin**, keyed by the Origin header. Skipped for favored
//!    origins.
//!
//! Missing header values become the empty string, so all requests without a
//! client address (or without an Origin) share one bucket.
//!
//! The limiter itself sits behind [`RateLimiter`]; the gateway only relies
//! on its allow/deny answer.

use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use governor::{DefaultKeyedRateLimiter, Quota};
use tracing::{debug, info};

use super::access::OriginPatterns;
use crate::error::GatewayError;

// =============================================================================
// Limiter Contract
// =============================================================================

/// Allow/deny admission for a key under a pre-configured window.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Record one request for `key`. Returns `false` when the key is over its
    /// limit.
    async fn allow(&self, key: &str) -> bool;
}

/// Limiter that admits every request.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unlimited;

#[async_trait]
impl RateLimiter for Unlimited {
    async fn allow(&self, _key: &str) -> bool {
        true
    }
}

/// Checks between two prunes of idle limiter keys.
pub const DEFAULT_PRUNE_INTERVAL: u64 = 4096;

/// In-process keyed GCRA limiter.
///
/// Admits `per_minute` requests per key per minute, with bursts of up to the
/// same amount. Keys are client addresses and origins, so every
/// `prune_interval` checks the limiter drops keys whose state has fully
/// replenished.
pub struct GovernorLimiter {
    limiter: DefaultKeyedRateLimiter<String>,
    prune_interval: u64,
    checks: AtomicU64,
}

impl GovernorLimiter {
    pub fn per_minute(per_minute: NonZeroU32) -> Self {
        Self {
            limiter: DefaultKeyedRateLimiter::keyed(Quota::per_minute(per_minute)),
            prune_interval: DEFAULT_PRUNE_INTERVAL,
            checks: AtomicU64::new(0),
        }
    }

    /// Prune idle keys every `checks` checks. Zero is treated as one.
    pub fn with_prune_interval(mut self, checks: u64) -> Self {
        self.prune_interval = checks.max(1);
        self
    }

    /// Drop every key that is no longer limited.
    pub fn prune(&self) {
        let before = self.limiter.len();
        self.limiter.retain_recent();
        self.limiter.shrink_to_fit();
        debug!(before, after = self.limiter.len(), "Pruned rate limiter keys");
    }

    /// Number of keys currently tracked.
    pub fn tracked_keys(&self) -> usize {
        self.limiter.len()
    }

    /// Build a limiter for an optional configured limit. `None` (or zero)
    /// means unlimited.
    pub fn from_limit(per_minute: Option<u32>) -> Arc<dyn RateLimiter> {
        match per_minute.and_then(NonZeroU32::new) {
            Some(limit) => Arc::new(Self::per_minute(limit)),
            None => Arc::new(Unlimited),
        }
    }
}

#[async_trait]
impl RateLimiter for GovernorLimiter {
    async fn allow(&self, key: &str) -> bool {
        let allowed = self.limiter.check_key(&key.to_string()).is_ok();

        let checks = self.checks.fetch_add(1, Ordering::Relaxed) + 1;
        if checks % self.prune_interval == 0 {
            self.prune();
        }

        allowed
    }
}

// =============================================================================
// Quota Enforcer
// =============================================================================

/// Applies the per-IP and per-origin checks in order.
#[derive(Clone)]
pub struct QuotaEnforcer {
    per_ip: Arc<dyn RateLimiter>,
    per_origin: Arc<dyn RateLimiter>,
    favored: Arc<OriginPatterns>,
}

impl QuotaEnforcer {
    pub fn new(
        per_ip: Arc<dyn RateLimiter>,
        per_origin: Arc<dyn RateLimiter>,
        favored: Arc<OriginPatterns>,
    ) -> Self {
        Self {
            per_ip,
            per_origin,
            favored,
        }
    }

    /// Enforcer with no limits at all.
    pub fn unlimited() -> Self {
        Self::new(
            Arc::new(Unlimited),
            Arc::new(Unlimited),
            Arc::new(OriginPatterns::empty()),
        )
    }

    /// Whether `origin` is exempt from the per-origin check. Requests without
    /// an Origin are never favored.
    pub fn is_favored(&self, origin: Option<&str>) -> bool {
        origin.is_some_and(|o| self.favored.matches(o))
    }

    /// Run both checks. The per-IP check runs first and the first failure is
    /// returned.
    pub async fn check(
        &self,
        client_address: Option<&str>,
        origin: Option<&str>,
    ) -> Result<(), GatewayError> {
        let ip_key = client_address.unwrap_or("");
        if !self.per_ip.allow(ip_key).await {
            info!(key = ip_key, "Per-IP rate limit exceeded");
            return Err(GatewayError::RateLimited(format!(
                "Rate limit exceeded for IP {}",
                ip_key
            )));
        }

        if self.is_favored(origin) {
            debug!(origin = origin.unwrap_or(""), "Favored origin, skipping per-origin limit");
            return Ok(());
        }

        let origin_key = origin.unwrap_or("");
        if !self.per_origin.allow(origin_key).await {
            info!(key = origin_key, "Per-origin rate limit exceeded");
            return Err(GatewayError::RateLimited(format!(
                "Rate limit exceeded for Origin {}",
                origin_key
            )));
        }

        Ok(())
    }
}
