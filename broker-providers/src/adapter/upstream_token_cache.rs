//! Per-adapter cache for an upstream OAuth2 client-credentials token
//! (spec.md §4.3, invariant 2; §5, "single-flight").
//!
//! The cache is shared across every user of an adapter — it authenticates
//! the adapter to its remote, not any particular end user.

use std::future::Future;
use std::time::{Duration, Instant};

use broker_core::error::BrokerResult;
use tokio::sync::Mutex;

const REFRESH_MARGIN: Duration = Duration::from_secs(60);

struct Cached {
    token: String,
    expires_at: Instant,
}

/// Holds `{token, expiry}` behind a single mutex so that, on a miss,
/// exactly one refresh runs while concurrent callers await its result
/// (spec.md §8, "Upstream-token refresh fires exactly once").
pub struct UpstreamTokenCache {
    inner: Mutex<Option<Cached>>,
}

impl Default for UpstreamTokenCache {
    fn default() -> Self {
        Self::new()
    }
}

impl UpstreamTokenCache {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(None),
        }
    }

    /// Return a live token, refreshing via `refresh` if the cached token
    /// is missing or has fewer than 60 seconds left.
    pub async fn get_or_refresh<F, Fut>(&self, refresh: F) -> BrokerResult<String>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = BrokerResult<(String, Duration)>>,
    {
        let mut guard = self.inner.lock().await;
        let needs_refresh = match &*guard {
            Some(cached) => Instant::now() + REFRESH_MARGIN >= cached.expires_at,
            None => true,
        };

        if needs_refresh {
            let (token, ttl) = refresh().await?;
            *guard = Some(Cached {
                token: token.clone(),
                expires_at: Instant::now() + ttl,
            });
            return Ok(token);
        }

        Ok(guard.as_ref().expect("checked above").token.clone())
    }
}
