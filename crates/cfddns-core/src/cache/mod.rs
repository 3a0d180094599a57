// # Zone ID Cache
//
// Optional, time-bounded, in-memory map from zone name to provider zone ID.
//
// ## Scope
//
// Only zone IDs are cached. Record IDs and published record content are read
// from the provider on every cycle, because the record lookup is also how the
// Reconciler learns the published IP.
//
// ## Staleness
//
// - An entry older than the configured TTL is treated as absent
// - The Reconciler invalidates an entry as soon as the provider stops
//   recognising the cached ID, then re-resolves from the provider
// - Nothing survives a restart

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::traits::ZoneId;

/// Upper bound for the cache lifetime
const MAX_TTL: Duration = Duration::from_secs(86_400);

#[derive(Debug, Clone)]
struct CachedZone {
    zone_id: ZoneId,
    resolved_at: chrono::DateTime<chrono::Utc>,
}

impl CachedZone {
    fn is_stale(&self, max_age: chrono::Duration) -> bool {
        chrono::Utc::now().signed_duration_since(self.resolved_at) >= max_age
    }
}

/// In-memory zone ID cache
///
/// # Example
///
/// ```rust,no_run
/// use cfddns_core::cache::ZoneCache;
/// use cfddns_core::traits::ZoneId;
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() {
///     let cache = ZoneCache::new(Duration::from_secs(3600));
///     cache.insert("example.com", ZoneId::new("023e105f4ecef8ad9ca31a8372d0c353")).await;
///     assert!(cache.get("example.com").await.is_some());
/// }
/// ```
#[derive(Debug, Clone)]
pub struct ZoneCache {
    ttl: chrono::Duration,
    inner: Arc<RwLock<HashMap<String, CachedZone>>>,
}

impl ZoneCache {
    /// Create an empty cache whose entries live for `ttl` (capped at one day)
    pub fn new(ttl: Duration) -> Self {
        let ttl = chrono::Duration::from_std(ttl.min(MAX_TTL))
            .unwrap_or_else(|_| chrono::Duration::days(1));
        Self {
            ttl,
            inner: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Get a fresh zone ID, if one is cached
    pub async fn get(&self, zone_name: &str) -> Option<ZoneId> {
        let guard = self.inner.read().await;
        guard
            .get(&cache_key(zone_name))
            .filter(|entry| !entry.is_stale(self.ttl))
            .map(|entry| entry.zone_id.clone())
    }

    /// Remember a zone ID resolved from the provider
    pub async fn insert(&self, zone_name: &str, zone_id: ZoneId) {
        let mut guard = self.inner.write().await;
        guard.insert(
            cache_key(zone_name),
            CachedZone {
                zone_id,
                resolved_at: chrono::Utc::now(),
            },
        );
    }

    /// Forget a zone ID the provider no longer recognises
    pub async fn invalidate(&self, zone_name: &str) {
        let mut guard = self.inner.write().await;
        guard.remove(&cache_key(zone_name));
    }

    /// Get the number of cached entries, stale ones included
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Check if the cache is empty
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

// Zone names are case-insensitive
fn cache_key(zone_name: &str) -> String {
    zone_name.to_ascii_lowercase()
}
