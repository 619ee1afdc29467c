//! Version-checked cache of loaded artifact bundles

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use super::lru_ttl::{CacheStats, LruTtlCache};
use crate::artifacts::ArtifactBundle;

/// Loaded bundles keyed by series key.
///
/// Every lookup states the store's current version; an entry for any other
/// version is dropped and reported as a miss, so a retrained key is never
/// served from a stale bundle.
pub struct BundleCache {
    inner: LruTtlCache<String, Arc<ArtifactBundle>>,
}

impl BundleCache {
    pub fn new(max_size: usize, ttl: Duration) -> Self {
        Self {
            inner: LruTtlCache::new(max_size, ttl),
        }
    }

    pub fn get(&self, key: &str, current_version: u64) -> Option<Arc<ArtifactBundle>> {
        let key = key.to_string();
        let mut stale = None;
        let found = self.inner.get_if(&key, |bundle| {
            let fresh = bundle.version() == current_version;
            if !fresh {
                stale = Some(bundle.version());
            }
            fresh
        });

        match (&found, stale) {
            (Some(_), _) => debug!(key = %key, version = current_version, "Bundle cache hit"),
            (None, Some(cached)) => debug!(
                key = %key,
                cached,
                current = current_version,
                "Bundle cache entry is stale"
            ),
            (None, None) => debug!(key = %key, version = current_version, "Bundle cache miss"),
        }
        found
    }

    pub fn insert(&self, bundle: Arc<ArtifactBundle>) {
        self.inner.set(bundle.key().to_string(), bundle);
    }

    pub fn invalidate(&self, key: &str) {
        if self.inner.remove(&key.to_string()).is_some() {
            debug!(key, "Invalidated cached bundle");
        }
    }

    pub fn clear(&self) {
        self.inner.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        self.inner.stats()
    }
}

impl std::fmt::Debug for BundleCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BundleCache").field("stats", &self.stats()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::BundleMetadata;
    use crate::preprocessing::ScalingState;
    use crate::training::{Architecture, ModelParameters};

    fn bundle(version: u64) -> Arc<ArtifactBundle> {
        let bundle = ArtifactBundle::new(
            ModelParameters {
                architecture: Architecture::Linear,
                lookback: 1,
                weights: vec![1.0, 0.0],
            },
            ScalingState { min: 0.0, max: 1.0 },
            BundleMetadata::new("NVDA", "linear"),
        );
        Arc::new(bundle.with_version(version))
    }

    #[test]
    fn test_hit_on_matching_version() {
        let cache = BundleCache::new(4, Duration::from_secs(60));
        cache.insert(bundle(1));
        assert_eq!(cache.get("NVDA", 1).map(|b| b.version()), Some(1));
        assert_eq!(cache.stats().hits, 1);
    }

    #[test]
    fn test_version_mismatch_is_a_miss() {
        let cache = BundleCache::new(4, Duration::from_secs(60));
        cache.insert(bundle(1));
        assert!(cache.get("NVDA", 2).is_none());
        assert!(cache.is_empty());

        let stats = cache.stats();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn test_invalidate() {
        let cache = BundleCache::new(4, Duration::from_secs(60));
        cache.insert(bundle(3));
        cache.invalidate("NVDA");
        assert!(cache.get("NVDA", 3).is_none());
    }
}
