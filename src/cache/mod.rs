//! Caching for loaded artifact bundles

mod bundle_cache;
mod lru_ttl;

pub use bundle_cache::BundleCache;
pub use lru_ttl::{CacheEntry, CacheStats, LruTtlCache};
