//! Response caching.
//!
//! - [`control`]: the `Cache-Control` codec
//! - [`DiskCache`]: SQLite store with TTL and LRU eviction
//! - [`CachingAssetAccessor`]: read-through decorator for any [`AssetAccessor`](crate::http::AssetAccessor)

mod accessor;
pub mod control;
mod disk;
mod item;

pub use accessor::CachingAssetAccessor;
pub use control::{CacheControlError, ResponseCacheControl, CACHE_CONTROL_HEADER};
pub use disk::{
    DiskCache, DiskCacheConfig, DiskCacheError, PruneResult, DEFAULT_MAX_ITEMS,
    DEFAULT_PRUNE_INTERVAL,
};
pub use item::{CacheItem, CacheRequest, CacheResponse};
