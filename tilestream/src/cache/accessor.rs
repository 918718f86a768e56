//! Read-through caching in front of an asset accessor.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use super::disk::{DiskCache, DEFAULT_PRUNE_INTERVAL};
use crate::async_system::{AsyncSystem, BoxFuture};
use crate::http::{AssetAccessor, AssetError, AssetRequest, HttpHeaders};
use crate::log::Logger;
use crate::{log_info, log_warn};

/// Serves fresh responses from a [`DiskCache`] and stores cacheable
/// responses fetched through the wrapped accessor.
///
/// Every database call runs on a worker thread. Cache failures are logged
/// and the request falls through to the network.
pub struct CachingAssetAccessor {
    inner: Arc<dyn AssetAccessor>,
    cache: Arc<DiskCache>,
    async_system: AsyncSystem,
    logger: Arc<dyn Logger>,
    prune_interval: u32,
    stores_since_prune: Arc<AtomicU32>,
}

impl CachingAssetAccessor {
    pub fn new(
        inner: Arc<dyn AssetAccessor>,
        cache: Arc<DiskCache>,
        async_system: AsyncSystem,
        logger: Arc<dyn Logger>,
    ) -> Self {
        Self {
            inner,
            cache,
            async_system,
            logger,
            prune_interval: DEFAULT_PRUNE_INTERVAL,
            stores_since_prune: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Prune after this many stores. Zero disables automatic pruning.
    pub fn with_prune_interval(mut self, prune_interval: u32) -> Self {
        self.prune_interval = prune_interval;
        self
    }

    pub fn cache(&self) -> &Arc<DiskCache> {
        &self.cache
    }
}

impl AssetAccessor for CachingAssetAccessor {
    fn get(
        &self,
        url: &str,
        headers: &HttpHeaders,
    ) -> BoxFuture<'static, Result<Arc<dyn AssetRequest>, AssetError>> {
        let url = url.to_string();
        let headers = headers.clone();
        let inner = Arc::clone(&self.inner);
        let cache = Arc::clone(&self.cache);
        let async_system = self.async_system.clone();
        let logger = Arc::clone(&self.logger);
        let prune_interval = self.prune_interval;
        let stores_since_prune = Arc::clone(&self.stores_since_prune);

        Box::pin(async move {
            let lookup = {
                let cache = Arc::clone(&cache);
                let key = url.clone();
                async_system
                    .run_in_worker_thread(move || {
                        let now = Utc::now();
                        cache.get_entry(&key, |item| item.is_fresh_at(now))
                    })
                    .await
                    .map_err(AssetError::from)
            };

            match lookup {
                Ok(Ok(Some(item))) => {
                    debug!(url = %url, "Serving response from disk cache");
                    return Ok(Arc::new(item) as Arc<dyn AssetRequest>);
                }
                Ok(Ok(None)) => {}
                Ok(Err(e)) => log_warn!(logger, "Cache lookup for {} failed: {}", url, e),
                Err(e) => log_warn!(logger, "Cache lookup for {} abandoned: {}", url, e),
            }

            let request = inner.get(&url, &headers).await?;

            let Some(expiry_time) = cacheable_expiry(request.as_ref(), Utc::now()) else {
                return Ok(request);
            };

            let stored = {
                let cache = Arc::clone(&cache);
                let request = Arc::clone(&request);
                let key = url.clone();
                async_system
                    .run_in_worker_thread(move || {
                        cache.store_response(&key, expiry_time, request.as_ref())
                    })
                    .await
                    .map_err(AssetError::from)
            };

            match stored {
                Ok(Ok(())) => {
                    let stores = stores_since_prune.fetch_add(1, Ordering::AcqRel) + 1;
                    if prune_interval > 0 && stores >= prune_interval {
                        stores_since_prune.store(0, Ordering::Release);
                        schedule_prune(&async_system, cache, logger);
                    }
                }
                Ok(Err(e)) => log_warn!(logger, "Failed to cache response for {}: {}", url, e),
                Err(e) => log_warn!(logger, "Caching {} abandoned: {}", url, e),
            }

            Ok(request)
        })
    }
}

fn schedule_prune(async_system: &AsyncSystem, cache: Arc<DiskCache>, logger: Arc<dyn Logger>) {
    // Detached; the response does not wait for eviction.
    drop(async_system.run_in_worker_thread(move || match cache.prune() {
        Ok(result) if result.total_removed() > 0 => log_info!(logger, "{}", result),
        Ok(_) => {}
        Err(e) => log_warn!(logger, "Disk cache prune failed: {}", e),
    }));
}

/// Expiry time for a response that may be stored, or `None`.
///
/// Only successful GET responses whose cache-control allows reuse qualify.
fn cacheable_expiry(request: &dyn AssetRequest, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    if !request.method().eq_ignore_ascii_case("GET") {
        return None;
    }
    let response = request.response()?;
    if !(200..300).contains(&response.status_code()) {
        return None;
    }
    let cache_control = response.cache_control()?;
    if !cache_control.is_cacheable() {
        return None;
    }
    let lifetime = chrono::Duration::from_std(cache_control.freshness_lifetime()).ok()?;
    now.checked_add_signed(lifetime)
}
