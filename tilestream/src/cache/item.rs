//! Rows of the disk cache, decoded.

use chrono::{DateTime, Utc};

use super::ResponseCacheControl;
use crate::http::{AssetRequest, AssetResponse, HttpHeaders};

/// The request half of a cached exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheRequest {
    pub headers: HttpHeaders,
    pub method: String,
    pub url: String,
}

/// The response half of a cached exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheResponse {
    pub status_code: u16,
    pub content_type: String,
    pub headers: HttpHeaders,
    pub cache_control: Option<ResponseCacheControl>,
    pub data: Vec<u8>,
}

/// One cached request/response exchange.
///
/// Produced fresh for every row a lookup scans; only
/// [`DiskCache`](super::DiskCache) mutates the stored row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheItem {
    pub expiry_time: DateTime<Utc>,
    pub last_accessed_time: DateTime<Utc>,
    pub request: CacheRequest,
    pub response: CacheResponse,
}

impl CacheItem {
    /// Whether the item's absolute expiry is still in the future at `now`.
    pub fn is_fresh_at(&self, now: DateTime<Utc>) -> bool {
        self.expiry_time > now
    }
}

impl AssetResponse for CacheResponse {
    fn status_code(&self) -> u16 {
        self.status_code
    }

    fn content_type(&self) -> &str {
        &self.content_type
    }

    fn headers(&self) -> &HttpHeaders {
        &self.headers
    }

    fn cache_control(&self) -> Option<&ResponseCacheControl> {
        self.cache_control.as_ref()
    }

    fn data(&self) -> &[u8] {
        &self.data
    }
}

/// A cache hit can be handed back to callers as a completed request.
impl AssetRequest for CacheItem {
    fn method(&self) -> &str {
        &self.request.method
    }

    fn url(&self) -> &str {
        &self.request.url
    }

    fn headers(&self) -> &HttpHeaders {
        &self.request.headers
    }

    fn response(&self) -> Option<&dyn AssetResponse> {
        Some(&self.response)
    }
}
