//! Request/response contract shared with the asset-fetch path.
//!
//! The network transport is supplied by the embedding application through
//! [`AssetAccessor`]. This module only defines the shape of a completed
//! exchange, which is what the disk cache persists.

mod simple;

use std::collections::BTreeMap;
use std::sync::Arc;

use thiserror::Error;

use crate::async_system::BoxFuture;
use crate::cache::ResponseCacheControl;

pub use simple::{SimpleAssetRequest, SimpleAssetResponse};

/// HTTP header map, ordered by header name.
pub type HttpHeaders = BTreeMap<String, String>;

/// Errors surfaced by asset accessors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AssetError {
    /// The transport could not complete the request.
    #[error("Request to {url} failed: {message}")]
    RequestFailed { url: String, message: String },

    /// A worker task panicked or was cancelled.
    #[error("Worker task failed: {0}")]
    Worker(String),
}

impl From<tokio::task::JoinError> for AssetError {
    fn from(e: tokio::task::JoinError) -> Self {
        AssetError::Worker(e.to_string())
    }
}

/// A response received for an [`AssetRequest`].
pub trait AssetResponse: Send + Sync {
    fn status_code(&self) -> u16;

    fn content_type(&self) -> &str;

    fn headers(&self) -> &HttpHeaders;

    /// Parsed `Cache-Control` directives, if the response carried any.
    fn cache_control(&self) -> Option<&ResponseCacheControl>;

    fn data(&self) -> &[u8];
}

/// A request, optionally with its completed response attached.
pub trait AssetRequest: Send + Sync {
    fn method(&self) -> &str;

    fn url(&self) -> &str;

    fn headers(&self) -> &HttpHeaders;

    /// The response, or `None` if the request has not completed.
    fn response(&self) -> Option<&dyn AssetResponse>;
}

/// Fetches assets over whatever transport the application provides.
pub trait AssetAccessor: Send + Sync {
    /// Issue a GET request for `url` with the given request headers.
    fn get(
        &self,
        url: &str,
        headers: &HttpHeaders,
    ) -> BoxFuture<'static, Result<Arc<dyn AssetRequest>, AssetError>>;
}
