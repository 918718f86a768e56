//! Plain in-memory request/response values.

use super::{AssetRequest, AssetResponse, HttpHeaders};
use crate::cache::ResponseCacheControl;

/// An owned response.
///
/// `new` parses cache-control directives from the headers, as a transport
/// would when it receives the response.
#[derive(Debug, Clone, PartialEq)]
pub struct SimpleAssetResponse {
    status_code: u16,
    content_type: String,
    headers: HttpHeaders,
    cache_control: Option<ResponseCacheControl>,
    data: Vec<u8>,
}

impl SimpleAssetResponse {
    pub fn new(
        status_code: u16,
        content_type: impl Into<String>,
        headers: HttpHeaders,
        data: Vec<u8>,
    ) -> Self {
        let cache_control = ResponseCacheControl::parse_from_response_headers(&headers);
        Self {
            status_code,
            content_type: content_type.into(),
            headers,
            cache_control,
            data,
        }
    }

    /// Override the parsed cache-control directives.
    pub fn with_cache_control(mut self, cache_control: Option<ResponseCacheControl>) -> Self {
        self.cache_control = cache_control;
        self
    }
}

impl AssetResponse for SimpleAssetResponse {
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

/// An owned request with an optional response.
#[derive(Debug, Clone, PartialEq)]
pub struct SimpleAssetRequest {
    method: String,
    url: String,
    headers: HttpHeaders,
    response: Option<SimpleAssetResponse>,
}

impl SimpleAssetRequest {
    pub fn new(method: impl Into<String>, url: impl Into<String>, headers: HttpHeaders) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            headers,
            response: None,
        }
    }

    /// Shorthand for a GET request without headers.
    pub fn get(url: impl Into<String>) -> Self {
        Self::new("GET", url, HttpHeaders::new())
    }

    /// Attach a completed response.
    pub fn with_response(mut self, response: SimpleAssetResponse) -> Self {
        self.response = Some(response);
        self
    }
}

impl AssetRequest for SimpleAssetRequest {
    fn method(&self) -> &str {
        &self.method
    }

    fn url(&self) -> &str {
        &self.url
    }

    fn headers(&self) -> &HttpHeaders {
        &self.headers
    }

    fn response(&self) -> Option<&dyn AssetResponse> {
        self.response.as_ref().map(|r| r as &dyn AssetResponse)
    }
}
