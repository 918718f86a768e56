//! HTTP `Cache-Control` directives.
//!
//! [`ResponseCacheControl::parse_from_response_headers`] reads the directives a
//! server sent, and the persisted form is the compact JSON object stored in
//! the `responseCacheControl` column of the disk cache.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::http::HttpHeaders;

/// Header name looked up by the parser. The lookup is case-sensitive.
pub const CACHE_CONTROL_HEADER: &str = "Cache-Control";

/// Errors decoding a persisted cache-control string.
#[derive(Debug, Error)]
pub enum CacheControlError {
    /// The string is not JSON or lacks one of the nine expected keys.
    #[error("Malformed persisted cache-control '{text}': {source}")]
    Malformed {
        text: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Parsed `Cache-Control` response directives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseCacheControl {
    must_revalidate: bool,
    no_cache: bool,
    no_store: bool,
    no_transform: bool,
    access_control_public: bool,
    access_control_private: bool,
    proxy_revalidate: bool,
    max_age: i32,
    shared_max_age: i32,
}

impl ResponseCacheControl {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        must_revalidate: bool,
        no_cache: bool,
        no_store: bool,
        no_transform: bool,
        access_control_public: bool,
        access_control_private: bool,
        proxy_revalidate: bool,
        max_age: i32,
        shared_max_age: i32,
    ) -> Self {
        Self {
            must_revalidate,
            no_cache,
            no_store,
            no_transform,
            access_control_public,
            access_control_private,
            proxy_revalidate,
            max_age,
            shared_max_age,
        }
    }

    /// Parse the `Cache-Control` header out of a response's headers.
    ///
    /// Returns `None` when the header is absent. Directive names match
    /// case-insensitively; unknown directives are ignored and an unparsable
    /// `max-age`/`s-maxage` value counts as 0.
    pub fn parse_from_response_headers(headers: &HttpHeaders) -> Option<Self> {
        let header_value = headers.get(CACHE_CONTROL_HEADER)?;

        let mut parameterized: BTreeMap<String, &str> = BTreeMap::new();
        let mut directives: BTreeSet<String> = BTreeSet::new();

        for raw in header_value.split(',') {
            let directive = trim_space(raw);
            match directive.split_once('=') {
                Some((name, value)) => {
                    // First occurrence wins.
                    parameterized
                        .entry(trim_space(name).to_ascii_lowercase())
                        .or_insert_with(|| trim_space(value));
                }
                None => {
                    directives.insert(directive.to_ascii_lowercase());
                }
            }
        }

        let has = |name: &str| directives.contains(name);
        let seconds = |name: &str| {
            parameterized
                .get(name)
                .and_then(|value| value.parse::<i32>().ok())
                .unwrap_or(0)
        };

        Some(Self {
            must_revalidate: has("must-revalidate"),
            no_cache: has("no-cache"),
            no_store: has("no-store"),
            no_transform: has("no-transform"),
            access_control_public: has("public"),
            access_control_private: has("private"),
            proxy_revalidate: has("proxy-revalidate"),
            max_age: seconds("max-age"),
            shared_max_age: seconds("s-maxage"),
        })
    }

    /// Serialize to the compact form stored by the disk cache.
    pub fn to_persisted_string(&self) -> String {
        // A struct of bools and integers always serializes.
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Decode the form written by [`to_persisted_string`](Self::to_persisted_string).
    pub fn from_persisted_str(text: &str) -> Result<Self, CacheControlError> {
        serde_json::from_str(text).map_err(|source| CacheControlError::Malformed {
            text: text.to_string(),
            source,
        })
    }

    pub fn must_revalidate(&self) -> bool {
        self.must_revalidate
    }

    pub fn no_cache(&self) -> bool {
        self.no_cache
    }

    pub fn no_store(&self) -> bool {
        self.no_store
    }

    pub fn no_transform(&self) -> bool {
        self.no_transform
    }

    pub fn access_control_public(&self) -> bool {
        self.access_control_public
    }

    pub fn access_control_private(&self) -> bool {
        self.access_control_private
    }

    pub fn proxy_revalidate(&self) -> bool {
        self.proxy_revalidate
    }

    /// `max-age` in seconds.
    pub fn max_age(&self) -> i32 {
        self.max_age
    }

    /// `s-maxage` in seconds.
    pub fn shared_max_age(&self) -> i32 {
        self.shared_max_age
    }

    /// How long a response may be served from cache.
    ///
    /// `s-maxage` takes precedence over `max-age`; negative values clamp to zero.
    pub fn freshness_lifetime(&self) -> Duration {
        let seconds = if self.shared_max_age > 0 {
            self.shared_max_age
        } else {
            self.max_age
        };
        Duration::from_secs(u64::try_from(seconds).unwrap_or(0))
    }

    /// Whether a response with these directives may be stored and reused
    /// without revalidation.
    pub fn is_cacheable(&self) -> bool {
        !self.no_store && !self.no_cache && !self.freshness_lifetime().is_zero()
    }
}

fn trim_space(s: &str) -> &str {
    s.trim_matches(' ')
}
