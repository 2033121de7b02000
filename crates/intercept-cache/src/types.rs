//! Request, response and cache-entry types

use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// An outbound request seen by the interception layer
#[derive(Debug, Clone)]
pub struct InterceptedRequest {
    pub method: Method,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

impl InterceptedRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: Vec::new(),
            body: None,
        }
    }

    /// Shorthand for a bodyless GET
    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = Some(body);
        self
    }

    pub fn path(&self) -> &str {
        self.url.path()
    }

    /// Only GET and HEAD requests are ever matched against a cache
    pub fn is_cacheable_method(&self) -> bool {
        self.method == Method::GET || self.method == Method::HEAD
    }
}

/// A response as returned by the network or stored in a namespace.
///
/// Bodies are kept fully in memory and handed back byte-identical.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl CachedResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// 2xx status
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Case-insensitive header lookup, first value wins
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn content_type(&self) -> &str {
        self.header("content-type")
            .unwrap_or("application/octet-stream")
    }
}

/// The string a request is stored under inside a namespace.
///
/// Same-origin URLs are keyed by path and query so that a manifest locator
/// like `/index.html` and a request for `http://origin/index.html` share a
/// key. Cross-origin URLs keep their full form. Fragments never take part.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn for_url(url: &Url, origin: &Url) -> Self {
        if url.origin() == origin.origin() {
            let mut key = url.path().to_string();
            if let Some(query) = url.query() {
                key.push('?');
                key.push_str(query);
            }
            return Self(key);
        }

        let mut url = url.clone();
        url.set_fragment(None);
        Self(url.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CacheKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Metadata for a stored response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub content_type: String,
    pub size: u64,
    pub created_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn describe(key: &CacheKey, response: &CachedResponse) -> Self {
        Self {
            key: key.clone(),
            status: response.status,
            headers: response.headers.clone(),
            content_type: response.content_type().to_string(),
            size: response.body.len() as u64,
            created_at: Utc::now(),
        }
    }

    pub fn into_response(self, body: Vec<u8>) -> CachedResponse {
        CachedResponse {
            status: self.status,
            headers: self.headers,
            body,
        }
    }
}

/// Statistics about a cache store
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    pub namespaces: usize,
    pub entries: usize,
    /// Sum of stored body lengths, identical across store backends
    pub total_size: u64,
    pub hits: u64,
    pub misses: u64,
}
