//! Network collaborator

use crate::error::NetworkError;
use crate::types::{CachedResponse, InterceptedRequest};
use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

/// Headers that describe a single connection and must not be forwarded
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "host",
    "content-length",
];

pub fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP.iter().any(|h| h.eq_ignore_ascii_case(name))
}

/// Performs a request against the real network.
///
/// Any HTTP status counts as a completed fetch; only transport failures are
/// errors.
#[async_trait]
pub trait Network: Send + Sync {
    async fn fetch(&self, request: &InterceptedRequest) -> Result<CachedResponse, NetworkError>;
}

/// `reqwest`-backed network
pub struct HttpNetwork {
    client: Client,
}

impl HttpNetwork {
    pub fn new() -> Self {
        Self::with_client(Client::new())
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

impl Default for HttpNetwork {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Network for HttpNetwork {
    async fn fetch(&self, request: &InterceptedRequest) -> Result<CachedResponse, NetworkError> {
        if !matches!(request.url.scheme(), "http" | "https") {
            return Err(NetworkError::InvalidUrl(format!(
                "unsupported scheme in {}",
                request.url
            )));
        }

        debug!(method = %request.method, url = %request.url, "Fetching from network");

        let mut builder = self.client.request(request.method.clone(), request.url.clone());
        for (name, value) in &request.headers {
            if !is_hop_by_hop(name) {
                builder = builder.header(name.as_str(), value.as_str());
            }
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();

        let headers = response
            .headers()
            .iter()
            .filter(|(name, _)| !is_hop_by_hop(name.as_str()))
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();

        let body = response.bytes().await?.to_vec();

        debug!(url = %request.url, status, size = body.len(), "Fetched from network");

        Ok(CachedResponse {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    #[test]
    fn test_hop_by_hop_headers() {
        assert!(is_hop_by_hop("Connection"));
        assert!(is_hop_by_hop("transfer-encoding"));
        assert!(is_hop_by_hop("Host"));
        assert!(!is_hop_by_hop("content-type"));
        assert!(!is_hop_by_hop("cache-control"));
    }

    #[tokio::test]
    async fn test_unsupported_scheme_rejected() {
        let network = HttpNetwork::new();
        let request = InterceptedRequest::get(Url::parse("file:///etc/passwd").unwrap());

        let result = network.fetch(&request).await;
        assert!(matches!(result, Err(NetworkError::InvalidUrl(_))));
    }
}
