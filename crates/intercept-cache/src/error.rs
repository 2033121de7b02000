//! Error types for the interception cache

use std::fmt;

/// Errors from a cache store backend
#[derive(Debug)]
pub enum StoreError {
    Io(Box<std::io::Error>),
    Serialization(serde_json::Error),
    InvalidNamespace(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Io(err) => write!(f, "Store IO error: {}", err),
            StoreError::Serialization(err) => write!(f, "Store metadata error: {}", err),
            StoreError::InvalidNamespace(name) => write!(f, "Invalid namespace name: {:?}", name),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Io(err) => Some(err.as_ref()),
            StoreError::Serialization(err) => Some(err),
            StoreError::InvalidNamespace(_) => None,
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io(Box::new(err))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err)
    }
}

/// Transport-level failures from the network collaborator.
///
/// A response with a non-2xx status is not an error at this level.
#[derive(Debug)]
pub enum NetworkError {
    Http(Box<reqwest::Error>),
    InvalidUrl(String),
    Unreachable(String),
}

impl fmt::Display for NetworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkError::Http(err) => write!(f, "HTTP error: {}", err),
            NetworkError::InvalidUrl(msg) => write!(f, "Invalid URL: {}", msg),
            NetworkError::Unreachable(msg) => write!(f, "Network unreachable: {}", msg),
        }
    }
}

impl std::error::Error for NetworkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            NetworkError::Http(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for NetworkError {
    fn from(err: reqwest::Error) -> Self {
        NetworkError::Http(Box::new(err))
    }
}

/// The shell namespace could not be fully populated
#[derive(Debug)]
pub enum ProvisionError {
    DuplicateLocator(String),
    InvalidLocator(String),
    Fetch {
        locator: String,
        source: NetworkError,
    },
    BadStatus {
        locator: String,
        status: u16,
    },
    Store(StoreError),
}

impl fmt::Display for ProvisionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProvisionError::DuplicateLocator(locator) => {
                write!(f, "Manifest lists {} more than once", locator)
            }
            ProvisionError::InvalidLocator(locator) => {
                write!(f, "Manifest locator {} is not a valid URL", locator)
            }
            ProvisionError::Fetch { locator, source } => {
                write!(f, "Failed to fetch {}: {}", locator, source)
            }
            ProvisionError::BadStatus { locator, status } => {
                write!(f, "Fetching {} returned status {}", locator, status)
            }
            ProvisionError::Store(err) => write!(f, "Failed to store shell asset: {}", err),
        }
    }
}

impl std::error::Error for ProvisionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProvisionError::Fetch { source, .. } => Some(source),
            ProvisionError::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for ProvisionError {
    fn from(err: StoreError) -> Self {
        ProvisionError::Store(err)
    }
}

/// A routed request failed
#[derive(Debug)]
pub enum RouteError {
    /// A media request missed the cache and the network fetch failed
    CacheMissNetwork(NetworkError),
    /// A shell request under stale-while-revalidate missed the cache and the fetch failed
    Network(NetworkError),
}

impl RouteError {
    pub fn network_error(&self) -> &NetworkError {
        match self {
            RouteError::CacheMissNetwork(err) | RouteError::Network(err) => err,
        }
    }
}

impl fmt::Display for RouteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteError::CacheMissNetwork(err) => {
                write!(f, "Media cache miss and network failed: {}", err)
            }
            RouteError::Network(err) => write!(f, "Network error: {}", err),
        }
    }
}

impl std::error::Error for RouteError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.network_error())
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_store_io_error_display() {
        let err = StoreError::from(std::io::Error::other("disk full"));
        assert_eq!(format!("{}", err), "Store IO error: disk full");
        assert!(err.source().is_some());
    }

    #[test]
    fn test_invalid_namespace_display() {
        let err = StoreError::InvalidNamespace("../etc".to_string());
        assert_eq!(format!("{}", err), "Invalid namespace name: \"../etc\"");
    }

    #[test]
    fn test_provision_fetch_error_keeps_source() {
        let err = ProvisionError::Fetch {
            locator: "/index.html".to_string(),
            source: NetworkError::Unreachable("connection refused".to_string()),
        };
        assert_eq!(
            format!("{}", err),
            "Failed to fetch /index.html: Network unreachable: connection refused"
        );
        assert!(err.source().is_some());
    }

    #[test]
    fn test_bad_status_display() {
        let err = ProvisionError::BadStatus {
            locator: "/manifest.json".to_string(),
            status: 404,
        };
        assert_eq!(format!("{}", err), "Fetching /manifest.json returned status 404");
    }

    #[test]
    fn test_route_error_exposes_network_error() {
        let err = RouteError::CacheMissNetwork(NetworkError::Unreachable("offline".to_string()));
        assert!(matches!(err.network_error(), NetworkError::Unreachable(_)));
        assert!(format!("{}", err).contains("offline"));
    }
}
