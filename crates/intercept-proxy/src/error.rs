//! Error types for the interception proxy

use std::fmt;

#[derive(Debug)]
pub enum ProxyError {
    Store(intercept_cache::StoreError),
    Provision(intercept_cache::ProvisionError),
    Io(Box<std::io::Error>),
    Config(String),
}

impl fmt::Display for ProxyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProxyError::Store(err) => write!(f, "Cache store error: {}", err),
            ProxyError::Provision(err) => write!(f, "Installation failed: {}", err),
            ProxyError::Io(err) => write!(f, "IO error: {}", err),
            ProxyError::Config(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for ProxyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProxyError::Store(err) => Some(err),
            ProxyError::Provision(err) => Some(err),
            ProxyError::Io(err) => Some(err.as_ref()),
            ProxyError::Config(_) => None,
        }
    }
}

impl From<intercept_cache::StoreError> for ProxyError {
    fn from(err: intercept_cache::StoreError) -> Self {
        ProxyError::Store(err)
    }
}

impl From<intercept_cache::ProvisionError> for ProxyError {
    fn from(err: intercept_cache::ProvisionError) -> Self {
        ProxyError::Provision(err)
    }
}

impl From<std::io::Error> for ProxyError {
    fn from(err: std::io::Error) -> Self {
        ProxyError::Io(Box::new(err))
    }
}

impl From<tracing_subscriber::filter::ParseError> for ProxyError {
    fn from(err: tracing_subscriber::filter::ParseError) -> Self {
        ProxyError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ProxyError>;
