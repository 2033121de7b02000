//! Request-interception cache engine
//!
//! Classifies intercepted requests by path and applies a per-category
//! strategy: cache-first for downloaded media, pass-through for API calls and,
//! by default, for the app shell. The app shell namespace is filled once at
//! install time from a fixed manifest; the media namespace only changes
//! through an explicit save.

pub mod config;
pub mod error;
pub mod manager;
pub mod network;
pub mod provision;
pub mod router;
pub mod store;
#[cfg(any(test, feature = "test-util"))]
pub mod testing;
pub mod types;

pub use config::{AssetManifest, NamespaceNames, RouterConfig, ShellStrategy};
pub use error::{NetworkError, ProvisionError, Result, RouteError, StoreError};
pub use manager::CacheManager;
pub use network::{HttpNetwork, Network};
pub use provision::{ProvisionReport, Provisioner};
pub use router::{CacheRouter, Category, Decision, PathMatcher, RouteRule, RoutingTable, Strategy};
pub use store::{CacheStore, FileStore, MemoryStore, NamespaceHandle};
pub use types::{CacheEntry, CacheKey, CacheStats, CachedResponse, InterceptedRequest};
