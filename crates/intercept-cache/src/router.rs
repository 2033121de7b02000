//! Request classification and per-category cache strategies
//!
//! Classification walks an ordered list of path rules and stops at the first
//! match. Order matters: `/api/download/x` is a media request even though it
//! also starts with the API prefix, because the media rules come first.

use crate::config::{RouterConfig, ShellStrategy};
use crate::error::RouteError;
use crate::manager::CacheManager;
use crate::network::Network;
use crate::store::NamespaceHandle;
use crate::types::{CacheKey, CachedResponse, InterceptedRequest};
use reqwest::Method;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    /// Downloaded files, served cache-first from the media namespace
    Media,
    /// Backend calls, never cached
    Api,
    /// Everything else
    Shell,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathMatcher {
    Contains(String),
    Prefix(String),
}

impl PathMatcher {
    pub fn matches(&self, path: &str) -> bool {
        match self {
            PathMatcher::Contains(segment) => path.contains(segment.as_str()),
            PathMatcher::Prefix(prefix) => path.starts_with(prefix.as_str()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteRule {
    pub matcher: PathMatcher,
    pub category: Category,
}

/// Ordered rules, first match wins, unmatched paths are [`Category::Shell`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingTable {
    rules: Vec<RouteRule>,
}

impl RoutingTable {
    pub fn new(rules: Vec<RouteRule>) -> Self {
        Self { rules }
    }

    /// Media segments first, then the API prefix
    pub fn from_config(config: &RouterConfig) -> Self {
        let mut rules: Vec<RouteRule> = config
            .media_segments
            .iter()
            .map(|segment| RouteRule {
                matcher: PathMatcher::Contains(segment.clone()),
                category: Category::Media,
            })
            .collect();

        rules.push(RouteRule {
            matcher: PathMatcher::Prefix(config.api_prefix.clone()),
            category: Category::Api,
        });

        Self::new(rules)
    }

    pub fn rules(&self) -> &[RouteRule] {
        &self.rules
    }

    pub fn classify(&self, path: &str) -> Category {
        self.rules
            .iter()
            .find(|rule| rule.matcher.matches(path))
            .map(|rule| rule.category)
            .unwrap_or(Category::Shell)
    }
}

/// What a category does with a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Serve from cache, fall back to network, never write
    CacheFirst,
    /// Leave the request alone
    PassThrough,
    /// Serve from cache and refresh in the background
    StaleWhileRevalidate,
}

/// Result of routing one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    ServeFromCache {
        namespace: String,
        response: CachedResponse,
    },
    /// The router went to the network itself and this is what came back
    FetchNetwork(CachedResponse),
    /// The router declined; the caller sends the request as if no cache existed
    PassThrough,
}

impl Decision {
    /// Value for an `X-Cache` style header
    pub fn cache_status(&self) -> &'static str {
        match self {
            Decision::ServeFromCache { .. } => "HIT",
            Decision::FetchNetwork(_) => "MISS",
            Decision::PassThrough => "BYPASS",
        }
    }
}

/// Stateless per-request router. Clones share the store and network.
#[derive(Clone)]
pub struct CacheRouter {
    table: Arc<RoutingTable>,
    shell_strategy: ShellStrategy,
    manager: CacheManager,
    network: Arc<dyn Network>,
}

impl CacheRouter {
    pub fn new(config: &RouterConfig, manager: CacheManager, network: Arc<dyn Network>) -> Self {
        Self {
            table: Arc::new(RoutingTable::from_config(config)),
            shell_strategy: config.shell_strategy,
            manager,
            network,
        }
    }

    pub fn manager(&self) -> &CacheManager {
        &self.manager
    }

    pub fn classify(&self, request: &InterceptedRequest) -> Category {
        self.table.classify(request.path())
    }

    pub fn strategy_for(&self, category: Category) -> Strategy {
        match category {
            Category::Media => Strategy::CacheFirst,
            Category::Api => Strategy::PassThrough,
            Category::Shell => match self.shell_strategy {
                ShellStrategy::NetworkOnly => Strategy::PassThrough,
                ShellStrategy::StaleWhileRevalidate => Strategy::StaleWhileRevalidate,
            },
        }
    }

    pub async fn route(&self, request: &InterceptedRequest) -> Result<Decision, RouteError> {
        let category = self.classify(request);
        let strategy = self.strategy_for(category);
        debug!(
            method = %request.method,
            path = request.path(),
            ?category,
            ?strategy,
            "Routing request"
        );

        match strategy {
            Strategy::PassThrough => Ok(Decision::PassThrough),
            Strategy::CacheFirst => self.cache_first(request).await,
            Strategy::StaleWhileRevalidate => self.stale_while_revalidate(request).await,
        }
    }

    async fn cache_first(&self, request: &InterceptedRequest) -> Result<Decision, RouteError> {
        if request.is_cacheable_method() {
            let key = self.manager.key_for(request);
            match self.manager.media().await {
                Ok(media) => {
                    if let Some(response) = self.lookup(&media, &key).await {
                        return Ok(Decision::ServeFromCache {
                            namespace: self.manager.names().media.clone(),
                            response,
                        });
                    }
                }
                Err(e) => warn!(key = %key, error = %e, "Media namespace unavailable, treating as miss"),
            }
        }

        // Not written back: media only changes through an explicit save
        let response = self
            .network
            .fetch(request)
            .await
            .map_err(RouteError::CacheMissNetwork)?;
        Ok(Decision::FetchNetwork(response))
    }

    async fn stale_while_revalidate(
        &self,
        request: &InterceptedRequest,
    ) -> Result<Decision, RouteError> {
        if !request.is_cacheable_method() {
            return Ok(Decision::PassThrough);
        }

        let key = self.manager.key_for(request);
        let shell = match self.manager.shell().await {
            Ok(shell) => shell,
            Err(e) => {
                warn!(error = %e, "Shell namespace unavailable, passing through");
                return Ok(Decision::PassThrough);
            }
        };

        if let Some(response) = self.lookup(&shell, &key).await {
            self.spawn_refresh(shell, key, revalidation_request(request), None);
            return Ok(Decision::ServeFromCache {
                namespace: self.manager.names().shell.clone(),
                response,
            });
        }

        let response = self
            .network
            .fetch(request)
            .await
            .map_err(RouteError::Network)?;
        // A HEAD response has no body to store
        if response.is_success() && request.method == Method::GET {
            self.spawn_refresh(shell, key, request.clone(), Some(response.clone()));
        }
        Ok(Decision::FetchNetwork(response))
    }

    /// Read failures count as misses
    async fn lookup(&self, ns: &NamespaceHandle, key: &CacheKey) -> Option<CachedResponse> {
        match self.manager.store().get(ns, key).await {
            Ok(found) => found,
            Err(e) => {
                warn!(
                    namespace = ns.name(),
                    key = %key,
                    error = %e,
                    "Cache read failed, treating as miss"
                );
                None
            }
        }
    }

    /// Store `fetched` if given, otherwise fetch first. Runs detached so a
    /// cancelled request does not cancel the refresh.
    fn spawn_refresh(
        &self,
        ns: NamespaceHandle,
        key: CacheKey,
        request: InterceptedRequest,
        fetched: Option<CachedResponse>,
    ) {
        let store = self.manager.store().clone();
        let network = self.network.clone();

        tokio::spawn(async move {
            let response = match fetched {
                Some(response) => response,
                None => match network.fetch(&request).await {
                    Ok(response) if response.is_success() => response,
                    Ok(response) => {
                        debug!(
                            key = %key,
                            status = response.status,
                            "Revalidation skipped non-success response"
                        );
                        return;
                    }
                    Err(e) => {
                        warn!(key = %key, error = %e, "Revalidation fetch failed");
                        return;
                    }
                },
            };

            if let Err(e) = store.put(&ns, &key, &response).await {
                warn!(
                    namespace = ns.name(),
                    key = %key,
                    error = %e,
                    "Failed to refresh shell entry"
                );
            } else {
                debug!(namespace = ns.name(), key = %key, "Refreshed shell entry");
            }
        });
    }
}

/// Shell entries hold full bodies, so revalidation always fetches with GET
fn revalidation_request(request: &InterceptedRequest) -> InterceptedRequest {
    InterceptedRequest {
        method: Method::GET,
        body: None,
        ..request.clone()
    }
}
