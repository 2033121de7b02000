//! Install-time population of the shell namespace
//!
//! Provisioning is all-or-nothing. Every manifest asset is fetched before
//! anything is written, so a failed fetch leaves the namespace untouched. If a
//! write fails part-way, the keys already written in this run are put back to
//! what they held before (or removed if they were new).

use crate::config::AssetManifest;
use crate::error::ProvisionError;
use crate::manager::CacheManager;
use crate::network::Network;
use crate::store::NamespaceHandle;
use crate::types::{CacheKey, CachedResponse, InterceptedRequest};
use futures::future::try_join_all;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Outcome of a successful provisioning run
#[derive(Debug, Clone, Serialize)]
pub struct ProvisionReport {
    pub namespace: String,
    pub stored: Vec<CacheKey>,
    pub bytes: u64,
}

pub struct Provisioner {
    manager: CacheManager,
    network: Arc<dyn Network>,
}

impl Provisioner {
    pub fn new(manager: CacheManager, network: Arc<dyn Network>) -> Self {
        Self { manager, network }
    }

    pub async fn provision(
        &self,
        manifest: &AssetManifest,
    ) -> Result<ProvisionReport, ProvisionError> {
        let targets = self.plan(manifest)?;
        let namespace = self.manager.names().shell.clone();
        info!(namespace = %namespace, assets = targets.len(), "Provisioning shell cache");

        let shell = self.manager.shell().await?;

        let network = &self.network;
        let fetched = try_join_all(targets.into_iter().map(|(locator, key, request)| async move {
            let response = network
                .fetch(&request)
                .await
                .map_err(|source| ProvisionError::Fetch {
                    locator: locator.clone(),
                    source,
                })?;

            if !response.is_success() {
                return Err(ProvisionError::BadStatus {
                    locator,
                    status: response.status,
                });
            }

            Ok((key, response))
        }))
        .await
        .map_err(|e| {
            error!(namespace = %namespace, error = %e, "Provisioning aborted, nothing stored");
            e
        })?;

        self.store_all(&shell, &fetched).await?;

        let report = ProvisionReport {
            namespace,
            bytes: fetched.iter().map(|(_, r)| r.body.len() as u64).sum(),
            stored: fetched.into_iter().map(|(key, _)| key).collect(),
        };
        info!(
            namespace = %report.namespace,
            assets = report.stored.len(),
            bytes = report.bytes,
            "Shell cache provisioned"
        );
        Ok(report)
    }

    /// Resolve every locator and reject duplicates before any network call
    fn plan(
        &self,
        manifest: &AssetManifest,
    ) -> Result<Vec<(String, CacheKey, InterceptedRequest)>, ProvisionError> {
        let mut seen = HashSet::new();
        let mut targets = Vec::with_capacity(manifest.len());

        for locator in manifest.locators() {
            let url = self
                .manager
                .resolve(locator)
                .map_err(|_| ProvisionError::InvalidLocator(locator.clone()))?;
            let request = InterceptedRequest::get(url);
            let key = self.manager.key_for(&request);

            if !seen.insert(key.clone()) {
                return Err(ProvisionError::DuplicateLocator(locator.clone()));
            }
            targets.push((locator.clone(), key, request));
        }

        Ok(targets)
    }

    async fn store_all(
        &self,
        shell: &NamespaceHandle,
        fetched: &[(CacheKey, CachedResponse)],
    ) -> Result<(), ProvisionError> {
        let store = self.manager.store();
        let mut written: Vec<(&CacheKey, Option<CachedResponse>)> = Vec::new();

        for (key, response) in fetched {
            let outcome = match store.get(shell, key).await {
                Ok(previous) => store
                    .put(shell, key, response)
                    .await
                    .map(|()| previous),
                Err(e) => Err(e),
            };

            match outcome {
                Ok(previous) => {
                    debug!(key = %key, size = response.body.len(), "Stored shell asset");
                    written.push((key, previous));
                }
                Err(e) => {
                    error!(key = %key, error = %e, "Failed to store shell asset, rolling back");
                    self.rollback(shell, written).await;
                    return Err(e.into());
                }
            }
        }

        Ok(())
    }

    async fn rollback(
        &self,
        shell: &NamespaceHandle,
        written: Vec<(&CacheKey, Option<CachedResponse>)>,
    ) {
        let store = self.manager.store();

        for (key, previous) in written.into_iter().rev() {
            let result = match previous {
                Some(previous) => store.put(shell, key, &previous).await,
                None => store.delete(shell, key).await.map(|_| ()),
            };
            if let Err(e) = result {
                warn!(key = %key, error = %e, "Failed to roll back shell asset");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NamespaceNames;
    use crate::store::CacheStore;
    use crate::testing::{FakeNetwork, RecordingStore};
    use url::Url;

    const ORIGIN: &str = "http://localhost:8000";

    fn setup(network: FakeNetwork) -> (Arc<RecordingStore>, Arc<FakeNetwork>, Provisioner) {
        let store = Arc::new(RecordingStore::new());
        let network = Arc::new(network);
        let manager = CacheManager::new(
            store.clone(),
            NamespaceNames::default(),
            Url::parse(ORIGIN).unwrap(),
        );
        let provisioner = Provisioner::new(manager, network.clone());
        (store, network, provisioner)
    }

    fn url(path: &str) -> String {
        format!("{}{}", ORIGIN, path)
    }

    #[tokio::test]
    async fn test_provision_stores_every_asset() {
        let network = FakeNetwork::new()
            .respond(&url("/shell.html"), CachedResponse::new(200, "<html>shell</html>"))
            .respond(&url("/manifest.json"), CachedResponse::new(200, "{}"));
        let (store, network, provisioner) = setup(network);

        let manifest = AssetManifest::new(["/shell.html", "/manifest.json"]);
        let report = provisioner.provision(&manifest).await.unwrap();

        assert_eq!(report.namespace, "shell-v2");
        assert_eq!(report.stored.len(), 2);
        assert_eq!(report.bytes, 20);
        assert_eq!(network.call_count(), 2);

        let shell = store.peek("shell-v2", "/shell.html").await.unwrap();
        assert_eq!(shell.body, b"<html>shell</html>");
        assert!(store.peek("shell-v2", "/manifest.json").await.is_some());
        assert!(store.peek("media-v1", "/shell.html").await.is_none());
    }

    #[tokio::test]
    async fn test_cross_origin_assets_keyed_by_full_url() {
        let cdn = "https://cdn.example.net/vue.js";
        let network = FakeNetwork::new().respond(cdn, CachedResponse::new(200, "vue"));
        let (store, _, provisioner) = setup(network);

        provisioner
            .provision(&AssetManifest::new([cdn]))
            .await
            .unwrap();

        assert!(store.peek("shell-v2", cdn).await.is_some());
    }

    #[tokio::test]
    async fn test_failed_fetch_stores_nothing() {
        let network = FakeNetwork::new()
            .respond(&url("/shell.html"), CachedResponse::new(200, "shell"))
            .fail(&url("/manifest.json"), "connection reset");
        let (store, _, provisioner) = setup(network);

        let manifest = AssetManifest::new(["/shell.html", "/manifest.json"]);
        let err = provisioner.provision(&manifest).await.unwrap_err();

        assert!(matches!(
            err,
            ProvisionError::Fetch { ref locator, .. } if locator == "/manifest.json"
        ));
        assert_eq!(store.puts(), 0);
        assert!(store.peek("shell-v2", "/shell.html").await.is_none());
    }

    #[tokio::test]
    async fn test_non_success_status_fails_provisioning() {
        // "/manifest.json" is unscripted and answers 404
        let network =
            FakeNetwork::new().respond(&url("/shell.html"), CachedResponse::new(200, "shell"));
        let (store, _, provisioner) = setup(network);

        let manifest = AssetManifest::new(["/shell.html", "/manifest.json"]);
        let err = provisioner.provision(&manifest).await.unwrap_err();

        assert!(matches!(err, ProvisionError::BadStatus { status: 404, .. }));
        assert_eq!(store.puts(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_locators_rejected_before_fetching() {
        let (store, network, provisioner) = setup(FakeNetwork::new());

        // Same key once resolved against the origin
        let manifest = AssetManifest::new(vec!["/shell.html".to_string(), url("/shell.html")]);
        let err = provisioner.provision(&manifest).await.unwrap_err();

        assert!(matches!(err, ProvisionError::DuplicateLocator(_)));
        assert_eq!(network.call_count(), 0);
        assert_eq!(store.calls(), 0);
    }

    #[tokio::test]
    async fn test_invalid_locator_rejected() {
        let (_, network, provisioner) = setup(FakeNetwork::new());

        let manifest = AssetManifest::new(["http://[::1"]);
        let err = provisioner.provision(&manifest).await.unwrap_err();

        assert!(matches!(err, ProvisionError::InvalidLocator(_)));
        assert_eq!(network.call_count(), 0);
    }

    #[tokio::test]
    async fn test_write_failure_rolls_back_previous_values() {
        let network = FakeNetwork::new()
            .respond(&url("/a.html"), CachedResponse::new(200, "new a"))
            .respond(&url("/b.html"), CachedResponse::new(200, "new b"))
            .respond(&url("/c.html"), CachedResponse::new(200, "new c"));
        let (store, _, provisioner) = setup(network);

        store
            .seed("shell-v2", "/a.html", CachedResponse::new(200, "old a"))
            .await;
        store.fail_puts_for("/c.html");

        let manifest = AssetManifest::new(["/a.html", "/b.html", "/c.html"]);
        let err = provisioner.provision(&manifest).await.unwrap_err();
        assert!(matches!(err, ProvisionError::Store(_)));

        // Existing entry restored, new entry removed
        let a = store.peek("shell-v2", "/a.html").await.unwrap();
        assert_eq!(a.body, b"old a");
        assert!(store.peek("shell-v2", "/b.html").await.is_none());
        assert!(store.peek("shell-v2", "/c.html").await.is_none());
    }

    #[tokio::test]
    async fn test_reprovisioning_is_idempotent() {
        let network =
            FakeNetwork::new().respond(&url("/shell.html"), CachedResponse::new(200, "shell"));
        let (store, network, provisioner) = setup(network);
        let manifest = AssetManifest::new(["/shell.html"]);

        provisioner.provision(&manifest).await.unwrap();
        provisioner.provision(&manifest).await.unwrap();

        assert_eq!(network.call_count(), 2);
        let stats = store.stats().await;
        assert_eq!(stats.entries, 1);
        assert_eq!(
            store.peek("shell-v2", "/shell.html").await.unwrap().body,
            b"shell"
        );
    }

    #[tokio::test]
    async fn test_empty_manifest_succeeds() {
        let (_, network, provisioner) = setup(FakeNetwork::new());

        let report = provisioner
            .provision(&AssetManifest::new(Vec::<String>::new()))
            .await
            .unwrap();

        assert!(report.stored.is_empty());
        assert_eq!(network.call_count(), 0);
    }
}
