//! Cache-first asset cache with versioned namespaces.

use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, info, warn};

use super::{CacheError, CacheStorage, Fetcher, Request, RequestKey, Response};

/// Where a response handed out by [`OfflineCache::fetch`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
    /// Served from the live namespace without touching the network
    Hit,
    /// Fetched from the network (and stored, for GET requests)
    Miss,
}

/// Cache-first, network-fallback cache over one live namespace.
///
/// Entries never expire: a hit is returned as-is, however old. Concurrent
/// misses for the same key are not coalesced; each one fetches and the last
/// write wins.
pub struct OfflineCache {
    storage: Arc<dyn CacheStorage>,
    fetcher: Arc<dyn Fetcher>,
    namespace: String,
    manifest: Vec<String>,
}

impl OfflineCache {
    pub fn new(
        storage: Arc<dyn CacheStorage>,
        fetcher: Arc<dyn Fetcher>,
        namespace: impl Into<String>,
        manifest: Vec<String>,
    ) -> Self {
        Self {
            storage,
            fetcher,
            namespace: namespace.into(),
            manifest,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn manifest(&self) -> &[String] {
        &self.manifest
    }

    pub fn storage(&self) -> &dyn CacheStorage {
        self.storage.as_ref()
    }

    /// Open the live namespace and pre-cache every manifest URL.
    ///
    /// All-or-nothing: if any asset fails to fetch or answers with a
    /// non-success status, nothing is stored and the install fails.
    pub async fn install(&self) -> Result<usize, CacheError> {
        info!(namespace = %self.namespace, assets = self.manifest.len(), "Installing offline cache");
        self.storage.open(&self.namespace)?;

        let requests: Vec<Request> = self.manifest.iter().map(Request::get).collect();
        let results = join_all(requests.iter().map(|r| self.fetcher.fetch(r))).await;

        let mut entries: Vec<(RequestKey, Response)> = Vec::with_capacity(results.len());
        for (request, result) in requests.iter().zip(results) {
            let response = result.map_err(|e| CacheError::InstallFailed {
                path: request.url.clone(),
                reason: e.to_string(),
            })?;
            if !response.is_success() {
                return Err(CacheError::InstallFailed {
                    path: request.url.clone(),
                    reason: format!("status {}", response.status),
                });
            }
            entries.push((request.key(), response));
        }

        self.storage.put_all(&self.namespace, &entries)?;
        info!(namespace = %self.namespace, stored = entries.len(), "Offline cache installed");
        Ok(entries.len())
    }

    /// Delete every namespace other than the live one. Returns the deleted names.
    pub fn activate(&self) -> Result<Vec<String>, CacheError> {
        let mut deleted = Vec::new();
        for name in self.storage.namespaces()? {
            if name == self.namespace {
                continue;
            }
            if self.storage.delete_namespace(&name)? {
                info!(namespace = %name, "Deleted stale cache namespace");
                deleted.push(name);
            }
        }
        Ok(deleted)
    }

    /// Serve a request from the live namespace, falling back to the network.
    ///
    /// A network failure on a miss is returned to the caller. GET responses
    /// fetched on a miss are stored whatever their status; other methods are
    /// passed through without being stored.
    pub async fn fetch(&self, request: &Request) -> Result<(Response, CacheSource), CacheError> {
        let key = request.key();
        if let Some(cached) = self.storage.lookup(&self.namespace, &key)? {
            debug!(%key, age = %cached.age_display(), "Cache hit");
            return Ok((cached.data, CacheSource::Hit));
        }

        debug!(%key, "Cache miss");
        let response = self.fetcher.fetch(request).await?;

        if request.is_get() {
            if let Err(e) = self.storage.put(&self.namespace, &key, &response) {
                warn!(%key, error = %e, "Failed to store response in cache");
            }
        } else {
            debug!(%key, "Not caching non-GET response");
        }

        Ok((response, CacheSource::Miss))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::FetchError;
    use crate::cache::MemoryCacheStorage;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    const NAMESPACE: &str = "appCache";

    /// Serves canned responses and counts every network call.
    /// Unknown URLs fail like an unreachable host.
    #[derive(Default)]
    struct FakeNetwork {
        routes: HashMap<String, Response>,
        calls: AtomicUsize,
        delay: Option<Duration>,
    }

    impl FakeNetwork {
        fn with(routes: &[(&str, Response)]) -> Self {
            Self {
                routes: routes.iter().map(|(u, r)| (u.to_string(), r.clone())).collect(),
                ..Default::default()
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Fetcher for FakeNetwork {
        async fn fetch(&self, request: &Request) -> Result<Response, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.routes
                .get(&request.url)
                .cloned()
                .ok_or_else(|| FetchError::InvalidResponse(format!("unreachable: {}", request.url)))
        }
    }

    fn manifest() -> Vec<String> {
        vec![
            "https://app.example.edu/logo192.png".to_string(),
            "https://app.example.edu/favicon.ico".to_string(),
        ]
    }

    fn assets() -> Vec<(&'static str, Response)> {
        vec![
            ("https://app.example.edu/logo192.png", Response::ok("png-bytes")),
            ("https://app.example.edu/favicon.ico", Response::ok("ico-bytes")),
        ]
    }

    fn cache_with(network: Arc<FakeNetwork>) -> (OfflineCache, Arc<MemoryCacheStorage>) {
        let storage = Arc::new(MemoryCacheStorage::new());
        let cache = OfflineCache::new(storage.clone(), network, NAMESPACE, manifest());
        (cache, storage)
    }

    #[tokio::test]
    async fn test_install_stores_every_manifest_asset() {
        let network = Arc::new(FakeNetwork::with(&assets()));
        let (cache, storage) = cache_with(network.clone());

        assert_eq!(cache.install().await.expect("install"), 2);

        for (url, expected) in assets() {
            let cached = storage
                .lookup(NAMESPACE, &RequestKey::new("GET", url))
                .expect("lookup")
                .expect("asset cached");
            assert_eq!(cached.data, expected);
        }
    }

    #[tokio::test]
    async fn test_install_is_all_or_nothing() {
        let routes = vec![assets().remove(0)];
        let network = Arc::new(FakeNetwork::with(&routes));
        let (cache, storage) = cache_with(network);

        let err = cache.install().await.unwrap_err();
        match err {
            CacheError::InstallFailed { path, .. } => {
                assert_eq!(path, "https://app.example.edu/favicon.ico")
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(storage.entries(NAMESPACE).expect("entries").is_empty());
    }

    #[tokio::test]
    async fn test_install_rejects_error_status() {
        let mut routes = assets();
        routes[1].1.status = 404;
        let network = Arc::new(FakeNetwork::with(&routes));
        let (cache, storage) = cache_with(network);

        assert!(matches!(cache.install().await, Err(CacheError::InstallFailed { .. })));
        assert!(storage.entries(NAMESPACE).expect("entries").is_empty());
    }

    #[tokio::test]
    async fn test_activate_keeps_only_live_namespace() {
        let network = Arc::new(FakeNetwork::default());
        let (cache, storage) = cache_with(network);
        for name in ["appCache-v1", "appCache-v2", NAMESPACE, "other"] {
            storage.open(name).expect("open");
        }

        let mut deleted = cache.activate().expect("activate");
        deleted.sort();
        assert_eq!(deleted, vec!["appCache-v1", "appCache-v2", "other"]);
        assert_eq!(storage.namespaces().expect("list"), vec![NAMESPACE.to_string()]);
    }

    #[tokio::test]
    async fn test_miss_then_hit_skips_network() {
        let network = Arc::new(FakeNetwork::with(&[(
            "https://app.example.edu/data.json",
            Response::ok("{}"),
        )]));
        let (cache, _) = cache_with(network.clone());
        let request = Request::get("https://app.example.edu/data.json");

        let (first, source) = cache.fetch(&request).await.expect("first fetch");
        assert_eq!(source, CacheSource::Miss);
        let (second, source) = cache.fetch(&request).await.expect("second fetch");
        assert_eq!(source, CacheSource::Hit);

        assert_eq!(first, second);
        assert_eq!(network.calls(), 1);
    }

    #[tokio::test]
    async fn test_network_failure_on_miss_propagates() {
        let network = Arc::new(FakeNetwork::default());
        let (cache, storage) = cache_with(network);

        let result = cache.fetch(&Request::get("https://app.example.edu/missing")).await;
        assert!(matches!(result, Err(CacheError::Network(_))));
        assert!(storage.entries(NAMESPACE).expect("entries").is_empty());
    }

    #[tokio::test]
    async fn test_non_get_requests_are_not_stored() {
        let network = Arc::new(FakeNetwork::with(&[("https://app.example.edu/api", Response::ok("ok"))]));
        let (cache, _) = cache_with(network.clone());
        let request = Request::new("POST", "https://app.example.edu/api").with_body(b"{}".to_vec());

        cache.fetch(&request).await.expect("first post");
        let (_, source) = cache.fetch(&request).await.expect("second post");
        assert_eq!(source, CacheSource::Miss);
        assert_eq!(network.calls(), 2);
    }

    #[tokio::test]
    async fn test_error_responses_are_cached_like_any_other() {
        let mut not_found = Response::ok("gone");
        not_found.status = 404;
        let network = Arc::new(FakeNetwork::with(&[("https://app.example.edu/old", not_found)]));
        let (cache, _) = cache_with(network.clone());
        let request = Request::get("https://app.example.edu/old");

        cache.fetch(&request).await.expect("first fetch");
        let (response, source) = cache.fetch(&request).await.expect("second fetch");
        assert_eq!(source, CacheSource::Hit);
        assert_eq!(response.status, 404);
        assert_eq!(network.calls(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_misses_are_not_deduplicated() {
        let network = Arc::new(FakeNetwork {
            delay: Some(Duration::from_millis(20)),
            ..FakeNetwork::with(&[("https://app.example.edu/feed", Response::ok("feed"))])
        });
        let (cache, storage) = cache_with(network.clone());
        let request = Request::get("https://app.example.edu/feed");

        let (a, b) = tokio::join!(cache.fetch(&request), cache.fetch(&request));
        assert_eq!(a.expect("a").1, CacheSource::Miss);
        assert_eq!(b.expect("b").1, CacheSource::Miss);
        assert_eq!(network.calls(), 2);
        assert_eq!(storage.entries(NAMESPACE).expect("entries").len(), 1);
    }
}
