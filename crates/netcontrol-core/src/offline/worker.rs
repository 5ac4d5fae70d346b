use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use futures::future::{join_all, try_join_all};
use reqwest::Method;
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use super::manifest::CacheManifest;
use super::network::{Network, NetworkError};
use super::policy::{is_http, CachePolicy};
use super::request::{CacheRequest, CachedResponse};
use super::storage::{CacheError, CacheStorage};

/// Path of the cached page served to navigations when offline.
pub const APP_SHELL_PATH: &str = "/index.html";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Installing,
    Installed,
    Activating,
    Activated,
    /// Superseded by a newer worker.
    Redundant,
}

/// Where a served response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    Cache,
    Network,
    /// The cached app shell, standing in for an unreachable page.
    AppShell,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Not intercepted; the caller goes to the network itself.
    Bypass,
    Respond(CachedResponse, ResponseSource),
}

#[derive(Error, Debug)]
pub enum FetchError {
    #[error(transparent)]
    Network(#[from] NetworkError),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallReport {
    pub cached: Vec<String>,
    pub failed: Vec<String>,
}

/// Installs one cache generation and answers fetches from it.
pub struct OfflineWorker {
    manifest: CacheManifest,
    cache_name: String,
    origin: Url,
    policy: CachePolicy,
    storage: Arc<dyn CacheStorage>,
    network: Arc<dyn Network>,
    state: Mutex<WorkerState>,
    skip_waiting: AtomicBool,
}

impl OfflineWorker {
    /// `origin` is the page the worker serves; its host decides what counts
    /// as same-site.
    pub fn new(
        manifest: CacheManifest,
        origin: Url,
        storage: Arc<dyn CacheStorage>,
        network: Arc<dyn Network>,
    ) -> Result<Self, CacheError> {
        let host = origin
            .host_str()
            .ok_or_else(|| CacheError::InvalidUrl(format!("{} has no host", origin)))?
            .to_string();
        let policy = CachePolicy::new(host, manifest.allow_list.clone());
        Ok(Self {
            cache_name: manifest.cache_name(),
            manifest,
            origin,
            policy,
            storage,
            network,
            state: Mutex::new(WorkerState::Installing),
            skip_waiting: AtomicBool::new(false),
        })
    }

    pub fn cache_name(&self) -> &str {
        &self.cache_name
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    pub fn policy(&self) -> &CachePolicy {
        &self.policy
    }

    pub fn storage(&self) -> &Arc<dyn CacheStorage> {
        &self.storage
    }

    pub fn state(&self) -> WorkerState {
        match self.state.lock() {
            Ok(state) => *state,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    fn set_state(&self, next: WorkerState) {
        debug!(cache = %self.cache_name, state = ?next, "Worker state");
        match self.state.lock() {
            Ok(mut state) => *state = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
    }

    pub fn mark_redundant(&self) {
        self.set_state(WorkerState::Redundant);
    }

    /// Set once install finishes: activate without waiting for old clients.
    pub fn skip_waiting_requested(&self) -> bool {
        self.skip_waiting.load(Ordering::SeqCst)
    }

    /// Resolve a manifest entry or a path against the page origin.
    pub fn resolve(&self, asset: &str) -> Result<Url, CacheError> {
        self.origin
            .join(asset)
            .map_err(|e| CacheError::InvalidUrl(format!("{}: {}", asset, e)))
    }

    // ===== Install =====

    /// Fetch and store every manifest asset. A failing asset is logged and
    /// skipped; only failing to open the generation aborts.
    pub async fn install(&self) -> Result<InstallReport, CacheError> {
        self.set_state(WorkerState::Installing);
        self.storage.open(&self.cache_name).await?;

        let results = join_all(
            self.manifest
                .assets
                .iter()
                .map(|asset| async move { (asset.clone(), self.install_asset(asset).await) }),
        )
        .await;

        let mut report = InstallReport::default();
        for (asset, result) in results {
            match result {
                Ok(()) => report.cached.push(asset),
                Err(reason) => {
                    warn!(asset = %asset, reason = %reason, "Could not cache asset");
                    report.failed.push(asset);
                }
            }
        }

        info!(
            cache = %self.cache_name,
            cached = report.cached.len(),
            failed = report.failed.len(),
            "Install complete"
        );
        self.set_state(WorkerState::Installed);
        self.skip_waiting.store(true, Ordering::SeqCst);
        Ok(report)
    }

    async fn install_asset(&self, asset: &str) -> Result<(), String> {
        let url = self.resolve(asset).map_err(|e| e.to_string())?;
        let response = self
            .network
            .fetch(&CacheRequest::get(url.clone()))
            .await
            .map_err(|e| e.to_string())?;
        if !response.is_ok() {
            return Err(format!("HTTP {}", response.status));
        }
        self.storage
            .put(&self.cache_name, url.as_str(), &response)
            .await
            .map_err(|e| e.to_string())
    }

    /// Whether this worker's generation already exists in storage.
    pub async fn is_installed(&self) -> Result<bool, CacheError> {
        Ok(self.storage.keys().await?.iter().any(|name| *name == self.cache_name))
    }

    // ===== Activate =====

    /// Delete every generation other than this worker's. Returns the deleted
    /// names. Claiming clients is left to the caller and must follow this.
    pub async fn activate(&self) -> Result<Vec<String>, CacheError> {
        self.set_state(WorkerState::Activating);

        let stale: Vec<String> = self
            .storage
            .keys()
            .await?
            .into_iter()
            .filter(|name| *name != self.cache_name)
            .collect();

        try_join_all(stale.iter().map(|name| async move {
            info!(cache = %name, "Deleting old cache");
            self.storage.delete(name).await
        }))
        .await?;

        self.set_state(WorkerState::Activated);
        Ok(stale)
    }

    // ===== Fetch =====

    /// Cache-first for same-site and allow-listed assets, network otherwise,
    /// with the app shell or a stale copy as the offline fallback.
    pub async fn handle_fetch(&self, request: &CacheRequest) -> Result<FetchOutcome, FetchError> {
        if request.method != Method::GET || !is_http(&request.url) {
            return Ok(FetchOutcome::Bypass);
        }

        let cached = self.lookup(request.url.as_str()).await;
        if let Some(ref hit) = cached {
            if !self.policy.is_external(&request.url) {
                debug!(url = %request.url, "Served from cache");
                return Ok(FetchOutcome::Respond(hit.clone(), ResponseSource::Cache));
            }
        }

        match self.network.fetch(request).await {
            Ok(response) => {
                if response.is_ok() && self.policy.should_cache(&request.url) {
                    if let Err(e) = self
                        .storage
                        .put(&self.cache_name, request.url.as_str(), &response)
                        .await
                    {
                        warn!(url = %request.url, error = %e, "Failed to cache response");
                    }
                }
                Ok(FetchOutcome::Respond(response, ResponseSource::Network))
            }
            Err(e) => {
                debug!(url = %request.url, error = %e, "Network failed, trying cache");
                if request.accepts_html() {
                    if let Some(shell) = self.app_shell().await {
                        return Ok(FetchOutcome::Respond(shell, ResponseSource::AppShell));
                    }
                }
                match cached {
                    Some(hit) => Ok(FetchOutcome::Respond(hit, ResponseSource::Cache)),
                    None => Err(e.into()),
                }
            }
        }
    }

    async fn app_shell(&self) -> Option<CachedResponse> {
        let url = self.resolve(APP_SHELL_PATH).ok()?;
        self.lookup(url.as_str()).await
    }

    /// Storage failures read as a miss.
    async fn lookup(&self, url: &str) -> Option<CachedResponse> {
        match self.storage.get(&self.cache_name, url).await {
            Ok(hit) => hit,
            Err(e) => {
                warn!(url, error = %e, "Cache lookup failed");
                None
            }
        }
    }
}
