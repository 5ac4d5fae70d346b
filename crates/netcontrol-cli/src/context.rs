//! Everything a command needs, built once from the configuration.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use netcontrol_core::auth::{
    CredentialStore, FileCredentialStore, GuardDecision, Navigator, LANDING_PATH,
};
use netcontrol_core::dashboard::build_source;
use netcontrol_core::offline::{
    CacheManifest, DiskCacheStorage, HttpNetwork, OfflineWorker, Registration,
};
use netcontrol_core::{ApiClient, Config, Dashboard, SessionManager};
use tracing::debug;

/// Subdirectory of the cache dir holding offline cache generations
const OFFLINE_DIR: &str = "offline";

pub struct AppContext {
    pub config: Config,
    pub cache_dir: PathBuf,
    pub client: ApiClient,
    pub store: Arc<dyn CredentialStore>,
    pub session: Arc<SessionManager>,
}

impl AppContext {
    pub fn load(base_url: Option<&str>, data_source: Option<&str>) -> Result<Self> {
        let mut config = Config::load()?;
        if let Some(url) = base_url {
            config.base_url = url.to_string();
        }
        if let Some(source) = data_source {
            config.data_source = source.parse()?;
        }

        let cache_dir = config.cache_dir()?;
        let client = ApiClient::new(config.base_url()?, config.request_timeout())
            .context("Failed to build HTTP client")?;
        let store: Arc<dyn CredentialStore> = Arc::new(FileCredentialStore::new(&cache_dir));
        let session = Arc::new(SessionManager::new(
            Arc::new(client.clone()),
            store.clone(),
            Arc::new(Navigator::default()),
        ));
        debug!(
            base_url = %config.base_url,
            data_source = %config.data_source,
            cache_dir = %cache_dir.display(),
            "Context ready"
        );

        Ok(Self {
            config,
            cache_dir,
            client,
            store,
            session,
        })
    }

    /// Fail unless a live session exists. An expired one is cleared first.
    pub fn require_session(&self) -> Result<()> {
        match self.session.guard(LANDING_PATH) {
            GuardDecision::Stay => Ok(()),
            GuardDecision::Redirect(to) => {
                debug!(to = %to, "Guard redirected");
                bail!("Not signed in. Run `netcontrol login` first.")
            }
        }
    }

    pub fn dashboard(&self) -> Dashboard {
        let source = build_source(&self.config, self.client.clone(), self.store.clone());
        Dashboard::new(source, self.session.clone())
    }

    /// Remember the email for the next login prompt.
    pub fn remember_email(&self, email: &str) -> Result<()> {
        let mut config = self.config.clone();
        config.last_email = Some(email.to_string());
        config.save()
    }

    pub fn offline_storage_dir(&self) -> PathBuf {
        self.cache_dir.join(OFFLINE_DIR)
    }

    /// A worker for the given manifest (or the built-in one) serving the
    /// configured server origin.
    pub fn offline_worker(&self, manifest: Option<&Path>) -> Result<Arc<OfflineWorker>> {
        let manifest = match manifest {
            Some(path) => CacheManifest::load(path)?,
            None => CacheManifest::default(),
        };
        let storage = Arc::new(DiskCacheStorage::new(self.offline_storage_dir()));
        let network = Arc::new(
            HttpNetwork::new(self.config.request_timeout())
                .context("Failed to build HTTP client")?,
        );
        let worker = OfflineWorker::new(manifest, self.config.base_url()?, storage, network)?;
        Ok(Arc::new(worker))
    }

    /// A registration whose active worker serves the current generation,
    /// installing it first if this is the first run.
    pub async fn offline_registration(&self) -> Result<Registration> {
        let worker = self.offline_worker(None)?;
        let registration = Registration::new();
        if worker.is_installed().await? {
            registration.resume(worker).await?;
        } else {
            let report = registration.register(worker).await?;
            debug!(
                cached = report.cached.len(),
                failed = report.failed.len(),
                "Installed offline cache on first use"
            );
        }
        Ok(registration)
    }
}
