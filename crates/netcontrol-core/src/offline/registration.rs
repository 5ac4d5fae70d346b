use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::info;

use super::request::CacheRequest;
use super::storage::CacheError;
use super::worker::{FetchError, FetchOutcome, InstallReport, OfflineWorker};

#[derive(Default)]
struct RegistrationState {
    active: Option<Arc<OfflineWorker>>,
    waiting: Option<Arc<OfflineWorker>>,
    /// Open client id -> cache name of the worker controlling it.
    clients: BTreeMap<String, Option<String>>,
}

/// Owns the worker lifecycle for one scope: installs new workers, activates
/// them, retires the one they replace and points open clients at the result.
#[derive(Default)]
pub struct Registration {
    state: Mutex<RegistrationState>,
}

impl Registration {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, RegistrationState> {
        match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn active(&self) -> Option<Arc<OfflineWorker>> {
        self.state().active.clone()
    }

    pub fn waiting(&self) -> Option<Arc<OfflineWorker>> {
        self.state().waiting.clone()
    }

    /// Track an open client. New clients are controlled by the active worker.
    pub fn open_client(&self, id: impl Into<String>) {
        let mut state = self.state();
        let controller = state.active.as_ref().map(|w| w.cache_name().to_string());
        state.clients.insert(id.into(), controller);
    }

    pub fn close_client(&self, id: &str) {
        self.state().clients.remove(id);
    }

    /// Cache name of the worker controlling `id`, if any.
    pub fn controller_of(&self, id: &str) -> Option<String> {
        self.state().clients.get(id).cloned().flatten()
    }

    /// Install `worker`, then activate it straight away if it asked to skip
    /// waiting. Otherwise it is parked as the waiting worker.
    pub async fn register(&self, worker: Arc<OfflineWorker>) -> Result<InstallReport, CacheError> {
        let report = worker.install().await?;
        if worker.skip_waiting_requested() {
            self.activate(worker).await?;
        } else {
            self.state().waiting = Some(worker);
        }
        Ok(report)
    }

    /// Activate the waiting worker, if there is one.
    pub async fn activate_waiting(&self) -> Result<bool, CacheError> {
        let waiting = self.state().waiting.take();
        match waiting {
            Some(worker) => {
                self.activate(worker).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Take over with a worker whose generation is already in storage, as
    /// after a restart. Nothing is fetched.
    pub async fn resume(&self, worker: Arc<OfflineWorker>) -> Result<(), CacheError> {
        self.activate(worker).await
    }

    async fn activate(&self, worker: Arc<OfflineWorker>) -> Result<(), CacheError> {
        let deleted = worker.activate().await?;

        // Cleanup is done; now take over.
        let mut state = self.state();
        if let Some(previous) = state.active.replace(worker.clone()) {
            if !Arc::ptr_eq(&previous, &worker) {
                previous.mark_redundant();
            }
        }
        let name = worker.cache_name().to_string();
        for controller in state.clients.values_mut() {
            *controller = Some(name.clone());
        }
        info!(
            cache = %name,
            deleted = deleted.len(),
            clients = state.clients.len(),
            "Worker activated and clients claimed"
        );
        Ok(())
    }

    /// Route a fetch through the active worker. Without one nothing is
    /// intercepted.
    pub async fn fetch(&self, request: &CacheRequest) -> Result<FetchOutcome, FetchError> {
        match self.active() {
            Some(worker) => worker.handle_fetch(request).await,
            None => Ok(FetchOutcome::Bypass),
        }
    }
}
