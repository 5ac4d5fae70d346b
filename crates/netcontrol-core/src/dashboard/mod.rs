//! Dashboard state: devices, blocked sites and schedules.
//!
//! `Dashboard` keeps the last loaded lists, a loading flag and a queue of
//! user-facing notifications. Data comes from a `DashboardSource` chosen by
//! configuration (`FixtureSource` or `RemoteSource`).
//!
//! Failures never propagate out of an operation. Auth failures end the
//! session; anything else becomes one notification and the operation stops.

pub mod fixture;
pub mod remote;
pub mod source;

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, warn};

use crate::api::ApiClient;
use crate::auth::{CredentialStore, SessionManager};
use crate::config::{Config, DataSource};
use crate::models::{BlockedSite, Device, Schedule, ScheduleAction};

pub use fixture::FixtureSource;
pub use remote::RemoteSource;
pub use source::{DashboardSource, SourceError};

/// Build the data source named by the configuration.
pub fn build_source(
    config: &Config,
    client: ApiClient,
    store: Arc<dyn CredentialStore>,
) -> Arc<dyn DashboardSource> {
    match config.data_source {
        DataSource::Fixture => Arc::new(FixtureSource::new()),
        DataSource::Remote => Arc::new(RemoteSource::new(client, store)),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Success,
    Warning,
    Danger,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
}

/// How a dashboard operation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    /// Input was rejected locally; a warning was posted.
    Rejected,
    /// The source failed; an error notification was posted.
    Failed,
    /// The session was refused and has been cleared.
    SignedOut,
    /// Another operation was in progress.
    Busy,
}

#[derive(Default)]
struct DashboardState {
    devices: Vec<Device>,
    blocked_sites: Vec<BlockedSite>,
    schedules: Vec<Schedule>,
    notifications: VecDeque<Notification>,
}

/// Clears the loading flag when the operation ends.
struct LoadingGuard<'a>(&'a AtomicBool);

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct Dashboard {
    source: Arc<dyn DashboardSource>,
    session: Arc<SessionManager>,
    loading: AtomicBool,
    state: Mutex<DashboardState>,
}

impl Dashboard {
    pub fn new(source: Arc<dyn DashboardSource>, session: Arc<SessionManager>) -> Self {
        Self {
            source,
            session,
            loading: AtomicBool::new(false),
            state: Mutex::new(DashboardState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, DashboardState> {
        match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn begin(&self) -> Option<LoadingGuard<'_>> {
        self.loading
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| LoadingGuard(&self.loading))
    }

    fn notify(&self, level: NotificationLevel, message: impl Into<String>) {
        let message = message.into();
        debug!(?level, message = %message, "Notification");
        self.state().notifications.push_back(Notification { level, message });
    }

    /// Route a source failure: auth failures log out, the rest notify.
    fn fail(&self, context: &str, err: SourceError) -> Outcome {
        if err.is_auth_failure() {
            warn!(error = %err, "Session refused, logging out");
            self.session.logout();
            return Outcome::SignedOut;
        }
        warn!(error = %err, "{}", context);
        self.notify(NotificationLevel::Danger, format!("{}: {}", context, err));
        Outcome::Failed
    }

    // ===== Accessors =====

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }

    pub fn devices(&self) -> Vec<Device> {
        self.state().devices.clone()
    }

    pub fn blocked_sites(&self) -> Vec<BlockedSite> {
        self.state().blocked_sites.clone()
    }

    pub fn schedules(&self) -> Vec<Schedule> {
        self.state().schedules.clone()
    }

    /// Remove and return every pending notification, oldest first.
    pub fn drain_notifications(&self) -> Vec<Notification> {
        self.state().notifications.drain(..).collect()
    }

    // ===== Devices =====

    pub async fn load_devices(&self) -> Outcome {
        let Some(_loading) = self.begin() else {
            return Outcome::Busy;
        };
        self.refresh_devices().await
    }

    async fn refresh_devices(&self) -> Outcome {
        match self.source.list_devices().await {
            Ok(devices) => {
                self.state().devices = devices;
                Outcome::Completed
            }
            Err(e) => self.fail("Failed to load devices", e),
        }
    }

    /// Flip a device between connected and blocked.
    pub async fn toggle_device(&self, device: &Device) -> Outcome {
        let Some(_loading) = self.begin() else {
            return Outcome::Busy;
        };
        let action = device.toggle_action();
        if let Err(e) = self.source.set_device_action(&device.ip, action).await {
            return self.fail("Failed to update device", e);
        }
        self.notify(
            NotificationLevel::Success,
            format!("Device {} {}", device.ip, action.past_tense()),
        );
        self.refresh_devices().await
    }

    // ===== Blocked Sites =====

    pub async fn load_blocked_sites(&self) -> Outcome {
        let Some(_loading) = self.begin() else {
            return Outcome::Busy;
        };
        self.refresh_blocked_sites().await
    }

    async fn refresh_blocked_sites(&self) -> Outcome {
        match self.source.list_blocked_sites().await {
            Ok(sites) => {
                self.state().blocked_sites = sites;
                Outcome::Completed
            }
            Err(e) => self.fail("Failed to load blocked sites", e),
        }
    }

    pub async fn add_blocked_site(&self, url: &str) -> Outcome {
        let url = url.trim();
        if url.is_empty() {
            self.notify(NotificationLevel::Warning, "Enter a valid URL");
            return Outcome::Rejected;
        }
        let Some(_loading) = self.begin() else {
            return Outcome::Busy;
        };
        if let Err(e) = self.source.block_site(url).await {
            return self.fail("Failed to block site", e);
        }
        self.notify(NotificationLevel::Success, format!("Site {} blocked", url));
        self.refresh_blocked_sites().await
    }

    pub async fn unblock_site(&self, url: &str) -> Outcome {
        if url.is_empty() {
            return Outcome::Rejected;
        }
        let Some(_loading) = self.begin() else {
            return Outcome::Busy;
        };
        if let Err(e) = self.source.unblock_site(url).await {
            return self.fail("Failed to unblock site", e);
        }
        self.notify(NotificationLevel::Success, format!("Site {} unblocked", url));
        self.refresh_blocked_sites().await
    }

    // ===== Schedules =====

    pub async fn load_schedules(&self) -> Outcome {
        let Some(_loading) = self.begin() else {
            return Outcome::Busy;
        };
        self.refresh_schedules().await
    }

    async fn refresh_schedules(&self) -> Outcome {
        match self.source.list_schedules().await {
            Ok(schedules) => {
                self.state().schedules = schedules;
                Outcome::Completed
            }
            Err(e) => self.fail("Failed to load schedules", e),
        }
    }

    /// Save a blocking window. Every field is required and times are `HH:MM`.
    pub async fn save_schedule(&self, start_time: &str, end_time: &str, action: &str) -> Outcome {
        if start_time.is_empty() || end_time.is_empty() || action.is_empty() {
            self.notify(NotificationLevel::Warning, "Fill in every schedule field");
            return Outcome::Rejected;
        }
        if !Schedule::is_valid_time(start_time) || !Schedule::is_valid_time(end_time) {
            self.notify(NotificationLevel::Warning, "Times must be HH:MM");
            return Outcome::Rejected;
        }
        let action: ScheduleAction = match action.parse() {
            Ok(action) => action,
            Err(e) => {
                self.notify(NotificationLevel::Warning, e);
                return Outcome::Rejected;
            }
        };
        let Some(_loading) = self.begin() else {
            return Outcome::Busy;
        };

        let schedule = Schedule {
            start_time: start_time.to_string(),
            end_time: end_time.to_string(),
            action,
        };
        if let Err(e) = self.source.save_schedule(&schedule).await {
            return self.fail("Failed to save schedule", e);
        }
        self.notify(NotificationLevel::Success, "Schedule saved");
        self.refresh_schedules().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiError;
    use crate::auth::{
        IdentityService, MemoryCredentialStore, Navigator, TOKEN_KEY, USER_KEY,
    };
    use crate::models::{AuthResponse, DeviceAction, DeviceStatus, LoginRequest, RegisterRequest};
    use async_trait::async_trait;
    use reqwest::StatusCode;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    struct NoIdentity;

    #[async_trait]
    impl IdentityService for NoIdentity {
        async fn register(&self, _: &RegisterRequest) -> Result<AuthResponse, ApiError> {
            Err(ApiError::Timeout)
        }
        async fn login(&self, _: &LoginRequest) -> Result<AuthResponse, ApiError> {
            Err(ApiError::Timeout)
        }
    }

    fn session() -> (Arc<SessionManager>, Arc<MemoryCredentialStore>) {
        let store = Arc::new(MemoryCredentialStore::new());
        store.set(TOKEN_KEY, "a.b.c").unwrap();
        store.set(USER_KEY, "{}").unwrap();
        let mgr = SessionManager::new(
            Arc::new(NoIdentity),
            store.clone(),
            Arc::new(Navigator::default()),
        );
        (Arc::new(mgr), store)
    }

    /// Fails every call with the given status.
    struct FailingSource {
        status: StatusCode,
        calls: AtomicUsize,
    }

    impl FailingSource {
        fn err(&self) -> SourceError {
            self.calls.fetch_add(1, Ordering::SeqCst);
            SourceError::Api(ApiError::from_status(self.status, ""))
        }
    }

    #[async_trait]
    impl DashboardSource for FailingSource {
        async fn list_devices(&self) -> Result<Vec<Device>, SourceError> {
            Err(self.err())
        }
        async fn set_device_action(&self, _: &str, _: DeviceAction) -> Result<(), SourceError> {
            Err(self.err())
        }
        async fn list_blocked_sites(&self) -> Result<Vec<BlockedSite>, SourceError> {
            Err(self.err())
        }
        async fn block_site(&self, _: &str) -> Result<(), SourceError> {
            Err(self.err())
        }
        async fn unblock_site(&self, _: &str) -> Result<(), SourceError> {
            Err(self.err())
        }
        async fn list_schedules(&self) -> Result<Vec<Schedule>, SourceError> {
            Err(self.err())
        }
        async fn save_schedule(&self, _: &Schedule) -> Result<(), SourceError> {
            Err(self.err())
        }
    }

    /// Fixture data behind a fixed delay, for overlapping operations.
    struct SlowSource(FixtureSource);

    #[async_trait]
    impl DashboardSource for SlowSource {
        async fn list_devices(&self) -> Result<Vec<Device>, SourceError> {
            tokio::time::sleep(Duration::from_millis(50)).await;
            self.0.list_devices().await
        }
        async fn set_device_action(&self, ip: &str, a: DeviceAction) -> Result<(), SourceError> {
            self.0.set_device_action(ip, a).await
        }
        async fn list_blocked_sites(&self) -> Result<Vec<BlockedSite>, SourceError> {
            self.0.list_blocked_sites().await
        }
        async fn block_site(&self, url: &str) -> Result<(), SourceError> {
            self.0.block_site(url).await
        }
        async fn unblock_site(&self, url: &str) -> Result<(), SourceError> {
            self.0.unblock_site(url).await
        }
        async fn list_schedules(&self) -> Result<Vec<Schedule>, SourceError> {
            self.0.list_schedules().await
        }
        async fn save_schedule(&self, s: &Schedule) -> Result<(), SourceError> {
            self.0.save_schedule(s).await
        }
    }

    #[tokio::test]
    async fn test_load_and_toggle_device() {
        let (session, _) = session();
        let dash = Dashboard::new(Arc::new(FixtureSource::new()), session);

        assert_eq!(dash.load_devices().await, Outcome::Completed);
        let pc = dash.devices()[0].clone();
        assert_eq!(pc.status, DeviceStatus::Connected);

        assert_eq!(dash.toggle_device(&pc).await, Outcome::Completed);
        assert_eq!(dash.devices()[0].status, DeviceStatus::Blocked);
        assert!(!dash.is_loading());

        let notes = dash.drain_notifications();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].level, NotificationLevel::Success);
        assert_eq!(notes[0].message, "Device 192.168.1.10 blocked");
        assert!(dash.drain_notifications().is_empty());
    }

    #[tokio::test]
    async fn test_empty_site_is_rejected_without_call() {
        let (session, _) = session();
        let source = Arc::new(FailingSource {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            calls: AtomicUsize::new(0),
        });
        let dash = Dashboard::new(source.clone(), session);

        assert_eq!(dash.add_blocked_site("   ").await, Outcome::Rejected);
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
        assert_eq!(dash.drain_notifications()[0].level, NotificationLevel::Warning);
    }

    #[tokio::test]
    async fn test_add_and_unblock_site() {
        let (session, _) = session();
        let dash = Dashboard::new(Arc::new(FixtureSource::new()), session);

        assert_eq!(dash.add_blocked_site("example.com").await, Outcome::Completed);
        assert_eq!(dash.blocked_sites().len(), 3);
        assert_eq!(dash.unblock_site("facebook.com").await, Outcome::Completed);
        let urls: Vec<String> = dash.blocked_sites().into_iter().map(|s| s.url).collect();
        assert_eq!(urls, vec!["twitter.com", "example.com"]);
    }

    #[tokio::test]
    async fn test_schedule_requires_every_field() {
        let (session, _) = session();
        let dash = Dashboard::new(Arc::new(FixtureSource::new()), session);

        assert_eq!(dash.save_schedule("", "07:00", "block").await, Outcome::Rejected);
        assert_eq!(dash.save_schedule("21:00", "7am", "block").await, Outcome::Rejected);
        assert_eq!(dash.save_schedule("21:00", "07:00", "pause").await, Outcome::Rejected);
        assert_eq!(dash.drain_notifications().len(), 3);

        assert_eq!(dash.save_schedule("21:00", "07:00", "block").await, Outcome::Completed);
        assert_eq!(dash.schedules()[0].action, ScheduleAction::Block);
    }

    #[tokio::test]
    async fn test_upstream_failure_notifies_once() {
        let (session, store) = session();
        let source = Arc::new(FailingSource {
            status: StatusCode::BAD_GATEWAY,
            calls: AtomicUsize::new(0),
        });
        let dash = Dashboard::new(source.clone(), session);

        assert_eq!(dash.add_blocked_site("example.com").await, Outcome::Failed);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        let notes = dash.drain_notifications();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].level, NotificationLevel::Danger);
        assert!(store.get(TOKEN_KEY).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_forbidden_logs_out() {
        let (session, store) = session();
        let source = Arc::new(FailingSource {
            status: StatusCode::FORBIDDEN,
            calls: AtomicUsize::new(0),
        });
        let dash = Dashboard::new(source, session.clone());

        assert_eq!(dash.load_devices().await, Outcome::SignedOut);
        assert_eq!(store.get(TOKEN_KEY).unwrap(), None);
        assert_eq!(session.navigator().current(), "/login.html?logout=true");
        assert!(dash.drain_notifications().is_empty());
    }

    #[tokio::test]
    async fn test_operations_ignored_while_loading() {
        let (session, _) = session();
        let dash = Dashboard::new(Arc::new(SlowSource(FixtureSource::new())), session);

        let (first, second) = tokio::join!(dash.load_devices(), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            dash.add_blocked_site("example.com").await
        });
        assert_eq!(first, Outcome::Completed);
        assert_eq!(second, Outcome::Busy);
        assert_eq!(dash.blocked_sites().len(), 0);
    }
}
