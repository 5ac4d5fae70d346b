use async_trait::async_trait;
use thiserror::Error;

use crate::api::ApiError;
use crate::models::{BlockedSite, Device, DeviceAction, Schedule};

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Not signed in")]
    NotAuthenticated,

    #[error(transparent)]
    Api(#[from] ApiError),
}

impl SourceError {
    /// The session is missing or was refused; the caller should log out.
    pub fn is_auth_failure(&self) -> bool {
        match self {
            SourceError::NotAuthenticated => true,
            SourceError::Api(e) => e.is_auth_failure(),
        }
    }
}

/// Where the dashboard reads and writes devices, blocked sites and schedules.
#[async_trait]
pub trait DashboardSource: Send + Sync {
    async fn list_devices(&self) -> Result<Vec<Device>, SourceError>;
    async fn set_device_action(&self, ip: &str, action: DeviceAction) -> Result<(), SourceError>;

    async fn list_blocked_sites(&self) -> Result<Vec<BlockedSite>, SourceError>;
    async fn block_site(&self, url: &str) -> Result<(), SourceError>;
    async fn unblock_site(&self, url: &str) -> Result<(), SourceError>;

    async fn list_schedules(&self) -> Result<Vec<Schedule>, SourceError>;
    async fn save_schedule(&self, schedule: &Schedule) -> Result<(), SourceError>;
}
