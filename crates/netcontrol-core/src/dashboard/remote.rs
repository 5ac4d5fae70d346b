use std::sync::Arc;

use async_trait::async_trait;

use crate::api::ApiClient;
use crate::auth::{CredentialStore, TOKEN_KEY};
use crate::models::{BlockedSite, Device, DeviceAction, Schedule};

use super::source::{DashboardSource, SourceError};

/// Dashboard data from the server's protected API.
///
/// The bearer token is read from the credential store on every call, so a
/// login or logout elsewhere takes effect immediately.
pub struct RemoteSource {
    client: ApiClient,
    store: Arc<dyn CredentialStore>,
}

impl RemoteSource {
    pub fn new(client: ApiClient, store: Arc<dyn CredentialStore>) -> Self {
        Self { client, store }
    }

    fn authed(&self) -> Result<ApiClient, SourceError> {
        match self.store.get(TOKEN_KEY) {
            Ok(Some(token)) => Ok(self.client.with_token(token)),
            _ => Err(SourceError::NotAuthenticated),
        }
    }
}

#[async_trait]
impl DashboardSource for RemoteSource {
    async fn list_devices(&self) -> Result<Vec<Device>, SourceError> {
        Ok(self.authed()?.fetch_devices().await?)
    }

    async fn set_device_action(&self, ip: &str, action: DeviceAction) -> Result<(), SourceError> {
        self.authed()?.set_device_action(ip, action).await?;
        Ok(())
    }

    async fn list_blocked_sites(&self) -> Result<Vec<BlockedSite>, SourceError> {
        Ok(self.authed()?.fetch_blocked_sites().await?)
    }

    async fn block_site(&self, url: &str) -> Result<(), SourceError> {
        self.authed()?.add_blocked_site(url).await?;
        Ok(())
    }

    async fn unblock_site(&self, url: &str) -> Result<(), SourceError> {
        self.authed()?.remove_blocked_site(url).await?;
        Ok(())
    }

    async fn list_schedules(&self) -> Result<Vec<Schedule>, SourceError> {
        Ok(self.authed()?.fetch_schedules().await?)
    }

    async fn save_schedule(&self, schedule: &Schedule) -> Result<(), SourceError> {
        self.authed()?.save_schedule(schedule).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::MemoryCredentialStore;
    use std::time::Duration;
    use url::Url;

    #[tokio::test]
    async fn test_missing_token_is_auth_failure() {
        let client = ApiClient::new(
            Url::parse("http://127.0.0.1:9").unwrap(),
            Duration::from_secs(1),
        )
        .unwrap();
        let source = RemoteSource::new(client, Arc::new(MemoryCredentialStore::new()));

        let err = source.list_devices().await.unwrap_err();
        assert!(matches!(err, SourceError::NotAuthenticated));
        assert!(err.is_auth_failure());
    }
}
