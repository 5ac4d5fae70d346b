//! In-memory sample data for working without a backend.

use std::sync::Mutex;

use async_trait::async_trait;
use tracing::info;

use crate::models::{BlockedSite, Device, DeviceAction, DeviceStatus, Schedule};

use super::source::{DashboardSource, SourceError};

struct FixtureData {
    devices: Vec<Device>,
    blocked_sites: Vec<BlockedSite>,
    schedules: Vec<Schedule>,
}

/// Sample devices and sites, mutated in place by the dashboard.
pub struct FixtureSource {
    data: Mutex<FixtureData>,
}

impl FixtureSource {
    pub fn new() -> Self {
        Self::with_data(sample_devices(), sample_blocked_sites(), Vec::new())
    }

    pub fn with_data(
        devices: Vec<Device>,
        blocked_sites: Vec<BlockedSite>,
        schedules: Vec<Schedule>,
    ) -> Self {
        Self {
            data: Mutex::new(FixtureData {
                devices,
                blocked_sites,
                schedules,
            }),
        }
    }

    fn with<T>(&self, f: impl FnOnce(&mut FixtureData) -> T) -> T {
        match self.data.lock() {
            Ok(mut data) => f(&mut data),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }
}

impl Default for FixtureSource {
    fn default() -> Self {
        Self::new()
    }
}

fn sample_devices() -> Vec<Device> {
    [
        ("PC-Juan", "192.168.1.10", DeviceStatus::Connected),
        ("Phone-Maria", "192.168.1.11", DeviceStatus::Connected),
        ("Tablet-Luis", "192.168.1.12", DeviceStatus::Blocked),
    ]
    .into_iter()
    .map(|(name, ip, status)| Device {
        name: Some(name.to_string()),
        ip: ip.to_string(),
        status,
    })
    .collect()
}

fn sample_blocked_sites() -> Vec<BlockedSite> {
    vec![BlockedSite::new("facebook.com"), BlockedSite::new("twitter.com")]
}

#[async_trait]
impl DashboardSource for FixtureSource {
    async fn list_devices(&self) -> Result<Vec<Device>, SourceError> {
        Ok(self.with(|d| d.devices.clone()))
    }

    /// Unknown addresses are ignored.
    async fn set_device_action(&self, ip: &str, action: DeviceAction) -> Result<(), SourceError> {
        self.with(|d| {
            if let Some(device) = d.devices.iter_mut().find(|dev| dev.ip == ip) {
                device.status = action.resulting_status();
                info!(ip, action = action.past_tense(), "Fixture device updated");
            }
        });
        Ok(())
    }

    async fn list_blocked_sites(&self) -> Result<Vec<BlockedSite>, SourceError> {
        Ok(self.with(|d| d.blocked_sites.clone()))
    }

    async fn block_site(&self, url: &str) -> Result<(), SourceError> {
        self.with(|d| {
            if !d.blocked_sites.iter().any(|s| s.url == url) {
                d.blocked_sites.push(BlockedSite::new(url));
            }
        });
        Ok(())
    }

    async fn unblock_site(&self, url: &str) -> Result<(), SourceError> {
        self.with(|d| d.blocked_sites.retain(|s| s.url != url));
        Ok(())
    }

    async fn list_schedules(&self) -> Result<Vec<Schedule>, SourceError> {
        Ok(self.with(|d| d.schedules.clone()))
    }

    async fn save_schedule(&self, schedule: &Schedule) -> Result<(), SourceError> {
        self.with(|d| d.schedules.push(schedule.clone()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ScheduleAction;

    #[tokio::test]
    async fn test_seeded_with_sample_data() {
        let source = FixtureSource::new();
        let devices = source.list_devices().await.unwrap();
        assert_eq!(devices.len(), 3);
        assert_eq!(devices[2].display_name(), "Tablet-Luis");
        assert_eq!(devices[2].status, DeviceStatus::Blocked);

        let sites = source.list_blocked_sites().await.unwrap();
        assert_eq!(sites, vec![BlockedSite::new("facebook.com"), BlockedSite::new("twitter.com")]);
        assert!(source.list_schedules().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_device_action_updates_status() {
        let source = FixtureSource::new();
        source
            .set_device_action("192.168.1.10", DeviceAction::Block)
            .await
            .unwrap();
        source
            .set_device_action("10.0.0.99", DeviceAction::Block)
            .await
            .unwrap();

        let devices = source.list_devices().await.unwrap();
        assert_eq!(devices[0].status, DeviceStatus::Blocked);
        assert_eq!(devices.len(), 3);
    }

    #[tokio::test]
    async fn test_block_site_is_idempotent() {
        let source = FixtureSource::new();
        source.block_site("example.com").await.unwrap();
        source.block_site("example.com").await.unwrap();
        source.unblock_site("facebook.com").await.unwrap();

        let urls: Vec<String> = source
            .list_blocked_sites()
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.url)
            .collect();
        assert_eq!(urls, vec!["twitter.com", "example.com"]);
    }

    #[tokio::test]
    async fn test_save_schedule_appends() {
        let source = FixtureSource::new();
        let schedule = Schedule {
            start_time: "22:00".to_string(),
            end_time: "06:30".to_string(),
            action: ScheduleAction::Block,
        };
        source.save_schedule(&schedule).await.unwrap();
        assert_eq!(source.list_schedules().await.unwrap(), vec![schedule]);
    }
}
