use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    Connected,
    Blocked,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    #[serde(default)]
    pub name: Option<String>,
    pub ip: String,
    pub status: DeviceStatus,
}

impl Device {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("Unknown")
    }

    /// The action that flips this device's current status.
    pub fn toggle_action(&self) -> DeviceAction {
        match self.status {
            DeviceStatus::Connected => DeviceAction::Block,
            DeviceStatus::Blocked => DeviceAction::Unblock,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceAction {
    Block,
    Unblock,
}

impl DeviceAction {
    /// Status a device ends up in after this action.
    pub fn resulting_status(&self) -> DeviceStatus {
        match self {
            DeviceAction::Block => DeviceStatus::Blocked,
            DeviceAction::Unblock => DeviceStatus::Connected,
        }
    }

    pub fn past_tense(&self) -> &'static str {
        match self {
            DeviceAction::Block => "blocked",
            DeviceAction::Unblock => "unblocked",
        }
    }
}

impl std::str::FromStr for DeviceAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "block" => Ok(DeviceAction::Block),
            "unblock" | "allow" => Ok(DeviceAction::Unblock),
            other => Err(format!("unknown device action: {}", other)),
        }
    }
}

/// Body of `POST /api/block-device`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockDeviceRequest {
    pub ip: String,
    pub action: DeviceAction,
}
