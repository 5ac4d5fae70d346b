use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleAction {
    Block,
    Allow,
}

impl std::str::FromStr for ScheduleAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "block" => Ok(ScheduleAction::Block),
            "allow" | "unblock" => Ok(ScheduleAction::Allow),
            other => Err(format!("unknown schedule action: {}", other)),
        }
    }
}

impl std::fmt::Display for ScheduleAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScheduleAction::Block => write!(f, "block"),
            ScheduleAction::Allow => write!(f, "allow"),
        }
    }
}

/// A blocking window, times as `HH:MM`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    pub start_time: String,
    pub end_time: String,
    pub action: ScheduleAction,
}

impl Schedule {
    /// Whether `value` is a 24h `HH:MM` time.
    pub fn is_valid_time(value: &str) -> bool {
        chrono::NaiveTime::parse_from_str(value, "%H:%M").is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schedule_wire_format() {
        let schedule = Schedule {
            start_time: "21:00".to_string(),
            end_time: "07:00".to_string(),
            action: ScheduleAction::Block,
        };
        assert_eq!(
            serde_json::to_string(&schedule).unwrap(),
            r#"{"startTime":"21:00","endTime":"07:00","action":"block"}"#
        );
    }

    #[test]
    fn test_is_valid_time() {
        assert!(Schedule::is_valid_time("00:00"));
        assert!(Schedule::is_valid_time("23:59"));
        assert!(!Schedule::is_valid_time("24:00"));
        assert!(!Schedule::is_valid_time("7pm"));
        assert!(!Schedule::is_valid_time(""));
    }
}
