use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of a browser tab, as handed out by the tab registry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct TabId(pub i64);

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TabInfo {
    pub id: TabId,
    pub url: String,
}

impl TabInfo {
    pub fn new(id: i64, url: impl Into<String>) -> Self {
        Self {
            id: TabId(id),
            url: url.into(),
        }
    }

    /// Browser-internal pages never host a capture agent.
    pub fn is_restricted(&self) -> bool {
        self.url.starts_with("chrome://") || self.url.starts_with("chrome-extension://")
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum SessionStatus {
    #[default]
    Idle,
    Starting,
    Active,
    Stopping,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Idle => "Idle",
            SessionStatus::Starting => "Starting",
            SessionStatus::Active => "Active",
            SessionStatus::Stopping => "Stopping",
        }
    }

    /// Starting and Active both occupy the single session slot.
    pub fn is_engaged(&self) -> bool {
        !matches!(self, SessionStatus::Idle)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub session_id: Option<String>,
    pub status: SessionStatus,
    pub target_tab_id: Option<TabId>,
    pub interval_ms: u64,
    pub started_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn restricted_pages_are_detected() {
        assert!(TabInfo::new(1, "chrome://extensions").is_restricted());
        assert!(TabInfo::new(1, "chrome-extension://abc/popup.html").is_restricted());
        assert!(!TabInfo::new(1, "https://www.youtube.com/watch?v=x").is_restricted());
    }

    #[test]
    fn tab_id_serializes_as_plain_number() {
        let json = serde_json::to_string(&TabId(42)).unwrap();
        assert_eq!(json, "42");
    }
}
