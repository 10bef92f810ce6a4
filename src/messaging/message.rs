use serde::{Deserialize, Serialize};

use crate::models::{AnalysisResult, TabId};

/// Requests addressed to the Coordinator or to a Capture Agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Command {
    #[serde(rename_all = "camelCase")]
    StartDetection {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tab_id: Option<TabId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        interval: Option<i64>,
    },
    StopDetection,
    Ping,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::StartDetection { .. } => "startDetection",
            Command::StopDetection => "stopDetection",
            Command::Ping => "ping",
        }
    }
}

/// Broadcast by a Capture Agent, relayed verbatim by the Coordinator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum DetectionEvent {
    DetectionResult { data: AnalysisResult },
    DetectionError { error: String },
    DetectionStopped,
}

/// A detection event together with the tab that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentEnvelope {
    pub tab_id: TabId,
    pub event: DetectionEvent,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Response {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl Response {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
            status: None,
        }
    }

    pub fn ready() -> Self {
        Self {
            status: Some("ready".into()),
            ..Self::ok()
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            status: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn commands_use_action_tag() {
        let start: Command =
            serde_json::from_value(json!({"action": "startDetection", "tabId": 7})).unwrap();
        assert_eq!(
            start,
            Command::StartDetection {
                tab_id: Some(TabId(7)),
                interval: None
            }
        );

        let stop = serde_json::to_value(Command::StopDetection).unwrap();
        assert_eq!(stop, json!({"action": "stopDetection"}));
    }

    #[test]
    fn stopped_event_has_no_payload() {
        let value = serde_json::to_value(DetectionEvent::DetectionStopped).unwrap();
        assert_eq!(value, json!({"action": "detectionStopped"}));
    }

    #[test]
    fn ping_response_reports_ready() {
        let value = serde_json::to_value(Response::ready()).unwrap();
        assert_eq!(value, json!({"success": true, "status": "ready"}));
        let failed = serde_json::to_value(Response::failed("nope")).unwrap();
        assert_eq!(failed, json!({"success": false, "error": "nope"}));
    }
}
