use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::TabId;

/// Why a single tick could not produce a frame.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaptureFailure {
    #[error("No video found on page")]
    NoVideoFound,
    #[error("Video not ready yet")]
    VideoNotReady,
    #[error("Video has no dimensions")]
    NoDimensions,
    #[error("Frame render failed: {0}")]
    Render(String),
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum DetectionError {
    #[error("Backend server not available. Please start the backend server first. ({0})")]
    BackendUnreachable(String),
    #[error("Could not establish connection. Refresh the page and try again.")]
    AgentUnreachable,
    #[error("Content script failed to start: {0}")]
    AgentRejected(String),
    #[error(transparent)]
    Capture(#[from] CaptureFailure),
    #[error("Backend error {status}: {body}")]
    AnalysisHttp { status: u16, body: String },
    #[error("Request failed: {0}")]
    Transport(String),
    #[error("Invalid backend response: {0}")]
    InvalidResponse(String),
    #[error("{0} timed out")]
    Timeout(String),
    #[error("Detection is already running in tab {0}")]
    SessionBusy(TabId),
    #[error("Request cancelled")]
    Cancelled,
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Invalid setting: {0}")]
    InvalidSetting(String),
    #[error("No response from receiver")]
    NoResponse,
    #[error("Could not reset backend: {0}")]
    ResetFailed(String),
}

impl DetectionError {
    /// Per-tick failures keep the capture loop alive.
    pub fn is_tick_recoverable(&self) -> bool {
        matches!(
            self,
            DetectionError::Capture(_)
                | DetectionError::AnalysisHttp { .. }
                | DetectionError::Transport(_)
                | DetectionError::InvalidResponse(_)
                | DetectionError::Timeout(_)
        )
    }
}

impl From<anyhow::Error> for DetectionError {
    fn from(err: anyhow::Error) -> Self {
        DetectionError::Storage(format!("{err:#}"))
    }
}

pub type DetectionResult<T> = std::result::Result<T, DetectionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_failures_keep_their_messages() {
        let err = DetectionError::from(CaptureFailure::NoVideoFound);
        assert_eq!(err.to_string(), "No video found on page");
        assert!(err.is_tick_recoverable());
    }

    #[test]
    fn http_error_carries_body() {
        let err = DetectionError::AnalysisHttp {
            status: 500,
            body: "model crashed".into(),
        };
        assert_eq!(err.to_string(), "Backend error 500: model crashed");
    }

    #[test]
    fn start_failures_are_not_tick_errors() {
        assert!(!DetectionError::AgentUnreachable.is_tick_recoverable());
        assert!(!DetectionError::BackendUnreachable("down".into()).is_tick_recoverable());
    }
}
