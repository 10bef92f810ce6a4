use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{DetectionError, DetectionResult};
use crate::models::{SessionSnapshot, SessionStatus, TabId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartDecision {
    /// Slot reserved; the caller must now probe the backend and command the agent.
    Proceed { session_id: String },
    /// Same tab is already Active; nothing to do.
    AlreadyActive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopDecision {
    NothingToStop,
    /// A start was in flight and has been abandoned.
    CancelStart(TabId),
    /// The agent in this tab must be told to stop.
    StopAgent(TabId),
    AlreadyStopping,
}

/// The single detection session. Transitions are pure; persistence and
/// messaging live in the controller.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub session_id: Option<String>,
    pub status: SessionStatus,
    pub target_tab_id: Option<TabId>,
    pub interval_ms: u64,
    pub started_at: Option<DateTime<Utc>>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_start(&mut self, tab_id: TabId, interval_ms: u64) -> DetectionResult<StartDecision> {
        match self.status {
            SessionStatus::Idle => {
                let session_id = Uuid::new_v4().to_string();
                *self = Self {
                    session_id: Some(session_id.clone()),
                    status: SessionStatus::Starting,
                    target_tab_id: Some(tab_id),
                    interval_ms,
                    started_at: None,
                };
                Ok(StartDecision::Proceed { session_id })
            }
            SessionStatus::Active if self.target_tab_id == Some(tab_id) => {
                Ok(StartDecision::AlreadyActive)
            }
            _ => Err(DetectionError::SessionBusy(
                self.target_tab_id.unwrap_or(tab_id),
            )),
        }
    }

    /// Starting -> Active, only for the session that reserved the slot.
    pub fn confirm_active(&mut self, session_id: &str) -> bool {
        if self.status != SessionStatus::Starting || self.session_id.as_deref() != Some(session_id) {
            return false;
        }
        self.status = SessionStatus::Active;
        self.started_at = Some(Utc::now());
        true
    }

    /// Starting -> Idle after a failed probe or agent handshake.
    pub fn abort_start(&mut self, session_id: &str) -> bool {
        if self.status != SessionStatus::Starting || self.session_id.as_deref() != Some(session_id) {
            return false;
        }
        self.reset();
        true
    }

    pub fn begin_stop(&mut self) -> StopDecision {
        match (self.status, self.target_tab_id) {
            (SessionStatus::Active, Some(tab_id)) => {
                self.status = SessionStatus::Stopping;
                StopDecision::StopAgent(tab_id)
            }
            (SessionStatus::Starting, Some(tab_id)) => {
                self.reset();
                StopDecision::CancelStart(tab_id)
            }
            (SessionStatus::Stopping, _) => StopDecision::AlreadyStopping,
            _ => {
                self.reset();
                StopDecision::NothingToStop
            }
        }
    }

    pub fn finish_stop(&mut self) {
        self.reset();
    }

    /// Forced cleanup when the target tab disappears. Returns whether the session was affected.
    pub fn tab_closed(&mut self, tab_id: TabId) -> bool {
        if self.status.is_engaged() && self.target_tab_id == Some(tab_id) {
            self.reset();
            return true;
        }
        false
    }

    /// The agent stopped on its own (overlay closed, page unloaded).
    pub fn agent_stopped(&mut self, tab_id: TabId) -> bool {
        let affected = matches!(self.status, SessionStatus::Active | SessionStatus::Stopping)
            && self.target_tab_id == Some(tab_id);
        if affected {
            self.reset();
        }
        affected
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.session_id.clone(),
            status: self.status,
            target_tab_id: self.target_tab_id,
            interval_ms: self.interval_ms,
            started_at: self.started_at,
        }
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TAB: TabId = TabId(1);
    const OTHER: TabId = TabId(2);

    fn active() -> SessionState {
        let mut state = SessionState::new();
        let StartDecision::Proceed { session_id } = state.begin_start(TAB, 1000).unwrap() else {
            panic!("expected to proceed");
        };
        assert!(state.confirm_active(&session_id));
        state
    }

    #[test]
    fn start_reserves_the_slot() {
        let mut state = SessionState::new();
        let decision = state.begin_start(TAB, 500).unwrap();
        assert!(matches!(decision, StartDecision::Proceed { .. }));
        assert_eq!(state.status, SessionStatus::Starting);
        assert_eq!(state.target_tab_id, Some(TAB));
        assert_eq!(state.interval_ms, 500);
    }

    #[test]
    fn second_start_while_starting_is_busy() {
        let mut state = SessionState::new();
        state.begin_start(TAB, 1000).unwrap();
        assert_eq!(
            state.begin_start(OTHER, 1000),
            Err(DetectionError::SessionBusy(TAB))
        );
        assert_eq!(state.begin_start(TAB, 1000), Err(DetectionError::SessionBusy(TAB)));
    }

    #[test]
    fn restart_on_active_tab_is_a_no_op() {
        let mut state = active();
        let before = state.session_id.clone();
        assert_eq!(state.begin_start(TAB, 1000).unwrap(), StartDecision::AlreadyActive);
        assert_eq!(state.session_id, before);
        assert_eq!(state.status, SessionStatus::Active);
    }

    #[test]
    fn start_on_other_tab_while_active_is_rejected() {
        let mut state = active();
        assert_eq!(
            state.begin_start(OTHER, 1000),
            Err(DetectionError::SessionBusy(TAB))
        );
    }

    #[test]
    fn stale_confirmation_is_ignored() {
        let mut state = SessionState::new();
        let StartDecision::Proceed { session_id } = state.begin_start(TAB, 1000).unwrap() else {
            panic!("expected to proceed");
        };
        assert_eq!(state.begin_stop(), StopDecision::CancelStart(TAB));
        assert!(!state.confirm_active(&session_id));
        assert_eq!(state.status, SessionStatus::Idle);
    }

    #[test]
    fn abort_returns_to_idle() {
        let mut state = SessionState::new();
        let StartDecision::Proceed { session_id } = state.begin_start(TAB, 1000).unwrap() else {
            panic!("expected to proceed");
        };
        assert!(state.abort_start(&session_id));
        assert_eq!(state.snapshot().status, SessionStatus::Idle);
        assert_eq!(state.target_tab_id, None);
    }

    #[test]
    fn stop_goes_through_stopping() {
        let mut state = active();
        assert_eq!(state.begin_stop(), StopDecision::StopAgent(TAB));
        assert_eq!(state.status, SessionStatus::Stopping);
        assert_eq!(state.begin_stop(), StopDecision::AlreadyStopping);
        state.finish_stop();
        assert_eq!(state.status, SessionStatus::Idle);
        assert_eq!(state.begin_stop(), StopDecision::NothingToStop);
    }

    #[test]
    fn closing_target_tab_forces_idle() {
        let mut state = active();
        assert!(!state.tab_closed(OTHER));
        assert_eq!(state.status, SessionStatus::Active);
        assert!(state.tab_closed(TAB));
        assert_eq!(state.status, SessionStatus::Idle);
    }

    #[test]
    fn agent_stop_only_counts_for_target() {
        let mut state = active();
        assert!(!state.agent_stopped(OTHER));
        assert!(state.agent_stopped(TAB));
        assert!(!state.agent_stopped(TAB));
    }
}
