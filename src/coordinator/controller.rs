use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, trace, warn};
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::analyzer::RemoteAnalyzer;
use crate::error::{DetectionError, DetectionResult};
use crate::messaging::{
    AgentEnvelope, Command, DetectionEvent, EventBus, PendingReply, Response, TabEvent,
    TabRegistry,
};
use crate::models::{HealthStatus, SessionSnapshot, TabId};
use crate::settings::{SettingsStore, BACKEND_TIMEOUT};

use super::state::{SessionState, StartDecision, StopDecision};

#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Bound on the reachability probe and on each agent handshake.
    pub health_timeout: Duration,
    /// Pause between a passing probe and the start command, giving a freshly
    /// loaded page's agent time to install its listeners.
    pub agent_settle_delay: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            health_timeout: BACKEND_TIMEOUT,
            agent_settle_delay: Duration::from_millis(300),
        }
    }
}

struct Shared {
    state: Mutex<SessionState>,
    /// Cancel handle of the start in flight, keyed by its session id.
    pending_start: Mutex<Option<(String, CancellationToken)>>,
    settings: SettingsStore,
    analyzer: Arc<dyn RemoteAnalyzer>,
    tabs: TabRegistry,
    agent_events: EventBus<AgentEnvelope>,
    surface_events: EventBus<DetectionEvent>,
    config: CoordinatorConfig,
}

/// Owns the session and relays agent events to control surfaces. Clones share state.
#[derive(Clone)]
pub struct Coordinator {
    shared: Arc<Shared>,
    relay_token: CancellationToken,
    relay: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl Coordinator {
    /// Builds the coordinator and starts relaying events from `agent_events`
    /// and tab lifecycle events from `tabs`. Must be called inside a runtime.
    pub fn start(
        config: CoordinatorConfig,
        settings: SettingsStore,
        analyzer: Arc<dyn RemoteAnalyzer>,
        tabs: TabRegistry,
        agent_events: EventBus<AgentEnvelope>,
    ) -> Self {
        let shared = Arc::new(Shared {
            state: Mutex::new(SessionState::new()),
            pending_start: Mutex::new(None),
            settings,
            analyzer,
            tabs,
            agent_events,
            surface_events: EventBus::new(),
            config,
        });

        // Subscribe before spawning so nothing published after `start` returns is missed.
        let envelopes = shared.agent_events.subscribe();
        let tab_events = shared.tabs.subscribe();
        let relay_token = CancellationToken::new();
        let handle = tokio::spawn(event_relay(
            Arc::clone(&shared),
            envelopes,
            tab_events,
            relay_token.clone(),
        ));

        Self {
            shared,
            relay_token,
            relay: Arc::new(Mutex::new(Some(handle))),
        }
    }

    /// Uniform asynchronous entry point for control-surface commands.
    pub fn request(&self, command: Command) -> PendingReply<Response> {
        let (responder, reply) = PendingReply::channel();
        let this = self.clone();
        tokio::spawn(async move {
            let result = match command {
                Command::StartDetection {
                    tab_id: Some(tab_id),
                    ..
                } => this.start_detection(tab_id).await.map(|()| Response::ok()),
                Command::StartDetection { tab_id: None, .. } => {
                    Ok(Response::failed("startDetection requires a tabId"))
                }
                Command::StopDetection => this.stop_detection().await.map(|()| Response::ok()),
                Command::Ping => Ok(Response::ready()),
            };
            responder.settle(result);
        });
        reply
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DetectionEvent> {
        self.shared.surface_events.subscribe()
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        self.shared.state.lock().await.snapshot()
    }

    pub async fn start_detection(&self, tab_id: TabId) -> DetectionResult<()> {
        let shared = &self.shared;
        let interval_ms = shared.settings.load().await?.capture_interval_ms;

        let cancel_token = CancellationToken::new();
        let session_id = {
            // Lock order: state, then pending_start.
            let mut state = shared.state.lock().await;
            let session_id = match state.begin_start(tab_id, interval_ms) {
                Ok(StartDecision::Proceed { session_id }) => session_id,
                Ok(StartDecision::AlreadyActive) => {
                    info!("detection already active in tab {tab_id}; start ignored");
                    return Ok(());
                }
                Err(err) => {
                    warn!("start in tab {tab_id} rejected: {err}");
                    return Err(err);
                }
            };
            *shared.pending_start.lock().await = Some((session_id.clone(), cancel_token.clone()));
            session_id
        };
        info!("session {session_id}: Idle -> Starting (tab {tab_id}, {interval_ms}ms)");

        let outcome = self.run_start(tab_id, interval_ms, &cancel_token).await;
        {
            let mut pending = shared.pending_start.lock().await;
            if pending.as_ref().is_some_and(|(id, _)| *id == session_id) {
                pending.take();
            }
        }

        if let Err(err) = outcome {
            // A stop or tab close already moved the session on and owns persistence.
            if shared.state.lock().await.abort_start(&session_id) {
                info!("session {session_id}: Starting -> Idle ({err})");
                self.persist_detecting(false).await;
            }
            return Err(err);
        }

        let confirmed = shared.state.lock().await.confirm_active(&session_id);
        if !confirmed {
            // Stopped or tab closed while the handshake was in flight.
            info!("session {session_id}: abandoned during start");
            let reply = shared.tabs.send(tab_id, Command::StopDetection);
            if let Err(err) = reply.settle().await {
                debug!("stop after abandoned start not delivered: {err}");
            }
            return Err(DetectionError::Cancelled);
        }

        self.persist_detecting(true).await;
        info!("session {session_id}: Starting -> Active");
        Ok(())
    }

    async fn run_start(
        &self,
        tab_id: TabId,
        interval_ms: u64,
        cancel_token: &CancellationToken,
    ) -> DetectionResult<()> {
        let config = &self.shared.config;

        let health = tokio::select! {
            biased;
            _ = cancel_token.cancelled() => return Err(DetectionError::Cancelled),
            health = self.probe_backend() => health?,
        };
        info!(
            "Backend health check passed (model loaded: {}, device: {})",
            health.model_loaded, health.device
        );

        tokio::select! {
            biased;
            _ = cancel_token.cancelled() => return Err(DetectionError::Cancelled),
            _ = tokio::time::sleep(config.agent_settle_delay) => {}
        }

        let reply = self.shared.tabs.send(
            tab_id,
            Command::StartDetection {
                tab_id: None,
                interval: Some(interval_ms as i64),
            },
        );
        let response = tokio::select! {
            biased;
            _ = cancel_token.cancelled() => return Err(DetectionError::Cancelled),
            response = tokio::time::timeout(config.health_timeout, reply.settle()) => {
                response.map_err(|_| DetectionError::AgentUnreachable)??
            }
        };

        if response.success {
            Ok(())
        } else {
            Err(DetectionError::AgentRejected(
                response.error.unwrap_or_else(|| "unknown error".into()),
            ))
        }
    }

    async fn probe_backend(&self) -> DetectionResult<HealthStatus> {
        let shared = &self.shared;
        let backend_url = shared.settings.load().await?.backend_url;
        let timeout = shared.config.health_timeout;

        match tokio::time::timeout(timeout, shared.analyzer.health(&backend_url)).await {
            Ok(Ok(health)) => Ok(health),
            Ok(Err(DetectionError::BackendUnreachable(reason))) => {
                error!("Backend health check failed: {reason}");
                Err(DetectionError::BackendUnreachable(reason))
            }
            Ok(Err(err)) => {
                error!("Backend health check failed: {err}");
                Err(DetectionError::BackendUnreachable(err.to_string()))
            }
            Err(_) => {
                error!("Backend health check timed out after {timeout:?}");
                Err(DetectionError::BackendUnreachable(format!(
                    "no answer from {backend_url} within {}s",
                    timeout.as_secs()
                )))
            }
        }
    }

    /// Always converges to Idle with `isDetecting == false`.
    pub async fn stop_detection(&self) -> DetectionResult<()> {
        let shared = &self.shared;
        let decision = {
            let mut state = shared.state.lock().await;
            let decision = state.begin_stop();
            if matches!(decision, StopDecision::CancelStart(_)) {
                cancel_pending_start(shared).await;
            }
            decision
        };

        match decision {
            StopDecision::NothingToStop => {}
            StopDecision::AlreadyStopping => {
                debug!("stop already in progress");
                return Ok(());
            }
            StopDecision::CancelStart(tab_id) => {
                info!("cancelled pending start in tab {tab_id}");
            }
            StopDecision::StopAgent(tab_id) => {
                info!("session: Active -> Stopping (tab {tab_id})");
                let reply = shared.tabs.send(tab_id, Command::StopDetection);
                match tokio::time::timeout(shared.config.health_timeout, reply.settle()).await {
                    Ok(Ok(_)) => {}
                    Ok(Err(err)) => debug!("stop not acknowledged by tab {tab_id}: {err}"),
                    Err(_) => warn!("stop acknowledgement from tab {tab_id} timed out"),
                }
                shared.state.lock().await.finish_stop();
                info!("session: Stopping -> Idle");
            }
        }

        self.persist_detecting(false).await;
        Ok(())
    }

    /// Stops relaying. In-flight requests still complete.
    pub async fn shutdown(&self) {
        self.relay_token.cancel();
        if let Some(handle) = self.relay.lock().await.take() {
            if let Err(err) = handle.await {
                error!("event relay task failed to join: {err}");
            }
        }
    }

    async fn persist_detecting(&self, detecting: bool) {
        persist_detecting(&self.shared, detecting).await;
    }
}

async fn persist_detecting(shared: &Shared, detecting: bool) {
    if let Err(err) = shared.settings.set_detecting(detecting).await {
        error!("failed to persist isDetecting={detecting}: {err}");
    }
}

async fn cancel_pending_start(shared: &Shared) {
    if let Some((session_id, token)) = shared.pending_start.lock().await.take() {
        debug!("cancelling start of session {session_id}");
        token.cancel();
    }
}

async fn event_relay(
    shared: Arc<Shared>,
    mut envelopes: broadcast::Receiver<AgentEnvelope>,
    mut tab_events: broadcast::Receiver<TabEvent>,
    cancel_token: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            _ = cancel_token.cancelled() => break,
            event = tab_events.recv() => match event {
                Ok(TabEvent::Removed(tab_id)) => on_tab_removed(&shared, tab_id).await,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("coordinator missed {skipped} tab events");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            envelope = envelopes.recv() => match envelope {
                Ok(envelope) => on_agent_event(&shared, envelope).await,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("coordinator missed {skipped} agent events");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }
    debug!("coordinator event relay stopped");
}

async fn on_tab_removed(shared: &Shared, tab_id: TabId) {
    {
        let mut state = shared.state.lock().await;
        if !state.tab_closed(tab_id) {
            return;
        }
        cancel_pending_start(shared).await;
    }
    persist_detecting(shared, false).await;
    info!("target tab {tab_id} closed; session forced to Idle");
}

async fn on_agent_event(shared: &Shared, envelope: AgentEnvelope) {
    let AgentEnvelope { tab_id, event } = envelope;

    if event == DetectionEvent::DetectionStopped {
        let affected = shared.state.lock().await.agent_stopped(tab_id);
        if affected {
            persist_detecting(shared, false).await;
            info!("agent in tab {tab_id} stopped on its own; session Idle");
        }
    }

    if shared.surface_events.publish(event) == 0 {
        trace!("no control surface listening for events from tab {tab_id}");
    }
}
