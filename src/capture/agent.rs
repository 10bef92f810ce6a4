use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::Duration;

use crate::analyzer::RemoteAnalyzer;
use crate::error::{DetectionError, DetectionResult};
use crate::messaging::{
    AgentEnvelope, Command, DetectionEvent, EventBus, Response, TabRegistry, TabRequest,
};
use crate::metrics::MetricsCollector;
use crate::models::TabId;
use crate::settings::{normalize_interval_ms, SettingsStore};

use super::controller::CaptureController;
use super::loop_worker::TickContext;
use super::overlay::{Overlay, OverlaySlot};
use super::page::{OverlayUpdate, Page, PageEvent};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

const RESET_TIMEOUT: Duration = Duration::from_secs(5);

/// Collaborators a Capture Agent is wired to when installed in a tab.
#[derive(Clone)]
pub struct AgentDeps {
    pub page: Arc<dyn Page>,
    pub analyzer: Arc<dyn RemoteAnalyzer>,
    pub settings: SettingsStore,
    pub events: EventBus<AgentEnvelope>,
}

/// Handle to an installed agent task.
pub struct AgentHandle {
    tab_id: TabId,
    metrics: MetricsCollector,
    task: JoinHandle<()>,
}

impl AgentHandle {
    pub fn tab_id(&self) -> TabId {
        self.tab_id
    }

    pub fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Waits for the agent to exit, which happens when its tab closes or its page unloads.
    pub async fn join(self) {
        if let Err(err) = self.task.await {
            log::error!("capture agent for tab {} panicked: {err}", self.tab_id);
        }
    }
}

/// In-page component: owns the capture loop and the overlay for one tab.
pub struct CaptureAgent {
    tab_id: TabId,
    deps: AgentDeps,
    overlay: OverlaySlot,
    metrics: MetricsCollector,
    controller: CaptureController,
}

impl CaptureAgent {
    /// Installs the agent's listeners in `tab_id`. Installing twice into a tab
    /// with a live agent is a no-op and returns `None`.
    pub fn install(tab_id: TabId, tabs: &TabRegistry, deps: AgentDeps) -> Option<AgentHandle> {
        let Some(requests) = tabs.register(tab_id) else {
            log_debug!("capture agent already installed in tab {}", tab_id);
            return None;
        };
        let page_events = deps.page.events();

        let agent = CaptureAgent {
            tab_id,
            deps,
            overlay: OverlaySlot::default(),
            metrics: MetricsCollector::new(),
            controller: CaptureController::new(),
        };
        let metrics = agent.metrics.clone();
        let task = tokio::spawn(agent.run(requests, page_events));

        log_info!("capture agent installed in tab {}", tab_id);
        Some(AgentHandle {
            tab_id,
            metrics,
            task,
        })
    }

    async fn run(
        mut self,
        mut requests: mpsc::UnboundedReceiver<TabRequest>,
        mut page_events: broadcast::Receiver<PageEvent>,
    ) {
        loop {
            tokio::select! {
                request = requests.recv() => match request {
                    Some(TabRequest { command, responder }) => {
                        let response = self.handle_command(command).await;
                        responder.resolve(response);
                    }
                    None => {
                        log_info!("tab {} closed, tearing down capture agent", self.tab_id);
                        self.stop_detection().await;
                        break;
                    }
                },
                event = page_events.recv() => match event {
                    Ok(PageEvent::OverlayClose) | Ok(PageEvent::OverlayStop) => {
                        log_info!("overlay in tab {} asked to stop", self.tab_id);
                        self.stop_detection().await;
                    }
                    Ok(PageEvent::BeforeUnload) => {
                        log_info!("page in tab {} unloading", self.tab_id);
                        self.stop_detection().await;
                        break;
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        log_warn!("tab {} dropped {} page events", self.tab_id, skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        self.stop_detection().await;
                        break;
                    }
                },
            }
        }
    }

    async fn handle_command(&mut self, command: Command) -> Response {
        log_debug!("tab {} received {}", self.tab_id, command.name());
        match command {
            Command::Ping => Response::ready(),
            Command::StartDetection { interval, .. } => {
                match self.start_detection(normalize_interval_ms(interval)).await {
                    Ok(()) => Response::ok(),
                    Err(err) => Response::failed(err.to_string()),
                }
            }
            Command::StopDetection => {
                self.stop_detection().await;
                Response::ok()
            }
        }
    }

    /// No-op while already capturing. The overlay is mounted before the loop
    /// is spawned, so no tick can fire without it.
    async fn start_detection(&mut self, interval_ms: u64) -> DetectionResult<()> {
        if self.controller.is_active() {
            log_debug!("tab {} already capturing", self.tab_id);
            return Ok(());
        }
        self.metrics.reset().await;

        if !self.overlay.is_mounted() {
            self.overlay.install(Overlay::mount(self.deps.page.as_ref()));
        }
        self.overlay.update(OverlayUpdate::Analyzing);

        let ctx = TickContext {
            tab_id: self.tab_id,
            page: Arc::clone(&self.deps.page),
            analyzer: Arc::clone(&self.deps.analyzer),
            settings: self.deps.settings.clone(),
            overlay: self.overlay.clone(),
            events: self.deps.events.clone(),
            metrics: self.metrics.clone(),
        };

        if let Err(err) = self
            .controller
            .start(ctx, Duration::from_millis(interval_ms))
        {
            drop(self.overlay.take());
            return Err(DetectionError::AgentRejected(err.to_string()));
        }

        log_info!("tab {} capturing every {}ms", self.tab_id, interval_ms);
        Ok(())
    }

    /// Safe to call at any time; does nothing unless a session is running here.
    async fn stop_detection(&mut self) {
        let was_capturing = match self.controller.stop().await {
            Ok(active) => active,
            Err(err) => {
                log_error!("failed to stop capture loop in tab {}: {err:?}", self.tab_id);
                true
            }
        };
        let overlay = self.overlay.take();
        if !was_capturing && overlay.is_none() {
            return;
        }
        drop(overlay);

        self.reset_backend().await;

        self.deps.events.publish(AgentEnvelope {
            tab_id: self.tab_id,
            event: DetectionEvent::DetectionStopped,
        });
        log_info!("tab {} detection stopped", self.tab_id);
    }

    /// Best effort: clears the backend's rolling state. Failures are only logged.
    async fn reset_backend(&self) {
        let backend_url = match self.deps.settings.load().await {
            Ok(settings) => settings.backend_url,
            Err(err) => {
                log_warn!("Could not reset backend: {err}");
                return;
            }
        };

        match tokio::time::timeout(RESET_TIMEOUT, self.deps.analyzer.reset(&backend_url)).await {
            Ok(Ok(())) => log_info!("Backend detector reset"),
            Ok(Err(err)) => log_warn!("Could not reset backend: {err}"),
            Err(_) => log_warn!("Could not reset backend: timed out after {:?}", RESET_TIMEOUT),
        }
    }
}
