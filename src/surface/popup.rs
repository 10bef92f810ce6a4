use std::sync::Arc;

use log::{debug, error, info};
use tokio::sync::broadcast::{self, error::TryRecvError};

use crate::analyzer::RemoteAnalyzer;
use crate::coordinator::Coordinator;
use crate::error::{DetectionError, DetectionResult};
use crate::messaging::{Command, DetectionEvent, TabRegistry};
use crate::models::TabInfo;
use crate::settings::{SettingsStore, BACKEND_TIMEOUT};

use super::view::{Diagnostic, SurfaceView};

/// Text shown when a start attempt fails.
pub fn start_failure_alert(err: &DetectionError) -> String {
    format!(
        "Failed to start detection.\n\n{err}\n\nMake sure:\n1. Backend server is running\n2. Backend URL is correct (check settings)"
    )
}

/// Transient control UI. Its only state is a mirror of `isDetecting`, seeded
/// from storage when it opens, plus whatever events it has rendered since.
pub struct ControlSurface {
    coordinator: Coordinator,
    settings: SettingsStore,
    analyzer: Arc<dyn RemoteAnalyzer>,
    tabs: TabRegistry,
    events: broadcast::Receiver<DetectionEvent>,
    view: SurfaceView,
    backend_url_input: String,
    capture_interval_input: String,
}

impl ControlSurface {
    pub async fn open(
        coordinator: Coordinator,
        settings: SettingsStore,
        analyzer: Arc<dyn RemoteAnalyzer>,
        tabs: TabRegistry,
    ) -> DetectionResult<Self> {
        let events = coordinator.subscribe();

        settings.seed_defaults().await?;
        let current = settings.load().await?;

        let mut view = SurfaceView::default();
        if settings.is_detecting().await? {
            view.set_detecting(true);
            view.results_visible = true;
        }

        Ok(Self {
            coordinator,
            settings,
            analyzer,
            tabs,
            events,
            view,
            backend_url_input: current.backend_url,
            capture_interval_input: current.capture_interval_ms.to_string(),
        })
    }

    pub fn view(&self) -> &SurfaceView {
        &self.view
    }

    pub fn backend_url_input(&self) -> &str {
        &self.backend_url_input
    }

    pub fn capture_interval_input(&self) -> &str {
        &self.capture_interval_input
    }

    pub async fn start(&mut self, tab: &TabInfo) -> DetectionResult<()> {
        info!("Starting detection on tab: {}", tab.id);
        let reply = self.coordinator.request(Command::StartDetection {
            tab_id: Some(tab.id),
            interval: None,
        });

        let outcome = match reply.settle().await {
            Ok(response) if response.success => Ok(()),
            Ok(response) => Err(DetectionError::AgentRejected(
                response.error.unwrap_or_else(|| "Unknown error occurred".into()),
            )),
            Err(err) => Err(err),
        };

        match outcome {
            Ok(()) => {
                self.view.set_detecting(true);
                self.view.results_visible = true;
                self.view.alert = None;
                Ok(())
            }
            Err(err) => {
                error!("Detection failed: {err}");
                self.view.alert = Some(start_failure_alert(&err));
                Err(err)
            }
        }
    }

    pub async fn stop(&mut self) -> DetectionResult<()> {
        let response = self.coordinator.request(Command::StopDetection).settle().await?;
        if response.success {
            self.view.set_detecting(false);
        }
        Ok(())
    }

    pub fn apply_event(&mut self, event: &DetectionEvent) {
        match event {
            DetectionEvent::DetectionResult { data } => self.view.apply_result(data),
            DetectionEvent::DetectionError { error } => {
                error!("Detection error: {error}");
                self.view.apply_error(error);
            }
            DetectionEvent::DetectionStopped => self.view.apply_stopped(),
        }
    }

    /// Applies every event already delivered. Returns how many were applied.
    pub fn drain_events(&mut self) -> usize {
        let mut applied = 0;
        loop {
            match self.events.try_recv() {
                Ok(event) => {
                    self.apply_event(&event);
                    applied += 1;
                }
                Err(TryRecvError::Lagged(skipped)) => {
                    debug!("popup skipped {skipped} stale events");
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
        applied
    }

    /// Waits for the next relayed event and applies it.
    pub async fn next_event(&mut self) -> Option<DetectionEvent> {
        loop {
            match self.events.recv().await {
                Ok(event) => {
                    self.apply_event(&event);
                    return Some(event);
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!("popup skipped {skipped} stale events");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Persists the URL as soon as it is edited.
    pub async fn update_backend_url(&mut self, input: &str) -> DetectionResult<()> {
        let saved = self.settings.set_backend_url(input).await?;
        self.backend_url_input = saved;
        Ok(())
    }

    pub async fn update_capture_interval(&mut self, input: &str) -> DetectionResult<()> {
        let saved = self.settings.set_capture_interval(input).await?;
        self.capture_interval_input = saved.to_string();
        Ok(())
    }

    /// Probes `/health` at the URL currently in the settings field.
    pub async fn test_backend(&mut self) -> Diagnostic {
        let backend_url = self.backend_url_input.clone();
        let probe = tokio::time::timeout(BACKEND_TIMEOUT, self.analyzer.health(&backend_url)).await;

        let diagnostic = match probe {
            Ok(Ok(health)) if !health.is_reported() => {
                Diagnostic::failed("Backend failed: /health answered without a status payload")
            }
            Ok(Ok(health)) => Diagnostic::ok(format!(
                "Backend OK! Model: {}, Device: {}",
                if health.model_loaded { "Loaded" } else { "Not loaded" },
                health.device
            )),
            Ok(Err(err)) => Diagnostic::failed(format!("Backend failed: {err}")),
            Err(_) => Diagnostic::failed(format!(
                "Backend failed: no answer within {}s",
                BACKEND_TIMEOUT.as_secs()
            )),
        };
        self.view.diagnostic = Some(diagnostic.clone());
        diagnostic
    }

    /// Pings the capture agent in `tab` without touching the session.
    pub async fn test_agent(&mut self, tab: &TabInfo) -> Diagnostic {
        let diagnostic = if tab.is_restricted() {
            Diagnostic::failed("Cannot run on chrome:// pages. Go to YouTube or any website.")
        } else {
            let reply = self.tabs.send(tab.id, Command::Ping);
            match tokio::time::timeout(BACKEND_TIMEOUT, reply.settle()).await {
                Ok(Ok(response)) if response.success => {
                    Diagnostic::ok("Content script OK! Ready to detect.")
                }
                _ => Diagnostic::failed("Content script not loaded. Refresh the page and try again."),
            }
        };
        self.view.diagnostic = Some(diagnostic.clone());
        diagnostic
    }
}
