#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use image::{Rgba, RgbaImage};

use framesentry_lib::analyzer::RemoteAnalyzer;
use framesentry_lib::capture::{AgentDeps, AgentHandle, CaptureAgent, StillImagePage};
use framesentry_lib::coordinator::{Coordinator, CoordinatorConfig};
use framesentry_lib::messaging::{AgentEnvelope, EventBus, TabRegistry};
use framesentry_lib::models::{AnalysisResult, ConfidenceLevel, HealthStatus, SessionStatus, TabId};
use framesentry_lib::settings::{Environment, SettingsStore};
use framesentry_lib::storage::MemoryStore;
use framesentry_lib::surface::ControlSurface;
use framesentry_lib::{DetectionError, DetectionResult};

pub fn fake_result() -> AnalysisResult {
    AnalysisResult {
        fake_probability: 0.82,
        temporal_average: 0.75,
        stability_score: 0.9,
        confidence_level: ConfidenceLevel::Fake,
        frame_count: 12,
    }
}

pub fn video_page() -> StillImagePage {
    StillImagePage::new(RgbaImage::from_pixel(64, 36, Rgba([120, 80, 40, 255])))
}

/// Scriptable stand-in for the analysis backend.
pub struct StubAnalyzer {
    healthy: AtomicBool,
    health_delay: Mutex<Duration>,
    analyze_delay: Mutex<Duration>,
    result: Mutex<AnalysisResult>,
    analyze_failure: Mutex<Option<DetectionError>>,
    reset_fails: AtomicBool,
    pub health_calls: AtomicUsize,
    pub analyze_calls: AtomicUsize,
    pub reset_calls: AtomicUsize,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub last_png_len: AtomicUsize,
}

impl StubAnalyzer {
    pub fn healthy() -> Self {
        Self {
            healthy: AtomicBool::new(true),
            health_delay: Mutex::new(Duration::ZERO),
            analyze_delay: Mutex::new(Duration::ZERO),
            result: Mutex::new(fake_result()),
            analyze_failure: Mutex::new(None),
            reset_fails: AtomicBool::new(false),
            health_calls: AtomicUsize::new(0),
            analyze_calls: AtomicUsize::new(0),
            reset_calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            last_png_len: AtomicUsize::new(0),
        }
    }

    pub fn unreachable() -> Self {
        let stub = Self::healthy();
        stub.healthy.store(false, Ordering::SeqCst);
        stub
    }

    pub fn with_health_delay(self, delay: Duration) -> Self {
        *self.health_delay.lock().unwrap() = delay;
        self
    }

    pub fn with_analyze_delay(self, delay: Duration) -> Self {
        *self.analyze_delay.lock().unwrap() = delay;
        self
    }

    /// Every `/analyze` answers with a non-2xx status.
    pub fn with_analyze_status(self, status: u16, body: &str) -> Self {
        *self.analyze_failure.lock().unwrap() = Some(DetectionError::AnalysisHttp {
            status,
            body: body.to_string(),
        });
        self
    }

    pub fn with_failing_reset(self) -> Self {
        self.reset_fails.store(true, Ordering::SeqCst);
        self
    }
}

#[async_trait]
impl RemoteAnalyzer for StubAnalyzer {
    async fn health(&self, _base_url: &str) -> DetectionResult<HealthStatus> {
        self.health_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.health_delay.lock().unwrap();
        tokio::time::sleep(delay).await;
        if !self.healthy.load(Ordering::SeqCst) {
            return Err(DetectionError::BackendUnreachable("connection refused".into()));
        }
        Ok(HealthStatus {
            status: Some("healthy".into()),
            model_loaded: true,
            device: "cpu".into(),
        })
    }

    async fn analyze(&self, _base_url: &str, png: Vec<u8>) -> DetectionResult<AnalysisResult> {
        self.analyze_calls.fetch_add(1, Ordering::SeqCst);
        self.last_png_len.store(png.len(), Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = *self.analyze_delay.lock().unwrap();
        tokio::time::sleep(delay).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        if let Some(err) = self.analyze_failure.lock().unwrap().clone() {
            return Err(err);
        }
        Ok(self.result.lock().unwrap().clone())
    }

    async fn reset(&self, _base_url: &str) -> DetectionResult<()> {
        self.reset_calls.fetch_add(1, Ordering::SeqCst);
        if self.reset_fails.load(Ordering::SeqCst) {
            return Err(DetectionError::ResetFailed("connection refused".into()));
        }
        Ok(())
    }
}

pub struct Harness {
    pub store: MemoryStore,
    pub settings: SettingsStore,
    pub analyzer: Arc<StubAnalyzer>,
    pub tabs: TabRegistry,
    pub agent_events: EventBus<AgentEnvelope>,
    pub coordinator: Coordinator,
}

impl Harness {
    pub fn new(analyzer: StubAnalyzer) -> Self {
        let store = MemoryStore::new();
        let settings =
            SettingsStore::with_environment(Arc::new(store.clone()), Environment::Local);
        let analyzer = Arc::new(analyzer);
        let tabs = TabRegistry::new();
        let agent_events = EventBus::new();
        let coordinator = Coordinator::start(
            CoordinatorConfig::default(),
            settings.clone(),
            analyzer.clone(),
            tabs.clone(),
            agent_events.clone(),
        );
        Self {
            store,
            settings,
            analyzer,
            tabs,
            agent_events,
            coordinator,
        }
    }

    pub fn install_agent(&self, tab_id: TabId, page: &StillImagePage) -> Option<AgentHandle> {
        CaptureAgent::install(
            tab_id,
            &self.tabs,
            AgentDeps {
                page: Arc::new(page.clone()),
                analyzer: self.analyzer.clone(),
                settings: self.settings.clone(),
                events: self.agent_events.clone(),
            },
        )
    }

    pub async fn open_surface(&self) -> ControlSurface {
        ControlSurface::open(
            self.coordinator.clone(),
            self.settings.clone(),
            self.analyzer.clone(),
            self.tabs.clone(),
        )
        .await
        .unwrap()
    }

    pub async fn status(&self) -> SessionStatus {
        self.coordinator.snapshot().await.status
    }

    /// Polls (in virtual time) until the session reaches `status`.
    pub async fn wait_for_status(&self, status: SessionStatus) {
        tokio::time::timeout(Duration::from_secs(60), async {
            while self.status().await != status {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("session never reached expected status");
    }
}
