pub mod analyzer;
pub mod capture;
pub mod coordinator;
pub mod db;
pub mod error;
pub mod messaging;
pub mod metrics;
pub mod models;
pub mod settings;
pub mod storage;
pub mod surface;
mod utils;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use log::{info, warn};

use analyzer::{HttpAnalyzer, RemoteAnalyzer};
use capture::{AgentDeps, CaptureAgent, StillImagePage};
use coordinator::{Coordinator, CoordinatorConfig};
use db::Database;
use messaging::{EventBus, TabRegistry};
use models::TabInfo;
use settings::SettingsStore;
use storage::KeyValueStore;
use surface::ControlSurface;

pub use error::{CaptureFailure, DetectionError, DetectionResult};
pub use utils::logging::init_logging;

const DEFAULT_RUN_SECS: u64 = 30;
const DEFAULT_TAB_URL: &str = "https://www.youtube.com/watch";

fn env_path(name: &str) -> Option<PathBuf> {
    std::env::var_os(name).map(PathBuf::from)
}

/// Headless session: one tab whose "video" is a still image, driven through
/// the same coordinator, agent and popup the extension uses.
pub async fn run() -> Result<()> {
    init_logging();
    info!("framesentry starting up...");

    let data_dir = env_path("FRAMESENTRY_DATA_DIR")
        .unwrap_or_else(|| std::env::temp_dir().join("framesentry"));
    let run_for = std::env::var("FRAMESENTRY_RUN_SECS")
        .ok()
        .and_then(|value| value.parse().ok())
        .map(Duration::from_secs)
        .unwrap_or(Duration::from_secs(DEFAULT_RUN_SECS));
    let tab_url = std::env::var("FRAMESENTRY_TAB_URL").unwrap_or_else(|_| DEFAULT_TAB_URL.into());

    let database = Database::new(data_dir.join("framesentry.sqlite3"))?;
    let store: Arc<dyn KeyValueStore> = Arc::new(database);
    let settings = SettingsStore::new(store);
    let analyzer: Arc<dyn RemoteAnalyzer> = Arc::new(HttpAnalyzer::new()?);

    let tabs = TabRegistry::new();
    let agent_events = EventBus::new();
    let coordinator = Coordinator::start(
        CoordinatorConfig::default(),
        settings.clone(),
        Arc::clone(&analyzer),
        tabs.clone(),
        agent_events.clone(),
    );

    let page = match env_path("FRAMESENTRY_FRAME") {
        Some(path) => StillImagePage::from_png_file(&path)?,
        None => {
            warn!("FRAMESENTRY_FRAME not set; the page has no video");
            StillImagePage::without_video()
        }
    };
    let tab = TabInfo::new(1, tab_url);
    let agent = CaptureAgent::install(
        tab.id,
        &tabs,
        AgentDeps {
            page: Arc::new(page),
            analyzer: Arc::clone(&analyzer),
            settings: settings.clone(),
            events: agent_events,
        },
    )
    .context("capture agent already installed")?;

    let mut surface =
        ControlSurface::open(coordinator.clone(), settings, Arc::clone(&analyzer), tabs.clone())
            .await?;
    info!("backend: {}", surface.backend_url_input());
    info!("{}", surface.test_backend().await.message);
    info!("{}", surface.test_agent(&tab).await.message);

    if let Err(err) = surface.start(&tab).await {
        warn!("{}", surface.view().alert.clone().unwrap_or_else(|| err.to_string()));
    } else {
        let deadline = tokio::time::sleep(run_for);
        tokio::pin!(deadline);
        loop {
            tokio::select! {
                _ = &mut deadline => break,
                _ = tokio::signal::ctrl_c() => break,
                event = surface.next_event() => {
                    if event.is_none() {
                        break;
                    }
                    let view = surface.view();
                    match &view.results {
                        Some(results) => info!(
                            "{} | confidence {} | temporal {} | stability {} | frames {}",
                            view.status_text,
                            results.confidence,
                            results.temporal_average,
                            results.stability,
                            results.frames_analyzed.unwrap_or(0)
                        ),
                        None => info!("{}: {}", view.status_text, view.last_error.clone().unwrap_or_default()),
                    }
                }
            }
        }
        surface.stop().await?;
    }

    let metrics = agent.metrics().get_snapshot().await;
    info!(
        "ticks: {} ok / {} failed",
        metrics.success_count, metrics.error_count
    );

    tabs.close_tab(tab.id);
    agent.join().await;
    coordinator.shutdown().await;
    info!("framesentry stopped");
    Ok(())
}
