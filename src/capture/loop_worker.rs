use std::sync::Arc;

use chrono::Utc;
use tokio::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use crate::analyzer::RemoteAnalyzer;
use crate::error::{CaptureFailure, DetectionError, DetectionResult};
use crate::messaging::{AgentEnvelope, DetectionEvent, EventBus};
use crate::metrics::{MetricsCollector, TickMetrics};
use crate::models::{AnalysisResult, TabId};
use crate::settings::SettingsStore;

use super::frame::{encode_png, grab_frame};
use super::overlay::OverlaySlot;
use super::page::{OverlayUpdate, Page};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

/// Upper bound on one capture -> encode -> analyze pass.
pub const TICK_TIMEOUT: Duration = Duration::from_secs(35);

/// Everything a tick needs, cloned into the loop task.
#[derive(Clone)]
pub struct TickContext {
    pub tab_id: TabId,
    pub page: Arc<dyn Page>,
    pub analyzer: Arc<dyn RemoteAnalyzer>,
    pub settings: SettingsStore,
    pub overlay: OverlaySlot,
    pub events: EventBus<AgentEnvelope>,
    pub metrics: MetricsCollector,
}

/// Single-flight capture loop: the next tick is scheduled `interval` after the
/// previous one finished, so ticks never overlap. Cancelling the token aborts
/// both the wait and an in-flight tick.
pub async fn capture_loop(ctx: TickContext, interval: Duration, cancel_token: CancellationToken) {
    log_info!("capture loop started for tab {} every {:?}", ctx.tab_id, interval);

    loop {
        tokio::select! {
            biased;
            _ = cancel_token.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }

        let outcome = tokio::select! {
            biased;
            _ = cancel_token.cancelled() => break,
            outcome = tokio::time::timeout(TICK_TIMEOUT, run_tick(&ctx)) => outcome,
        };

        let event = match outcome {
            Ok(Ok(result)) => {
                ctx.overlay.update(OverlayUpdate::Results(result.clone()));
                DetectionEvent::DetectionResult { data: result }
            }
            Ok(Err(err)) => {
                if err.is_tick_recoverable() {
                    log_warn!("tick failed for tab {}: {}", ctx.tab_id, err);
                } else {
                    log_error!("tick failed for tab {}: {}", ctx.tab_id, err);
                }
                DetectionEvent::DetectionError {
                    error: err.to_string(),
                }
            }
            Err(_) => {
                log_warn!("tick timeout (> {:?}) for tab {}", TICK_TIMEOUT, ctx.tab_id);
                DetectionEvent::DetectionError {
                    error: DetectionError::Timeout("frame analysis".into()).to_string(),
                }
            }
        };

        ctx.events.publish(AgentEnvelope {
            tab_id: ctx.tab_id,
            event,
        });
    }

    log_info!("capture loop for tab {} shutting down", ctx.tab_id);
}

async fn run_tick(ctx: &TickContext) -> DetectionResult<AnalysisResult> {
    let tick_start = Instant::now();
    let mut metrics = TickMetrics::begin(Utc::now());

    let result = perform_tick(ctx, &mut metrics).await;

    metrics.total_ms = tick_start.elapsed().as_millis() as u64;
    if let Err(err) = &result {
        metrics.error = Some(err.to_string());
    }
    ctx.metrics.record_tick(metrics).await;

    result
}

async fn perform_tick(ctx: &TickContext, metrics: &mut TickMetrics) -> DetectionResult<AnalysisResult> {
    let settings = ctx.settings.load().await?;

    let capture_start = Instant::now();
    let frame = grab_frame(ctx.page.as_ref())?;
    metrics.capture_ms = Some(capture_start.elapsed().as_millis() as u64);

    let encode_start = Instant::now();
    let png = tokio::task::spawn_blocking(move || encode_png(&frame))
        .await
        .map_err(|err| CaptureFailure::Render(format!("png worker join failed: {err}")))??;
    metrics.encode_ms = Some(encode_start.elapsed().as_millis() as u64);
    metrics.png_bytes = Some(png.len());

    log_debug!("tab {} frame encoded: {} bytes", ctx.tab_id, png.len());

    let analyze_start = Instant::now();
    let result = ctx.analyzer.analyze(&settings.backend_url, png).await?;
    metrics.analyze_ms = Some(analyze_start.elapsed().as_millis() as u64);

    log_debug!(
        "tab {} analysis: {} p={:.3} frames={}",
        ctx.tab_id,
        result.confidence_level.as_str(),
        result.fake_probability,
        result.frame_count
    );

    Ok(result)
}
