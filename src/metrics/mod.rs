mod types;

pub use types::{MetricsSnapshot, TickMetrics};

use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;

const MAX_RECENT_TICKS: usize = 20;

/// Rolling record of recent ticks for one capture agent.
#[derive(Clone, Default)]
pub struct MetricsCollector {
    inner: Arc<Mutex<MetricsState>>,
}

#[derive(Default)]
struct MetricsState {
    recent_ticks: VecDeque<TickMetrics>,
    tick_count: u64,
    success_count: u64,
    error_count: u64,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record_tick(&self, metrics: TickMetrics) {
        let mut state = self.inner.lock().await;

        state.tick_count += 1;
        if metrics.succeeded() {
            state.success_count += 1;
        } else {
            state.error_count += 1;
        }

        state.recent_ticks.push_back(metrics);
        if state.recent_ticks.len() > MAX_RECENT_TICKS {
            state.recent_ticks.pop_front();
        }
    }

    pub async fn get_snapshot(&self) -> MetricsSnapshot {
        let state = self.inner.lock().await;
        MetricsSnapshot {
            recent_ticks: state.recent_ticks.iter().cloned().collect(),
            tick_count: state.tick_count,
            success_count: state.success_count,
            error_count: state.error_count,
        }
    }

    pub async fn reset(&self) {
        let mut state = self.inner.lock().await;
        *state = MetricsState::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn keeps_a_bounded_window() {
        let collector = MetricsCollector::new();
        for i in 0..25 {
            let mut tick = TickMetrics::begin(Utc::now());
            tick.total_ms = i;
            if i % 5 == 0 {
                tick.error = Some("No video found on page".into());
            }
            collector.record_tick(tick).await;
        }

        let snapshot = collector.get_snapshot().await;
        assert_eq!(snapshot.tick_count, 25);
        assert_eq!(snapshot.error_count, 5);
        assert_eq!(snapshot.success_count, 20);
        assert_eq!(snapshot.recent_ticks.len(), MAX_RECENT_TICKS);
        assert_eq!(snapshot.recent_ticks[0].total_ms, 5);

        collector.reset().await;
        assert_eq!(collector.get_snapshot().await.tick_count, 0);
    }
}
