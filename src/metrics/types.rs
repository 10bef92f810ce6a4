use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Timings of one capture tick. Stages that never ran stay `None`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TickMetrics {
    pub timestamp: DateTime<Utc>,
    pub capture_ms: Option<u64>,
    pub encode_ms: Option<u64>,
    pub png_bytes: Option<usize>,
    pub analyze_ms: Option<u64>,
    pub total_ms: u64,
    pub error: Option<String>,
}

impl TickMetrics {
    pub fn begin(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            capture_ms: None,
            encode_ms: None,
            png_bytes: None,
            analyze_ms: None,
            total_ms: 0,
            error: None,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub recent_ticks: Vec<TickMetrics>,
    pub tick_count: u64,
    pub success_count: u64,
    pub error_count: u64,
}
