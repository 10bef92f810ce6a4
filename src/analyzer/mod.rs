//! Client side of the remote analysis backend.

mod client;

pub use client::HttpAnalyzer;

use async_trait::async_trait;

use crate::error::DetectionResult;
use crate::models::{AnalysisResult, HealthStatus};

/// The backend contract: `/health`, `/analyze`, `/reset`. `base_url` is passed
/// per call so a settings change takes effect on the next request.
#[async_trait]
pub trait RemoteAnalyzer: Send + Sync {
    async fn health(&self, base_url: &str) -> DetectionResult<HealthStatus>;

    async fn analyze(&self, base_url: &str, png: Vec<u8>) -> DetectionResult<AnalysisResult>;

    async fn reset(&self, base_url: &str) -> DetectionResult<()>;
}
