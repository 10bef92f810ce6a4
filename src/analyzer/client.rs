use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::{multipart, Client, StatusCode};

use super::RemoteAnalyzer;
use crate::error::{DetectionError, DetectionResult};
use crate::models::{AnalysisResult, HealthStatus};
use crate::settings::{endpoint, BACKEND_TIMEOUT};

const RESET_TIMEOUT: Duration = Duration::from_secs(5);
const FRAME_FIELD: &str = "frame";
const FRAME_FILE_NAME: &str = "frame.png";

#[derive(Clone)]
pub struct HttpAnalyzer {
    client: Client,
    timeout: Duration,
}

impl HttpAnalyzer {
    pub fn new() -> DetectionResult<Self> {
        Self::with_timeout(BACKEND_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> DetectionResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DetectionError::Transport(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { client, timeout })
    }
}

fn transport_error(what: &str, err: reqwest::Error) -> DetectionError {
    if err.is_timeout() {
        DetectionError::Timeout(what.to_string())
    } else {
        DetectionError::Transport(format!("{what}: {err}"))
    }
}

#[async_trait]
impl RemoteAnalyzer for HttpAnalyzer {
    async fn health(&self, base_url: &str) -> DetectionResult<HealthStatus> {
        let url = endpoint(base_url, "health");
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| DetectionError::BackendUnreachable(e.to_string()))?;

        if resp.status() != StatusCode::OK {
            return Err(DetectionError::BackendUnreachable(format!(
                "health check returned {}",
                resp.status().as_u16()
            )));
        }

        // Any 200 counts as reachable; the payload is informational.
        let body = resp.text().await.unwrap_or_default();
        Ok(serde_json::from_str(&body).unwrap_or_else(|err| {
            debug!("health payload from {url} not understood: {err}");
            HealthStatus::default()
        }))
    }

    async fn analyze(&self, base_url: &str, png: Vec<u8>) -> DetectionResult<AnalysisResult> {
        let url = endpoint(base_url, "analyze");
        debug!("sending {} byte frame to {}", png.len(), url);

        let part = multipart::Part::bytes(png)
            .file_name(FRAME_FILE_NAME)
            .mime_str("image/png")
            .map_err(|e| DetectionError::Transport(format!("Invalid MIME: {e}")))?;
        let form = multipart::Form::new().part(FRAME_FIELD, part);

        let resp = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| transport_error("analysis request", e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(DetectionError::AnalysisHttp {
                status: status.as_u16(),
                body,
            });
        }

        let result: AnalysisResult = resp
            .json()
            .await
            .map_err(|e| DetectionError::InvalidResponse(e.to_string()))?;
        result.validate().map_err(DetectionError::InvalidResponse)?;
        Ok(result)
    }

    async fn reset(&self, base_url: &str) -> DetectionResult<()> {
        let url = endpoint(base_url, "reset");
        self.client
            .post(&url)
            .header("Content-Type", "application/json")
            .timeout(RESET_TIMEOUT.min(self.timeout))
            .send()
            .await
            .map_err(|e| DetectionError::ResetFailed(e.to_string()))?;
        Ok(())
    }
}
