use serde::Serialize;

use crate::models::{AnalysisResult, ConfidenceLevel};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum StatusDot {
    Idle,
    Analyzing,
    Active,
    Alert,
}

impl StatusDot {
    pub fn css_class(&self) -> &'static str {
        match self {
            StatusDot::Idle => "status-dot",
            StatusDot::Analyzing => "status-dot analyzing",
            StatusDot::Active => "status-dot active",
            StatusDot::Alert => "status-dot alert",
        }
    }
}

fn percent_text(score: f64) -> String {
    format!("{:.1}%", score * 100.0)
}

/// CSS width for a progress bar; whole numbers drop the decimal ("75%").
fn bar_width(score: f64) -> String {
    let fixed = format!("{:.1}", score * 100.0);
    let trimmed = fixed.strip_suffix(".0").unwrap_or(&fixed);
    format!("{trimmed}%")
}

/// Rendered text of one analysis result.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultsView {
    pub classification: String,
    pub classification_class: String,
    pub confidence: String,
    pub temporal_average: String,
    pub temporal_bar_width: String,
    pub stability: String,
    pub stability_bar_width: String,
    pub frames_analyzed: Option<u64>,
}

impl ResultsView {
    /// `previous_frames` is kept when the backend reports a zero frame count.
    pub fn render(result: &AnalysisResult, previous_frames: Option<u64>) -> Self {
        let classification = result.confidence_level.as_str().to_string();
        let classification_class = format!(
            "result-value {}",
            classification.to_lowercase().replacen('_', "-", 1)
        );
        let frames_analyzed = if result.frame_count > 0 {
            Some(result.frame_count)
        } else {
            previous_frames
        };

        Self {
            classification,
            classification_class,
            confidence: percent_text(result.fake_probability),
            temporal_average: percent_text(result.temporal_average),
            temporal_bar_width: bar_width(result.temporal_average),
            stability: percent_text(result.stability_score),
            stability_bar_width: bar_width(result.stability_score),
            frames_analyzed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DiagnosticStatus {
    Ok,
    Failed,
}

/// Outcome of one of the popup's connection tests. Informational only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub status: DiagnosticStatus,
    pub message: String,
}

impl Diagnostic {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            status: DiagnosticStatus::Ok,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: DiagnosticStatus::Failed,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SurfaceView {
    pub is_detecting: bool,
    pub start_enabled: bool,
    pub stop_enabled: bool,
    pub status_dot: StatusDot,
    pub status_text: String,
    pub results_visible: bool,
    pub results: Option<ResultsView>,
    pub last_error: Option<String>,
    pub alert: Option<String>,
    pub diagnostic: Option<Diagnostic>,
}

impl Default for SurfaceView {
    fn default() -> Self {
        let mut view = Self {
            is_detecting: false,
            start_enabled: true,
            stop_enabled: false,
            status_dot: StatusDot::Idle,
            status_text: String::new(),
            results_visible: false,
            results: None,
            last_error: None,
            alert: None,
            diagnostic: None,
        };
        view.set_detecting(false);
        view
    }
}

impl SurfaceView {
    pub fn set_detecting(&mut self, detecting: bool) {
        self.is_detecting = detecting;
        self.start_enabled = !detecting;
        self.stop_enabled = detecting;
        if detecting {
            self.status_dot = StatusDot::Analyzing;
            self.status_text = "Analyzing...".into();
        } else {
            self.status_dot = StatusDot::Idle;
            self.status_text = "Inactive".into();
        }
    }

    pub fn apply_result(&mut self, result: &AnalysisResult) {
        let previous_frames = self.results.as_ref().and_then(|r| r.frames_analyzed);
        self.results = Some(ResultsView::render(result, previous_frames));
        self.results_visible = true;

        let level: ConfidenceLevel = result.confidence_level;
        if level.is_fake() {
            self.status_dot = StatusDot::Alert;
            self.status_text = "🔴 Deepfake Detected!".into();
        } else if level.is_real() {
            self.status_dot = StatusDot::Active;
            self.status_text = "🟢 Authentic Video".into();
        } else {
            self.status_dot = StatusDot::Analyzing;
            self.status_text = "🟡 Analyzing...".into();
        }
    }

    pub fn apply_error(&mut self, message: &str) {
        self.status_dot = StatusDot::Alert;
        self.status_text = "Error".into();
        self.last_error = Some(message.to_string());
    }

    pub fn apply_stopped(&mut self) {
        self.set_detecting(false);
    }
}
