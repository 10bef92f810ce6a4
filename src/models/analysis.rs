use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfidenceLevel {
    Real,
    Fake,
    HighReal,
    HighFake,
    #[default]
    #[serde(other)]
    Uncertain,
}

impl ConfidenceLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceLevel::Real => "REAL",
            ConfidenceLevel::Fake => "FAKE",
            ConfidenceLevel::HighReal => "HIGH_REAL",
            ConfidenceLevel::HighFake => "HIGH_FAKE",
            ConfidenceLevel::Uncertain => "UNCERTAIN",
        }
    }

    pub fn is_fake(&self) -> bool {
        matches!(self, ConfidenceLevel::Fake | ConfidenceLevel::HighFake)
    }

    pub fn is_real(&self) -> bool {
        matches!(self, ConfidenceLevel::Real | ConfidenceLevel::HighReal)
    }
}

/// One `/analyze` response. Field names follow the backend's JSON.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisResult {
    pub fake_probability: f64,
    pub temporal_average: f64,
    pub stability_score: f64,
    #[serde(default)]
    pub confidence_level: ConfidenceLevel,
    #[serde(default)]
    pub frame_count: u64,
}

impl AnalysisResult {
    /// Checks that every score lies in `[0, 1]`.
    pub fn validate(&self) -> Result<(), String> {
        let scores = [
            ("fake_probability", self.fake_probability),
            ("temporal_average", self.temporal_average),
            ("stability_score", self.stability_score),
        ];
        for (name, value) in scores {
            if !(0.0..=1.0).contains(&value) {
                return Err(format!("{name} out of range: {value}"));
            }
        }
        Ok(())
    }
}

/// `/health` payload. A backend that answers 200 without one reads as the default.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct HealthStatus {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub model_loaded: bool,
    #[serde(default)]
    pub device: String,
}

impl HealthStatus {
    /// Whether the backend described itself at all.
    pub fn is_reported(&self) -> bool {
        *self != HealthStatus::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_backend_payload() {
        let json = r#"{"fake_probability":0.82,"temporal_average":0.75,"stability_score":0.9,"confidence_level":"HIGH_FAKE","frame_count":12}"#;
        let result: AnalysisResult = serde_json::from_str(json).unwrap();
        assert_eq!(result.confidence_level, ConfidenceLevel::HighFake);
        assert_eq!(result.frame_count, 12);
        assert!(result.validate().is_ok());
    }

    #[test]
    fn unknown_confidence_level_is_uncertain() {
        let json = r#"{"fake_probability":0.5,"temporal_average":0.5,"stability_score":0.5,"confidence_level":"MAYBE"}"#;
        let result: AnalysisResult = serde_json::from_str(json).unwrap();
        assert_eq!(result.confidence_level, ConfidenceLevel::Uncertain);
        assert_eq!(result.frame_count, 0);
    }

    #[test]
    fn empty_health_payload_is_unreported() {
        assert!(!HealthStatus::default().is_reported());
        let health: HealthStatus = serde_json::from_str(r#"{"model_loaded":false,"device":"cpu"}"#).unwrap();
        assert!(health.is_reported());
    }

    #[test]
    fn out_of_range_scores_fail_validation() {
        let result = AnalysisResult {
            fake_probability: 1.2,
            temporal_average: 0.1,
            stability_score: 0.1,
            confidence_level: ConfidenceLevel::Fake,
            frame_count: 1,
        };
        assert!(result.validate().unwrap_err().contains("fake_probability"));
    }
}
