use std::sync::Arc;
use std::time::Duration;

use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{DetectionError, DetectionResult};
use crate::storage::KeyValueStore;

pub const BACKEND_URL_KEY: &str = "backendUrl";
pub const CAPTURE_INTERVAL_KEY: &str = "captureInterval";
pub const IS_DETECTING_KEY: &str = "isDetecting";

pub const PRODUCTION_URL: &str = "https://deepfake-backend-kpu7yogeia-uc.a.run.app";
pub const LOCAL_URL: &str = "http://localhost:5000";
pub const DEFAULT_CAPTURE_INTERVAL_MS: u64 = 1000;

/// Upper bound for every backend call, sized to absorb a cold start.
pub const BACKEND_TIMEOUT: Duration = Duration::from_secs(30);

const ENVIRONMENT_VAR: &str = "FRAMESENTRY_ENV";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Production,
    Local,
}

impl Environment {
    pub fn from_env() -> Self {
        std::env::var(ENVIRONMENT_VAR)
            .map(|value| Self::parse(&value))
            .unwrap_or(Environment::Production)
    }

    fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("local") {
            Environment::Local
        } else {
            Environment::Production
        }
    }

    pub fn backend_url(&self) -> &'static str {
        match self {
            Environment::Production => PRODUCTION_URL,
            Environment::Local => LOCAL_URL,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub backend_url: String,
    pub capture_interval_ms: u64,
}

impl Settings {
    pub fn defaults(environment: Environment) -> Self {
        Self {
            backend_url: environment.backend_url().to_string(),
            capture_interval_ms: DEFAULT_CAPTURE_INTERVAL_MS,
        }
    }
}

/// Joins an endpoint path onto the backend URL without doubling slashes.
pub fn endpoint(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Non-positive or missing intervals fall back to the default.
pub fn normalize_interval_ms(raw: Option<i64>) -> u64 {
    match raw {
        Some(value) if value > 0 => value as u64,
        _ => DEFAULT_CAPTURE_INTERVAL_MS,
    }
}

/// Reads the leading integer of user input, ignoring trailing garbage ("250ms" -> 250).
pub fn parse_interval_input(input: &str) -> DetectionResult<u64> {
    let trimmed = input.trim();
    let (sign, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let prefix: String = digits.chars().take_while(|c| c.is_ascii_digit()).collect();
    let value: i64 = prefix
        .parse()
        .map_err(|_| DetectionError::InvalidSetting(format!("'{input}' is not a number")))?;
    let value = sign * value;
    if value <= 0 {
        return Err(DetectionError::InvalidSetting(format!(
            "capture interval must be positive, got {value}"
        )));
    }
    Ok(value as u64)
}

pub fn validate_backend_url(input: &str) -> DetectionResult<String> {
    let trimmed = input.trim();
    let url = Url::parse(trimmed)
        .map_err(|err| DetectionError::InvalidSetting(format!("'{trimmed}': {err}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(DetectionError::InvalidSetting(format!(
            "'{trimmed}' must use http or https"
        )));
    }
    Ok(trimmed.trim_end_matches('/').to_string())
}

/// Typed access to the persisted keys. Clones share the underlying store.
#[derive(Clone)]
pub struct SettingsStore {
    store: Arc<dyn KeyValueStore>,
    environment: Environment,
}

impl SettingsStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_environment(store, Environment::from_env())
    }

    pub fn with_environment(store: Arc<dyn KeyValueStore>, environment: Environment) -> Self {
        Self { store, environment }
    }

    pub async fn load(&self) -> DetectionResult<Settings> {
        let defaults = Settings::defaults(self.environment);

        let backend_url = match self.store.get(BACKEND_URL_KEY).await? {
            Some(Value::String(url)) if !url.trim().is_empty() => url,
            _ => defaults.backend_url,
        };
        let capture_interval_ms =
            normalize_interval_ms(self.store.get(CAPTURE_INTERVAL_KEY).await?.and_then(|v| v.as_i64()));

        Ok(Settings {
            backend_url,
            capture_interval_ms,
        })
    }

    /// Writes defaults for any key that is absent. Existing values are untouched.
    pub async fn seed_defaults(&self) -> DetectionResult<()> {
        let defaults = Settings::defaults(self.environment);
        if self.store.get(BACKEND_URL_KEY).await?.is_none() {
            self.store
                .set(BACKEND_URL_KEY, json!(defaults.backend_url))
                .await?;
        }
        if self.store.get(CAPTURE_INTERVAL_KEY).await?.is_none() {
            self.store
                .set(CAPTURE_INTERVAL_KEY, json!(defaults.capture_interval_ms))
                .await?;
        }
        Ok(())
    }

    pub async fn set_backend_url(&self, input: &str) -> DetectionResult<String> {
        let url = validate_backend_url(input)?;
        self.store.set(BACKEND_URL_KEY, json!(url)).await?;
        Ok(url)
    }

    pub async fn set_capture_interval(&self, input: &str) -> DetectionResult<u64> {
        let interval = parse_interval_input(input)?;
        self.store.set(CAPTURE_INTERVAL_KEY, json!(interval)).await?;
        Ok(interval)
    }

    pub async fn is_detecting(&self) -> DetectionResult<bool> {
        Ok(self
            .store
            .get(IS_DETECTING_KEY)
            .await?
            .and_then(|v| v.as_bool())
            .unwrap_or(false))
    }

    pub async fn set_detecting(&self, detecting: bool) -> DetectionResult<()> {
        self.store.set(IS_DETECTING_KEY, json!(detecting)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn store() -> (MemoryStore, SettingsStore) {
        let memory = MemoryStore::new();
        let settings = SettingsStore::with_environment(Arc::new(memory.clone()), Environment::Production);
        (memory, settings)
    }

    #[tokio::test]
    async fn defaults_apply_when_absent() {
        let (_, settings) = store();
        let loaded = settings.load().await.unwrap();
        assert_eq!(loaded.backend_url, PRODUCTION_URL);
        assert_eq!(loaded.capture_interval_ms, 1000);
        assert!(!settings.is_detecting().await.unwrap());
    }

    #[tokio::test]
    async fn non_positive_interval_is_clamped() {
        let (memory, settings) = store();
        memory.set(CAPTURE_INTERVAL_KEY, json!(-5)).await.unwrap();
        assert_eq!(settings.load().await.unwrap().capture_interval_ms, 1000);
        memory.set(CAPTURE_INTERVAL_KEY, json!("fast")).await.unwrap();
        assert_eq!(settings.load().await.unwrap().capture_interval_ms, 1000);
    }

    #[tokio::test]
    async fn seeding_keeps_existing_values() {
        let (memory, settings) = store();
        memory.set(CAPTURE_INTERVAL_KEY, json!(500)).await.unwrap();
        settings.seed_defaults().await.unwrap();

        assert_eq!(memory.get(CAPTURE_INTERVAL_KEY).await.unwrap(), Some(json!(500)));
        assert_eq!(
            memory.get(BACKEND_URL_KEY).await.unwrap(),
            Some(json!(PRODUCTION_URL))
        );
    }

    #[tokio::test]
    async fn backend_url_must_be_absolute() {
        let (_, settings) = store();
        assert!(matches!(
            settings.set_backend_url("localhost:5000/api").await,
            Err(DetectionError::InvalidSetting(_))
        ));
        let saved = settings.set_backend_url("http://localhost:5000/").await.unwrap();
        assert_eq!(saved, LOCAL_URL);
        assert_eq!(settings.load().await.unwrap().backend_url, LOCAL_URL);
    }

    #[test]
    fn interval_input_uses_leading_integer() {
        assert_eq!(parse_interval_input("250ms").unwrap(), 250);
        assert_eq!(parse_interval_input(" 2000 ").unwrap(), 2000);
        assert!(parse_interval_input("0").is_err());
        assert!(parse_interval_input("-10").is_err());
        assert!(parse_interval_input("abc").is_err());
    }

    #[test]
    fn endpoint_joins_cleanly() {
        assert_eq!(endpoint("http://localhost:5000/", "/health"), "http://localhost:5000/health");
        assert_eq!(endpoint("http://h", "analyze"), "http://h/analyze");
    }

    #[test]
    fn environment_parsing() {
        assert_eq!(Environment::parse("LOCAL"), Environment::Local);
        assert_eq!(Environment::parse("production"), Environment::Production);
        assert_eq!(Environment::Local.backend_url(), LOCAL_URL);
    }
}
