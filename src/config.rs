use serde::{Deserialize, Deserializer};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::constants;
use crate::error::ConfigError;

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Timings {
    pub reconnect_delay_ms: u64,
    pub fetch_timeout_ms: u64,
    pub replay_startup_delay_ms: u64,
    pub replay_event_delay_ms: u64,
    pub historical_event_delay_ms: u64,
    pub stop_join_timeout_ms: u64,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            reconnect_delay_ms: constants::stream::RECONNECT_DELAY.as_millis() as u64,
            fetch_timeout_ms: constants::fetch::FETCH_TIMEOUT.as_millis() as u64,
            replay_startup_delay_ms: constants::replay::STARTUP_DELAY.as_millis() as u64,
            replay_event_delay_ms: constants::replay::EVENT_DELAY.as_millis() as u64,
            historical_event_delay_ms: constants::replay::HISTORICAL_EVENT_DELAY.as_millis() as u64,
            stop_join_timeout_ms: constants::stream::STOP_JOIN_TIMEOUT.as_millis() as u64,
        }
    }
}

impl Timings {
    /// No waiting anywhere; used by tests and dry runs.
    pub fn immediate() -> Self {
        Self {
            reconnect_delay_ms: 0,
            fetch_timeout_ms: constants::fetch::FETCH_TIMEOUT.as_millis() as u64,
            replay_startup_delay_ms: 0,
            replay_event_delay_ms: 0,
            historical_event_delay_ms: 0,
            stop_join_timeout_ms: constants::stream::STOP_JOIN_TIMEOUT.as_millis() as u64,
        }
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    pub fn replay_startup_delay(&self) -> Duration {
        Duration::from_millis(self.replay_startup_delay_ms)
    }

    pub fn replay_event_delay(&self) -> Duration {
        Duration::from_millis(self.replay_event_delay_ms)
    }

    pub fn historical_event_delay(&self) -> Duration {
        Duration::from_millis(self.historical_event_delay_ms)
    }

    pub fn stop_join_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_join_timeout_ms)
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub bind_addr: String,
    pub stream_url: String,
    pub query_url: String,
    pub frame_log_path: String,
    pub user_agent: String,

    /// Default feed/query credential; sessions may override it.
    pub sec_api_key: Option<String>,
    /// Default analysis/speech credential; sessions may override it.
    pub openai_api_key: Option<String>,
    pub openai_base_url: Option<String>,

    pub timings: Timings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:5001".to_string(),
            stream_url: constants::stream::DEFAULT_STREAM_URL.to_string(),
            query_url: constants::replay::DEFAULT_QUERY_URL.to_string(),
            frame_log_path: constants::stream::DEFAULT_FRAME_LOG.to_string(),
            user_agent: constants::fetch::USER_AGENT.to_string(),
            sec_api_key: None,
            openai_api_key: None,
            openai_base_url: None,
            timings: Timings::default(),
        }
    }
}

impl AppConfig {
    /// Load `path` if it exists (defaults otherwise), then apply environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let config = if path.exists() {
            let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
                path: path.display().to_string(),
                source,
            })?;
            Self::from_yaml_str(&content)?
        } else {
            Self::default()
        };
        Ok(config.with_env_overrides())
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        // Strip BOM if present
        let content = content.strip_prefix('\u{feff}').unwrap_or(content);
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    fn with_env_overrides(mut self) -> Self {
        if let Some(key) = non_empty_env("SEC_API_KEY") {
            self.sec_api_key = Some(key);
        }
        if let Some(key) = non_empty_env("OPENAI_API_KEY") {
            self.openai_api_key = Some(key);
        }
        if let Some(url) = non_empty_env("OPENAI_BASE_URL") {
            self.openai_base_url = Some(url);
        }
        if let Some(addr) = non_empty_env("NAV_HUNTER_BIND") {
            self.bind_addr = addr;
        }
        self
    }

    pub fn feed_key(&self, session: &SessionConfig) -> Result<String, ConfigError> {
        session
            .sec_api_key
            .clone()
            .or_else(|| self.sec_api_key.clone())
            .ok_or(ConfigError::MissingCredential("SEC_API_KEY"))
    }

    pub fn analysis_key(&self, session: &SessionConfig) -> Result<String, ConfigError> {
        session
            .openai_api_key
            .clone()
            .or_else(|| self.openai_api_key.clone())
            .ok_or(ConfigError::MissingCredential("OPENAI_API_KEY"))
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Per-session settings, sent by the subscriber with every start/replay/test
/// request and replaced wholesale each time.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
    #[serde(rename = "formTypes", default = "default_form_types")]
    pub form_type_filters: Vec<String>,
    #[serde(
        rename = "confidence",
        default = "default_threshold",
        deserialize_with = "threshold_from_any"
    )]
    pub confidence_threshold: u8,
    #[serde(rename = "aiModel", default = "default_model")]
    pub analysis_model: String,
    #[serde(
        rename = "aiTemperature",
        default = "default_temperature",
        deserialize_with = "temperature_from_any"
    )]
    pub analysis_temperature: f32,
    #[serde(rename = "aiPrompt", default = "default_prompt")]
    pub analysis_prompt_template: String,
    #[serde(default, deserialize_with = "credential")]
    pub sec_api_key: Option<String>,
    #[serde(default, deserialize_with = "credential")]
    pub openai_api_key: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            form_type_filters: default_form_types(),
            confidence_threshold: default_threshold(),
            analysis_model: default_model(),
            analysis_temperature: default_temperature(),
            analysis_prompt_template: default_prompt(),
            sec_api_key: None,
            openai_api_key: None,
        }
    }
}

fn default_form_types() -> Vec<String> {
    constants::session::DEFAULT_FORM_TYPES
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_threshold() -> u8 {
    constants::analysis::DEFAULT_CONFIDENCE_THRESHOLD
}

fn default_model() -> String {
    constants::analysis::DEFAULT_MODEL.to_string()
}

fn default_temperature() -> f32 {
    constants::analysis::DEFAULT_TEMPERATURE
}

fn default_prompt() -> String {
    constants::analysis::DEFAULT_PROMPT.to_string()
}

/// UI form fields arrive as either JSON numbers or strings.
#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(f64),
    Text(String),
}

fn threshold_from_any<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let value = match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(n) => n,
        NumberOrString::Text(s) => s.trim().parse::<f64>().map_err(serde::de::Error::custom)?,
    };
    if !(0.0..=100.0).contains(&value) {
        return Err(serde::de::Error::custom(format!(
            "confidence must be within 0-100, got {value}"
        )));
    }
    Ok(value.trunc() as u8)
}

fn temperature_from_any<'de, D>(deserializer: D) -> Result<f32, D::Error>
where
    D: Deserializer<'de>,
{
    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(n) => Ok(n as f32),
        NumberOrString::Text(s) => s.trim().parse::<f32>().map_err(serde::de::Error::custom),
    }
}

fn credential<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value.filter(|v| !v.trim().is_empty()))
}
