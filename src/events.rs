use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::AnalysisDetails;

/// One regulatory filing notification as delivered by the feed or query API.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilingEvent {
    #[serde(default = "not_available")]
    pub ticker: String,
    #[serde(default = "unknown_company")]
    pub company_name: String,
    #[serde(default = "not_available")]
    pub form_type: String,
    #[serde(default)]
    pub filed_at: String,
    #[serde(default, rename = "linkToTxt")]
    pub link_to_raw_document: String,
    #[serde(default)]
    pub link_to_filing_details: String,
}

fn not_available() -> String {
    "N/A".to_string()
}

fn unknown_company() -> String {
    "Unknown".to_string()
}

impl FilingEvent {
    pub fn filed_at_timestamp(&self) -> Option<DateTime<FixedOffset>> {
        DateTime::parse_from_rfc3339(&self.filed_at).ok()
    }

    /// Date part of `filedAt`, or "N/A"
    pub fn filed_date(&self) -> &str {
        match self.filed_at.split('T').next() {
            Some(date) if !date.is_empty() => date,
            _ => "N/A",
        }
    }

    pub fn matches_any(&self, prefixes: &[String]) -> bool {
        prefixes.iter().any(|p| self.form_type.starts_with(p.as_str()))
    }
}

/// Parse one raw feed frame. A bare object counts as a batch of one.
pub fn parse_frame(frame: &str) -> Result<Vec<FilingEvent>, serde_json::Error> {
    let value: Value = serde_json::from_str(frame)?;
    match value {
        Value::Array(_) => serde_json::from_value(value),
        other => Ok(vec![serde_json::from_value(other)?]),
    }
}

/// Structured output of the scoring service for one filing.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisVerdict {
    pub is_alert_worthy: bool,
    pub confidence_score: u8,
    pub alert_highlight: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_to_speak: Option<String>,
    /// Anything else the model returned (summary, reasoning, ...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
    #[serde(skip)]
    pub raw_request: String,
    #[serde(skip)]
    pub raw_response: String,
}

impl AnalysisVerdict {
    pub fn passes(&self, threshold: u8) -> bool {
        self.is_alert_worthy && self.confidence_score >= threshold
    }

    pub fn details(&self) -> AnalysisDetails {
        AnalysisDetails {
            request: self.raw_request.clone(),
            response: self.raw_response.clone(),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub filing: FilingEvent,
    pub ai_analysis: AnalysisVerdict,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
    Skipped,
    Analysis,
    Hit,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionStatus {
    Live,
    Error,
    Off,
}

/// Where an event entered the pipeline
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventSource {
    Live,
    Replay,
    Historical,
}

impl EventSource {
    pub fn verb(&self) -> &'static str {
        match self {
            EventSource::Live => "Received",
            EventSource::Replay => "Replaying",
            EventSource::Historical => "Testing",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionCheck {
    pub has_feed_key: bool,
    pub has_analysis_key: bool,
    pub stream_url: String,
}

/// Everything a session can be told, as sent over the subscriber socket.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum Notification {
    LogMessage {
        message: String,
        level: LogLevel,
    },
    AiLogMessage {
        message: String,
        level: LogLevel,
        #[serde(skip_serializing_if = "Option::is_none")]
        details: Option<AnalysisDetails>,
    },
    NewAlert(Box<Alert>),
    UpdateStats {
        processed: u64,
    },
    MonitoringStatus {
        #[serde(rename = "isMonitoring")]
        is_monitoring: bool,
    },
    WsStatus {
        status: ConnectionStatus,
    },
    WsStatusFlash,
    ReplayFinished,
    TestTickerFinished,
    PlayTtsAudio {
        #[serde(rename = "audioB64")]
        audio_b64: String,
    },
    ConnectionCheck(ConnectionCheck),
}
