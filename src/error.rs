//! Error types for the filing pipeline
//!
//! Transport and parse failures are recovered inside the pipeline; only
//! configuration errors travel back to the request that caused them.

use serde::Serialize;
use thiserror::Error;

/// Document fetch failures
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP {status} fetching {url}")]
    Http { status: u16, url: String },

    #[error("Transport error fetching {url}: {reason}")]
    Transport { url: String, reason: String },

    #[error("Invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
}

impl FetchError {
    pub fn from_reqwest(url: &str, err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => FetchError::Http {
                status: status.as_u16(),
                url: url.to_string(),
            },
            None => FetchError::Transport {
                url: url.to_string(),
                reason: err.to_string(),
            },
        }
    }
}

/// Failures talking to the OpenAI-compatible service
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("OpenAI API error: {0}")]
    Api(#[from] async_openai::error::OpenAIError),

    #[error("Empty response from model")]
    EmptyResponse,
}

/// Raw request/response pair attached to analysis diagnostics
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct AnalysisDetails {
    pub request: String,
    pub response: String,
}

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Scoring service call failed: {source}")]
    Service {
        #[source]
        source: LlmError,
        request: String,
    },

    #[error("Malformed verdict: {reason}")]
    Parse {
        reason: String,
        request: String,
        response: String,
    },

    #[error("Non-numeric confidence score: {value}")]
    InvalidConfidence {
        value: String,
        request: String,
        response: String,
    },
}

impl AnalysisError {
    pub fn details(&self) -> AnalysisDetails {
        match self {
            AnalysisError::Service { source, request } => AnalysisDetails {
                request: request.clone(),
                response: source.to_string(),
            },
            AnalysisError::Parse {
                request, response, ..
            }
            | AnalysisError::InvalidConfidence {
                request, response, ..
            } => AnalysisDetails {
                request: request.clone(),
                response: response.clone(),
            },
        }
    }
}

#[derive(Error, Debug)]
pub enum SpeechError {
    #[error("Speech synthesis failed: {0}")]
    Synthesis(#[from] LlmError),

    #[error("Speech service returned no audio")]
    EmptyAudio,
}

/// Upstream feed errors
#[derive(Error, Debug)]
pub enum FeedError {
    #[error("Feed connection failed: {0}")]
    Connection(String),

    #[error("Feed WebSocket error: {0}")]
    WebSocket(String),
}

/// Query API errors
#[derive(Error, Debug)]
pub enum QueryError {
    #[error("Query API HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing credential: {0}")]
    MissingCredential(&'static str),

    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Unknown session: {0}")]
    UnknownSession(uuid::Uuid),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Cannot start replay while live monitoring is active")]
    MonitoringActive,
}
