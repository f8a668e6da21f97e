use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{error, info};

use crate::config::SessionConfig;
use crate::constants::analysis::{MAX_CONTENT_CHARS, MAX_OUTPUT_TOKENS};
use crate::error::AnalysisError;
use crate::events::AnalysisVerdict;
use crate::llm::{ScoringRequest, ScoringService};

/// Filing identity substituted into the prompt template.
#[derive(Clone, Copy, Debug)]
pub struct PromptSubject<'a> {
    pub company: &'a str,
    pub ticker: &'a str,
    pub form_type: &'a str,
}

#[derive(Clone)]
pub struct AnalysisEngine {
    service: Arc<dyn ScoringService>,
}

impl AnalysisEngine {
    pub fn new(service: Arc<dyn ScoringService>) -> Self {
        Self { service }
    }

    pub async fn analyze(
        &self,
        text: &str,
        subject: PromptSubject<'_>,
        config: &SessionConfig,
    ) -> Result<AnalysisVerdict, AnalysisError> {
        let prompt = build_prompt(&config.analysis_prompt_template, subject, text);
        let request = ScoringRequest {
            model: config.analysis_model.clone(),
            temperature: config.analysis_temperature,
            max_tokens: MAX_OUTPUT_TOKENS,
            prompt,
        };

        info!(
            "🤖 [ANALYSIS] Scoring {} ({}) {} with {}",
            subject.company, subject.ticker, subject.form_type, request.model
        );

        let response = match self.service.complete(&request).await {
            Ok(response) => response,
            Err(source) => {
                error!("Analysis failed for {}: {}", subject.ticker, source);
                return Err(AnalysisError::Service {
                    source,
                    request: request.prompt,
                });
            }
        };

        parse_verdict(request.prompt, response)
    }
}

pub fn build_prompt(template: &str, subject: PromptSubject<'_>, text: &str) -> String {
    let prompt = template
        .replace("{company}", subject.company)
        .replace("{ticker}", subject.ticker)
        .replace("{formType}", subject.form_type);
    let head: String = text.chars().take(MAX_CONTENT_CHARS).collect();
    format!("{prompt}\n\nFILING CONTENT TO ANALYZE:\n{head}...")
}

/// Remove markdown code fences around a JSON reply.
pub fn strip_fences(raw: &str) -> String {
    raw.trim().replace("```json", "").replace("```", "").trim().to_string()
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawVerdict {
    is_alert_worthy: bool,
    confidence_score: Value,
    #[serde(default)]
    alert_highlight: bool,
    #[serde(default)]
    text_to_speak: Option<String>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

pub fn parse_verdict(request: String, response: String) -> Result<AnalysisVerdict, AnalysisError> {
    let raw: RawVerdict = match serde_json::from_str(&strip_fences(&response)) {
        Ok(raw) => raw,
        Err(e) => {
            return Err(AnalysisError::Parse {
                reason: e.to_string(),
                request,
                response,
            })
        }
    };

    let Some(confidence_score) = coerce_confidence(&raw.confidence_score) else {
        return Err(AnalysisError::InvalidConfidence {
            value: raw.confidence_score.to_string(),
            request,
            response,
        });
    };

    Ok(AnalysisVerdict {
        is_alert_worthy: raw.is_alert_worthy,
        confidence_score,
        alert_highlight: raw.alert_highlight,
        text_to_speak: raw.text_to_speak.filter(|t| !t.trim().is_empty()),
        extra: raw.extra,
        raw_request: request,
        raw_response: response,
    })
}

/// Integers pass, floats truncate, integer strings parse; everything else is
/// rejected. The result is clamped to 0-100.
pub fn coerce_confidence(value: &Value) -> Option<u8> {
    let score = match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64))?,
        Value::String(s) => s.trim().parse::<i64>().ok()?,
        _ => return None,
    };
    Some(score.clamp(0, 100) as u8)
}
