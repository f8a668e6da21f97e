use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::bus::EventBus;
use crate::config::SessionConfig;
use crate::constants::{analysis::MIN_CONTENT_CHARS, fetch::PRESS_RELEASE_SEPARATOR, speech::FALLBACK_TEXT};
use crate::error::SpeechError;
use crate::events::{Alert, EventSource, FilingEvent, LogLevel, Notification};
use crate::fetch::ContentFetcher;
use crate::services::analysis::{AnalysisEngine, PromptSubject};
use crate::services::speech::SpeechDispatcher;

/// What happened to one event.
#[derive(Debug)]
pub enum PipelineOutcome {
    /// Form type outside the session's filters
    Filtered,
    InsufficientContent { chars: usize },
    AnalysisFailed,
    NoHit { score: u8 },
    Alerted {
        speech: Option<JoinHandle<Result<(), SpeechError>>>,
    },
}

impl PipelineOutcome {
    pub fn is_alert(&self) -> bool {
        matches!(self, PipelineOutcome::Alerted { .. })
    }
}

/// filter → fetch/enrich → analyze → alert → speech, for one event at a time.
#[derive(Clone)]
pub struct EventPipeline {
    fetcher: ContentFetcher,
    analyzer: AnalysisEngine,
    speech: SpeechDispatcher,
}

impl EventPipeline {
    pub fn new(fetcher: ContentFetcher, analyzer: AnalysisEngine, speech: SpeechDispatcher) -> Self {
        Self {
            fetcher,
            analyzer,
            speech,
        }
    }

    pub async fn process(
        &self,
        event: &FilingEvent,
        config: &SessionConfig,
        source: EventSource,
        out: &EventBus,
    ) -> PipelineOutcome {
        if !event.matches_any(&config.form_type_filters) {
            out.log(
                LogLevel::Skipped,
                format!(
                    "📬 {} [{} - {}]. Does not match filter, skipping.",
                    source.verb(),
                    event.ticker,
                    event.form_type
                ),
            );
            return PipelineOutcome::Filtered;
        }

        out.log(
            LogLevel::Info,
            format!(
                "📬 {} [{} - {}]. Matches filter, processing...",
                source.verb(),
                event.ticker,
                event.form_type
            ),
        );
        out.publish(Notification::UpdateStats { processed: 1 });

        let content = self.enrich(event, out).await;
        let chars = content.trim().chars().count();
        if chars <= MIN_CONTENT_CHARS {
            out.log(
                LogLevel::Warn,
                format!(
                    "⚠ Skipping analysis - insufficient content for {} ({} chars)",
                    event.ticker, chars
                ),
            );
            return PipelineOutcome::InsufficientContent { chars };
        }

        let subject = PromptSubject {
            company: &event.company_name,
            ticker: &event.ticker,
            form_type: &event.form_type,
        };
        out.ai_log(
            LogLevel::Analysis,
            format!(
                "🤖 Analyzing {} ({}) using {}...",
                event.company_name, event.ticker, config.analysis_model
            ),
            None,
        );

        let verdict = match self.analyzer.analyze(&content, subject, config).await {
            Ok(verdict) => verdict,
            Err(e) => {
                warn!("Analysis failed for {}: {}", event.ticker, e);
                out.ai_log(
                    LogLevel::Error,
                    format!("❌ Analysis failed: {}", e),
                    Some(e.details()),
                );
                return PipelineOutcome::AnalysisFailed;
            }
        };

        out.ai_log(
            LogLevel::Hit,
            format!("📊 Analysis complete: {}% confidence", verdict.confidence_score),
            Some(verdict.details()),
        );

        if !verdict.passes(config.confidence_threshold) {
            out.ai_log(
                LogLevel::Info,
                format!("- No hit: {} ({}%)", event.ticker, verdict.confidence_score),
                None,
            );
            return PipelineOutcome::NoHit {
                score: verdict.confidence_score,
            };
        }

        info!(
            "🚨 Alert: {} {} ({}%)",
            event.ticker, event.form_type, verdict.confidence_score
        );
        let highlight = verdict.alert_highlight;
        let text_to_speak = verdict
            .text_to_speak
            .clone()
            .unwrap_or_else(|| FALLBACK_TEXT.to_string());
        out.publish(Notification::NewAlert(Box::new(Alert {
            filing: event.clone(),
            ai_analysis: verdict,
        })));

        let speech = highlight.then(|| self.speech.dispatch(text_to_speak, out.clone()));
        PipelineOutcome::Alerted { speech }
    }

    /// Filing text plus any linked press release; failures leave that part empty.
    async fn enrich(&self, event: &FilingEvent, out: &EventBus) -> String {
        let mut content = self.fetcher.fetch_and_clean(&event.link_to_raw_document, out).await;
        let press_release = self
            .fetcher
            .find_press_release(&event.link_to_filing_details, out)
            .await;

        if !press_release.is_empty() {
            content.push_str(PRESS_RELEASE_SEPARATOR);
            content.push_str(&press_release);
            out.log(
                LogLevel::Info,
                "🖇️ Combined filing and press release text for AI analysis.",
            );
        }
        content
    }
}
