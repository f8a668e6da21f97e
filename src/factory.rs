use reqwest::Client;
use std::sync::Arc;

use crate::config::{AppConfig, SessionConfig};
use crate::error::ConfigError;
use crate::feed::{FeedTransport, FilingQuery, QueryApiClient, WsFeedTransport};
use crate::fetch::{ContentFetcher, DocumentSource, HttpDocumentSource};
use crate::llm::LLMClient;
use crate::services::analysis::AnalysisEngine;
use crate::services::pipeline::EventPipeline;
use crate::services::speech::SpeechDispatcher;

/// Builds per-session collaborators, resolving session credential overrides
/// against the process defaults.
pub trait ServiceProvider: Send + Sync {
    fn pipeline(&self, session: &SessionConfig) -> Result<EventPipeline, ConfigError>;
    fn feed(&self, session: &SessionConfig) -> Result<Arc<dyn FeedTransport>, ConfigError>;
    fn query(&self, session: &SessionConfig) -> Result<Arc<dyn FilingQuery>, ConfigError>;

    fn stream_url(&self) -> String;

    /// (feed key resolvable, analysis key resolvable)
    fn credentials_available(&self, session: &SessionConfig) -> (bool, bool);
}

pub struct LiveServices {
    config: AppConfig,
    documents: Arc<dyn DocumentSource>,
    http: Client,
}

impl LiveServices {
    pub fn new(config: AppConfig) -> Result<Self, reqwest::Error> {
        let documents = HttpDocumentSource::new(&config.user_agent, config.timings.fetch_timeout())?;
        let http = Client::builder()
            .timeout(config.timings.fetch_timeout())
            .build()?;
        Ok(Self {
            config,
            documents: Arc::new(documents),
            http,
        })
    }
}

impl ServiceProvider for LiveServices {
    fn pipeline(&self, session: &SessionConfig) -> Result<EventPipeline, ConfigError> {
        let key = self.config.analysis_key(session)?;
        let llm = Arc::new(LLMClient::new(key, self.config.openai_base_url.clone()));
        Ok(EventPipeline::new(
            ContentFetcher::new(self.documents.clone()),
            AnalysisEngine::new(llm.clone()),
            SpeechDispatcher::new(llm),
        ))
    }

    fn feed(&self, session: &SessionConfig) -> Result<Arc<dyn FeedTransport>, ConfigError> {
        let key = self.config.feed_key(session)?;
        Ok(Arc::new(WsFeedTransport::new(self.config.stream_url.clone(), key)))
    }

    fn query(&self, session: &SessionConfig) -> Result<Arc<dyn FilingQuery>, ConfigError> {
        let key = self.config.feed_key(session)?;
        Ok(Arc::new(QueryApiClient::new(
            self.http.clone(),
            self.config.query_url.clone(),
            key,
        )))
    }

    fn stream_url(&self) -> String {
        self.config.stream_url.clone()
    }

    fn credentials_available(&self, session: &SessionConfig) -> (bool, bool) {
        (
            self.config.feed_key(session).is_ok(),
            self.config.analysis_key(session).is_ok(),
        )
    }
}
