//! In-memory stand-ins for the external services, shared by unit tests.

use async_trait::async_trait;
use futures_util::{stream, StreamExt};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;

use crate::config::SessionConfig;
use crate::error::{ConfigError, FeedError, FetchError, LlmError, QueryError};
use crate::events::{FilingEvent, Notification};
use crate::factory::ServiceProvider;
use crate::feed::{FeedTransport, FilingQuery, FilingSearch, FrameStream, SearchResults};
use crate::fetch::{ContentFetcher, DocumentSource};
use crate::llm::{ScoringRequest, ScoringService, SpeechService};
use crate::services::analysis::AnalysisEngine;
use crate::services::pipeline::EventPipeline;
use crate::services::speech::SpeechDispatcher;

pub const RAW_URL: &str = "https://www.sec.gov/Archives/edgar/data/1/0001.txt";
pub const DETAILS_URL: &str = "https://www.sec.gov/Archives/edgar/data/1/0001-index.htm";

#[derive(Default)]
pub struct FakeDocuments {
    pages: Mutex<HashMap<String, Result<String, u16>>>,
    pub requested: Mutex<Vec<String>>,
}

impl FakeDocuments {
    pub fn with_page(self, url: &str, body: impl Into<String>) -> Self {
        self.pages.lock().unwrap().insert(url.to_string(), Ok(body.into()));
        self
    }

    pub fn with_status(self, url: &str, status: u16) -> Self {
        self.pages.lock().unwrap().insert(url.to_string(), Err(status));
        self
    }

    pub fn calls(&self) -> usize {
        self.requested.lock().unwrap().len()
    }
}

#[async_trait]
impl DocumentSource for FakeDocuments {
    async fn get(&self, url: &str) -> Result<String, FetchError> {
        self.requested.lock().unwrap().push(url.to_string());
        match self.pages.lock().unwrap().get(url) {
            Some(Ok(body)) => Ok(body.clone()),
            Some(Err(status)) => Err(FetchError::Http {
                status: *status,
                url: url.to_string(),
            }),
            None => Err(FetchError::Transport {
                url: url.to_string(),
                reason: "connection refused".to_string(),
            }),
        }
    }
}

/// Scoring service that answers every call with the same reply.
pub struct FakeScorer {
    reply: Option<String>,
    delay: Duration,
    pub requests: Mutex<Vec<ScoringRequest>>,
}

impl FakeScorer {
    pub fn replying(reply: impl Into<String>) -> Self {
        Self {
            reply: Some(reply.into()),
            delay: Duration::ZERO,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: None,
            delay: Duration::ZERO,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn verdict(worthy: bool, score: u8, highlight: bool, speak: &str) -> Self {
        Self::replying(format!(
            r#"{{"isAlertWorthy":{worthy},"confidenceScore":{score},"alertHighlight":{highlight},"textToSpeak":"{speak}"}}"#
        ))
    }

    /// Each call is recorded immediately, then answered after `delay`.
    pub fn slow(self, delay: Duration) -> Self {
        Self { delay, ..self }
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl ScoringService for FakeScorer {
    async fn complete(&self, request: &ScoringRequest) -> Result<String, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.reply.clone().ok_or(LlmError::EmptyResponse)
    }
}

pub struct FakeSpeech {
    fail: bool,
    pub texts: Mutex<Vec<String>>,
}

impl FakeSpeech {
    pub fn ok() -> Self {
        Self {
            fail: false,
            texts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            texts: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.texts.lock().unwrap().len()
    }
}

#[async_trait]
impl SpeechService for FakeSpeech {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, LlmError> {
        self.texts.lock().unwrap().push(text.to_string());
        if self.fail {
            Err(LlmError::EmptyResponse)
        } else {
            Ok(b"ID3-fake-mp3".to_vec())
        }
    }
}

/// How one fake connection behaves.
pub enum Connection {
    /// Deliver frames, then the remote closes.
    Closes(Vec<String>),
    /// Deliver frames, then stay open.
    Holds(Vec<String>),
    Refused,
}

#[derive(Default)]
pub struct FakeTransport {
    script: Mutex<VecDeque<Connection>>,
    pub connects: AtomicUsize,
}

impl FakeTransport {
    /// Once the script runs out, further connections stay open and silent.
    pub fn scripted(script: Vec<Connection>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            connects: AtomicUsize::new(0),
        }
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FeedTransport for FakeTransport {
    async fn connect(&self) -> Result<FrameStream, FeedError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Connection::Closes(frames)) => Ok(stream::iter(frames.into_iter().map(Ok)).boxed()),
            Some(Connection::Holds(frames)) => Ok(stream::iter(frames.into_iter().map(Ok))
                .chain(stream::pending())
                .boxed()),
            Some(Connection::Refused) => Err(FeedError::Connection("refused".to_string())),
            None => Ok(stream::pending().boxed()),
        }
    }

    fn describe(&self) -> String {
        "fake://feed".to_string()
    }
}

#[derive(Default)]
pub struct FakeQuery {
    pub results: Mutex<Option<Vec<FilingEvent>>>,
    pub searches: Mutex<Vec<FilingSearch>>,
}

impl FakeQuery {
    pub fn returning(filings: Vec<FilingEvent>) -> Self {
        Self {
            results: Mutex::new(Some(filings)),
            searches: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FilingQuery for FakeQuery {
    async fn search(&self, search: &FilingSearch) -> Result<SearchResults, QueryError> {
        self.searches.lock().unwrap().push(search.clone());
        match self.results.lock().unwrap().clone() {
            Some(filings) => {
                let total = filings.len() as u64;
                Ok(SearchResults {
                    filings,
                    total: crate::feed::query::SearchTotal { value: total },
                })
            }
            None => Err(QueryError::Http {
                status: 401,
                body: "unauthorized".to_string(),
            }),
        }
    }
}

pub struct Fakes {
    pub documents: Arc<FakeDocuments>,
    pub scorer: Arc<FakeScorer>,
    pub speech: Arc<FakeSpeech>,
}

impl Fakes {
    pub fn new(documents: FakeDocuments, scorer: FakeScorer, speech: FakeSpeech) -> Self {
        Self {
            documents: Arc::new(documents),
            scorer: Arc::new(scorer),
            speech: Arc::new(speech),
        }
    }

    pub fn pipeline(&self) -> EventPipeline {
        EventPipeline::new(
            ContentFetcher::new(self.documents.clone()),
            AnalysisEngine::new(self.scorer.clone()),
            SpeechDispatcher::new(self.speech.clone()),
        )
    }
}

/// Provider handing out fakes; `feed_key` false simulates a missing credential.
pub struct FakeServices {
    pub fakes: Fakes,
    pub transport: Arc<FakeTransport>,
    pub query: Arc<FakeQuery>,
    pub has_keys: bool,
}

impl ServiceProvider for FakeServices {
    fn pipeline(&self, _session: &SessionConfig) -> Result<EventPipeline, ConfigError> {
        if !self.has_keys {
            return Err(ConfigError::MissingCredential("OPENAI_API_KEY"));
        }
        Ok(self.fakes.pipeline())
    }

    fn feed(&self, _session: &SessionConfig) -> Result<Arc<dyn FeedTransport>, ConfigError> {
        if !self.has_keys {
            return Err(ConfigError::MissingCredential("SEC_API_KEY"));
        }
        Ok(self.transport.clone())
    }

    fn query(&self, _session: &SessionConfig) -> Result<Arc<dyn FilingQuery>, ConfigError> {
        if !self.has_keys {
            return Err(ConfigError::MissingCredential("SEC_API_KEY"));
        }
        Ok(self.query.clone())
    }

    fn stream_url(&self) -> String {
        "fake://feed".to_string()
    }

    fn credentials_available(&self, _session: &SessionConfig) -> (bool, bool) {
        (self.has_keys, self.has_keys)
    }
}

pub fn filing(ticker: &str, form_type: &str) -> FilingEvent {
    FilingEvent {
        ticker: ticker.to_string(),
        company_name: format!("{ticker} Inc"),
        form_type: form_type.to_string(),
        filed_at: "2024-01-01T00:00:00Z".to_string(),
        link_to_raw_document: RAW_URL.to_string(),
        link_to_filing_details: DETAILS_URL.to_string(),
    }
}

pub fn frame(events: &[FilingEvent]) -> String {
    serde_json::to_string(events).unwrap()
}

/// Plain text long enough to pass the content gate.
pub fn long_text(chars: usize) -> String {
    "NAV per share rose sharply. ".chars().cycle().take(chars).collect()
}

pub fn session_config(filters: &[&str], threshold: u8) -> SessionConfig {
    SessionConfig {
        form_type_filters: filters.iter().map(|s| s.to_string()).collect(),
        confidence_threshold: threshold,
        ..SessionConfig::default()
    }
}

pub fn drain(rx: &mut broadcast::Receiver<Notification>) -> Vec<Notification> {
    let mut out = Vec::new();
    while let Ok(n) = rx.try_recv() {
        out.push(n);
    }
    out
}

pub fn count_alerts(notifications: &[Notification]) -> usize {
    notifications
        .iter()
        .filter(|n| matches!(n, Notification::NewAlert(_)))
        .count()
}

/// Poll `check` until it holds or ~2s pass.
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
