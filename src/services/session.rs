//! Per-subscriber monitoring state.
//!
//! Each session owns its stream handle, its replay/historical tasks and its
//! configuration. Entries are only mutated by requests from the same
//! session, so the map never sees cross-session writes.

use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info};
use uuid::Uuid;

use crate::bus::EventBus;
use crate::config::{SessionConfig, Timings};
use crate::constants::session::OUTPUT_CAPACITY;
use crate::data::FrameLog;
use crate::error::SessionError;
use crate::events::{ConnectionCheck, ConnectionStatus, LogLevel, Notification};
use crate::factory::ServiceProvider;
use crate::services::historical::HistoricalQueryEngine;
use crate::services::replay::ReplayEngine;
use crate::services::stream_client::{StreamClient, StreamHandle, StreamState};

pub type SessionId = Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    AlreadyRunning,
}

pub struct MonitoringSession {
    pub id: SessionId,
    is_monitoring: Arc<AtomicBool>,
    /// Settings of the most recent start/replay/test request
    config: Option<Arc<SessionConfig>>,
    output: EventBus,
    stream: Option<StreamHandle>,
    replay: Option<JoinHandle<()>>,
    historical: Option<JoinHandle<()>>,
}

impl MonitoringSession {
    fn new(id: SessionId) -> Self {
        Self {
            id,
            is_monitoring: Arc::new(AtomicBool::new(false)),
            config: None,
            output: EventBus::new(OUTPUT_CAPACITY),
            stream: None,
            replay: None,
            historical: None,
        }
    }

    fn stream_alive(&self) -> bool {
        self.stream.as_ref().is_some_and(StreamHandle::is_alive)
    }
}

fn task_alive(task: &Option<JoinHandle<()>>) -> bool {
    task.as_ref().is_some_and(|t| !t.is_finished())
}

pub struct SessionRegistry {
    sessions: DashMap<SessionId, MonitoringSession>,
    services: Arc<dyn ServiceProvider>,
    frame_log: FrameLog,
    timings: Timings,
}

impl SessionRegistry {
    pub fn new(services: Arc<dyn ServiceProvider>, frame_log: FrameLog, timings: Timings) -> Self {
        Self {
            sessions: DashMap::new(),
            services,
            frame_log,
            timings,
        }
    }

    /// Register a new subscriber; returns its id and output channel.
    pub fn open_session(&self) -> (SessionId, EventBus) {
        let id = Uuid::new_v4();
        let session = MonitoringSession::new(id);
        let output = session.output.clone();
        self.sessions.insert(id, session);
        info!("Client connected: {}", id);
        (id, output)
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn output(&self, id: SessionId) -> Result<EventBus, SessionError> {
        self.sessions
            .get(&id)
            .map(|s| s.output.clone())
            .ok_or(SessionError::UnknownSession(id))
    }

    pub fn is_monitoring(&self, id: SessionId) -> bool {
        self.sessions
            .get(&id)
            .is_some_and(|s| s.is_monitoring.load(Ordering::SeqCst))
    }

    pub fn stream_state(&self, id: SessionId) -> Option<StreamState> {
        self.sessions
            .get(&id)
            .and_then(|s| s.stream.as_ref().map(StreamHandle::state))
    }

    /// Idempotent: a live stream for this session turns the call into a no-op.
    pub fn start_monitoring(&self, id: SessionId, config: SessionConfig) -> Result<StartOutcome, SessionError> {
        let mut session = self
            .sessions
            .get_mut(&id)
            .ok_or(SessionError::UnknownSession(id))?;

        if session.stream_alive() {
            info!("Session {} already monitoring; start ignored", id);
            return Ok(StartOutcome::AlreadyRunning);
        }

        let out = session.output.clone();
        let (pipeline, transport) = match self
            .services
            .pipeline(&config)
            .and_then(|p| Ok((p, self.services.feed(&config)?)))
        {
            Ok(parts) => parts,
            Err(e) => {
                error!("Start monitoring rejected for {}: {}", id, e);
                out.log(LogLevel::Error, format!("❌ Cannot start monitoring: {}", e));
                return Err(e.into());
            }
        };

        info!("Start monitoring request received from client: {}", id);
        out.log(
            LogLevel::Warn,
            format!(
                "🔴 LIVE MODE: Raw stream data is being saved to {}",
                self.frame_log.path().display()
            ),
        );

        let config = Arc::new(config);
        session.config = Some(config.clone());
        session.is_monitoring.store(true, Ordering::SeqCst);

        let client = StreamClient::new(
            transport,
            pipeline,
            config,
            self.frame_log.clone(),
            out.clone(),
            self.timings.reconnect_delay(),
        );
        session.stream = Some(client.spawn());

        out.publish(Notification::MonitoringStatus { is_monitoring: true });
        Ok(StartOutcome::Started)
    }

    pub async fn stop_monitoring(&self, id: SessionId) -> Result<(), SessionError> {
        let (handle, out) = {
            let mut session = self
                .sessions
                .get_mut(&id)
                .ok_or(SessionError::UnknownSession(id))?;
            if !session.is_monitoring.swap(false, Ordering::SeqCst) && session.stream.is_none() {
                return Ok(());
            }
            (session.stream.take(), session.output.clone())
        };

        info!("Stop monitoring request received from client: {}", id);
        if let Some(handle) = handle {
            handle.stop(self.timings.stop_join_timeout()).await;
        }
        out.publish(Notification::MonitoringStatus { is_monitoring: false });
        Ok(())
    }

    /// Replay the frame log. Refused while this session is live.
    pub fn replay_log(&self, id: SessionId, config: SessionConfig) -> Result<(), SessionError> {
        let mut session = self
            .sessions
            .get_mut(&id)
            .ok_or(SessionError::UnknownSession(id))?;
        let out = session.output.clone();

        if session.is_monitoring.load(Ordering::SeqCst) {
            out.log(
                LogLevel::Error,
                "❌ Cannot start replay while live monitoring is active.",
            );
            return Err(SessionError::MonitoringActive);
        }
        if task_alive(&session.replay) {
            out.log(LogLevel::Warn, "⟳ Replay already running.");
            return Ok(());
        }

        let pipeline = match self.services.pipeline(&config) {
            Ok(pipeline) => pipeline,
            Err(e) => {
                out.log(LogLevel::Error, format!("❌ Cannot start replay: {}", e));
                out.publish(Notification::ReplayFinished);
                return Err(e.into());
            }
        };

        info!("Replay request received from client: {}", id);
        let config = Arc::new(config);
        session.config = Some(config.clone());

        let engine = ReplayEngine::new(
            pipeline,
            self.frame_log.clone(),
            self.timings.replay_startup_delay(),
            self.timings.replay_event_delay(),
        );
        session.replay = Some(tokio::spawn(async move {
            engine.run(&config, &out).await;
        }));
        Ok(())
    }

    pub fn run_historical_test(&self, id: SessionId, ticker: String, config: SessionConfig) -> Result<(), SessionError> {
        let mut session = self
            .sessions
            .get_mut(&id)
            .ok_or(SessionError::UnknownSession(id))?;
        let out = session.output.clone();

        if task_alive(&session.historical) {
            out.log(LogLevel::Warn, "A ticker test is already running.");
            return Ok(());
        }

        let parts = self
            .services
            .pipeline(&config)
            .and_then(|p| Ok((p, self.services.query(&config)?)));
        let (pipeline, query) = match parts {
            Ok(parts) => parts,
            Err(e) => {
                out.log(LogLevel::Error, format!("❌ Ticker Test failed: {}", e));
                out.publish(Notification::TestTickerFinished);
                return Err(e.into());
            }
        };

        info!("--- Starting FULL test for [{}] from client {} ---", ticker, id);
        let config = Arc::new(config);
        session.config = Some(config.clone());

        let engine = HistoricalQueryEngine::new(query, pipeline, self.timings.historical_event_delay());
        session.historical = Some(tokio::spawn(async move {
            engine.run(&ticker, &config, &out).await;
        }));
        Ok(())
    }

    pub fn report_status(&self, id: SessionId) -> Result<(), SessionError> {
        let session = self
            .sessions
            .get(&id)
            .ok_or(SessionError::UnknownSession(id))?;
        let is_monitoring = session.is_monitoring.load(Ordering::SeqCst);
        let status = match session.stream.as_ref().map(StreamHandle::state) {
            Some(StreamState::Connected) => ConnectionStatus::Live,
            _ => ConnectionStatus::Off,
        };
        session.output.publish(Notification::MonitoringStatus { is_monitoring });
        session.output.publish(Notification::WsStatus { status });
        if let Some(config) = &session.config {
            session.output.log(
                LogLevel::Info,
                format!(
                    "Filters: {} | threshold {}% | model {}",
                    config.form_type_filters.join(", "),
                    config.confidence_threshold,
                    config.analysis_model
                ),
            );
        }
        Ok(())
    }

    /// Reports which credentials would resolve, without connecting anywhere.
    pub fn check_connection(&self, id: SessionId, config: &SessionConfig) -> Result<ConnectionCheck, SessionError> {
        let out = self.output(id)?;
        let (has_feed_key, has_analysis_key) = self.services.credentials_available(config);
        let check = ConnectionCheck {
            has_feed_key,
            has_analysis_key,
            stream_url: self.services.stream_url(),
        };

        if has_feed_key {
            out.log(LogLevel::Info, "✅ SEC API key is configured");
        } else {
            out.log(LogLevel::Error, "❌ SEC API key is NOT configured");
        }
        if !has_analysis_key {
            out.log(LogLevel::Error, "❌ OpenAI API key is NOT configured");
        }
        out.publish(Notification::ConnectionCheck(check.clone()));
        Ok(check)
    }

    /// Disconnect: stop streaming and abandon any replay or ticker test.
    pub async fn close_session(&self, id: SessionId) {
        let Some((_, mut session)) = self.sessions.remove(&id) else {
            return;
        };
        info!("Client disconnected: {}", id);

        session.is_monitoring.store(false, Ordering::SeqCst);
        if let Some(task) = session.replay.take() {
            task.abort();
        }
        if let Some(task) = session.historical.take() {
            task.abort();
        }
        if let Some(handle) = session.stream.take() {
            handle.stop(self.timings.stop_join_timeout()).await;
        }
    }
}
