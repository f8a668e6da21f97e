//! Long-lived connection to the filing feed.
//!
//! ```text
//! Disconnected -> Connecting -> Connected -(frame)-> Connected
//!                    ^              |
//!                    |        (error | close)
//!                    |              v
//!                    +---- ReconnectPending ---(stopped)---> Disconnected
//! ```
//!
//! Frames are handled inline by the read loop: every event of a frame goes
//! through the pipeline before the next frame is read. That is the
//! backpressure for the whole source; a slow analysis call holds back
//! everything behind it.

use futures_util::StreamExt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::bus::EventBus;
use crate::config::SessionConfig;
use crate::data::FrameLog;
use crate::events::{parse_frame, ConnectionStatus, EventSource, LogLevel, Notification};
use crate::feed::{FeedTransport, FrameStream};
use crate::services::pipeline::EventPipeline;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamState {
    Disconnected,
    Connecting,
    Connected,
    ReconnectPending,
}

pub struct StreamClient {
    transport: Arc<dyn FeedTransport>,
    pipeline: EventPipeline,
    config: Arc<SessionConfig>,
    frame_log: FrameLog,
    out: EventBus,
    /// Cleared only by this client's own handle
    active: Arc<AtomicBool>,
    reconnect_delay: Duration,
    state_tx: watch::Sender<StreamState>,
}

/// Owning handle to a running [`StreamClient`].
pub struct StreamHandle {
    active: Arc<AtomicBool>,
    shutdown_tx: watch::Sender<bool>,
    state_rx: watch::Receiver<StreamState>,
    out: EventBus,
    task: JoinHandle<()>,
}

impl StreamHandle {
    pub fn is_alive(&self) -> bool {
        !self.task.is_finished()
    }

    pub fn state(&self) -> StreamState {
        *self.state_rx.borrow()
    }

    /// Close the transport and suppress reconnects. An event already taken
    /// off the stream finishes processing first, bounded by `join_timeout`;
    /// past that the task is detached but publishes nothing further except
    /// that event's own pipeline output.
    pub async fn stop(self, join_timeout: Duration) {
        self.active.store(false, Ordering::SeqCst);
        self.shutdown_tx.send(true).ok();
        self.out.publish(Notification::WsStatus {
            status: ConnectionStatus::Off,
        });

        let mut task = self.task;
        if tokio::time::timeout(join_timeout, &mut task).await.is_err() {
            warn!("Stream task still busy after {:?}; detaching", join_timeout);
        }
    }
}

impl StreamClient {
    pub fn new(
        transport: Arc<dyn FeedTransport>,
        pipeline: EventPipeline,
        config: Arc<SessionConfig>,
        frame_log: FrameLog,
        out: EventBus,
        reconnect_delay: Duration,
    ) -> Self {
        let (state_tx, _) = watch::channel(StreamState::Disconnected);
        Self {
            transport,
            pipeline,
            config,
            frame_log,
            out,
            active: Arc::new(AtomicBool::new(true)),
            reconnect_delay,
            state_tx,
        }
    }

    pub fn spawn(self) -> StreamHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let state_rx = self.state_tx.subscribe();
        let active = self.active.clone();
        let out = self.out.clone();
        let task = tokio::spawn(self.run(shutdown_rx));
        StreamHandle {
            active,
            shutdown_tx,
            state_rx,
            out,
            task,
        }
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    fn enter(&self, state: StreamState) {
        self.state_tx.send_replace(state);
    }

    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!("Starting filing stream task ({})", self.transport.describe());
        let mut state = StreamState::Connecting;

        loop {
            self.enter(state);
            state = match state {
                StreamState::Connecting => {
                    if !self.is_active() {
                        StreamState::Disconnected
                    } else {
                        self.connect_and_read(&mut shutdown).await
                    }
                }
                StreamState::ReconnectPending => {
                    if !self.is_active() || *shutdown.borrow() {
                        StreamState::Disconnected
                    } else {
                        self.out.publish(Notification::WsStatus {
                            status: ConnectionStatus::Off,
                        });
                        self.out.log(LogLevel::Warn, "🔌 Attempting to reconnect...");
                        tokio::select! {
                            _ = tokio::time::sleep(self.reconnect_delay) => {
                                if self.is_active() {
                                    StreamState::Connecting
                                } else {
                                    StreamState::Disconnected
                                }
                            }
                            _ = shutdown.changed() => StreamState::Disconnected,
                        }
                    }
                }
                StreamState::Connected => StreamState::ReconnectPending,
                StreamState::Disconnected => break,
            };
        }

        // The stopping handle already reported Off.
        info!("### Filing Stream Closed ###");
    }

    /// One connection lifetime; returns the next state.
    async fn connect_and_read(&self, shutdown: &mut watch::Receiver<bool>) -> StreamState {
        let frames = tokio::select! {
            result = self.transport.connect() => result,
            _ = shutdown.changed() => return StreamState::Disconnected,
        };

        let mut frames: FrameStream = match frames {
            Ok(frames) => frames,
            Err(e) => {
                error!("Filing stream error: {}", e);
                self.out.publish(Notification::WsStatus {
                    status: ConnectionStatus::Error,
                });
                return StreamState::ReconnectPending;
            }
        };

        self.enter(StreamState::Connected);
        info!("### Filing Stream Opened ###");
        self.out.publish(Notification::WsStatus {
            status: ConnectionStatus::Live,
        });
        self.out.log(LogLevel::Info, "✅ WebSocket connection opened successfully.");

        loop {
            if !self.is_active() {
                return StreamState::Disconnected;
            }
            let next = tokio::select! {
                next = frames.next() => next,
                _ = shutdown.changed() => {
                    info!("Stop requested, closing filing stream");
                    return StreamState::Disconnected;
                }
            };

            match next {
                Some(Ok(frame)) => self.handle_frame(&frame).await,
                Some(Err(e)) => {
                    error!("Filing stream error: {}", e);
                    self.out.publish(Notification::WsStatus {
                        status: ConnectionStatus::Error,
                    });
                    return StreamState::ReconnectPending;
                }
                None => {
                    warn!("⚠ Filing stream closed by remote");
                    return StreamState::ReconnectPending;
                }
            }
        }
    }

    async fn handle_frame(&self, frame: &str) {
        if let Err(e) = self.frame_log.append(frame) {
            error!(
                "Failed to write to {}: {}",
                self.frame_log.path().display(),
                e
            );
        }

        let events = match parse_frame(frame) {
            Ok(events) => events,
            Err(e) => {
                error!("Error processing message: {}", e);
                return;
            }
        };

        for event in &events {
            if !self.is_active() {
                info!("Stream stopped; dropping rest of frame");
                break;
            }
            self.out.publish(Notification::WsStatusFlash);
            self.pipeline
                .process(event, &self.config, EventSource::Live, &self.out)
                .await;
        }
    }
}
