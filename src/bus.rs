use crate::error::AnalysisDetails;
use crate::events::{LogLevel, Notification};
use tokio::sync::broadcast;

/// A session's output channel. Delivery is best-effort: a notification
/// published while nobody is subscribed is dropped.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<Notification>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }

    pub fn publish(&self, notification: Notification) {
        self.tx.send(notification).ok();
    }

    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        self.publish(Notification::LogMessage {
            message: message.into(),
            level,
        });
    }

    pub fn ai_log(&self, level: LogLevel, message: impl Into<String>, details: Option<AnalysisDetails>) {
        self.publish(Notification::AiLogMessage {
            message: message.into(),
            level,
            details,
        });
    }
}
