use std::time::Duration;
use tracing::{info, warn};

use crate::bus::EventBus;
use crate::config::SessionConfig;
use crate::data::FrameLog;
use crate::events::{parse_frame, EventSource, LogLevel, Notification};
use crate::services::pipeline::EventPipeline;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReplayReport {
    pub lines: usize,
    /// Events handed to the pipeline, filtered or not
    pub events: usize,
    pub alerts: usize,
    pub malformed_lines: usize,
}

/// Re-drives captured frames through the live pipeline, one event at a time.
pub struct ReplayEngine {
    pipeline: EventPipeline,
    frame_log: FrameLog,
    startup_delay: Duration,
    event_delay: Duration,
}

impl ReplayEngine {
    pub fn new(pipeline: EventPipeline, frame_log: FrameLog, startup_delay: Duration, event_delay: Duration) -> Self {
        Self {
            pipeline,
            frame_log,
            startup_delay,
            event_delay,
        }
    }

    /// Always ends with `replay_finished`, including when the log is missing.
    pub async fn run(&self, config: &SessionConfig, out: &EventBus) -> ReplayReport {
        let report = self.replay(config, out).await;
        info!(
            "⟳ Replay done: {} lines, {} events, {} alerts, {} malformed",
            report.lines, report.events, report.alerts, report.malformed_lines
        );
        out.publish(Notification::ReplayFinished);
        report
    }

    async fn replay(&self, config: &SessionConfig, out: &EventBus) -> ReplayReport {
        let mut report = ReplayReport::default();

        let lines = match self.frame_log.read_lines().await {
            Ok(lines) => lines,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                out.log(
                    LogLevel::Error,
                    format!(
                        "❌ {} not found. Run live monitoring first to create it.",
                        self.frame_log.path().display()
                    ),
                );
                return report;
            }
            Err(e) => {
                out.log(
                    LogLevel::Error,
                    format!("❌ Failed to read {}: {}", self.frame_log.path().display(), e),
                );
                return report;
            }
        };

        report.lines = lines.len();
        out.log(
            LogLevel::Warn,
            format!("⟳ Found {} messages in log file. Starting replay...", lines.len()),
        );
        tokio::time::sleep(self.startup_delay).await;

        for line in &lines {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let events = match parse_frame(line) {
                Ok(events) => events,
                Err(e) => {
                    warn!("Skipping malformed line in frame log ({}): {}", e, line);
                    report.malformed_lines += 1;
                    continue;
                }
            };

            for event in &events {
                let outcome = self
                    .pipeline
                    .process(event, config, EventSource::Replay, out)
                    .await;
                report.events += 1;
                if outcome.is_alert() {
                    report.alerts += 1;
                }
                tokio::time::sleep(self.event_delay).await;
            }
        }

        report
    }
}
