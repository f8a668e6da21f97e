//! Unit tests for the feed connection lifecycle.

#[cfg(test)]
mod stream_client_tests {
    use std::sync::Arc;
    use std::time::Duration;

    use crate::bus::EventBus;
    use crate::config::SessionConfig;
    use crate::data::FrameLog;
    use crate::events::{ConnectionStatus, Notification};
    use crate::services::stream_client::{StreamClient, StreamHandle, StreamState};
    use crate::test_support::*;

    const JOIN: Duration = Duration::from_secs(2);

    struct Harness {
        fakes: Fakes,
        transport: Arc<FakeTransport>,
        log: FrameLog,
        bus: EventBus,
        dir: tempfile::TempDir,
    }

    impl Harness {
        fn new(script: Vec<Connection>) -> Self {
            Self::with_scorer(script, FakeScorer::verdict(false, 10, false, ""))
        }

        fn with_scorer(script: Vec<Connection>, scorer: FakeScorer) -> Self {
            let dir = tempfile::tempdir().unwrap();
            Self {
                fakes: Fakes::new(
                    FakeDocuments::default().with_page(RAW_URL, long_text(300)),
                    scorer,
                    FakeSpeech::ok(),
                ),
                transport: Arc::new(FakeTransport::scripted(script)),
                log: FrameLog::new(dir.path().join("stream.log")),
                bus: EventBus::new(1000),
                dir,
            }
        }

        fn spawn(&self, config: SessionConfig) -> StreamHandle {
            StreamClient::new(
                self.transport.clone(),
                self.fakes.pipeline(),
                Arc::new(config),
                self.log.clone(),
                self.bus.clone(),
                Duration::ZERO,
            )
            .spawn()
        }
    }

    fn ticker_config() -> SessionConfig {
        let mut config = session_config(&["8-K"], 70);
        config.analysis_prompt_template = "T={ticker}".to_string();
        config
    }

    #[tokio::test]
    async fn test_reconnects_after_remote_close() {
        let h = Harness::new(vec![Connection::Closes(vec![]), Connection::Holds(vec![])]);
        let mut rx = h.bus.subscribe();
        let handle = h.spawn(ticker_config());

        assert!(eventually(|| h.transport.connects() >= 2).await);
        assert!(eventually(|| handle.state() == StreamState::Connected).await);
        assert!(handle.is_alive());

        handle.stop(JOIN).await;
        let notes = drain(&mut rx);
        assert!(notes.iter().any(|n| matches!(
            n,
            Notification::LogMessage { message, .. } if message.contains("Attempting to reconnect")
        )));
    }

    #[tokio::test]
    async fn test_refused_connection_is_retried() {
        let h = Harness::new(vec![
            Connection::Refused,
            Connection::Holds(vec![frame(&[filing("AAA", "8-K")])]),
        ]);
        let mut rx = h.bus.subscribe();
        let handle = h.spawn(ticker_config());

        assert!(eventually(|| h.fakes.scorer.calls() == 1).await);
        assert_eq!(h.transport.connects(), 2);

        handle.stop(JOIN).await;
        let notes = drain(&mut rx);
        assert!(notes.iter().any(|n| matches!(
            n,
            Notification::WsStatus { status: ConnectionStatus::Error }
        )));
        assert!(notes.iter().any(|n| matches!(
            n,
            Notification::WsStatus { status: ConnectionStatus::Live }
        )));
    }

    #[tokio::test]
    async fn test_stop_suppresses_reconnect() {
        let h = Harness::new(vec![Connection::Holds(vec![])]);
        let mut rx = h.bus.subscribe();
        let handle = h.spawn(ticker_config());

        assert!(eventually(|| h.transport.connects() == 1).await);
        handle.stop(JOIN).await;

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(h.transport.connects(), 1);

        let notes = drain(&mut rx);
        assert!(!notes.iter().any(|n| matches!(
            n,
            Notification::LogMessage { message, .. } if message.contains("Attempting to reconnect")
        )));
        assert!(matches!(
            notes.last(),
            Some(Notification::WsStatus { status: ConnectionStatus::Off })
        ));
    }

    #[tokio::test]
    async fn test_idle_stream_stops_promptly() {
        let h = Harness::new(vec![Connection::Holds(vec![])]);
        let handle = h.spawn(ticker_config());
        assert!(eventually(|| handle.state() == StreamState::Connected).await);

        assert!(handle.is_alive());

        let started = std::time::Instant::now();
        handle.stop(JOIN).await;
        assert!(started.elapsed() < JOIN, "idle stream should stop without waiting out the join bound");
    }

    #[tokio::test]
    async fn test_stop_lets_in_flight_event_finish() {
        let h = Harness::with_scorer(
            vec![Connection::Holds(vec![frame(&[filing("AAA", "8-K"), filing("BBB", "8-K")])])],
            FakeScorer::verdict(false, 10, false, "").slow(Duration::from_millis(200)),
        );
        let mut rx = h.bus.subscribe();
        let handle = h.spawn(ticker_config());

        assert!(eventually(|| h.fakes.scorer.calls() == 1).await);
        handle.stop(JOIN).await;

        // AAA was mid-analysis and completes; BBB is dropped.
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(h.fakes.scorer.calls(), 1);
        let notes = drain(&mut rx);
        assert!(notes.iter().any(|n| matches!(
            n,
            Notification::AiLogMessage { message, .. } if message == "- No hit: AAA (10%)"
        )));
        assert!(!notes.iter().any(|n| matches!(
            n,
            Notification::LogMessage { message, .. } if message.contains("[BBB - 8-K]")
        )));
    }

    #[tokio::test]
    async fn test_frame_log_failure_does_not_stop_processing() {
        let h = Harness::new(vec![Connection::Holds(vec![
            frame(&[filing("AAA", "8-K")]),
            frame(&[filing("BBB", "8-K")]),
        ])]);
        // A directory cannot be opened for appending.
        let unwritable = FrameLog::new(h.dir.path());
        let handle = StreamClient::new(
            h.transport.clone(),
            h.fakes.pipeline(),
            Arc::new(ticker_config()),
            unwritable,
            h.bus.clone(),
            Duration::ZERO,
        )
        .spawn();

        assert!(eventually(|| h.fakes.scorer.calls() == 2).await);
        assert!(handle.is_alive());
        handle.stop(JOIN).await;
    }

    #[tokio::test]
    async fn test_events_processed_in_order_and_frames_logged() {
        let first = frame(&[filing("AAA", "8-K"), filing("BBB", "10-Q"), filing("CCC", "8-K")]);
        let second = frame(&[filing("DDD", "8-K")]);
        let h = Harness::new(vec![Connection::Holds(vec![
            first.clone(),
            "{not json".to_string(),
            second.clone(),
        ])]);
        let handle = h.spawn(ticker_config());

        assert!(eventually(|| h.fakes.scorer.calls() == 3).await);
        handle.stop(JOIN).await;

        let prompts: Vec<String> = h
            .fakes
            .scorer
            .requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.prompt.split("\n\n").next().unwrap_or_default().to_string())
            .collect();
        assert_eq!(prompts, vec!["T=AAA", "T=CCC", "T=DDD"]);

        let lines = h.log.read_lines().await.unwrap();
        assert_eq!(lines, vec![first, "{not json".to_string(), second]);
    }

    #[tokio::test]
    async fn test_single_object_frame_is_processed() {
        let object = serde_json::to_string(&filing("EEE", "8-K")).unwrap();
        let h = Harness::new(vec![Connection::Holds(vec![object])]);
        let handle = h.spawn(ticker_config());

        assert!(eventually(|| h.fakes.scorer.calls() == 1).await);
        handle.stop(JOIN).await;
    }

    #[tokio::test]
    async fn test_every_event_flashes_status() {
        let h = Harness::new(vec![Connection::Holds(vec![frame(&[
            filing("BBB", "S-1"),
            filing("AAA", "8-K"),
        ])])]);
        let mut rx = h.bus.subscribe();
        let handle = h.spawn(ticker_config());

        assert!(eventually(|| h.fakes.scorer.calls() == 1).await);
        handle.stop(JOIN).await;

        let flashes = drain(&mut rx)
            .iter()
            .filter(|n| matches!(n, Notification::WsStatusFlash))
            .count();
        assert_eq!(flashes, 2);
    }
}
