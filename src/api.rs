use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};

use crate::config::SessionConfig;
use crate::events::LogLevel;
use crate::services::session::{SessionId, SessionRegistry};

pub struct AppState {
    pub registry: Arc<SessionRegistry>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct TickerTestRequest {
    pub ticker: String,
    #[serde(flatten)]
    pub config: SessionConfig,
}

/// Subscriber-issued commands, `{"command": ..., "data": {...}}`.
#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "command", content = "data", rename_all = "snake_case")]
pub enum Command {
    StartMonitoring(SessionConfig),
    StopMonitoring,
    RunTickerTest(TickerTestRequest),
    ReplayLogFile(SessionConfig),
    GetStatus,
    TestConnection(Option<SessionConfig>),
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health))
        .with_state(state)
}

pub async fn run_server(state: Arc<AppState>, bind_addr: &str) -> std::io::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    info!("API Server listening on {}", bind_addr);
    axum::serve(listener, app).await
}

async fn health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let registry = state.registry.clone();
    let (session_id, output) = registry.open_session();
    let mut notifications = output.subscribe();
    let (mut sender, mut receiver) = socket.split();

    let forward = tokio::spawn(async move {
        loop {
            match notifications.recv().await {
                Ok(notification) => {
                    let text = match serde_json::to_string(&notification) {
                        Ok(text) => text,
                        Err(e) => {
                            error!("Failed to encode notification: {}", e);
                            continue;
                        }
                    };
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Session {} lagging, dropped {} notifications", session_id, skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    while let Some(Ok(msg)) = receiver.next().await {
        match msg {
            Message::Text(text) => match serde_json::from_str::<Command>(text.as_str()) {
                Ok(command) => handle_command(&registry, session_id, command).await,
                Err(e) => {
                    warn!("Unrecognized command from {}: {}", session_id, e);
                    output.log(LogLevel::Error, format!("❌ Unrecognized command: {}", e));
                }
            },
            Message::Close(_) => break,
            _ => {}
        }
    }

    registry.close_session(session_id).await;
    forward.abort();
}

/// Errors are already reported on the session channel by the registry.
pub async fn handle_command(registry: &SessionRegistry, id: SessionId, command: Command) {
    let result = match command {
        Command::StartMonitoring(config) => registry.start_monitoring(id, config).map(|_| ()),
        Command::StopMonitoring => registry.stop_monitoring(id).await,
        Command::RunTickerTest(request) => {
            registry.run_historical_test(id, request.ticker, request.config)
        }
        Command::ReplayLogFile(config) => registry.replay_log(id, config),
        Command::GetStatus => registry.report_status(id),
        Command::TestConnection(config) => registry
            .check_connection(id, &config.unwrap_or_default())
            .map(|_| ()),
    };

    if let Err(e) = result {
        warn!("Command for session {} failed: {}", id, e);
    }
}
