use nav_hunter::api::{run_server, AppState};
use nav_hunter::config::AppConfig;
use nav_hunter::data::FrameLog;
use nav_hunter::factory::LiveServices;
use nav_hunter::services::session::SessionRegistry;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    dotenvy::dotenv().ok();

    // Setup Logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting NAV Hunter...");

    let config = AppConfig::load("config.yaml")?;
    info!(
        "Loaded Configuration: stream={} query={} log={}",
        config.stream_url, config.query_url, config.frame_log_path
    );
    if config.sec_api_key.is_none() {
        warn!("⚠️ SEC_API_KEY not set - sessions must supply their own key");
    }
    if config.openai_api_key.is_none() {
        warn!("⚠️ OPENAI_API_KEY not set - sessions must supply their own key");
    }

    let frame_log = FrameLog::new(config.frame_log_path.clone());
    let services = Arc::new(LiveServices::new(config.clone())?);
    let registry = Arc::new(SessionRegistry::new(services, frame_log, config.timings.clone()));

    let state = Arc::new(AppState { registry });

    info!("Initializing API Server...");
    run_server(state, &config.bind_addr).await?;

    Ok(())
}
