use anyhow::Context;
use gateway::{AppState, GatewayConfig, logging::setup_logging, run_server};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = GatewayConfig::from_env().context("failed to load configuration")?;
    let _telemetry = setup_logging(&config)?;

    tracing::info!(
        environment = config.environment.as_str(),
        backend = %config.backend_url,
        max_upload_bytes = config.max_upload_bytes,
        "Starting gateway"
    );

    let state = AppState::from_config(&config)?;
    run_server(&config, state).await
}
