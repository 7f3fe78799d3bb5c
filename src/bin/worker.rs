use anyhow::Context;
use media_relay::{
    config::WorkerConfig,
    server::worker::{app, WorkerState},
    startup::{init_log, load_dotenv},
};
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv()?;
    init_log();

    let config = WorkerConfig::from_env()?;
    let state = WorkerState::from_config(&config).await?;

    let addr = (config.server.host.as_str(), config.server.port);
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Could not bind {}:{}", addr.0, addr.1))?;

    info!(addr = %listener.local_addr()?, output_dir = ?config.output_dir, "Starting worker...");

    axum::serve(listener, app(state)).await?;

    Ok(())
}
