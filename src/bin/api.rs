use anyhow::Context;
use media_relay::{
    config::ApiConfig,
    server,
    startup::{init_log, load_dotenv},
};
use tokio::net::TcpListener;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv()?;
    init_log();

    let config = ApiConfig::from_env()?;

    if !config.spotify.is_configured() {
        warn!("SPOTIFY_CLIENT_ID/SPOTIFY_CLIENT_SECRET not set, Spotify lookups will fail");
    }

    let app = server::api::app(&config).await?;

    let addr = (config.server.host.as_str(), config.server.port);
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Could not bind {}:{}", addr.0, addr.1))?;

    info!(
        addr = %listener.local_addr()?,
        worker = %config.worker_url,
        embedded_worker = config.embed_worker,
        "Starting API server..."
    );

    axum::serve(listener, app).await?;

    Ok(())
}
