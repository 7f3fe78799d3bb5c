use anyhow::Context;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{filter::Builder as TracingFilterBuilder, util::SubscriberInitExt};

/// Loads `.env` if there is one. A missing file is fine, a broken one is not.
pub fn load_dotenv() -> anyhow::Result<()> {
    match dotenvy::dotenv() {
        Err(e) if e.not_found() => Ok(()),
        Ok(_) => Ok(()),
        Err(e) => Err(e).context("Failed to load .env file"),
    }
}

pub fn init_log() {
    tracing_subscriber::fmt()
        .with_ansi(true)
        .with_env_filter(
            TracingFilterBuilder::default()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .finish()
        .init();
}
