use std::sync::Arc;

use anyhow::Context;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use reqwest::Client;
use tower_http::trace::TraceLayer;
use tracing::info;

use super::response::{health, ApiResult};
use crate::{
    config::WorkerConfig,
    model::DownloadJob,
    processor::ffmpeg::Encoder,
    worker::{CallbackNotifier, Worker, YtDlpFetcher},
};

#[derive(Debug, Clone)]
pub struct WorkerState {
    pub worker: Arc<Worker>,
}
impl WorkerState {
    pub fn new(worker: Worker) -> Self {
        Self {
            worker: Arc::new(worker),
        }
    }

    /// Worker backed by yt-dlp and ffmpeg. Creates the output directory.
    pub async fn from_config(config: &WorkerConfig) -> anyhow::Result<Self> {
        tokio::fs::create_dir_all(&config.output_dir)
            .await
            .with_context(|| format!("Could not create {}", config.output_dir.display()))?;
        info!(output_dir = ?config.output_dir, "Output directory ready");

        let client = super::http_client(config.http_timeout)?;
        let streaming = super::streaming_client(config.http_timeout)?;

        let encoder = Encoder::new(config.tools.ffmpeg_bin.clone());
        let fetcher = YtDlpFetcher::new(streaming, config.tools.ytdlp_bin.clone(), encoder);

        Ok(Self::new(Worker::new(
            config.output_dir.clone(),
            Arc::new(fetcher),
            CallbackNotifier::new(client),
        )))
    }
}

/// Only the job endpoint, so it can be merged into the API router.
pub fn router(state: WorkerState) -> Router {
    Router::new()
        .route("/enqueue", post(enqueue))
        .with_state(state)
}

/// Standalone worker service.
pub fn app(state: WorkerState) -> Router {
    router(state)
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
}

async fn enqueue(
    State(state): State<WorkerState>,
    payload: Result<Json<DownloadJob>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(job) = payload?;

    let result = state.worker.process(job).await?;
    let status = if result.ok {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };

    Ok((status, Json(result)).into_response())
}
