use std::sync::Arc;

use axum::{
    body::Body,
    extract::{rejection::JsonRejection, Query, State},
    http::header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use super::{
    response::{health, ApiError, ApiResult},
    worker::{self, WorkerState},
};
use crate::{
    config::ApiConfig,
    dispatcher::Dispatcher,
    helpers::{
        download::{stream_remote, ByteStream},
        media_type, sanitize,
    },
    model::{DownloadJob, MediaKind, Provider, ResolvedMetadata},
    processor::ffmpeg::Encoder,
    resolver::MediaResolver,
};

#[derive(Debug, Clone)]
pub struct ApiState {
    pub resolver: Arc<MediaResolver>,
    pub dispatcher: Arc<Dispatcher>,
    pub encoder: Arc<Encoder>,
    /// Used for proxied downloads, which have no overall deadline.
    pub streaming: Client,
}
impl ApiState {
    pub fn from_config(config: &ApiConfig) -> anyhow::Result<Self> {
        let client = super::http_client(config.http_timeout)?;

        Ok(Self {
            resolver: Arc::new(MediaResolver::new(
                client.clone(),
                config.spotify.clone(),
                &config.tools,
            )),
            dispatcher: Arc::new(Dispatcher::new(
                client,
                config.worker_url.clone(),
                config.dispatch_timeout,
            )),
            encoder: Arc::new(Encoder::new(config.tools.ffmpeg_bin.clone())),
            streaming: super::streaming_client(config.http_timeout)?,
        })
    }
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/track", get(track))
        .route("/album", get(album))
        .route("/playlist", get(playlist))
        .route("/info", get(info))
        .route("/down", get(down))
        .route("/request-download", post(request_download))
        .route("/health-check", post(health))
        .route("/health", get(health))
        .with_state(state)
}

/// The full API service, with the worker mounted in-process when
/// `embed_worker` is set.
pub async fn app(config: &ApiConfig) -> anyhow::Result<Router> {
    let mut app = router(ApiState::from_config(config)?);

    if config.embed_worker {
        info!("Mounting embedded worker");
        let state = WorkerState::from_config(&config.embedded_worker()).await?;
        app = app.merge(worker::router(state));
    }

    Ok(app.layer(TraceLayer::new_for_http()))
}

#[derive(Debug, Deserialize)]
pub struct UrlQuery {
    url: Option<String>,
}
impl UrlQuery {
    fn required(&self) -> ApiResult<&str> {
        self.url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| ApiError::bad_request("Missing ?url="))
    }
}

async fn index() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": env!("CARGO_PKG_NAME"),
        "docs": "See /track, /album, /playlist, /info, /down, /request-download",
    }))
}

async fn track(
    State(state): State<ApiState>,
    Query(query): Query<UrlQuery>,
) -> ApiResult<Json<Value>> {
    resolve_as(&state, &query, Some(MediaKind::Track), "track").await
}

async fn album(
    State(state): State<ApiState>,
    Query(query): Query<UrlQuery>,
) -> ApiResult<Json<Value>> {
    resolve_as(&state, &query, Some(MediaKind::Album), "album").await
}

async fn playlist(
    State(state): State<ApiState>,
    Query(query): Query<UrlQuery>,
) -> ApiResult<Json<Value>> {
    resolve_as(&state, &query, Some(MediaKind::Playlist), "playlist").await
}

async fn info(
    State(state): State<ApiState>,
    Query(query): Query<UrlQuery>,
) -> ApiResult<Json<Value>> {
    resolve_as(&state, &query, None, "info").await
}

async fn resolve_as(
    state: &ApiState,
    query: &UrlQuery,
    expected: Option<MediaKind>,
    key: &str,
) -> ApiResult<Json<Value>> {
    let url = query.required()?;
    let meta = state.resolver.resolve(url).await?;

    if let Some(kind) = expected.filter(|k| *k != meta.kind) {
        return Err(ApiError::bad_request(format!(
            "Expected a {kind} URL, got a {} {}",
            meta.provider, meta.kind
        )));
    }

    let meta = serde_json::to_value(&meta).map_err(|e| ApiError::internal(e.to_string()))?;

    let mut body = Map::new();
    body.insert("ok".to_string(), Value::Bool(true));
    body.insert("provider".to_string(), meta["provider"].clone());
    body.insert(key.to_string(), meta);

    Ok(Json(Value::Object(body)))
}

async fn down(
    State(state): State<ApiState>,
    Query(query): Query<UrlQuery>,
) -> ApiResult<Response> {
    let url = query.required()?;
    let meta = state.resolver.resolve(url).await?;
    debug!(provider = %meta.provider, "Preparing download");

    match meta.provider {
        Provider::Spotify => Err(ApiError::payment_required(
            "Spotify only exposes preview clips, there is no downloadable audio",
        )),
        Provider::YouTube => {
            let source = meta.preview_or_stream_url.as_deref().ok_or_else(|| {
                ApiError::payment_required("No audio-only format is available for this video")
            })?;
            let stream = state
                .encoder
                .stream_mp3(source)
                .map_err(|e| ApiError::internal(format!("{e:#}")))?;

            Ok(attachment(stream, "audio/mpeg", &download_name(&meta, "mp3")))
        }
        Provider::Generic => generic_download(&state, &meta).await,
        Provider::Invalid => Err(ApiError::bad_request("Invalid URL")),
    }
}

async fn generic_download(state: &ApiState, meta: &ResolvedMetadata) -> ApiResult<Response> {
    if let Some(source) = meta.preview_or_stream_url.as_deref() {
        let (content_type, stream) = stream_remote(&state.streaming, source)
            .await
            .map_err(|e| ApiError::bad_gateway(format!("{e:#}")))?;
        let content_type =
            content_type.unwrap_or_else(|| "application/octet-stream".to_string());
        let ext = extension_for(&content_type, source);

        return Ok(attachment(stream, &content_type, &download_name(meta, ext)));
    }

    if let Some(image) = meta.images.first() {
        return Ok(Json(json!({"ok": true, "redirect": image})).into_response());
    }

    Err(ApiError::payment_required("No downloadable asset found on this page"))
}

async fn request_download(
    State(state): State<ApiState>,
    payload: Result<Json<DownloadJob>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(job) = payload?;

    let worker = state.dispatcher.dispatch(&job).await?;

    Ok(Json(json!({"ok": true, "worker": worker})))
}

fn attachment(stream: ByteStream, content_type: &str, file_name: &str) -> Response {
    (
        [
            (CONTENT_TYPE, content_type.to_string()),
            (CONTENT_DISPOSITION, content_disposition(file_name)),
        ],
        Body::from_stream(stream),
    )
        .into_response()
}

/// `attachment` header with an ASCII fallback name and the RFC 5987 UTF-8
/// form.
pub fn content_disposition(file_name: &str) -> String {
    let ascii: String = file_name
        .chars()
        .map(|c| {
            if c.is_ascii() && !c.is_ascii_control() && c != '"' && c != '\\' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let encoded = utf8_percent_encode(file_name, NON_ALPHANUMERIC);

    format!("attachment; filename=\"{ascii}\"; filename*=UTF-8''{encoded}")
}

fn download_name(meta: &ResolvedMetadata, ext: &str) -> String {
    let title = meta.title.as_deref().unwrap_or("download");
    let stem = match meta.artist_line() {
        Some(artists) => format!("{title} - {artists}"),
        None => title.to_string(),
    };
    let stem = stem
        .strip_suffix(&format!(".{ext}"))
        .unwrap_or(&stem)
        .to_string();

    sanitize::file_name(&stem, ext, "download")
}

fn extension_for<'a>(content_type: &str, source: &'a str) -> &'a str {
    media_type::audio_mime_extension(content_type)
        .or_else(|| media_type::url_extension(source))
        .unwrap_or("bin")
}
