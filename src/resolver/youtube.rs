use std::{path::PathBuf, process::Stdio, time::Duration};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, trace};
use url::Url;

use super::Resolver;
use crate::{
    error::ResolveError,
    helpers::domain::DomainParser,
    model::{Artist, MediaKind, Provider, ResolvedMetadata},
    processor::ffmpeg::last_line,
};

const WATCH_URL: &str = "https://www.youtube.com/watch?v=";
const INFO_TIMEOUT: Duration = Duration::from_secs(60);
static VIDEO_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]{11}$").expect("Invalid regex"));

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
}

#[derive(Debug, Deserialize)]
struct VideoInfo {
    id: String,
    title: Option<String>,
    channel: Option<String>,
    uploader: Option<String>,
    channel_id: Option<String>,
    duration: Option<f64>,
    description: Option<String>,
    thumbnail: Option<String>,
    #[serde(default)]
    thumbnails: Vec<Thumbnail>,
    #[serde(default)]
    formats: Vec<EncodedFormat>,
}

/// One entry of the encoded format list reported by yt-dlp.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EncodedFormat {
    pub format_id: String,
    pub url: Option<String>,
    pub ext: Option<String>,
    /// Audio bitrate in kbit/s
    pub abr: Option<f64>,
    pub vcodec: Option<String>,
    pub acodec: Option<String>,
    pub height: Option<u32>,
    pub format_note: Option<String>,
}
impl EncodedFormat {
    /// Label such as `720p` for formats carrying a video track.
    pub fn quality_label(&self) -> Option<String> {
        let has_video =
            self.vcodec.as_deref().is_some_and(|v| v != "none") || self.height.is_some();

        if !has_video {
            return None;
        }

        Some(
            self.height
                .map(|h| format!("{h}p"))
                .or_else(|| self.format_note.clone())
                .unwrap_or_else(|| "video".to_string()),
        )
    }

    fn has_audio(&self) -> bool {
        self.acodec.as_deref() != Some("none")
    }
}

/// Highest-bitrate audio-only format with a fetchable URL.
pub fn best_audio_format(formats: &[EncodedFormat]) -> Option<&EncodedFormat> {
    formats
        .iter()
        .filter(|f| f.quality_label().is_none() && f.has_audio() && f.url.is_some())
        .max_by(|a, b| a.abr.unwrap_or(0.0).total_cmp(&b.abr.unwrap_or(0.0)))
}

/// Extracts an 11-character video id from a bare id or any of the common
/// YouTube URL shapes.
pub fn video_id(input: &str) -> Option<String> {
    let input = input.trim();

    if VIDEO_ID.is_match(input) {
        return Some(input.to_string());
    }

    video_id_from_url(&Url::parse(input).ok()?)
}

pub fn video_id_from_url(url: &Url) -> Option<String> {
    let host = DomainParser::normalized_host(url)?;
    let mut segments = url.path_segments().into_iter().flatten().filter(|s| !s.is_empty());

    let candidate = if host == "youtu.be" {
        segments.next().map(ToString::to_string)
    } else if host == "youtube.com" || host.ends_with(".youtube.com") {
        match segments.next() {
            Some("watch") => url
                .query_pairs()
                .find(|(k, _)| k == "v")
                .map(|(_, v)| v.into_owned()),
            Some("shorts" | "embed" | "live" | "v") => segments.next().map(ToString::to_string),
            _ => None,
        }
    } else {
        None
    };

    candidate.filter(|id| VIDEO_ID.is_match(id))
}

#[derive(Debug)]
pub struct YouTubeResolver {
    ytdlp: PathBuf,
}

#[async_trait::async_trait]
impl Resolver for YouTubeResolver {
    fn provider(&self) -> Provider {
        Provider::YouTube
    }

    #[tracing::instrument(skip(self, url), fields(url = ?url.as_str()))]
    async fn resolve(&self, url: &Url) -> Result<ResolvedMetadata, ResolveError> {
        let Some(id) = video_id_from_url(url) else {
            return Err(ResolveError::unsupported(
                Provider::YouTube,
                "not a valid YouTube video URL",
            ));
        };
        debug!(%id, "Resolving YouTube video");

        let info = self.fetch_info(&id).await?;

        Ok(into_metadata(info))
    }
}

impl YouTubeResolver {
    pub fn new(ytdlp: impl Into<PathBuf>) -> Self {
        Self {
            ytdlp: ytdlp.into(),
        }
    }

    async fn fetch_info(&self, id: &str) -> Result<VideoInfo, ResolveError> {
        let upstream = |e: String| ResolveError::upstream(Provider::YouTube, e);

        let output = Command::new(&self.ytdlp)
            .args(["--dump-single-json", "--no-playlist", "--no-warnings", "--skip-download"])
            .arg(format!("{WATCH_URL}{id}"))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(INFO_TIMEOUT, output)
            .await
            .map_err(|_| upstream(format!("yt-dlp timed out after {INFO_TIMEOUT:?}")))?
            .map_err(|e| upstream(format!("could not run {}: {e}", self.ytdlp.display())))?;

        trace!(status = ?output.status, "yt-dlp finished");

        if !output.status.success() {
            return Err(upstream(last_line(&output.stderr)));
        }

        serde_json::from_slice(&output.stdout).map_err(|e| upstream(e.to_string()))
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn into_metadata(info: VideoInfo) -> ResolvedMetadata {
    let mut meta = ResolvedMetadata::empty(
        Provider::YouTube,
        MediaKind::Track,
        format!("{WATCH_URL}{}", info.id),
    );

    meta.preview_or_stream_url = best_audio_format(&info.formats).and_then(|f| f.url.clone());
    meta.id = Some(info.id);
    meta.title = info.title;
    meta.description = info.description.filter(|d| !d.is_empty());
    meta.duration_ms = info
        .duration
        .filter(|d| d.is_finite() && *d >= 0.0)
        .map(|d| (d * 1000.0).round() as u64);

    if let Some(name) = info.channel.or(info.uploader) {
        meta.artists.push(Artist {
            id: info.channel_id,
            name,
        });
    }

    // yt-dlp lists thumbnails worst to best
    meta.images = info.thumbnails.into_iter().rev().map(|t| t.url).collect();
    if meta.images.is_empty() {
        meta.images.extend(info.thumbnail);
    }

    meta
}
