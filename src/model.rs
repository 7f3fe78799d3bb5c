use std::{fmt::Display, path::PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::JobError;

pub const DEFAULT_FORMAT: &str = "mp3";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Spotify,
    YouTube,
    Generic,
    Invalid,
}
impl Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Spotify => f.write_str("spotify"),
            Self::YouTube => f.write_str("youtube"),
            Self::Generic => f.write_str("generic"),
            Self::Invalid => f.write_str("invalid"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Track,
    Album,
    Playlist,
    Page,
}
impl Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Track => f.write_str("track"),
            Self::Album => f.write_str("album"),
            Self::Playlist => f.write_str("playlist"),
            Self::Page => f.write_str("page"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artist {
    pub id: Option<String>,
    pub name: String,
}

/// One entry of an album or playlist track listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackSummary {
    pub id: Option<String>,
    pub title: Option<String>,
    #[serde(default)]
    pub artists: Vec<Artist>,
    pub duration_ms: Option<u64>,
    pub preview_or_stream_url: Option<String>,
    pub url: Option<String>,
}

/// Provider-agnostic metadata produced by a single resolution.
///
/// Lives for one request only. Optional fields serialize as `null` so every
/// record has the same shape regardless of provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedMetadata {
    pub provider: Provider,
    pub kind: MediaKind,
    pub url: String,
    pub id: Option<String>,
    pub title: Option<String>,
    #[serde(default)]
    pub artists: Vec<Artist>,
    pub duration_ms: Option<u64>,
    #[serde(default)]
    pub images: Vec<String>,
    pub preview_or_stream_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tracks: Vec<TrackSummary>,
}

impl ResolvedMetadata {
    pub fn empty(provider: Provider, kind: MediaKind, url: impl Into<String>) -> Self {
        Self {
            provider,
            kind,
            url: url.into(),
            id: None,
            title: None,
            artists: Vec::new(),
            duration_ms: None,
            images: Vec::new(),
            preview_or_stream_url: None,
            description: None,
            site: None,
            tracks: Vec::new(),
        }
    }

    pub fn artist_line(&self) -> Option<String> {
        if self.artists.is_empty() {
            return None;
        }

        Some(
            self.artists
                .iter()
                .map(|a| a.name.as_str())
                .collect::<Vec<_>>()
                .join(", "),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    Track,
    Album,
    Playlist,
}
impl Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Track => f.write_str("track"),
            Self::Album => f.write_str("album"),
            Self::Playlist => f.write_str("playlist"),
        }
    }
}
impl std::str::FromStr for JobKind {
    type Err = JobError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "track" => Ok(Self::Track),
            "album" => Ok(Self::Album),
            "playlist" => Ok(Self::Playlist),
            other => Err(JobError::UnknownType(other.to_string())),
        }
    }
}

/// Download job exactly as it travels over the wire.
///
/// Fields stay loosely typed so the dispatcher can forward a job untouched and
/// both sides can answer a malformed job with a validation error instead of a
/// deserialization failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadJob {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    #[serde(default = "default_format")]
    pub format: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
}

fn default_format() -> String {
    DEFAULT_FORMAT.to_string()
}

impl DownloadJob {
    pub fn new(kind: JobKind, metadata: serde_json::Value) -> Self {
        Self {
            kind: Some(kind.to_string()),
            metadata: Some(metadata),
            format: default_format(),
            callback_url: None,
        }
    }

    /// Checks that `type` and `metadata` are present. Their contents are not
    /// inspected.
    pub fn ensure_present(&self) -> Result<(&str, &serde_json::Value), JobError> {
        let kind = self
            .kind
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty());

        match (kind, self.metadata.as_ref()) {
            (Some(kind), Some(metadata)) if !metadata.is_null() => Ok((kind, metadata)),
            _ => Err(JobError::MissingFields),
        }
    }
}

/// Outcome of one track write inside a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedTrack {
    pub title: String,
    pub path: Option<PathBuf>,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
impl SavedTrack {
    pub fn saved(title: impl Into<String>, path: PathBuf) -> Self {
        Self {
            title: title.into(),
            path: Some(path),
            ok: true,
            error: None,
        }
    }

    pub fn failed(title: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            path: None,
            ok: false,
            error: Some(error.into()),
        }
    }
}

/// Produced once per job. Same shape for the synchronous reply and the
/// callback body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobResult {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Vec<SavedTrack>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
impl JobResult {
    pub const fn completed(result: Vec<SavedTrack>) -> Self {
        Self {
            ok: true,
            result: Some(result),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            result: None,
            error: Some(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn job_defaults_format_and_reads_callback() {
        let job: DownloadJob = serde_json::from_value(json!({
            "type": "track",
            "metadata": {"title": "Foo"},
            "callback_url": "http://localhost/cb",
        }))
        .unwrap();

        assert_eq!(job.format, "mp3");
        assert_eq!(job.callback_url.as_deref(), Some("http://localhost/cb"));
        assert!(job.ensure_present().is_ok());
    }

    #[test]
    fn job_without_type_or_metadata_is_rejected() {
        let no_type: DownloadJob =
            serde_json::from_value(json!({"metadata": {"title": "Foo"}})).unwrap();
        let null_metadata: DownloadJob =
            serde_json::from_value(json!({"type": "track", "metadata": null})).unwrap();
        let blank_type: DownloadJob =
            serde_json::from_value(json!({"type": " ", "metadata": {}})).unwrap();

        for job in [no_type, null_metadata, blank_type] {
            assert!(matches!(
                job.ensure_present(),
                Err(JobError::MissingFields)
            ));
        }
    }

    #[test]
    fn job_kind_parses_known_types_only() {
        assert_eq!("album".parse::<JobKind>().unwrap(), JobKind::Album);
        assert!(matches!(
            "video".parse::<JobKind>(),
            Err(JobError::UnknownType(t)) if t == "video"
        ));
    }

    #[test]
    fn metadata_serializes_camel_case_with_nulls() {
        let meta = ResolvedMetadata::empty(Provider::Generic, MediaKind::Page, "https://a.test");
        let value = serde_json::to_value(&meta).unwrap();

        assert_eq!(value["provider"], "generic");
        assert_eq!(value["kind"], "page");
        assert!(value["durationMs"].is_null());
        assert!(value["previewOrStreamUrl"].is_null());
        assert!(value.get("tracks").is_none());
    }

    #[test]
    fn failed_result_has_no_payload() {
        let value = serde_json::to_value(JobResult::failed("boom")).unwrap();

        assert_eq!(value, json!({"ok": false, "error": "boom"}));
    }
}
