mod callback;
mod fetcher;
mod format;
mod metadata;

use std::{
    collections::HashSet,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::Context;
use tracing::{debug, info, warn};

pub use callback::CallbackNotifier;
pub use fetcher::{MediaFetcher, YtDlpFetcher};
pub use format::AudioFormat;
pub use metadata::{ArtistRef, AudioSource, JobMetadata};

use crate::{
    error::JobError,
    helpers::sanitize::{numbered_file_name, path_component},
    model::{DownloadJob, JobKind, JobResult, SavedTrack},
};

/// A job that passed validation and is ready to run.
#[derive(Debug, Clone)]
pub struct ValidatedJob {
    pub kind: JobKind,
    pub metadata: JobMetadata,
    pub format: AudioFormat,
    pub callback_url: Option<String>,
}
impl TryFrom<DownloadJob> for ValidatedJob {
    type Error = JobError;

    fn try_from(job: DownloadJob) -> Result<Self, Self::Error> {
        let (kind, metadata) = job.ensure_present()?;
        let kind: JobKind = kind.parse()?;
        let metadata: JobMetadata = serde_json::from_value(metadata.clone())
            .map_err(|e| JobError::InvalidMetadata(e.to_string()))?;

        let format = job.format.parse()?;

        Ok(Self {
            kind,
            metadata,
            format,
            callback_url: job.callback_url.filter(|u| !u.trim().is_empty()),
        })
    }
}

/// Runs one download job per call: validate, fetch, report.
///
/// There is no queue behind this; every call does its work immediately and
/// identical jobs are not coalesced.
#[derive(Debug, Clone)]
pub struct Worker {
    output_dir: PathBuf,
    fetcher: Arc<dyn MediaFetcher>,
    callbacks: CallbackNotifier,
}
impl Worker {
    pub fn new(
        output_dir: impl Into<PathBuf>,
        fetcher: Arc<dyn MediaFetcher>,
        callbacks: CallbackNotifier,
    ) -> Self {
        Self {
            output_dir: output_dir.into(),
            fetcher,
            callbacks,
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Validation failures come back as `Err` with no side effects. Anything
    /// that goes wrong after that is reported inside the [`JobResult`], which
    /// is also posted to the job's callback URL if it has one.
    #[tracing::instrument(skip_all, fields(kind = job.kind.as_deref(), format = %job.format))]
    pub async fn process(&self, job: DownloadJob) -> Result<JobResult, JobError> {
        let job = ValidatedJob::try_from(job).inspect_err(|e| debug!(%e, "Rejected job"))?;

        info!("Processing job");
        let result = match self.run(&job).await {
            Ok(saved) => {
                info!(files = saved.len(), "Job completed");
                JobResult::completed(saved)
            }
            Err(e) => {
                warn!(?e, "Job failed");
                JobResult::failed(format!("{e:#}"))
            }
        };

        if let Some(url) = job.callback_url {
            self.callbacks.notify(url, result.clone());
        }

        Ok(result)
    }

    async fn run(&self, job: &ValidatedJob) -> anyhow::Result<Vec<SavedTrack>> {
        match job.kind {
            JobKind::Track => {
                let path = self
                    .output_dir
                    .join(job.metadata.file_name(job.format.extension()));
                let saved = self.download_track(path, &job.metadata, job.format).await?;
                Ok(vec![saved])
            }
            JobKind::Album | JobKind::Playlist => {
                self.download_collection(job.kind, &job.metadata, job.format)
                    .await
            }
        }
    }

    async fn download_track(
        &self,
        path: PathBuf,
        track: &JobMetadata,
        format: AudioFormat,
    ) -> anyhow::Result<SavedTrack> {
        debug!(?path, "Downloading track");

        if let Some(dir) = path.parent() {
            ensure_dir(dir).await?;
        }
        self.fetcher.fetch(track, &path, format).await?;

        Ok(SavedTrack::saved(track.display_title(), path))
    }

    async fn download_collection(
        &self,
        kind: JobKind,
        collection: &JobMetadata,
        format: AudioFormat,
    ) -> anyhow::Result<Vec<SavedTrack>> {
        if collection.tracks.is_empty() {
            anyhow::bail!("{kind} has no tracks");
        }

        let fallback = kind.to_string();
        let dir = self.output_dir.join(path_component(
            collection.collection_name().unwrap_or(&fallback),
            &fallback,
        ));
        ensure_dir(&dir).await?;

        let mut names = TrackNames::default();
        let mut saved = Vec::with_capacity(collection.tracks.len());
        for track in &collection.tracks {
            let path = dir.join(names.claim(track, format.extension()));
            let outcome = match self.download_track(path, track, format).await {
                Ok(s) => s,
                Err(e) => {
                    warn!(?e, title = track.display_title(), "Track failed");
                    SavedTrack::failed(track.display_title(), format!("{e:#}"))
                }
            };
            saved.push(outcome);
        }

        Ok(saved)
    }
}

/// File names already handed out within one directory. Repeats get ` (2)`,
/// ` (3)` and so on. Compared case-insensitively so collisions on
/// case-insensitive file systems are caught too.
#[derive(Debug, Default)]
struct TrackNames {
    used: HashSet<String>,
}
impl TrackNames {
    fn claim(&mut self, track: &JobMetadata, ext: &str) -> String {
        let mut name = track.file_name(ext);
        let mut n = 1;

        while !self.used.insert(name.to_lowercase()) {
            n += 1;
            name = numbered_file_name(&track.file_stem(), n, ext, "untitled");
        }

        name
    }
}

/// Creates `dir` and its parents; a directory that already exists, or that a
/// concurrent job creates first, is fine.
async fn ensure_dir(dir: &Path) -> anyhow::Result<()> {
    match tokio::fs::create_dir_all(dir).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists && dir.is_dir() => Ok(()),
        Err(e) => Err(e).with_context(|| format!("Could not create {}", dir.display())),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn job(value: serde_json::Value) -> DownloadJob {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn validation_rejects_unknown_type_and_bad_format() {
        let unknown = ValidatedJob::try_from(job(json!({"type": "video", "metadata": {}})));
        assert!(matches!(unknown, Err(JobError::UnknownType(_))));

        let bad_format = ValidatedJob::try_from(job(json!({
            "type": "track",
            "metadata": {"title": "Foo"},
            "format": "mp3 --exec rm",
        })));
        assert!(matches!(bad_format, Err(JobError::InvalidFormat(_))));

        let bad_metadata =
            ValidatedJob::try_from(job(json!({"type": "track", "metadata": "Foo"})));
        assert!(matches!(bad_metadata, Err(JobError::InvalidMetadata(_))));
    }

    #[test]
    fn validation_normalizes_format_and_callback() {
        let v = ValidatedJob::try_from(job(json!({
            "type": "album",
            "metadata": {"name": "X"},
            "format": " FLAC ",
            "callback_url": "",
        })))
        .unwrap();

        assert_eq!(v.kind, JobKind::Album);
        assert_eq!(v.format, AudioFormat::Flac);
        assert_eq!(v.callback_url, None);
    }

    #[tokio::test]
    async fn ensure_dir_tolerates_existing_and_concurrent() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("a").join("b");

        let (a, b) = tokio::join!(ensure_dir(&dir), ensure_dir(&dir));
        a.unwrap();
        b.unwrap();
        ensure_dir(&dir).await.unwrap();

        assert!(dir.is_dir());
    }

    #[test]
    fn ogg_requests_become_vorbis() {
        let v = ValidatedJob::try_from(job(json!({
            "type": "track",
            "metadata": {"title": "Foo"},
            "format": "ogg",
        })))
        .unwrap();

        assert_eq!(v.format, AudioFormat::Vorbis);
        assert_eq!(v.metadata.file_name(v.format.extension()), "Foo.ogg");
    }

    #[test]
    fn repeated_track_names_are_numbered() {
        let mut names = TrackNames::default();
        let intro: JobMetadata =
            serde_json::from_value(json!({"title": "Intro", "artist": "X"})).unwrap();
        let shouty: JobMetadata =
            serde_json::from_value(json!({"title": "INTRO", "artist": "X"})).unwrap();

        assert_eq!(names.claim(&intro, "mp3"), "Intro - X.mp3");
        assert_eq!(names.claim(&intro, "mp3"), "Intro - X (2).mp3");
        assert_eq!(names.claim(&shouty, "mp3"), "INTRO - X (3).mp3");
        assert_eq!(names.claim(&intro, "flac"), "Intro - X.flac");
    }
}
