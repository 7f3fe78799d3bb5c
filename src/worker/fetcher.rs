use std::{
    ffi::OsString,
    path::{Path, PathBuf},
    process::Stdio,
};

use anyhow::Context;
use reqwest::Client;
use tokio::process::Command;
use tracing::{debug, trace};

use super::{
    format::AudioFormat,
    metadata::{AudioSource, JobMetadata},
};
use crate::{
    helpers::{download::download_file, temp_dir::TempDir},
    processor::ffmpeg::{last_line, Encoder},
};

/// The external download/transcode capability the worker drives.
#[async_trait::async_trait]
pub trait MediaFetcher: std::fmt::Debug + Send + Sync {
    /// Writes one track to `output` encoded as `format`.
    async fn fetch(
        &self,
        track: &JobMetadata,
        output: &Path,
        format: AudioFormat,
    ) -> anyhow::Result<()>;
}

/// Fetches audio with yt-dlp, or downloads it directly and transcodes it with
/// ffmpeg when the metadata points at a plain audio file.
#[derive(Debug)]
pub struct YtDlpFetcher {
    client: Client,
    ytdlp: PathBuf,
    encoder: Encoder,
}

#[async_trait::async_trait]
impl MediaFetcher for YtDlpFetcher {
    #[tracing::instrument(skip(self, track), fields(title = track.display_title()))]
    async fn fetch(
        &self,
        track: &JobMetadata,
        output: &Path,
        format: AudioFormat,
    ) -> anyhow::Result<()> {
        match track.source() {
            AudioSource::Video(url) => self.ytdlp(&url, output, format).await,
            AudioSource::Search(query) => {
                self.ytdlp(&format!("ytsearch1:{query}"), output, format)
                    .await
            }
            AudioSource::Direct(url) => self.direct(&url, output, format).await,
        }
    }
}

impl YtDlpFetcher {
    pub fn new(client: Client, ytdlp: impl Into<PathBuf>, encoder: Encoder) -> Self {
        Self {
            client,
            ytdlp: ytdlp.into(),
            encoder,
        }
    }

    async fn ytdlp(&self, target: &str, output: &Path, format: AudioFormat) -> anyhow::Result<()> {
        debug!(?target, "Downloading with yt-dlp");

        let template = output_template(output, format.extension());

        let out = Command::new(&self.ytdlp)
            .args(["--no-playlist", "--no-progress", "--no-warnings", "--quiet"])
            .args(["--extract-audio", "--audio-format", format.ytdlp_codec()])
            .args([
                OsString::from("--ffmpeg-location"),
                self.encoder.binary().as_os_str().to_os_string(),
            ])
            .args([OsString::from("--output"), template])
            .arg(target)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("Could not run {}", self.ytdlp.display()))?;

        trace!(status = ?out.status, "yt-dlp command finished");

        if !out.status.success() {
            anyhow::bail!(
                "yt-dlp exited with code {:?}: {}",
                out.status.code(),
                last_line(&out.stderr)
            );
        }

        if !tokio::fs::try_exists(output).await.unwrap_or(false) {
            anyhow::bail!("yt-dlp finished but {} was not written", output.display());
        }

        Ok(())
    }

    async fn direct(&self, url: &str, output: &Path, format: AudioFormat) -> anyhow::Result<()> {
        debug!(?url, "Downloading audio file");

        let parent = output.parent().unwrap_or_else(|| Path::new("."));
        let scratch = TempDir::with_prefix_in(parent, ".media-relay-").await?;

        let source = download_file(&self.client, &scratch.path().join("source"), url).await?;
        self.encoder
            .transcode_file(&source, output, format.ffmpeg_encoder())
            .await
    }
}

/// yt-dlp names its output itself; hand it `{stem}.%(ext)s` so the converted
/// file lands exactly on `output`.
fn output_template(output: &Path, ext: &str) -> OsString {
    let file_name = output
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = file_name
        .strip_suffix(&format!(".{ext}"))
        .unwrap_or(&file_name);

    output.with_file_name(format!("{stem}.%(ext)s")).into_os_string()
}
