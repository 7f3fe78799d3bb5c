use std::{
    ffi::OsString,
    io,
    path::{Path, PathBuf},
    process::Stdio,
};

use anyhow::Context;
use futures::{future, stream, StreamExt};
use tokio::process::Command;
use tokio_util::io::ReaderStream;
use tracing::{debug, trace};

use crate::helpers::download::ByteStream;

pub const STREAM_BITRATE: &str = "192k";

#[derive(Debug, Clone)]
pub struct Encoder {
    ffmpeg: PathBuf,
}
impl Encoder {
    pub fn new(ffmpeg: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
        }
    }

    pub fn binary(&self) -> &Path {
        &self.ffmpeg
    }

    /// Re-encodes `input` into `output` with the ffmpeg audio `encoder`; the
    /// container follows the output extension.
    #[tracing::instrument(skip(self))]
    pub async fn transcode_file(
        &self,
        input: &Path,
        output: &Path,
        encoder: &str,
    ) -> anyhow::Result<()> {
        debug!("Transcoding file");

        let out = Command::new(&self.ffmpeg)
            .args(["-hide_banner", "-loglevel", "error", "-y"])
            .args([OsString::from("-i"), input.as_os_str().to_os_string()])
            .args(["-vn", "-c:a", encoder])
            .arg(output)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("Could not run {}", self.ffmpeg.display()))?;

        trace!(status = ?out.status, "Transcode command finished");

        if !out.status.success() {
            anyhow::bail!(
                "ffmpeg exited with code {:?}: {}",
                out.status.code(),
                last_line(&out.stderr)
            );
        }

        Ok(())
    }

    /// Spawns ffmpeg reading `source` and returns its MP3 output as a byte
    /// stream. A non-zero exit shows up as a trailing error item so the HTTP
    /// layer cuts the response short.
    #[tracing::instrument(skip(self))]
    pub fn stream_mp3(&self, source: &str) -> anyhow::Result<ByteStream> {
        debug!("Starting encoder stream");

        let mut child = Command::new(&self.ffmpeg)
            .args(["-hide_banner", "-loglevel", "error", "-i", source])
            .args(["-vn", "-f", "mp3", "-b:a", STREAM_BITRATE, "pipe:1"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Could not run {}", self.ffmpeg.display()))?;

        let stdout = child
            .stdout
            .take()
            .context("ffmpeg stdout was not captured")?;

        let exit = stream::once(async move {
            match child.wait().await {
                Ok(status) if status.success() => None,
                Ok(status) => Some(Err(io::Error::other(format!(
                    "encoder exited with {status}"
                )))),
                Err(e) => Some(Err(e)),
            }
        })
        .filter_map(future::ready);

        Ok(ReaderStream::new(stdout).chain(exit).boxed())
    }
}

pub fn last_line(output: &[u8]) -> String {
    String::from_utf8_lossy(output)
        .lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .unwrap_or("no output")
        .trim()
        .to_string()
}
