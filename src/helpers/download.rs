use std::{
    io,
    path::{Path, PathBuf},
};

use anyhow::Context;
use axum::body::Bytes;
use futures::{stream::BoxStream, StreamExt, TryStreamExt};
use reqwest::{header::CONTENT_TYPE, Client, Response};
use tokio::{
    fs,
    io::{AsyncWriteExt, BufWriter},
};
use tracing::{debug, trace};

/// Lazy, finite, non-restartable sequence of body chunks.
pub type ByteStream = BoxStream<'static, io::Result<Bytes>>;

#[tracing::instrument(skip(client))]
pub async fn download_file(
    client: &Client,
    download_path: &Path,
    download_url: &str,
) -> anyhow::Result<PathBuf> {
    let resp = get_file_response(client, download_url).await?;

    write_resp_to_file(resp, download_path).await
}

/// Opens `download_url` and hands back its content type and body stream
/// without buffering it.
#[tracing::instrument(skip(client))]
pub async fn stream_remote(
    client: &Client,
    download_url: &str,
) -> anyhow::Result<(Option<String>, ByteStream)> {
    let resp = get_file_response(client, download_url).await?;
    let content_type = resp
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string);

    let stream = resp.bytes_stream().map_err(io::Error::other).boxed();

    Ok((content_type, stream))
}

async fn get_file_response(client: &Client, download_url: &str) -> anyhow::Result<Response> {
    debug!("Starting download");
    client
        .get(download_url)
        .send()
        .await?
        .error_for_status()
        .map_err(|e| anyhow::anyhow!(e))
}

async fn write_resp_to_file(mut resp: Response, file_path: &Path) -> anyhow::Result<PathBuf> {
    trace!(path = ?file_path, "Writing request response to disk");

    let partial_path = {
        let mut p = file_path.as_os_str().to_os_string();
        p.push(".part");
        PathBuf::from(p)
    };

    {
        let out_file = fs::File::create(&partial_path)
            .await
            .with_context(|| format!("Could not create {}", partial_path.display()))?;
        let mut out_file = BufWriter::new(out_file);

        while let Some(chunk) = resp.chunk().await? {
            out_file.write_all(&chunk).await?;
        }
        out_file.flush().await?;
    }
    trace!("Finished writing to disk");

    trace!(from = ?partial_path, to = ?file_path, "Moving finished download into place");
    fs::rename(&partial_path, file_path).await?;

    debug!("Response written to disk");

    Ok(file_path.to_path_buf())
}
