use std::time::Duration;

use reqwest::Client;
use serde_json::Value;
use tracing::{debug, info, warn};
use url::Url;

use crate::{error::DispatchError, model::DownloadJob};

/// Hands download jobs to the worker with a single `POST /enqueue`.
///
/// Nothing is queued or retried here: if the worker is not reachable at call
/// time the job is lost and the caller gets the error.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    client: Client,
    worker_base_url: Url,
    timeout: Duration,
}
impl Dispatcher {
    pub const fn new(client: Client, worker_base_url: Url, timeout: Duration) -> Self {
        Self {
            client,
            worker_base_url,
            timeout,
        }
    }

    pub fn enqueue_url(&self) -> String {
        format!(
            "{}/enqueue",
            self.worker_base_url.as_str().trim_end_matches('/')
        )
    }

    /// Returns the worker's response body untouched.
    #[tracing::instrument(skip_all, fields(kind = job.kind.as_deref(), worker = %self.worker_base_url))]
    pub async fn dispatch(&self, job: &DownloadJob) -> Result<Value, DispatchError> {
        job.ensure_present()?;

        debug!("Forwarding job to worker");
        let resp = self
            .client
            .post(self.enqueue_url())
            .timeout(self.timeout)
            .json(job)
            .send()
            .await
            .map_err(|e| {
                warn!(?e, "Worker unreachable");
                DispatchError::Worker(e.to_string())
            })?;

        let status = resp.status();
        let body = resp
            .bytes()
            .await
            .map_err(|e| DispatchError::Worker(e.to_string()))?;

        if !status.is_success() {
            let reason = serde_json::from_slice::<Value>(&body)
                .ok()
                .and_then(|v| v.get("error").and_then(Value::as_str).map(ToString::to_string))
                .unwrap_or_else(|| String::from_utf8_lossy(&body).trim().to_string());

            warn!(%status, %reason, "Worker rejected job");
            return Err(DispatchError::Worker(format!(
                "worker responded with {status}: {reason}"
            )));
        }

        info!(%status, "Job handed to worker");

        serde_json::from_slice(&body)
            .map_err(|e| DispatchError::Worker(format!("worker sent invalid JSON: {e}")))
    }
}
