use reqwest::Client;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::model::JobResult;

/// Best-effort delivery of job outcomes to caller-supplied URLs.
#[derive(Debug, Clone)]
pub struct CallbackNotifier {
    client: Client,
}
impl CallbackNotifier {
    pub const fn new(client: Client) -> Self {
        Self { client }
    }

    /// Posts `payload` to `url` once, in the background. Failures are logged
    /// and dropped.
    pub fn notify(&self, url: String, payload: JobResult) -> JoinHandle<()> {
        let client = self.client.clone();

        tokio::spawn(async move {
            let res = client
                .post(&url)
                .json(&payload)
                .send()
                .await
                .and_then(reqwest::Response::error_for_status);

            match res {
                Ok(resp) => debug!(%url, status = %resp.status(), "Callback delivered"),
                Err(e) => warn!(%url, ?e, "Callback delivery failed"),
            }
        })
    }
}
