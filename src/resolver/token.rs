use std::time::{Duration, Instant};

use anyhow::Context;
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, trace};

/// Tokens are replaced this long before Spotify would reject them.
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Clone)]
struct AccessToken {
    value: String,
    refresh_at: Instant,
}
impl AccessToken {
    fn is_fresh(&self) -> bool {
        Instant::now() < self.refresh_at
    }
}

/// Client-credentials token shared by every Spotify request in the process.
///
/// The lock is held across the refresh, so callers arriving while a refresh
/// is in flight wait for it and reuse its token.
#[derive(Debug)]
pub struct TokenCache {
    client: Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    current: Mutex<Option<AccessToken>>,
}
impl TokenCache {
    pub fn new(
        client: Client,
        accounts_url: &str,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            client,
            token_url: format!("{}/api/token", accounts_url.trim_end_matches('/')),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            current: Mutex::new(None),
        }
    }

    pub async fn access_token(&self) -> anyhow::Result<String> {
        let mut current = self.current.lock().await;

        if let Some(token) = current.as_ref().filter(|t| t.is_fresh()) {
            trace!("Reusing cached Spotify token");
            return Ok(token.value.clone());
        }

        debug!("Requesting new Spotify access token");
        let token = self.request_token().await?;
        let value = token.value.clone();
        *current = Some(token);

        Ok(value)
    }

    async fn request_token(&self) -> anyhow::Result<AccessToken> {
        let issued_at = Instant::now();

        let resp: TokenResponse = self
            .client
            .post(&self.token_url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .context("Could not reach the Spotify accounts service")?
            .error_for_status()
            .context("Spotify rejected the client credentials")?
            .json()
            .await
            .context("Could not parse the Spotify token response")?;

        let lifetime = Duration::from_secs(resp.expires_in).saturating_sub(REFRESH_MARGIN);

        Ok(AccessToken {
            value: resp.access_token,
            refresh_at: issued_at + lifetime,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_lived_tokens_are_never_fresh() {
        let token = AccessToken {
            value: "t".to_string(),
            refresh_at: Instant::now(),
        };

        assert!(!token.is_fresh());
    }

    #[test]
    fn token_url_tolerates_trailing_slash() {
        let cache = TokenCache::new(Client::new(), "http://accounts.test/", "id", "secret");

        assert_eq!(cache.token_url, "http://accounts.test/api/token");
    }
}
