use std::{path::PathBuf, str::FromStr, time::Duration};

use anyhow::Context;
use url::Url;

pub const DEFAULT_API_PORT: u16 = 3000;
pub const DEFAULT_WORKER_PORT: u16 = 3001;
pub const DEFAULT_WORKER_URL: &str = "http://127.0.0.1:3001";
pub const DEFAULT_OUTPUT_DIR: &str = "/tmp/media-relay-output";
pub const SPOTIFY_ACCOUNTS_URL: &str = "https://accounts.spotify.com";
pub const SPOTIFY_API_URL: &str = "https://api.spotify.com";
pub const SPOTIFY_MAX_ALBUM_PAGE: u32 = 50;
pub const SPOTIFY_MAX_PLAYLIST_PAGE: u32 = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpotifyConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub accounts_url: String,
    pub api_url: String,
    pub album_page_size: u32,
    pub playlist_page_size: u32,
}
impl SpotifyConfig {
    pub fn credentials(&self) -> Option<(&str, &str)> {
        let id = self.client_id.as_deref().filter(|s| !s.is_empty())?;
        let secret = self.client_secret.as_deref().filter(|s| !s.is_empty())?;

        Some((id, secret))
    }

    pub fn is_configured(&self) -> bool {
        self.credentials().is_some()
    }
}
impl Default for SpotifyConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            accounts_url: SPOTIFY_ACCOUNTS_URL.to_string(),
            api_url: SPOTIFY_API_URL.to_string(),
            album_page_size: SPOTIFY_MAX_ALBUM_PAGE,
            playlist_page_size: SPOTIFY_MAX_PLAYLIST_PAGE,
        }
    }
}

/// External binaries the service shells out to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolsConfig {
    pub ytdlp_bin: PathBuf,
    pub ffmpeg_bin: PathBuf,
}
impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ytdlp_bin: PathBuf::from("yt-dlp"),
            ffmpeg_bin: PathBuf::from("ffmpeg"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub server: ServerConfig,
    pub worker_url: Url,
    pub embed_worker: bool,
    pub spotify: SpotifyConfig,
    pub tools: ToolsConfig,
    pub http_timeout: Duration,
    pub dispatch_timeout: Duration,
    pub output_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub server: ServerConfig,
    pub output_dir: PathBuf,
    pub tools: ToolsConfig,
    pub http_timeout: Duration,
}

impl ApiConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let worker_url = env.get("MEDIA_WORKER_URL");
        let worker_url = worker_url.as_deref().unwrap_or(DEFAULT_WORKER_URL);
        let worker_url = Url::parse(worker_url)
            .with_context(|| format!("MEDIA_WORKER_URL is not a valid URL: {worker_url}"))?;

        Ok(Self {
            server: env.server(DEFAULT_API_PORT)?,
            worker_url,
            embed_worker: env.parse("EMBED_WORKER", false)?,
            spotify: SpotifyConfig {
                client_id: env.get("SPOTIFY_CLIENT_ID"),
                client_secret: env.get("SPOTIFY_CLIENT_SECRET"),
                accounts_url: env
                    .get("SPOTIFY_ACCOUNTS_URL")
                    .unwrap_or_else(|| SPOTIFY_ACCOUNTS_URL.to_string()),
                api_url: env
                    .get("SPOTIFY_API_URL")
                    .unwrap_or_else(|| SPOTIFY_API_URL.to_string()),
                album_page_size: env
                    .parse("SPOTIFY_ALBUM_PAGE_SIZE", SPOTIFY_MAX_ALBUM_PAGE)?
                    .clamp(1, SPOTIFY_MAX_ALBUM_PAGE),
                playlist_page_size: env
                    .parse("SPOTIFY_PLAYLIST_PAGE_SIZE", SPOTIFY_MAX_PLAYLIST_PAGE)?
                    .clamp(1, SPOTIFY_MAX_PLAYLIST_PAGE),
            },
            tools: env.tools(),
            http_timeout: Duration::from_secs(env.parse("HTTP_TIMEOUT_SECS", 15)?),
            dispatch_timeout: Duration::from_secs(env.parse("DISPATCH_TIMEOUT_SECS", 600)?),
            output_dir: env.output_dir(),
        })
    }

    /// Worker settings for running the worker inside the API process.
    pub fn embedded_worker(&self) -> WorkerConfig {
        WorkerConfig {
            server: self.server.clone(),
            output_dir: self.output_dir.clone(),
            tools: self.tools.clone(),
            http_timeout: self.http_timeout,
        }
    }
}

impl WorkerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        Ok(Self {
            server: env.server(DEFAULT_WORKER_PORT)?,
            output_dir: env.output_dir(),
            tools: env.tools(),
            http_timeout: Duration::from_secs(env.parse("HTTP_TIMEOUT_SECS", 15)?),
        })
    }
}

struct Env<F>(F);
impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn parse<T>(&self, key: &str, default: T) -> anyhow::Result<T>
    where
        T: FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        match self.get(key) {
            None => Ok(default),
            Some(raw) => raw
                .parse()
                .with_context(|| format!("Invalid value for {key}: {raw:?}")),
        }
    }

    fn server(&self, default_port: u16) -> anyhow::Result<ServerConfig> {
        Ok(ServerConfig {
            host: self.get("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: self.parse("PORT", default_port)?,
        })
    }

    fn tools(&self) -> ToolsConfig {
        let defaults = ToolsConfig::default();

        ToolsConfig {
            ytdlp_bin: self
                .get("YTDLP_BIN")
                .map_or(defaults.ytdlp_bin, PathBuf::from),
            ffmpeg_bin: self
                .get("FFMPEG_BIN")
                .map_or(defaults.ffmpeg_bin, PathBuf::from),
        }
    }

    fn output_dir(&self) -> PathBuf {
        PathBuf::from(
            self.get("OUTPUT_DIR")
                .unwrap_or_else(|| DEFAULT_OUTPUT_DIR.to_string()),
        )
    }
}
