mod generic;
mod spotify;
mod token;
mod youtube;

use reqwest::Client;
use tracing::info;
use url::Url;

pub use generic::GenericResolver;
pub use spotify::SpotifyResolver;
pub use youtube::{best_audio_format, video_id, EncodedFormat, YouTubeResolver};

use crate::{
    config::{SpotifyConfig, ToolsConfig},
    error::ResolveError,
    helpers::domain::DomainParser,
    model::{Provider, ResolvedMetadata},
};

#[async_trait::async_trait]
pub trait Resolver: std::fmt::Debug + Send + Sync {
    fn provider(&self) -> Provider;

    async fn resolve(&self, url: &Url) -> Result<ResolvedMetadata, ResolveError>;
}

/// Classifies a raw URL by host. Unparseable input is [`Provider::Invalid`].
pub fn classify(raw_url: &str) -> Provider {
    Url::parse(raw_url.trim()).map_or(Provider::Invalid, |url| classify_url(&url))
}

pub fn classify_url(url: &Url) -> Provider {
    let Some(host) = DomainParser::normalized_host(url) else {
        return Provider::Generic;
    };

    if host.contains("spotify.com") {
        Provider::Spotify
    } else if host.contains("youtube.com") || host.contains("youtu.be") {
        Provider::YouTube
    } else {
        Provider::Generic
    }
}

/// Entry point for resolution: classifies the URL and hands it to the
/// matching provider.
#[derive(Debug)]
pub struct MediaResolver {
    spotify: SpotifyResolver,
    youtube: YouTubeResolver,
    generic: GenericResolver,
}
impl MediaResolver {
    pub fn new(client: Client, spotify: SpotifyConfig, tools: &ToolsConfig) -> Self {
        Self {
            spotify: SpotifyResolver::new(client.clone(), spotify),
            youtube: YouTubeResolver::new(tools.ytdlp_bin.clone()),
            generic: GenericResolver::new(client),
        }
    }

    fn handler(&self, provider: Provider) -> Option<&dyn Resolver> {
        match provider {
            Provider::Spotify => Some(&self.spotify),
            Provider::YouTube => Some(&self.youtube),
            Provider::Generic => Some(&self.generic),
            Provider::Invalid => None,
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn resolve(&self, raw_url: &str) -> Result<ResolvedMetadata, ResolveError> {
        let url = Url::parse(raw_url.trim()).map_err(|e| ResolveError::Invalid(e.to_string()))?;
        let provider = classify_url(&url);

        let Some(handler) = self.handler(provider) else {
            return Err(ResolveError::Invalid(raw_url.to_string()));
        };

        info!(%provider, "Resolving URL");
        handler.resolve(&url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_by_host() {
        let cases = [
            ("https://open.spotify.com/track/abc123", Provider::Spotify),
            ("https://SPOTIFY.COM/album/x", Provider::Spotify),
            ("https://www.youtube.com/watch?v=dQw4w9WgXcQ", Provider::YouTube),
            ("https://music.youtube.com/watch?v=x", Provider::YouTube),
            ("https://youtu.be/dQw4w9WgXcQ", Provider::YouTube),
            ("https://www.youtu.be/x", Provider::YouTube),
            ("https://example.com/page", Provider::Generic),
            ("http://127.0.0.1:8080/song.mp3", Provider::Generic),
            ("not a url", Provider::Invalid),
            ("", Provider::Invalid),
            ("/relative/path", Provider::Invalid),
        ];

        for (url, expected) in cases {
            assert_eq!(classify(url), expected, "{url}");
        }
    }

    #[tokio::test]
    async fn invalid_urls_fail_without_network() {
        let resolver = MediaResolver::new(
            Client::new(),
            SpotifyConfig::default(),
            &ToolsConfig::default(),
        );

        let err = resolver.resolve("::nope::").await.unwrap_err();

        assert!(matches!(err, ResolveError::Invalid(_)));
        assert_eq!(err.provider(), Provider::Invalid);
    }
}
