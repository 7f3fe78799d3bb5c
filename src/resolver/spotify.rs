use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize};
use tracing::{debug, trace};
use url::Url;

use super::{token::TokenCache, Resolver};
use crate::{
    config::SpotifyConfig,
    error::ResolveError,
    model::{Artist, MediaKind, Provider, ResolvedMetadata, TrackSummary},
};

const OPEN_URL: &str = "https://open.spotify.com";
static ID_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9]+$").expect("Invalid regex"));

#[derive(Debug, Deserialize)]
struct SpotifyArtist {
    id: Option<String>,
    name: String,
}

#[derive(Debug, Deserialize)]
struct SpotifyImage {
    url: String,
}

#[derive(Debug, Default, Deserialize)]
struct ExternalUrls {
    spotify: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct AlbumRef {
    #[serde(default)]
    images: Vec<SpotifyImage>,
}

#[derive(Debug, Deserialize)]
struct SpotifyTrack {
    id: Option<String>,
    name: String,
    #[serde(default)]
    artists: Vec<SpotifyArtist>,
    duration_ms: Option<u64>,
    preview_url: Option<String>,
    #[serde(default)]
    external_urls: ExternalUrls,
    album: Option<AlbumRef>,
}

#[derive(Debug, Deserialize)]
struct SpotifyAlbum {
    id: String,
    name: String,
    #[serde(default)]
    artists: Vec<SpotifyArtist>,
    #[serde(default)]
    images: Vec<SpotifyImage>,
}

#[derive(Debug, Deserialize)]
struct SpotifyPlaylist {
    id: String,
    name: String,
    description: Option<String>,
    images: Option<Vec<SpotifyImage>>,
}

#[derive(Debug, Deserialize)]
struct PlaylistItem {
    track: Option<SpotifyTrack>,
}

#[derive(Debug, Deserialize)]
struct Page<T> {
    items: Vec<T>,
    next: Option<String>,
    total: usize,
}

#[derive(Debug)]
pub struct SpotifyResolver {
    client: Client,
    config: SpotifyConfig,
    tokens: Option<TokenCache>,
}

#[async_trait::async_trait]
impl Resolver for SpotifyResolver {
    fn provider(&self) -> Provider {
        Provider::Spotify
    }

    #[tracing::instrument(skip(self, url), fields(url = ?url.as_str()))]
    async fn resolve(&self, url: &Url) -> Result<ResolvedMetadata, ResolveError> {
        let (kind, id) = parse_path(url)?;
        debug!(%kind, %id, "Resolving Spotify URL");

        match kind {
            MediaKind::Track => self.track(&id).await,
            MediaKind::Album => self.album(&id).await,
            MediaKind::Playlist => self.playlist(&id).await,
            MediaKind::Page => Err(ResolveError::unsupported(
                Provider::Spotify,
                "pages are not resolvable",
            )),
        }
    }
}

impl SpotifyResolver {
    pub fn new(client: Client, config: SpotifyConfig) -> Self {
        let tokens = config
            .credentials()
            .map(|(id, secret)| TokenCache::new(client.clone(), &config.accounts_url, id, secret));

        Self {
            client,
            config,
            tokens,
        }
    }

    async fn track(&self, id: &str) -> Result<ResolvedMetadata, ResolveError> {
        let track: SpotifyTrack = self.get_json(&format!("/v1/tracks/{id}"), &[]).await?;

        let mut meta = ResolvedMetadata::empty(
            Provider::Spotify,
            MediaKind::Track,
            canonical_url("track", id),
        );
        meta.id = Some(track.id.clone().unwrap_or_else(|| id.to_string()));
        meta.title = Some(track.name);
        meta.artists = convert_artists(track.artists);
        meta.duration_ms = track.duration_ms;
        meta.images = track
            .album
            .unwrap_or_default()
            .images
            .into_iter()
            .map(|i| i.url)
            .collect();
        meta.preview_or_stream_url = track.preview_url;

        Ok(meta)
    }

    async fn album(&self, id: &str) -> Result<ResolvedMetadata, ResolveError> {
        let album: SpotifyAlbum = self.get_json(&format!("/v1/albums/{id}"), &[]).await?;
        let tracks: Vec<SpotifyTrack> = self
            .collect_pages(
                &format!("/v1/albums/{id}/tracks"),
                self.config.album_page_size,
            )
            .await?;
        trace!(count = tracks.len(), "Fetched album tracks");

        let mut meta = ResolvedMetadata::empty(
            Provider::Spotify,
            MediaKind::Album,
            canonical_url("album", &album.id),
        );
        meta.id = Some(album.id);
        meta.title = Some(album.name);
        meta.artists = convert_artists(album.artists);
        meta.images = album.images.into_iter().map(|i| i.url).collect();
        meta.tracks = tracks.into_iter().map(summarize).collect();
        meta.duration_ms = total_duration(&meta.tracks);

        Ok(meta)
    }

    async fn playlist(&self, id: &str) -> Result<ResolvedMetadata, ResolveError> {
        let playlist: SpotifyPlaylist = self.get_json(&format!("/v1/playlists/{id}"), &[]).await?;
        let items: Vec<PlaylistItem> = self
            .collect_pages(
                &format!("/v1/playlists/{id}/tracks"),
                self.config.playlist_page_size,
            )
            .await?;
        trace!(count = items.len(), "Fetched playlist items");

        let tracks: Vec<TrackSummary> = items
            .into_iter()
            .filter_map(|item| item.track)
            .map(summarize)
            .collect();

        let mut meta = ResolvedMetadata::empty(
            Provider::Spotify,
            MediaKind::Playlist,
            canonical_url("playlist", &playlist.id),
        );
        meta.id = Some(playlist.id);
        meta.title = Some(playlist.name);
        meta.description = playlist.description.filter(|d| !d.trim().is_empty());
        meta.images = playlist
            .images
            .unwrap_or_default()
            .into_iter()
            .map(|i| i.url)
            .collect();
        meta.artists = distinct_artists(&tracks);
        meta.duration_ms = total_duration(&tracks);
        meta.tracks = tracks;

        Ok(meta)
    }

    async fn collect_pages<T: DeserializeOwned>(
        &self,
        path: &str,
        page_size: u32,
    ) -> Result<Vec<T>, ResolveError> {
        let mut items = Vec::new();
        let mut offset = 0usize;

        loop {
            let page: Page<T> = self
                .get_json(
                    path,
                    &[
                        ("limit", page_size.to_string()),
                        ("offset", offset.to_string()),
                    ],
                )
                .await?;

            let fetched = page.items.len();
            trace!(offset, fetched, total = page.total, "Fetched page");
            items.extend(page.items);
            offset += fetched;

            if page.next.is_none() || fetched == 0 || offset >= page.total {
                break;
            }
        }

        Ok(items)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ResolveError> {
        let Some(tokens) = &self.tokens else {
            return Err(ResolveError::upstream(
                Provider::Spotify,
                "Spotify client credentials are not configured \
                 (set SPOTIFY_CLIENT_ID and SPOTIFY_CLIENT_SECRET)",
            ));
        };

        let token = tokens
            .access_token()
            .await
            .map_err(|e| ResolveError::upstream(Provider::Spotify, format!("{e:#}")))?;

        let url = format!("{}{path}", self.config.api_url.trim_end_matches('/'));
        trace!(?url, "Spotify API request");

        self.client
            .get(url)
            .bearer_auth(token)
            .query(query)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| ResolveError::upstream(Provider::Spotify, e))?
            .json::<T>()
            .await
            .map_err(|e| ResolveError::upstream(Provider::Spotify, e))
    }
}

/// Reads `{kind}/{id}` from the path, skipping a leading `intl-xx` locale
/// segment.
pub fn parse_path(url: &Url) -> Result<(MediaKind, String), ResolveError> {
    let mut segments = url
        .path_segments()
        .into_iter()
        .flatten()
        .filter(|s| !s.is_empty())
        .peekable();

    if segments.peek().is_some_and(|s| s.starts_with("intl-")) {
        segments.next();
    }

    let kind = match segments.next() {
        Some("track") => MediaKind::Track,
        Some("album") => MediaKind::Album,
        Some("playlist") => MediaKind::Playlist,
        Some(other) => {
            return Err(ResolveError::unsupported(
                Provider::Spotify,
                format!("unsupported type {other:?}"),
            ))
        }
        None => {
            return Err(ResolveError::unsupported(
                Provider::Spotify,
                "URL has no path",
            ))
        }
    };

    match segments.next() {
        Some(id) if ID_REGEX.is_match(id) => Ok((kind, id.to_string())),
        _ => Err(ResolveError::unsupported(
            Provider::Spotify,
            format!("missing or malformed {kind} id"),
        )),
    }
}

fn canonical_url(kind: &str, id: &str) -> String {
    format!("{OPEN_URL}/{kind}/{id}")
}

fn convert_artists(artists: Vec<SpotifyArtist>) -> Vec<Artist> {
    artists
        .into_iter()
        .map(|a| Artist {
            id: a.id,
            name: a.name,
        })
        .collect()
}

fn summarize(track: SpotifyTrack) -> TrackSummary {
    TrackSummary {
        url: track
            .external_urls
            .spotify
            .or_else(|| track.id.as_deref().map(|id| canonical_url("track", id))),
        id: track.id,
        title: Some(track.name),
        artists: convert_artists(track.artists),
        duration_ms: track.duration_ms,
        preview_or_stream_url: track.preview_url,
    }
}

fn total_duration(tracks: &[TrackSummary]) -> Option<u64> {
    if tracks.is_empty() {
        return None;
    }

    Some(tracks.iter().filter_map(|t| t.duration_ms).sum())
}

/// Artists across all tracks in order of first appearance.
fn distinct_artists(tracks: &[TrackSummary]) -> Vec<Artist> {
    let mut seen: Vec<Artist> = Vec::new();

    for artist in tracks.iter().flat_map(|t| &t.artists) {
        let duplicate = seen.iter().any(|s| match (&s.id, &artist.id) {
            (Some(a), Some(b)) => a == b,
            _ => s.name == artist.name,
        });

        if !duplicate {
            seen.push(artist.clone());
        }
    }

    seen
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(url: &str) -> Result<(MediaKind, String), ResolveError> {
        parse_path(&Url::parse(url).unwrap())
    }

    #[test]
    fn parses_kinds() {
        assert_eq!(
            parse("https://open.spotify.com/track/abc123").unwrap(),
            (MediaKind::Track, "abc123".to_string())
        );
        assert_eq!(
            parse("https://open.spotify.com/album/XyZ?si=foo").unwrap(),
            (MediaKind::Album, "XyZ".to_string())
        );
        assert_eq!(
            parse("https://open.spotify.com/intl-de/playlist/37i9dQ/").unwrap(),
            (MediaKind::Playlist, "37i9dQ".to_string())
        );
    }

    #[test]
    fn rejects_other_types() {
        let err = parse("https://open.spotify.com/artist/abc").unwrap_err();

        assert!(matches!(
            err,
            ResolveError::Unsupported {
                provider: Provider::Spotify,
                ..
            }
        ));
        assert!(parse("https://open.spotify.com/").is_err());
        assert!(parse("https://open.spotify.com/track/").is_err());
        assert!(parse("https://open.spotify.com/track/a-b").is_err());
    }

    #[test]
    fn distinct_artists_keep_first_seen_order() {
        let artist = |id: &str, name: &str| Artist {
            id: Some(id.to_string()),
            name: name.to_string(),
        };
        let track = |artists: Vec<Artist>| TrackSummary {
            id: None,
            title: None,
            artists,
            duration_ms: Some(1000),
            preview_or_stream_url: None,
            url: None,
        };

        let tracks = vec![
            track(vec![artist("b", "Beta"), artist("a", "Alpha")]),
            track(vec![artist("a", "Alpha"), artist("c", "Gamma")]),
        ];

        let names: Vec<_> = distinct_artists(&tracks)
            .into_iter()
            .map(|a| a.name)
            .collect();

        assert_eq!(names, ["Beta", "Alpha", "Gamma"]);
        assert_eq!(total_duration(&tracks), Some(2000));
        assert_eq!(total_duration(&[]), None);
    }

    #[tokio::test]
    async fn missing_credentials_fail_without_network() {
        let resolver = SpotifyResolver::new(
            Client::new(),
            SpotifyConfig {
                api_url: "http://127.0.0.1:9".to_string(),
                ..SpotifyConfig::default()
            },
        );

        let err = resolver
            .resolve(&Url::parse("https://open.spotify.com/track/abc123").unwrap())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ResolveError::Upstream {
                provider: Provider::Spotify,
                ref message,
            } if message.contains("credentials")
        ));
    }
}
