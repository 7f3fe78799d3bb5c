mod common;

use std::sync::Arc;

use common::MockSpotify;
use media_relay::{
    config::{SpotifyConfig, ToolsConfig},
    error::ResolveError,
    model::{MediaKind, Provider},
    resolver::MediaResolver,
};
use reqwest::Client;

fn resolver(config: SpotifyConfig) -> MediaResolver {
    MediaResolver::new(Client::new(), config, &ToolsConfig::default())
}

#[tokio::test]
async fn resolves_track() {
    let mock = MockSpotify::default();
    let resolver = resolver(mock.start().await);

    let meta = resolver
        .resolve("https://open.spotify.com/track/abc123?si=xyz")
        .await
        .unwrap();

    assert_eq!(meta.provider, Provider::Spotify);
    assert_eq!(meta.kind, MediaKind::Track);
    assert_eq!(meta.id.as_deref(), Some("abc123"));
    assert_eq!(meta.title.as_deref(), Some("Under Pressure"));
    assert_eq!(meta.artist_line().as_deref(), Some("Queen"));
    assert_eq!(meta.duration_ms, Some(248_000));
    assert_eq!(meta.images, ["https://i.scdn.test/abc123.jpg"]);
    assert_eq!(
        meta.preview_or_stream_url.as_deref(),
        Some("https://p.scdn.test/abc123.mp3")
    );
    assert_eq!(meta.url, "https://open.spotify.com/track/abc123");
}

#[tokio::test]
async fn album_tracks_are_collected_across_pages() {
    let mock = MockSpotify::default();
    let config = SpotifyConfig {
        album_page_size: 2,
        ..mock.start().await
    };
    let resolver = resolver(config);

    let meta = resolver
        .resolve("https://open.spotify.com/album/n5")
        .await
        .unwrap();

    assert_eq!(meta.kind, MediaKind::Album);
    assert_eq!(meta.title.as_deref(), Some("Greatest Hits"));
    assert_eq!(meta.tracks.len(), 5);
    assert_eq!(meta.tracks[4].title.as_deref(), Some("Track 4"));
    assert_eq!(meta.duration_ms, Some(5000));
    // album itself plus three pages of two
    assert_eq!(mock.api_requests(), 4);
    assert_eq!(mock.token_requests(), 1);
}

#[tokio::test]
async fn playlist_skips_removed_tracks() {
    let mock = MockSpotify::default();
    let resolver = resolver(mock.start().await);

    let meta = resolver
        .resolve("https://open.spotify.com/intl-de/playlist/n5")
        .await
        .unwrap();

    assert_eq!(meta.kind, MediaKind::Playlist);
    assert_eq!(meta.title.as_deref(), Some("Road Trip"));
    assert_eq!(meta.description, None);
    assert_eq!(meta.tracks.len(), 5);
    assert_eq!(meta.artist_line().as_deref(), Some("A0, A1"));
    assert!(meta.images.is_empty());
}

#[tokio::test]
async fn playlist_description_is_kept_when_present() {
    let mock = MockSpotify::default();
    let resolver = resolver(mock.start().await);

    let meta = resolver
        .resolve("https://open.spotify.com/playlist/described")
        .await
        .unwrap();

    assert_eq!(meta.description.as_deref(), Some("Summer songs"));
    assert!(meta.tracks.is_empty());
}

#[tokio::test]
async fn empty_album_has_no_tracks() {
    let mock = MockSpotify::default();
    let resolver = resolver(mock.start().await);

    let meta = resolver
        .resolve("https://open.spotify.com/album/empty")
        .await
        .unwrap();

    assert!(meta.tracks.is_empty());
    assert_eq!(meta.duration_ms, None);
}

#[tokio::test]
async fn concurrent_cold_requests_share_one_token() {
    let mock = MockSpotify::default();
    let resolver = Arc::new(resolver(mock.start().await));

    let tasks: Vec<_> = (0..8)
        .map(|i| {
            let resolver = resolver.clone();
            tokio::spawn(async move {
                resolver
                    .resolve(&format!("https://open.spotify.com/track/id{i}"))
                    .await
            })
        })
        .collect();

    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(mock.token_requests(), 1);
    assert_eq!(mock.api_requests(), 8);
}

#[tokio::test]
async fn token_is_reused_between_calls() {
    let mock = MockSpotify::default();
    let resolver = resolver(mock.start().await);

    resolver
        .resolve("https://open.spotify.com/track/a1")
        .await
        .unwrap();
    resolver
        .resolve("https://open.spotify.com/track/a2")
        .await
        .unwrap();

    assert_eq!(mock.token_requests(), 1);
}

#[tokio::test]
async fn unsupported_spotify_paths_are_rejected_before_network() {
    let mock = MockSpotify::default();
    let resolver = resolver(mock.start().await);

    let err = resolver
        .resolve("https://open.spotify.com/artist/abc")
        .await
        .unwrap_err();

    assert!(matches!(err, ResolveError::Unsupported { .. }));
    assert_eq!(mock.token_requests(), 0);
    assert_eq!(mock.api_requests(), 0);
}

#[tokio::test]
async fn rejected_credentials_are_upstream_errors() {
    let config = SpotifyConfig {
        client_id: Some("client".to_string()),
        client_secret: Some("secret".to_string()),
        accounts_url: common::serve(axum::Router::new()).await,
        ..SpotifyConfig::default()
    };

    let err = resolver(config)
        .resolve("https://open.spotify.com/track/abc123")
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ResolveError::Upstream {
            provider: Provider::Spotify,
            ..
        }
    ));
}
