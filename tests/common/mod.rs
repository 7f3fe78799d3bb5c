#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use media_relay::config::SpotifyConfig;
use serde_json::{json, Value};
use tokio::net::TcpListener;

pub const TOKEN: &str = "test-token";

/// Serves `router` on an ephemeral local port and returns its base URL.
pub async fn serve(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, router).await });

    format!("http://{addr}")
}

/// Stand-in for the Spotify accounts service and Web API.
#[derive(Debug, Clone, Default)]
pub struct MockSpotify {
    pub token_requests: Arc<AtomicUsize>,
    pub api_requests: Arc<AtomicUsize>,
}
impl MockSpotify {
    pub fn token_requests(&self) -> usize {
        self.token_requests.load(Ordering::SeqCst)
    }

    pub fn api_requests(&self) -> usize {
        self.api_requests.load(Ordering::SeqCst)
    }

    /// Starts both servers and returns a config pointing at them.
    pub async fn start(&self) -> SpotifyConfig {
        let accounts = Router::new()
            .route("/api/token", post(token))
            .with_state(self.clone());
        let api = Router::new()
            .route("/v1/tracks/:id", get(track))
            .route("/v1/albums/:id", get(album))
            .route("/v1/albums/:id/tracks", get(album_tracks))
            .route("/v1/playlists/:id", get(playlist))
            .route("/v1/playlists/:id/tracks", get(playlist_tracks))
            .with_state(self.clone());

        SpotifyConfig {
            client_id: Some("client".to_string()),
            client_secret: Some("secret".to_string()),
            accounts_url: serve(accounts).await,
            api_url: serve(api).await,
            ..SpotifyConfig::default()
        }
    }
}

async fn token(State(mock): State<MockSpotify>, headers: HeaderMap) -> (StatusCode, Json<Value>) {
    mock.token_requests.fetch_add(1, Ordering::SeqCst);
    // keep the refresh in flight long enough for concurrent callers to pile up
    tokio::time::sleep(Duration::from_millis(100)).await;

    let basic = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("Basic "));
    if !basic {
        return (StatusCode::UNAUTHORIZED, Json(json!({"error": "invalid_client"})));
    }

    (
        StatusCode::OK,
        Json(json!({"access_token": TOKEN, "token_type": "Bearer", "expires_in": 3600})),
    )
}

fn authorized(mock: &MockSpotify, headers: &HeaderMap) -> Result<(), StatusCode> {
    mock.api_requests.fetch_add(1, Ordering::SeqCst);

    let expected = format!("Bearer {TOKEN}");
    match headers.get("authorization").and_then(|v| v.to_str().ok()) {
        Some(v) if v == expected => Ok(()),
        _ => Err(StatusCode::UNAUTHORIZED),
    }
}

pub fn track_json(id: &str, name: &str, artist: &str, duration_ms: u64) -> Value {
    json!({
        "id": id,
        "name": name,
        "artists": [{"id": format!("artist-{artist}"), "name": artist}],
        "duration_ms": duration_ms,
        "preview_url": format!("https://p.scdn.test/{id}.mp3"),
        "external_urls": {"spotify": format!("https://open.spotify.com/track/{id}")},
        "album": {"images": [{"url": format!("https://i.scdn.test/{id}.jpg")}]},
    })
}

/// Tracks behind album and playlist ids: `n5` has five tracks, anything else
/// has none.
fn listing(id: &str) -> Vec<Value> {
    let count = id.strip_prefix('n').and_then(|n| n.parse().ok()).unwrap_or(0);

    (0..count)
        .map(|i| track_json(&format!("t{i}"), &format!("Track {i}"), &format!("A{}", i % 2), 1000))
        .collect()
}

fn page(items: Vec<Value>, query: &HashMap<String, String>) -> Json<Value> {
    let limit: usize = query.get("limit").and_then(|v| v.parse().ok()).unwrap_or(20);
    let offset: usize = query.get("offset").and_then(|v| v.parse().ok()).unwrap_or(0);
    let total = items.len();
    let next = (offset + limit < total).then(|| format!("next?offset={}", offset + limit));

    Json(json!({
        "items": items.into_iter().skip(offset).take(limit).collect::<Vec<_>>(),
        "next": next,
        "total": total,
    }))
}

async fn track(
    State(mock): State<MockSpotify>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Value>, StatusCode> {
    authorized(&mock, &headers)?;

    Ok(Json(track_json(&id, "Under Pressure", "Queen", 248_000)))
}

async fn album(
    State(mock): State<MockSpotify>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Value>, StatusCode> {
    authorized(&mock, &headers)?;

    Ok(Json(json!({
        "id": id,
        "name": "Greatest Hits",
        "artists": [{"id": "artist-A0", "name": "A0"}],
        "images": [{"url": "https://i.scdn.test/album.jpg"}],
    })))
}

async fn album_tracks(
    State(mock): State<MockSpotify>,
    Path(id): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Result<Json<Value>, StatusCode> {
    authorized(&mock, &headers)?;

    Ok(page(listing(&id), &query))
}

async fn playlist(
    State(mock): State<MockSpotify>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Value>, StatusCode> {
    authorized(&mock, &headers)?;

    Ok(Json(json!({
        "id": id,
        "name": "Road Trip",
        "description": if id == "described" { "Summer songs" } else { "" },
        "images": null,
        "owner": {"display_name": "someone"},
    })))
}

async fn playlist_tracks(
    State(mock): State<MockSpotify>,
    Path(id): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Result<Json<Value>, StatusCode> {
    authorized(&mock, &headers)?;

    // removed tracks show up as null entries
    let mut items: Vec<Value> = listing(&id).into_iter().map(|t| json!({"track": t})).collect();
    items.push(json!({"track": null}));

    Ok(page(items, &query))
}
