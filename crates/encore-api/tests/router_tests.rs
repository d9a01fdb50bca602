// SPDX-License-Identifier: GPL-3.0-or-later
use axum::body::Body;
use axum::http::{header, HeaderMap, Request, StatusCode};
use axum::Router;
use encore_api::router;
use encore_application::AppState;
use encore_config::AppConfig;
use encore_infrastructure::open_library_store;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{body_string_contains, header as header_is, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn app(server: &MockServer) -> Router {
    let mut config = AppConfig::default();
    config.database.url = "sqlite::memory:".into();
    config.database.pool_max_size = 1;
    config.spotify.client_id = "client-id".into();
    config.spotify.client_secret = "client-secret".into();
    config.spotify.redirect_uri = "http://127.0.0.1:3000/auth/callback".into();
    config.spotify.api_base_url = Some(format!("{}/v1", server.uri()));
    config.spotify.accounts_base_url = Some(server.uri());
    config.gemini.api_key = Some("test-key".into());
    config.gemini.base_url = Some(server.uri());

    let store = open_library_store(&config).await.unwrap();
    router(AppState::from_config(config, store).unwrap())
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, HeaderMap, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, headers, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

fn get_with_cookie(uri: &str, cookie: &str) -> Request<Body> {
    Request::get(uri)
        .header(header::COOKIE, cookie)
        .body(Body::empty())
        .unwrap()
}

fn post(uri: &str, body: Value, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::post(uri).header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn set_cookies(headers: &HeaderMap) -> Vec<String> {
    headers
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect()
}

fn track_json() -> Value {
    json!({
        "type": "track",
        "id": "t1",
        "name": "Say It Ain't So",
        "uri": "spotify:track:t1",
        "duration_ms": 258000,
        "popularity": 70,
        "external_urls": { "spotify": "https://open.spotify.com/track/t1" },
        "artists": [{ "id": "ar1", "name": "Weezer" }],
        "album": {
            "id": "al1",
            "name": "Weezer",
            "album_type": "album",
            "release_date": "1994-05-10",
            "total_tracks": 10,
            "images": [{ "url": "https://img/blue", "height": 640, "width": 640 }],
            "external_urls": { "spotify": "https://open.spotify.com/album/al1" }
        }
    })
}

#[tokio::test]
async fn health_reports_ok() {
    let server = MockServer::start().await;
    let (status, _, body) = send(&app(&server).await, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "ok" }));
}

#[tokio::test]
async fn openapi_document_lists_player_routes() {
    let server = MockServer::start().await;
    let (status, _, body) = send(&app(&server).await, get("/api-doc/openapi.json")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["paths"]["/api/v1/player/now-playing"].is_object());
    assert!(body["paths"]["/api/v1/curator/generate"].is_object());
}

#[tokio::test]
async fn now_playing_without_credentials_is_unauthorized() {
    let server = MockServer::start().await;
    let (status, _, body) = send(&app(&server).await, get("/api/v1/player/now-playing")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({ "is_playing": false, "message": "Not authenticated" }));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn minimal_now_playing_reads_the_cookie_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/me/player/currently-playing"))
        .and(header_is("authorization", "Bearer cookie-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "is_playing": true,
            "progress_ms": 1000,
            "item": track_json()
        })))
        .mount(&server)
        .await;

    let (status, _, body) = send(
        &app(&server).await,
        get_with_cookie(
            "/api/v1/player/now-playing?minimal=true",
            "spotify_access_token=cookie-token",
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Say It Ain't So");
    assert_eq!(body["album_id"], "al1");
    assert_eq!(body["progress_ms"], 1000);
    assert_eq!(body.as_object().unwrap().len(), 9);
}

#[tokio::test]
async fn refresh_cookie_mints_an_access_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "fresh-token",
            "token_type": "Bearer",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/me/player/currently-playing"))
        .and(header_is("authorization", "Bearer fresh-token"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let (status, _, body) = send(
        &app(&server).await,
        get_with_cookie("/api/v1/player/now-playing", "spotify_refresh_token=r1"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "is_playing": false }));
}

#[tokio::test]
async fn unreachable_provider_reports_failed_fetch() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/me/player/currently-playing"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let (status, _, body) = send(
        &app(&server).await,
        get_with_cookie("/api/v1/player/now-playing", "spotify_access_token=tok"),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "is_playing": false, "error": "Failed to fetch" }));
}

#[tokio::test]
async fn invalid_action_is_rejected_before_any_upstream_call() {
    let server = MockServer::start().await;
    let (status, _, body) = send(
        &app(&server).await,
        post("/api/v1/player/control", json!({ "action": "rewind" }), Some("tok")),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "success": false, "error": "Invalid action", "action_required": false }));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn control_without_credentials_is_unauthorized() {
    let server = MockServer::start().await;
    let (status, _, body) = send(
        &app(&server).await,
        post("/api/v1/player/control", json!({ "action": "next" }), None),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
    assert_eq!(body["action_required"], true);
}

#[tokio::test]
async fn restricted_play_returns_guidance() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/me/player/devices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "devices": [] })))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/v1/me/player/play"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": { "status": 403, "message": "Player command failed: Restriction violated" }
        })))
        .mount(&server)
        .await;

    let (status, _, body) = send(
        &app(&server).await,
        post("/api/v1/player/control", json!({ "action": "play" }), Some("tok")),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["error"].as_str().unwrap().contains("Private Session"));
}

#[tokio::test]
async fn control_targets_the_active_device() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/me/player/devices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "devices": [{ "id": "desk", "name": "Desk", "is_active": true, "type": "Computer" }]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/me/player/next"))
        .and(wiremock::matchers::query_param("device_id", "desk"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let (status, _, body) = send(
        &app(&server).await,
        post("/api/v1/player/control", json!({ "action": "Next" }), Some("tok")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "success": true }));
}

#[tokio::test]
async fn queue_without_device_is_reported_distinctly() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/me/player/queue"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": { "status": 404, "message": "Player command failed: No active device found" }
        })))
        .mount(&server)
        .await;

    let app = app(&server).await;
    let (status, _, body) = send(
        &app,
        post("/api/v1/player/queue", json!({ "uri": "spotify:track:t9" }), Some("tok")),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().starts_with("No active Spotify device"));
    assert_eq!(body["action_required"], true);

    let (status, _, body) = send(&app, post("/api/v1/player/queue", json!({}), Some("tok"))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Missing track URI");
}

#[tokio::test]
async fn rating_adds_then_updates() {
    let server = MockServer::start().await;
    let app = app(&server).await;
    let track = json!({
        "id": "t1",
        "name": "Say It Ain't So",
        "uri": "spotify:track:t1",
        "artist": "Weezer",
        "artist_id": "ar1",
        "album": "Weezer",
        "album_id": "al1"
    });

    let (status, _, body) = send(
        &app,
        post("/api/v1/player/rate", json!({ "track": track, "rating": 5 }), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "success": true, "status": "added", "playlist": "skipped" }));

    let (_, _, body) = send(
        &app,
        post("/api/v1/player/rate", json!({ "track": track, "rating": 4 }), None),
    )
    .await;
    assert_eq!(body["status"], "updated");
}

#[tokio::test]
async fn rating_requires_track_and_valid_value() {
    let server = MockServer::start().await;
    let app = app(&server).await;

    let (status, _, body) = send(&app, post("/api/v1/player/rate", json!({ "rating": 3 }), None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Missing track or rating");

    let (status, _, _) = send(
        &app,
        post(
            "/api/v1/player/rate",
            json!({ "track": { "id": "t1", "name": "x" }, "rating": 9 }),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn save_album_requires_an_id() {
    let server = MockServer::start().await;
    let (status, _, body) = send(
        &app(&server).await,
        post("/api/v1/player/save-album", json!({ "album_id": "" }), Some("tok")),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Missing Album ID");
}

#[tokio::test]
async fn related_artists_are_generated_then_cached() {
    let server = MockServer::start().await;
    let text = "```json\n[\
        {\"name\": \"Ozma\", \"reason\": \"power pop kin\"},\
        {\"name\": \"The Rentals\", \"reason\": \"shared bassist\"},\
        {\"name\": \"Weezer\", \"reason\": \"itself\"}\
    ]\n```";
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-2.0-flash:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{ "content": { "parts": [{ "text": text }], "role": "model" } }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let app = app(&server).await;
    let (status, _, body) = send(&app, get("/api/v1/player/related-artists?artist=Weezer")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["source"], "generated");
    let names: Vec<&str> = body["artists"]
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Ozma", "The Rentals"]);

    let (_, _, body) = send(&app, get("/api/v1/player/related-artists?artist=weezer")).await;
    assert_eq!(body["source"], "cache");
    assert_eq!(body["artists"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn related_artists_require_a_name() {
    let server = MockServer::start().await;
    let (status, _, body) =
        send(&app(&server).await, get("/api/v1/player/related-artists?artist=%20")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "success": false, "error": "Artist name is required", "action_required": false }));
}

#[tokio::test]
async fn unknown_artists_are_not_found() {
    let server = MockServer::start().await;
    let app = app(&server).await;

    let (status, _, body) = send(&app, get("/api/v1/artists/missing")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Artist not found");

    let (status, _, body) = send(
        &app,
        post("/api/v1/artists/related/save", json!({ "source_artist_id": "missing" }), None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Source artist not found");

    let (status, _, _) = send(&app, post("/api/v1/artists/related/save", json!({}), None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn curator_rejects_unknown_genres() {
    let server = MockServer::start().await;
    let (status, _, body) = send(
        &app(&server).await,
        post("/api/v1/curator/generate", json!({ "genre": "polka" }), None),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid genre");
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn login_redirects_with_state_cookie() {
    let server = MockServer::start().await;
    let (status, headers, _) = send(&app(&server).await, get("/auth/login")).await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    let location = headers[header::LOCATION].to_str().unwrap();
    assert!(location.starts_with(&format!("{}/authorize", server.uri())));
    assert!(location.contains("client_id=client-id"));
    let cookies = set_cookies(&headers);
    assert!(cookies[0].starts_with("spotify_auth_state="));
    assert!(cookies[0].contains("HttpOnly"));
}

#[tokio::test]
async fn callback_stores_tokens_in_cookies() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/token"))
        .and(body_string_contains("code=abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "acc",
            "token_type": "Bearer",
            "expires_in": 1800,
            "refresh_token": "ref"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (status, headers, _) = send(
        &app(&server).await,
        get_with_cookie("/auth/callback?code=abc&state=s1", "spotify_auth_state=s1"),
    )
    .await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(headers[header::LOCATION], "/");
    let cookies = set_cookies(&headers);
    assert!(cookies
        .iter()
        .any(|c| c.starts_with("spotify_access_token=acc;") && c.contains("Max-Age=1800")));
    assert!(cookies.iter().any(|c| c.starts_with("spotify_refresh_token=ref;")));
    assert!(cookies
        .iter()
        .filter(|c| c.starts_with("spotify_access_token="))
        .all(|c| c.contains("HttpOnly") && c.contains("SameSite=Lax") && c.contains("Path=/")));
    // the one-shot state cookie is expired once used
    assert!(cookies
        .iter()
        .any(|c| c.starts_with("spotify_auth_state=;") && c.contains("Max-Age=0")));
}

#[tokio::test]
async fn callback_rejects_missing_code_and_state_mismatch() {
    let server = MockServer::start().await;
    let app = app(&server).await;

    let (status, _, body) = send(&app, get("/auth/callback")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Missing code");

    let (status, _, body) = send(
        &app,
        get_with_cookie("/auth/callback?code=abc&state=forged", "spotify_auth_state=s1"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "State mismatch");
    assert!(server.received_requests().await.unwrap().is_empty());
}
