// SPDX-License-Identifier: GPL-3.0-or-later

use crate::error::{Result, SpotifyError};
use crate::models::{
    Album, Artist, CurrentlyPlaying, Device, DevicesResponse, ErrorEnvelope, Paging,
    SearchResponse, SimplifiedAlbum, SimplifiedTrack, TokenResponse, TopTracks, Track,
};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, trace};
use url::Url;

const SPOTIFY_API_BASE: &str = "https://api.spotify.com/v1";
const SPOTIFY_ACCOUNTS_BASE: &str = "https://accounts.spotify.com";
const USER_AGENT: &str = concat!("Encore/", env!("CARGO_PKG_VERSION"));
const ALBUM_TRACKS_PAGE: u32 = 50;

/// Scopes requested at login. Player control and playlist writes need the
/// modify scopes; the rest feed the dashboard.
pub const SCOPES: &[&str] = &[
    "user-read-private",
    "user-read-email",
    "user-read-playback-state",
    "user-modify-playback-state",
    "user-read-currently-playing",
    "user-read-recently-played",
    "playlist-modify-public",
    "playlist-modify-private",
    "playlist-read-private",
    "playlist-read-collaborative",
];

/// Spotify Web API client.
#[derive(Debug, Clone)]
pub struct SpotifyClient {
    client: Client,
    api_base_url: String,
    accounts_base_url: String,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
}

impl SpotifyClient {
    pub fn builder() -> SpotifyClientBuilder {
        SpotifyClientBuilder::default()
    }

    /// Authorization URL the browser is redirected to on login.
    pub fn authorize_url(&self, state: &str) -> Result<String> {
        let mut url = self.parse(&format!("{}/authorize", self.accounts_base_url))?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.client_id)
            .append_pair("response_type", "code")
            .append_pair("redirect_uri", &self.redirect_uri)
            .append_pair("scope", &SCOPES.join(" "))
            .append_pair("state", state);
        Ok(url.into())
    }

    /// Exchange an authorization code for an access/refresh token pair.
    pub async fn exchange_code(&self, code: &str) -> Result<TokenResponse> {
        self.token_request(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.redirect_uri.as_str()),
        ])
        .await
    }

    /// Mint a fresh access token from a refresh token.
    pub async fn refresh_access_token(&self, refresh_token: &str) -> Result<TokenResponse> {
        self.token_request(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ])
        .await
    }

    /// The user's current playback. `None` when nothing is playing (204).
    pub async fn currently_playing(
        &self,
        token: &str,
        market: &str,
    ) -> Result<Option<CurrentlyPlaying>> {
        let mut url = self.api_url("/me/player/currently-playing")?;
        url.query_pairs_mut().append_pair("market", market);

        let response = self.send(self.request(Method::GET, url, token)).await?;
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        let body = response.text().await?;
        if body.trim().is_empty() {
            return Ok(None);
        }
        Self::decode(&body).map(Some)
    }

    pub async fn artist(&self, token: &str, artist_id: &str) -> Result<Artist> {
        let url = self.api_url(&format!("/artists/{artist_id}"))?;
        self.get(url, token).await
    }

    pub async fn album(&self, token: &str, album_id: &str, market: &str) -> Result<Album> {
        let mut url = self.api_url(&format!("/albums/{album_id}"))?;
        url.query_pairs_mut().append_pair("market", market);
        self.get(url, token).await
    }

    /// Every track on an album, following pagination.
    pub async fn album_tracks(&self, token: &str, album_id: &str) -> Result<Vec<SimplifiedTrack>> {
        let mut tracks = Vec::new();
        let mut offset = 0u32;
        loop {
            let mut url = self.api_url(&format!("/albums/{album_id}/tracks"))?;
            url.query_pairs_mut()
                .append_pair("limit", &ALBUM_TRACKS_PAGE.to_string())
                .append_pair("offset", &offset.to_string());

            let page: Paging<SimplifiedTrack> = self.get(url, token).await?;
            let fetched = page.items.len() as u32;
            tracks.extend(page.items);
            if page.next.is_none() || fetched == 0 {
                break;
            }
            offset += fetched;
        }
        Ok(tracks)
    }

    pub async fn artist_top_tracks(
        &self,
        token: &str,
        artist_id: &str,
        market: &str,
    ) -> Result<Vec<Track>> {
        let mut url = self.api_url(&format!("/artists/{artist_id}/top-tracks"))?;
        url.query_pairs_mut().append_pair("market", market);
        let top: TopTracks = self.get(url, token).await?;
        Ok(top.tracks)
    }

    /// Studio albums only.
    pub async fn artist_albums(
        &self,
        token: &str,
        artist_id: &str,
        limit: u32,
        market: &str,
    ) -> Result<Vec<SimplifiedAlbum>> {
        let mut url = self.api_url(&format!("/artists/{artist_id}/albums"))?;
        url.query_pairs_mut()
            .append_pair("include_groups", "album")
            .append_pair("limit", &limit.to_string())
            .append_pair("market", market);
        let page: Paging<SimplifiedAlbum> = self.get(url, token).await?;
        Ok(page.items)
    }

    pub async fn search_artists(&self, token: &str, query: &str, limit: u32) -> Result<Vec<Artist>> {
        let response = self.search(token, query, "artist", limit).await?;
        Ok(response.artists.map(|p| p.items).unwrap_or_default())
    }

    pub async fn search_albums(
        &self,
        token: &str,
        query: &str,
        limit: u32,
    ) -> Result<Vec<SimplifiedAlbum>> {
        let response = self.search(token, query, "album", limit).await?;
        Ok(response.albums.map(|p| p.items).unwrap_or_default())
    }

    pub async fn devices(&self, token: &str) -> Result<Vec<Device>> {
        let url = self.api_url("/me/player/devices")?;
        let response: DevicesResponse = self.get(url, token).await?;
        Ok(response.devices)
    }

    pub async fn play(&self, token: &str, device_id: Option<&str>) -> Result<()> {
        self.player(Method::PUT, "/me/player/play", token, device_id, &[])
            .await
    }

    pub async fn pause(&self, token: &str, device_id: Option<&str>) -> Result<()> {
        self.player(Method::PUT, "/me/player/pause", token, device_id, &[])
            .await
    }

    pub async fn next(&self, token: &str, device_id: Option<&str>) -> Result<()> {
        self.player(Method::POST, "/me/player/next", token, device_id, &[])
            .await
    }

    pub async fn previous(&self, token: &str, device_id: Option<&str>) -> Result<()> {
        self.player(Method::POST, "/me/player/previous", token, device_id, &[])
            .await
    }

    pub async fn add_to_queue(&self, token: &str, uri: &str, device_id: Option<&str>) -> Result<()> {
        self.player(
            Method::POST,
            "/me/player/queue",
            token,
            device_id,
            &[("uri", uri)],
        )
        .await
    }

    pub async fn add_to_playlist(&self, token: &str, playlist_id: &str, uris: &[String]) -> Result<()> {
        let url = self.api_url(&format!("/playlists/{playlist_id}/tracks"))?;
        let request = self
            .request(Method::POST, url, token)
            .json(&serde_json::json!({ "uris": uris }));
        self.send(request).await?;
        Ok(())
    }

    async fn search(
        &self,
        token: &str,
        query: &str,
        kind: &str,
        limit: u32,
    ) -> Result<SearchResponse> {
        let mut url = self.api_url("/search")?;
        url.query_pairs_mut()
            .append_pair("q", query)
            .append_pair("type", kind)
            .append_pair("limit", &limit.to_string());
        self.get(url, token).await
    }

    async fn player(
        &self,
        method: Method,
        path: &str,
        token: &str,
        device_id: Option<&str>,
        extra: &[(&str, &str)],
    ) -> Result<()> {
        let mut url = self.api_url(path)?;
        if !extra.is_empty() || device_id.is_some() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in extra {
                pairs.append_pair(key, value);
            }
            if let Some(device_id) = device_id {
                pairs.append_pair("device_id", device_id);
            }
        }
        // Player endpoints reject bodiless PUT/POST without a length.
        let request = self.request(method, url, token).body("");
        self.send(request).await?;
        Ok(())
    }

    async fn token_request(&self, form: &[(&str, &str)]) -> Result<TokenResponse> {
        let url = self.parse(&format!("{}/api/token", self.accounts_base_url))?;
        trace!(target: "spotify", "POST {}", url);
        let request = self
            .client
            .post(url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(form);
        let response = self.send(request).await?;
        let body = response.text().await?;
        Self::decode(&body)
    }

    fn request(&self, method: Method, url: Url, token: &str) -> RequestBuilder {
        trace!(target: "spotify", "{} {}", method, url);
        self.client.request(method, url).bearer_auth(token)
    }

    async fn get<T: DeserializeOwned>(&self, url: Url, token: &str) -> Result<T> {
        let response = self.send(self.request(Method::GET, url, token)).await?;
        let body = response.text().await?;
        trace!(target: "spotify", "response body: {}", body);
        Self::decode(&body)
    }

    /// Send a request and map non-success statuses onto [`SpotifyError`].
    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request.send().await?;
        let status = response.status();
        debug!(target: "spotify", "response status: {}", status);

        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorEnvelope>(&text)
            .map(|e| e.error.message().to_string())
            .unwrap_or_else(|_| {
                if text.is_empty() {
                    status.to_string()
                } else {
                    text
                }
            });

        Err(match status {
            StatusCode::UNAUTHORIZED => SpotifyError::Unauthorized,
            StatusCode::FORBIDDEN => SpotifyError::Forbidden(message),
            StatusCode::NOT_FOUND => SpotifyError::NotFound(message),
            StatusCode::TOO_MANY_REQUESTS => SpotifyError::RateLimitExceeded,
            _ => SpotifyError::ApiError {
                status: status.as_u16(),
                message,
            },
        })
    }

    fn decode<T: DeserializeOwned>(body: &str) -> Result<T> {
        serde_json::from_str(body)
            .map_err(|e| SpotifyError::InvalidResponse(format!("Failed to parse response: {}", e)))
    }

    fn api_url(&self, path: &str) -> Result<Url> {
        self.parse(&format!("{}{}", self.api_base_url, path))
    }

    fn parse(&self, raw: &str) -> Result<Url> {
        Url::parse(raw).map_err(|e| SpotifyError::InvalidResponse(e.to_string()))
    }
}

/// Builder for configuring a Spotify client.
#[derive(Debug)]
pub struct SpotifyClientBuilder {
    api_base_url: String,
    accounts_base_url: String,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    timeout: Duration,
}

impl Default for SpotifyClientBuilder {
    fn default() -> Self {
        Self {
            api_base_url: SPOTIFY_API_BASE.to_string(),
            accounts_base_url: SPOTIFY_ACCOUNTS_BASE.to_string(),
            client_id: String::new(),
            client_secret: String::new(),
            redirect_uri: String::new(),
            timeout: Duration::from_secs(15),
        }
    }
}

impl SpotifyClientBuilder {
    /// Override the Web API base URL (useful for testing with mock servers).
    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Override the accounts service base URL (useful for testing).
    pub fn accounts_base_url(mut self, url: impl Into<String>) -> Self {
        self.accounts_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn credentials(mut self, client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        self.client_id = client_id.into();
        self.client_secret = client_secret.into();
        self
    }

    pub fn redirect_uri(mut self, uri: impl Into<String>) -> Self {
        self.redirect_uri = uri.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn build(self) -> Result<SpotifyClient> {
        let client = Client::builder()
            .timeout(self.timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(SpotifyClient {
            client,
            api_base_url: self.api_base_url,
            accounts_base_url: self.accounts_base_url,
            client_id: self.client_id,
            client_secret: self.client_secret,
            redirect_uri: self.redirect_uri,
        })
    }
}
