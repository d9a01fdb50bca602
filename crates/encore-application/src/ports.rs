// SPDX-License-Identifier: GPL-3.0-or-later
//! Seams between the services and the outside world.
//!
//! Services only see these traits, so tests substitute hand-written fakes and
//! the wiring in [`crate::AppState`] decides which clients back them.

use async_trait::async_trait;
use encore_metadata::{
    ArtistSuggestion, CuratedPick, CurationProfile, GeminiClient, GeminiError, LastFmClient,
    LastFmError, UserPlayCounts,
};
use encore_spotify::{
    Album, Artist, CurrentlyPlaying, Device, Result as SpotifyResult, SimplifiedAlbum,
    SimplifiedTrack, SpotifyClient, TokenResponse, Track,
};

/// Catalog, player and OAuth operations of the playback provider.
#[async_trait]
pub trait PlaybackProvider: Send + Sync {
    fn authorize_url(&self, state: &str) -> SpotifyResult<String>;
    async fn exchange_code(&self, code: &str) -> SpotifyResult<TokenResponse>;
    async fn refresh_access_token(&self, refresh_token: &str) -> SpotifyResult<TokenResponse>;

    async fn currently_playing(&self, token: &str) -> SpotifyResult<Option<CurrentlyPlaying>>;
    async fn artist(&self, token: &str, artist_id: &str) -> SpotifyResult<Artist>;
    async fn album(&self, token: &str, album_id: &str) -> SpotifyResult<Album>;
    async fn album_tracks(&self, token: &str, album_id: &str) -> SpotifyResult<Vec<SimplifiedTrack>>;
    async fn artist_top_tracks(&self, token: &str, artist_id: &str) -> SpotifyResult<Vec<Track>>;
    async fn artist_albums(
        &self,
        token: &str,
        artist_id: &str,
        limit: u32,
    ) -> SpotifyResult<Vec<SimplifiedAlbum>>;
    async fn search_artists(&self, token: &str, query: &str, limit: u32) -> SpotifyResult<Vec<Artist>>;
    async fn search_albums(
        &self,
        token: &str,
        query: &str,
        limit: u32,
    ) -> SpotifyResult<Vec<SimplifiedAlbum>>;

    async fn devices(&self, token: &str) -> SpotifyResult<Vec<Device>>;
    async fn play(&self, token: &str, device_id: Option<&str>) -> SpotifyResult<()>;
    async fn pause(&self, token: &str, device_id: Option<&str>) -> SpotifyResult<()>;
    async fn next(&self, token: &str, device_id: Option<&str>) -> SpotifyResult<()>;
    async fn previous(&self, token: &str, device_id: Option<&str>) -> SpotifyResult<()>;
    async fn add_to_queue(&self, token: &str, uri: &str, device_id: Option<&str>) -> SpotifyResult<()>;
    async fn add_to_playlist(&self, token: &str, playlist_id: &str, uris: &[String]) -> SpotifyResult<()>;
}

/// Per-user play counts.
#[async_trait]
pub trait ScrobbleStats: Send + Sync {
    async fn play_counts(
        &self,
        artist: &str,
        album: &str,
        track: &str,
    ) -> Result<UserPlayCounts, LastFmError>;
}

/// Text-generation backed recommendations.
#[async_trait]
pub trait RecommendationGenerator: Send + Sync {
    async fn related_artists(
        &self,
        artist_name: &str,
        count: usize,
    ) -> Result<Vec<ArtistSuggestion>, GeminiError>;
    async fn curate(
        &self,
        profile: &CurationProfile,
        count: usize,
    ) -> Result<Vec<CuratedPick>, GeminiError>;
}

/// [`PlaybackProvider`] over the Spotify Web API, pinned to one market.
#[derive(Clone)]
pub struct SpotifyPlayback {
    client: SpotifyClient,
    market: String,
}

impl SpotifyPlayback {
    pub fn new(client: SpotifyClient, market: impl Into<String>) -> Self {
        Self {
            client,
            market: market.into(),
        }
    }
}

#[async_trait]
impl PlaybackProvider for SpotifyPlayback {
    fn authorize_url(&self, state: &str) -> SpotifyResult<String> {
        self.client.authorize_url(state)
    }

    async fn exchange_code(&self, code: &str) -> SpotifyResult<TokenResponse> {
        self.client.exchange_code(code).await
    }

    async fn refresh_access_token(&self, refresh_token: &str) -> SpotifyResult<TokenResponse> {
        self.client.refresh_access_token(refresh_token).await
    }

    async fn currently_playing(&self, token: &str) -> SpotifyResult<Option<CurrentlyPlaying>> {
        self.client.currently_playing(token, &self.market).await
    }

    async fn artist(&self, token: &str, artist_id: &str) -> SpotifyResult<Artist> {
        self.client.artist(token, artist_id).await
    }

    async fn album(&self, token: &str, album_id: &str) -> SpotifyResult<Album> {
        self.client.album(token, album_id, &self.market).await
    }

    async fn album_tracks(&self, token: &str, album_id: &str) -> SpotifyResult<Vec<SimplifiedTrack>> {
        self.client.album_tracks(token, album_id).await
    }

    async fn artist_top_tracks(&self, token: &str, artist_id: &str) -> SpotifyResult<Vec<Track>> {
        self.client
            .artist_top_tracks(token, artist_id, &self.market)
            .await
    }

    async fn artist_albums(
        &self,
        token: &str,
        artist_id: &str,
        limit: u32,
    ) -> SpotifyResult<Vec<SimplifiedAlbum>> {
        self.client
            .artist_albums(token, artist_id, limit, &self.market)
            .await
    }

    async fn search_artists(&self, token: &str, query: &str, limit: u32) -> SpotifyResult<Vec<Artist>> {
        self.client.search_artists(token, query, limit).await
    }

    async fn search_albums(
        &self,
        token: &str,
        query: &str,
        limit: u32,
    ) -> SpotifyResult<Vec<SimplifiedAlbum>> {
        self.client.search_albums(token, query, limit).await
    }

    async fn devices(&self, token: &str) -> SpotifyResult<Vec<Device>> {
        self.client.devices(token).await
    }

    async fn play(&self, token: &str, device_id: Option<&str>) -> SpotifyResult<()> {
        self.client.play(token, device_id).await
    }

    async fn pause(&self, token: &str, device_id: Option<&str>) -> SpotifyResult<()> {
        self.client.pause(token, device_id).await
    }

    async fn next(&self, token: &str, device_id: Option<&str>) -> SpotifyResult<()> {
        self.client.next(token, device_id).await
    }

    async fn previous(&self, token: &str, device_id: Option<&str>) -> SpotifyResult<()> {
        self.client.previous(token, device_id).await
    }

    async fn add_to_queue(&self, token: &str, uri: &str, device_id: Option<&str>) -> SpotifyResult<()> {
        self.client.add_to_queue(token, uri, device_id).await
    }

    async fn add_to_playlist(&self, token: &str, playlist_id: &str, uris: &[String]) -> SpotifyResult<()> {
        self.client.add_to_playlist(token, playlist_id, uris).await
    }
}

#[async_trait]
impl ScrobbleStats for LastFmClient {
    async fn play_counts(
        &self,
        artist: &str,
        album: &str,
        track: &str,
    ) -> Result<UserPlayCounts, LastFmError> {
        self.user_play_counts(artist, album, track).await
    }
}

#[async_trait]
impl RecommendationGenerator for GeminiClient {
    async fn related_artists(
        &self,
        artist_name: &str,
        count: usize,
    ) -> Result<Vec<ArtistSuggestion>, GeminiError> {
        GeminiClient::related_artists(self, artist_name, count).await
    }

    async fn curate(
        &self,
        profile: &CurationProfile,
        count: usize,
    ) -> Result<Vec<CuratedPick>, GeminiError> {
        GeminiClient::curate(self, profile, count).await
    }
}
