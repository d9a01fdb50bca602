// SPDX-License-Identifier: GPL-3.0-or-later
//! Hand-written fakes of the ports plus an in-memory SQLite store.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use encore_config::AppConfig;
use encore_infrastructure::{init_database, SqliteLibraryStore};
use encore_metadata::{
    ArtistSuggestion, CuratedPick, CurationProfile, GeminiError, LastFmError, UserPlayCounts,
};
use encore_spotify::{
    Album, Artist, CurrentlyPlaying, Device, Result as SpotifyResult, SimplifiedAlbum,
    SimplifiedTrack, SpotifyError, TokenResponse, Track,
};
use serde_json::json;

use crate::ports::{PlaybackProvider, RecommendationGenerator, ScrobbleStats};

pub async fn memory_store() -> Arc<SqliteLibraryStore> {
    let mut config = AppConfig::default();
    config.database.url = "sqlite::memory:".into();
    config.database.pool_max_size = 1;
    let pool = init_database(&config).await.unwrap();
    Arc::new(SqliteLibraryStore::new(pool))
}

pub fn track(id: &str, name: &str, album_id: &str, total_tracks: u32) -> Track {
    serde_json::from_value(json!({
        "id": id,
        "name": name,
        "uri": format!("spotify:track:{id}"),
        "duration_ms": 200_000,
        "popularity": 50,
        "external_urls": { "spotify": format!("https://open.spotify.com/track/{id}") },
        "artists": [{ "id": "ar1", "name": "Weezer" }],
        "album": {
            "id": album_id,
            "name": "Pinkerton",
            "album_type": "album",
            "release_date": "1996-09-24",
            "total_tracks": total_tracks,
            "images": [{ "url": "https://img/pinkerton" }],
            "artists": [{ "id": "ar1", "name": "Weezer" }]
        }
    }))
    .unwrap()
}

pub fn playing(track: Track, progress_ms: u64) -> CurrentlyPlaying {
    let mut item = serde_json::to_value(track).unwrap();
    item["type"] = json!("track");
    serde_json::from_value(json!({
        "is_playing": true,
        "progress_ms": progress_ms,
        "item": item
    }))
    .unwrap()
}

pub fn album_tracks(album_id: &str, count: usize) -> Vec<SimplifiedTrack> {
    (1..=count)
        .map(|n| {
            serde_json::from_value(json!({
                "id": format!("{album_id}-t{n}"),
                "name": format!("Track {n}"),
                "uri": format!("spotify:track:{album_id}-t{n}"),
                "track_number": n
            }))
            .unwrap()
        })
        .collect()
}

pub fn catalog_artist(id: &str, name: &str, genres: &[&str]) -> Artist {
    serde_json::from_value(json!({
        "id": id,
        "name": name,
        "genres": genres,
        "images": [{ "url": format!("https://img/{id}") }],
        "external_urls": { "spotify": format!("https://open.spotify.com/artist/{id}") }
    }))
    .unwrap()
}

pub fn catalog_album(id: &str, name: &str, total_tracks: u32) -> Album {
    serde_json::from_value(json!({
        "id": id,
        "name": name,
        "album_type": "album",
        "total_tracks": total_tracks,
        "images": [{ "url": format!("https://img/{id}") }],
        "external_urls": { "spotify": format!("https://open.spotify.com/album/{id}") },
        "artists": [{ "id": "ar1", "name": "Weezer" }]
    }))
    .unwrap()
}

pub fn simplified_album(id: &str, name: &str) -> SimplifiedAlbum {
    serde_json::from_value(json!({
        "id": id,
        "name": name,
        "release_date": "2001-05-15",
        "total_tracks": 10,
        "images": [{ "url": format!("https://img/{id}") }]
    }))
    .unwrap()
}

pub fn device(id: &str, active: bool) -> Device {
    serde_json::from_value(json!({ "id": id, "name": "Desk", "is_active": active, "type": "Computer" }))
        .unwrap()
}

fn status_error(status: u16) -> SpotifyError {
    match status {
        401 => SpotifyError::Unauthorized,
        403 => SpotifyError::Forbidden("restricted".into()),
        404 => SpotifyError::NotFound("not found".into()),
        429 => SpotifyError::RateLimitExceeded,
        status => SpotifyError::ApiError {
            status,
            message: "boom".into(),
        },
    }
}

/// Scriptable playback provider. Every call is logged by name; calls whose
/// name appears in `failures` return the mapped status error.
#[derive(Default)]
pub struct FakeProvider {
    pub playing: Mutex<Option<CurrentlyPlaying>>,
    pub artists: Mutex<HashMap<String, Artist>>,
    pub albums: Mutex<HashMap<String, Album>>,
    pub tracks: Mutex<HashMap<String, Vec<SimplifiedTrack>>>,
    pub top_tracks: Mutex<Vec<Track>>,
    pub discography: Mutex<Vec<SimplifiedAlbum>>,
    /// Lower-cased query to artist hit.
    pub artist_hits: Mutex<HashMap<String, Artist>>,
    pub album_hits: Mutex<HashMap<String, SimplifiedAlbum>>,
    pub devices: Mutex<Vec<Device>>,
    pub failures: Mutex<HashMap<String, u16>>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeProvider {
    pub fn fail(&self, call: &str, status: u16) {
        self.failures.lock().unwrap().insert(call.to_string(), status);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn called(&self, call: &str) -> bool {
        self.calls().iter().any(|c| c == call)
    }

    fn record(&self, call: String) -> SpotifyResult<()> {
        self.calls.lock().unwrap().push(call.clone());
        match self.failures.lock().unwrap().get(&call) {
            Some(status) => Err(status_error(*status)),
            None => Ok(()),
        }
    }

    fn player_call(&self, name: &str, device_id: Option<&str>) -> SpotifyResult<()> {
        self.record(format!("{name}:{}", device_id.unwrap_or("-")))
    }
}

#[async_trait]
impl PlaybackProvider for FakeProvider {
    fn authorize_url(&self, state: &str) -> SpotifyResult<String> {
        Ok(format!("https://accounts.test/authorize?state={state}"))
    }

    async fn exchange_code(&self, code: &str) -> SpotifyResult<TokenResponse> {
        self.record(format!("exchange:{code}"))?;
        Ok(TokenResponse {
            access_token: format!("access-{code}"),
            token_type: Some("Bearer".into()),
            expires_in: Some(3600),
            refresh_token: Some(format!("refresh-{code}")),
            scope: None,
        })
    }

    async fn refresh_access_token(&self, refresh_token: &str) -> SpotifyResult<TokenResponse> {
        self.record(format!("refresh:{refresh_token}"))?;
        Ok(TokenResponse {
            access_token: "refreshed-token".into(),
            token_type: Some("Bearer".into()),
            expires_in: Some(3600),
            refresh_token: None,
            scope: None,
        })
    }

    async fn currently_playing(&self, _token: &str) -> SpotifyResult<Option<CurrentlyPlaying>> {
        self.record("currently_playing".into())?;
        Ok(self.playing.lock().unwrap().clone())
    }

    async fn artist(&self, _token: &str, artist_id: &str) -> SpotifyResult<Artist> {
        self.record("artist".into())?;
        self.artists
            .lock()
            .unwrap()
            .get(artist_id)
            .cloned()
            .ok_or_else(|| status_error(404))
    }

    async fn album(&self, _token: &str, album_id: &str) -> SpotifyResult<Album> {
        self.record("album".into())?;
        self.albums
            .lock()
            .unwrap()
            .get(album_id)
            .cloned()
            .ok_or_else(|| status_error(404))
    }

    async fn album_tracks(&self, _token: &str, album_id: &str) -> SpotifyResult<Vec<SimplifiedTrack>> {
        self.record("album_tracks".into())?;
        Ok(self
            .tracks
            .lock()
            .unwrap()
            .get(album_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn artist_top_tracks(&self, _token: &str, _artist_id: &str) -> SpotifyResult<Vec<Track>> {
        self.record("artist_top_tracks".into())?;
        Ok(self.top_tracks.lock().unwrap().clone())
    }

    async fn artist_albums(
        &self,
        _token: &str,
        _artist_id: &str,
        limit: u32,
    ) -> SpotifyResult<Vec<SimplifiedAlbum>> {
        self.record("artist_albums".into())?;
        let mut albums = self.discography.lock().unwrap().clone();
        albums.truncate(limit as usize);
        Ok(albums)
    }

    async fn search_artists(&self, _token: &str, query: &str, limit: u32) -> SpotifyResult<Vec<Artist>> {
        self.record(format!("search_artists:{query}"))?;
        let hit = self
            .artist_hits
            .lock()
            .unwrap()
            .get(&query.to_lowercase())
            .cloned();
        Ok(hit.into_iter().take(limit as usize).collect())
    }

    async fn search_albums(
        &self,
        _token: &str,
        query: &str,
        limit: u32,
    ) -> SpotifyResult<Vec<SimplifiedAlbum>> {
        self.record(format!("search_albums:{query}"))?;
        let hit = self
            .album_hits
            .lock()
            .unwrap()
            .get(&query.to_lowercase())
            .cloned();
        Ok(hit.into_iter().take(limit as usize).collect())
    }

    async fn devices(&self, _token: &str) -> SpotifyResult<Vec<Device>> {
        self.record("devices".into())?;
        Ok(self.devices.lock().unwrap().clone())
    }

    async fn play(&self, _token: &str, device_id: Option<&str>) -> SpotifyResult<()> {
        self.player_call("play", device_id)
    }

    async fn pause(&self, _token: &str, device_id: Option<&str>) -> SpotifyResult<()> {
        self.player_call("pause", device_id)
    }

    async fn next(&self, _token: &str, device_id: Option<&str>) -> SpotifyResult<()> {
        self.player_call("next", device_id)
    }

    async fn previous(&self, _token: &str, device_id: Option<&str>) -> SpotifyResult<()> {
        self.player_call("previous", device_id)
    }

    async fn add_to_queue(&self, _token: &str, uri: &str, device_id: Option<&str>) -> SpotifyResult<()> {
        self.record(format!("queue:{uri}:{}", device_id.unwrap_or("-")))
    }

    async fn add_to_playlist(&self, _token: &str, playlist_id: &str, uris: &[String]) -> SpotifyResult<()> {
        self.record(format!("playlist:{playlist_id}:{}", uris.join(",")))
    }
}

/// Stats provider that either answers with fixed counts or fails.
pub struct FakeStats {
    pub counts: Option<UserPlayCounts>,
}

#[async_trait]
impl ScrobbleStats for FakeStats {
    async fn play_counts(
        &self,
        _artist: &str,
        _album: &str,
        _track: &str,
    ) -> Result<UserPlayCounts, LastFmError> {
        self.counts.ok_or(LastFmError::Api {
            code: 11,
            message: "Service Offline".into(),
        })
    }
}

/// Generator with canned suggestions that counts its calls.
#[derive(Default)]
pub struct FakeGenerator {
    pub suggestions: Mutex<Vec<ArtistSuggestion>>,
    pub picks: Mutex<Vec<CuratedPick>>,
    pub malformed: Mutex<bool>,
    pub related_calls: AtomicUsize,
    pub prompts: Mutex<Vec<String>>,
}

impl FakeGenerator {
    pub fn with_names(names: &[&str]) -> Self {
        let generator = Self::default();
        *generator.suggestions.lock().unwrap() = names
            .iter()
            .map(|name| ArtistSuggestion {
                name: name.to_string(),
                reason: format!("{name} shares the sound"),
            })
            .collect();
        generator
    }

    pub fn related_calls(&self) -> usize {
        self.related_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecommendationGenerator for FakeGenerator {
    async fn related_artists(
        &self,
        _artist_name: &str,
        count: usize,
    ) -> Result<Vec<ArtistSuggestion>, GeminiError> {
        self.related_calls.fetch_add(1, Ordering::SeqCst);
        if *self.malformed.lock().unwrap() {
            return Err(GeminiError::Parse("expected value at line 1 column 1".into()));
        }
        let mut suggestions = self.suggestions.lock().unwrap().clone();
        suggestions.truncate(count);
        Ok(suggestions)
    }

    async fn curate(
        &self,
        profile: &CurationProfile,
        count: usize,
    ) -> Result<Vec<CuratedPick>, GeminiError> {
        self.prompts.lock().unwrap().push(profile.prompt(count));
        let mut picks = self.picks.lock().unwrap().clone();
        picks.truncate(count);
        Ok(picks)
    }
}

pub fn names(set: impl IntoIterator<Item = String>) -> HashSet<String> {
    set.into_iter().collect()
}
