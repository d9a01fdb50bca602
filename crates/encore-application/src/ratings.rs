// SPDX-License-Identifier: GPL-3.0-or-later
//! Track ratings and the album scores derived from them.

use std::collections::HashMap;
use std::sync::Arc;

use encore_domain::{Album, Artist, Rating, Song};
use encore_infrastructure::LibraryStore;
use encore_spotify as spotify;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::catalog;
use crate::error::{ServiceError, ServiceResult};
use crate::ports::PlaybackProvider;

/// The track being rated, as the dashboard knows it.
///
/// Field names follow the now-playing snapshot so the client can post it back.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackContext {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub artist: Option<String>,
    #[serde(default)]
    pub artist_id: Option<String>,
    #[serde(default)]
    pub artist_url: Option<String>,
    /// Album title.
    #[serde(default)]
    pub album: Option<String>,
    #[serde(default)]
    pub album_id: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    /// Other tracks on the album; persisted unrated when first seen.
    #[serde(default)]
    pub album_tracks: Vec<SeedTrack>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedTrack {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub uri: Option<String>,
}

impl From<&spotify::Track> for TrackContext {
    fn from(track: &spotify::Track) -> Self {
        let artist = track.artists.first();
        Self {
            id: track.id.clone().unwrap_or_default(),
            name: track.name.clone(),
            uri: track.uri.clone(),
            url: track.external_urls.spotify.clone(),
            artist: artist.map(|a| a.name.clone()),
            artist_id: artist.and_then(|a| a.id.clone()),
            artist_url: artist.and_then(|a| a.external_urls.spotify.clone()),
            album: Some(track.album.name.clone()),
            album_id: Some(track.album.id.clone()),
            image: spotify::models::first_image(&track.album.images),
            album_tracks: Vec::new(),
        }
    }
}

impl From<&spotify::SimplifiedTrack> for SeedTrack {
    fn from(track: &spotify::SimplifiedTrack) -> Self {
        Self {
            id: track.id.clone(),
            name: track.name.clone(),
            uri: track.uri.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaveStatus {
    Added,
    Updated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaylistSync {
    Added,
    Skipped,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateOutcome {
    pub status: SaveStatus,
    pub playlist: PlaylistSync,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeaturedStatus {
    Featured,
    Unfeatured,
}

impl FeaturedStatus {
    pub fn is_featured(self) -> bool {
        self == FeaturedStatus::Featured
    }
}

pub struct RatingService {
    store: Arc<dyn LibraryStore>,
    provider: Option<Arc<dyn PlaybackProvider>>,
    liked_playlist_id: Option<String>,
}

impl RatingService {
    pub fn new(
        store: Arc<dyn LibraryStore>,
        provider: Option<Arc<dyn PlaybackProvider>>,
        liked_playlist_id: Option<String>,
    ) -> Self {
        Self {
            store,
            provider,
            liked_playlist_id: liked_playlist_id.filter(|id| !id.is_empty()),
        }
    }

    /// Persist a rating and bring the album score up to date.
    ///
    /// A track seen for the first time gets its album (and the album's artist)
    /// stored first: `album` when the caller has the full record, otherwise a
    /// stub built from the track context.
    #[instrument(skip(self, track, album), fields(track_id = %track.id))]
    pub async fn record_rating(
        &self,
        track: &TrackContext,
        rating: Rating,
        album: Option<Album>,
    ) -> ServiceResult<SaveStatus> {
        if track.id.is_empty() {
            return Err(ServiceError::InvalidInput("Missing track or rating".into()));
        }
        let album_id = track.album_id.as_deref().filter(|id| !id.is_empty());

        let status = if self.store.get_song(&track.id).await?.is_some() {
            self.store.update_song_rating(&track.id, rating).await?;
            SaveStatus::Updated
        } else {
            if let Some(album_id) = album_id {
                self.ensure_album(track, album_id, album).await?;
            }
            let mut song = Song::new(track.id.clone(), track.name.clone(), rating);
            song.album_id = album_id.map(str::to_string);
            song.url = Some(
                track
                    .url
                    .clone()
                    .unwrap_or_else(|| Song::default_url(&track.id)),
            );
            self.store.insert_songs(&[song]).await?;
            SaveStatus::Added
        };

        if let Some(album_id) = album_id {
            if !track.album_tracks.is_empty() {
                let seeded = self.seed_album_tracks(album_id, &track.album_tracks).await?;
                debug!(target: "ratings", album_id, seeded, "seeded album tracks");
            }
            self.refresh_album_score(album_id).await?;
        }

        info!(target: "ratings", rating = %rating, status = ?status, "rating recorded");
        Ok(status)
    }

    async fn ensure_album(
        &self,
        track: &TrackContext,
        album_id: &str,
        album: Option<Album>,
    ) -> ServiceResult<()> {
        if let Some(mut album) = album {
            album.artist_id = self.ensure_artist(track, album.artist_id.take()).await?;
            self.store.upsert_album(&album).await?;
            return Ok(());
        }
        if self.store.get_album(album_id).await?.is_some() {
            return Ok(());
        }

        let mut stub = Album::stub(
            album_id,
            track.album.clone().unwrap_or_default(),
            track.image.clone(),
        );
        stub.artist_id = self.ensure_artist(track, None).await?;
        debug!(target: "ratings", album_id, "storing album stub");
        self.store.upsert_album(&stub).await?;
        Ok(())
    }

    /// The artist id an album row may reference. The track's own artist is
    /// stored on the way; any other artist must already be in the library.
    async fn ensure_artist(
        &self,
        track: &TrackContext,
        album_artist_id: Option<String>,
    ) -> ServiceResult<Option<String>> {
        let Some(id) = album_artist_id.or_else(|| track.artist_id.clone()) else {
            return Ok(None);
        };
        if track.artist_id.as_deref() == Some(id.as_str()) {
            if let Some(name) = track.artist.as_deref() {
                let mut artist = Artist::new(id.clone(), name);
                artist.url = track.artist_url.clone();
                self.store.upsert_artist(&artist).await?;
                return Ok(Some(id));
            }
        }
        let known = self.store.get_artist(&id).await?.is_some();
        Ok(known.then_some(id))
    }

    async fn seed_album_tracks(&self, album_id: &str, tracks: &[SeedTrack]) -> ServiceResult<usize> {
        let songs: Vec<Song> = tracks
            .iter()
            .filter(|t| !t.id.is_empty())
            .map(|t| {
                let mut song = Song::new(t.id.clone(), t.name.clone(), Rating::UNRATED);
                song.album_id = Some(album_id.to_string());
                song.url = Some(Song::default_url(&t.id));
                song
            })
            .collect();
        Ok(self.store.insert_songs(&songs).await?)
    }

    /// Recompute and store the album score. Albums with an unknown track count
    /// keep their previous score.
    pub async fn refresh_album_score(&self, album_id: &str) -> ServiceResult<Option<f64>> {
        let Some(album) = self.store.get_album(album_id).await? else {
            return Ok(None);
        };
        let ratings = self.store.album_song_ratings(album_id).await?;
        let Some(score) = album.score_from(ratings) else {
            debug!(target: "ratings", album_id, "album track count unknown, score left as is");
            return Ok(None);
        };
        self.store.set_album_score(album_id, score).await?;
        Ok(Some(score))
    }

    /// The stored rating for a track, creating it at the default on first sight.
    ///
    /// A stored 0 counts as unrated and is promoted the same way.
    #[instrument(skip(self, track, album), fields(track_id = %track.id))]
    pub async fn fetch_or_default(
        &self,
        track: &TrackContext,
        album: Option<Album>,
    ) -> ServiceResult<Rating> {
        match self.store.get_song(&track.id).await? {
            Some(song) if song.rating.is_rated() => Ok(song.rating),
            _ => {
                self.record_rating(track, Rating::DEFAULT, album).await?;
                Ok(Rating::DEFAULT)
            }
        }
    }

    /// Stored ratings for the given tracks; unknown tracks are absent.
    pub async fn album_ratings(&self, track_ids: &[String]) -> ServiceResult<HashMap<String, Rating>> {
        Ok(self.store.song_ratings(track_ids).await?)
    }

    /// Rate a track on behalf of a user and, when it is new to the library,
    /// append it to the liked playlist.
    ///
    /// Playlist problems never fail the rating.
    pub async fn rate_track(
        &self,
        token: Option<&str>,
        track: &TrackContext,
        rating: Rating,
    ) -> ServiceResult<RateOutcome> {
        let album = self.catalog_album(token, track).await;
        let status = self.record_rating(track, rating, album).await?;

        let playlist = match (status, token, self.liked_playlist_id.as_deref()) {
            (SaveStatus::Added, Some(token), Some(playlist_id)) => {
                self.add_to_liked(token, playlist_id, track).await
            }
            _ => PlaylistSync::Skipped,
        };
        Ok(RateOutcome { status, playlist })
    }

    /// The full album record, fetched only when the album is not stored yet.
    async fn catalog_album(&self, token: Option<&str>, track: &TrackContext) -> Option<Album> {
        let (Some(provider), Some(token)) = (self.provider.as_ref(), token) else {
            return None;
        };
        let album_id = track.album_id.as_deref().filter(|id| !id.is_empty())?;
        match self.store.get_album(album_id).await {
            Ok(Some(_)) => return None,
            Ok(None) => {}
            Err(err) => {
                warn!(target: "ratings", error = %err, "album lookup failed");
                return None;
            }
        }
        match provider.album(token, album_id).await {
            Ok(album) => Some(catalog::album_record(&album)),
            Err(err) => {
                warn!(target: "ratings", album_id, error = %err, "album fetch failed, using stub");
                None
            }
        }
    }

    async fn add_to_liked(&self, token: &str, playlist_id: &str, track: &TrackContext) -> PlaylistSync {
        let (Some(provider), Some(uri)) = (self.provider.as_ref(), track.uri.clone()) else {
            return PlaylistSync::Skipped;
        };
        match provider.add_to_playlist(token, playlist_id, &[uri]).await {
            Ok(()) => PlaylistSync::Added,
            Err(err) => {
                warn!(target: "ratings", playlist_id, error = %err, "failed to add track to liked playlist");
                PlaylistSync::Failed
            }
        }
    }

    /// Toggle the featured flag of an album, storing the catalog record first.
    ///
    /// An album saved for the first time becomes featured.
    #[instrument(skip(self, token))]
    pub async fn save_album(&self, token: &str, album_id: &str) -> ServiceResult<FeaturedStatus> {
        if album_id.trim().is_empty() {
            return Err(ServiceError::InvalidInput("Missing Album ID".into()));
        }
        let provider = self
            .provider
            .as_ref()
            .ok_or_else(|| ServiceError::Upstream("playback provider is not configured".into()))?;
        let album = provider.album(token, album_id).await?;

        let featured = match self.store.get_album(album_id).await? {
            Some(existing) => !existing.is_featured,
            None => true,
        };
        if let Some(artist) = album.artists.first().and_then(catalog::simplified_artist_record) {
            self.store.upsert_artist(&artist).await?;
        }
        self.store.upsert_album(&catalog::album_record(&album)).await?;
        self.store.set_album_featured(album_id, featured).await?;

        info!(target: "ratings", album_id, featured, "album featured flag toggled");
        Ok(if featured {
            FeaturedStatus::Featured
        } else {
            FeaturedStatus::Unfeatured
        })
    }

    pub async fn is_featured(&self, album_id: &str) -> ServiceResult<bool> {
        Ok(self
            .store
            .get_album(album_id)
            .await?
            .map(|album| album.is_featured)
            .unwrap_or(false))
    }
}
