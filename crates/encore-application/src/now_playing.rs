// SPDX-License-Identifier: GPL-3.0-or-later
//! The "what's playing now" view polled by the dashboard.

use std::collections::HashMap;
use std::fmt::Display;
use std::sync::Arc;

use encore_domain::{album_score, Rating};
use encore_metadata::UserPlayCounts;
use encore_spotify::models::first_image;
use encore_spotify::{CurrentlyPlaying, Track};
use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::catalog;
use crate::error::ServiceResult;
use crate::ports::{PlaybackProvider, ScrobbleStats};
use crate::ratings::{RatingService, SeedTrack, TrackContext};

const TOP_TRACKS: usize = 5;
const DISCOGRAPHY_LIMIT: u32 = 10;
const UNKNOWN_GENRE: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum NowPlaying {
    NotPlaying(Idle),
    Minimal(MinimalSnapshot),
    Full(Box<PlaybackSnapshot>),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Idle {
    pub is_playing: bool,
}

/// Identity and progress only; used to detect track changes between full polls.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MinimalSnapshot {
    pub id: Option<String>,
    pub name: String,
    pub artist: Option<String>,
    pub album: String,
    pub album_id: String,
    pub image: Option<String>,
    pub is_playing: bool,
    pub progress_ms: Option<u64>,
    pub duration_ms: u64,
}

impl MinimalSnapshot {
    fn new(current: &CurrentlyPlaying, track: &Track) -> Self {
        Self {
            id: track.id.clone(),
            name: track.name.clone(),
            artist: track.artists.first().map(|a| a.name.clone()),
            album: track.album.name.clone(),
            album_id: track.album.id.clone(),
            image: first_image(&track.album.images),
            is_playing: current.is_playing,
            progress_ms: current.progress_ms,
            duration_ms: track.duration_ms,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlbumTrackView {
    pub id: String,
    pub name: String,
    pub uri: Option<String>,
    pub rating: Rating,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopTrackView {
    pub id: Option<String>,
    pub name: String,
    pub uri: Option<String>,
    pub album_name: String,
    pub album_image: Option<String>,
    pub popularity: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiscographyEntry {
    pub id: String,
    pub name: String,
    pub image: Option<String>,
    pub release_date: Option<String>,
    pub total_tracks: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaybackSnapshot {
    pub id: Option<String>,
    pub name: String,
    pub artist: Option<String>,
    pub artist_id: Option<String>,
    pub artist_url: Option<String>,
    pub album: String,
    pub album_url: Option<String>,
    pub album_type: Option<String>,
    pub image: Option<String>,
    pub uri: Option<String>,
    pub url: Option<String>,
    pub album_id: String,
    pub release_date: Option<String>,
    pub duration_ms: u64,
    pub progress_ms: Option<u64>,
    pub is_playing: bool,
    pub stats: UserPlayCounts,
    pub rating: Rating,
    pub genre: String,
    pub album_tracks: Vec<AlbumTrackView>,
    pub album_score: f64,
    pub is_album_saved: bool,
    pub top_tracks: Vec<TopTrackView>,
    pub artist_albums: Vec<DiscographyEntry>,
}

fn or_default<T: Default, E: Display>(result: Result<T, E>, what: &'static str) -> T {
    result.unwrap_or_else(|err| {
        warn!(target: "now_playing", call = what, error = %err, "enrichment call failed");
        T::default()
    })
}

pub struct NowPlayingService {
    provider: Arc<dyn PlaybackProvider>,
    stats: Option<Arc<dyn ScrobbleStats>>,
    ratings: Arc<RatingService>,
}

impl NowPlayingService {
    pub fn new(
        provider: Arc<dyn PlaybackProvider>,
        stats: Option<Arc<dyn ScrobbleStats>>,
        ratings: Arc<RatingService>,
    ) -> Self {
        Self {
            provider,
            stats,
            ratings,
        }
    }

    /// Current playback. Only failing to reach the provider is an error;
    /// every enrichment call falls back to an empty value on its own.
    #[instrument(skip(self, token))]
    pub async fn now_playing(&self, token: &str, minimal: bool) -> ServiceResult<NowPlaying> {
        let Some(current) = self.provider.currently_playing(token).await? else {
            return Ok(NowPlaying::NotPlaying(Idle::default()));
        };
        let Some(track) = current.track() else {
            debug!(target: "now_playing", "playing item is not a track");
            return Ok(NowPlaying::NotPlaying(Idle::default()));
        };

        if minimal {
            return Ok(NowPlaying::Minimal(MinimalSnapshot::new(&current, track)));
        }
        let snapshot = self.enrich(token, &current, track).await;
        Ok(NowPlaying::Full(Box::new(snapshot)))
    }

    async fn enrich(&self, token: &str, current: &CurrentlyPlaying, track: &Track) -> PlaybackSnapshot {
        let artist = track.artists.first();
        let artist_id = artist.and_then(|a| a.id.as_deref());
        let artist_name = artist.map(|a| a.name.as_str()).unwrap_or_default();
        let album_id = track.album.id.as_str();

        let genres = async {
            match artist_id {
                Some(id) => or_default(
                    self.provider.artist(token, id).await.map(|a| a.genres),
                    "artist",
                ),
                None => Vec::new(),
            }
        };
        let stats = async {
            match &self.stats {
                Some(stats) => or_default(
                    stats
                        .play_counts(artist_name, &track.album.name, &track.name)
                        .await,
                    "play_counts",
                ),
                None => UserPlayCounts::default(),
            }
        };
        let album_tracks = async {
            or_default(
                self.provider.album_tracks(token, album_id).await,
                "album_tracks",
            )
        };
        let saved = async { or_default(self.ratings.is_featured(album_id).await, "is_featured") };
        let top_tracks = async {
            match artist_id {
                Some(id) => or_default(
                    self.provider.artist_top_tracks(token, id).await,
                    "artist_top_tracks",
                ),
                None => Vec::new(),
            }
        };
        let discography = async {
            match artist_id {
                Some(id) => or_default(
                    self.provider
                        .artist_albums(token, id, DISCOGRAPHY_LIMIT)
                        .await,
                    "artist_albums",
                ),
                None => Vec::new(),
            }
        };

        let (genres, stats, album_tracks, is_album_saved, top_tracks, discography) =
            tokio::join!(genres, stats, album_tracks, saved, top_tracks, discography);

        let mut context = TrackContext::from(track);
        context.album_tracks = album_tracks.iter().map(SeedTrack::from).collect();
        let track_ids: Vec<String> = album_tracks.iter().map(|t| t.id.clone()).collect();

        let current_rating = async {
            if context.id.is_empty() {
                return Rating::DEFAULT;
            }
            let album = catalog::simplified_album_record(&track.album);
            self.ratings
                .fetch_or_default(&context, Some(album))
                .await
                .unwrap_or_else(|err| {
                    warn!(target: "now_playing", error = %err, "failed to read or create track rating");
                    Rating::DEFAULT
                })
        };
        let bulk_ratings = async {
            or_default::<HashMap<String, Rating>, _>(
                self.ratings.album_ratings(&track_ids).await,
                "album_ratings",
            )
        };
        let (rating, mut ratings) = tokio::join!(current_rating, bulk_ratings);

        // The bulk read may predate the default written above.
        if !context.id.is_empty() {
            ratings.insert(context.id.clone(), rating);
        }

        let album_tracks: Vec<AlbumTrackView> = album_tracks
            .into_iter()
            .map(|t| AlbumTrackView {
                rating: ratings.get(&t.id).copied().unwrap_or(Rating::UNRATED),
                id: t.id,
                name: t.name,
                uri: t.uri,
            })
            .collect();

        let slots = track
            .album
            .total_tracks
            .filter(|n| *n > 0)
            .map(|n| n as usize)
            .unwrap_or(album_tracks.len());
        let album_score = album_score(album_tracks.iter().map(|t| t.rating), slots);

        let top_tracks = top_tracks
            .into_iter()
            .take(TOP_TRACKS)
            .map(|t| TopTrackView {
                album_image: first_image(&t.album.images),
                album_name: t.album.name,
                id: t.id,
                name: t.name,
                uri: t.uri,
                popularity: t.popularity,
            })
            .collect();
        let artist_albums = discography
            .into_iter()
            .map(|a| DiscographyEntry {
                image: first_image(&a.images),
                id: a.id,
                name: a.name,
                release_date: a.release_date,
                total_tracks: a.total_tracks,
            })
            .collect();

        PlaybackSnapshot {
            id: track.id.clone(),
            name: track.name.clone(),
            artist: artist.map(|a| a.name.clone()),
            artist_id: artist_id.map(str::to_string),
            artist_url: artist.and_then(|a| a.external_urls.spotify.clone()),
            album: track.album.name.clone(),
            album_url: track.album.external_urls.spotify.clone(),
            album_type: track.album.album_type.clone(),
            image: first_image(&track.album.images),
            uri: track.uri.clone(),
            url: track.external_urls.spotify.clone(),
            album_id: track.album.id.clone(),
            release_date: track.album.release_date.clone(),
            duration_ms: track.duration_ms,
            progress_ms: current.progress_ms,
            is_playing: current.is_playing,
            stats,
            rating,
            genre: genres
                .into_iter()
                .next()
                .unwrap_or_else(|| UNKNOWN_GENRE.to_string()),
            album_tracks,
            album_score,
            is_album_saved,
            top_tracks,
            artist_albums,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;
    use crate::test_support::{
        album_tracks, catalog_artist, memory_store, playing, simplified_album, track, FakeProvider,
        FakeStats,
    };
    use encore_infrastructure::{LibraryStore, SqliteLibraryStore};
    use std::collections::BTreeSet;

    struct Harness {
        provider: Arc<FakeProvider>,
        store: Arc<SqliteLibraryStore>,
        service: NowPlayingService,
    }

    async fn harness(stats: Option<UserPlayCounts>) -> Harness {
        let provider = Arc::new(FakeProvider::default());
        let store = memory_store().await;
        let ratings = Arc::new(RatingService::new(store.clone(), Some(provider.clone()), None));
        let stats: Arc<dyn ScrobbleStats> = Arc::new(FakeStats { counts: stats });
        let service = NowPlayingService::new(provider.clone(), Some(stats), ratings);
        Harness {
            provider,
            store,
            service,
        }
    }

    fn stage_album(provider: &FakeProvider) {
        *provider.playing.lock().unwrap() = Some(playing(track("al1-t1", "Song A", "al1", 4), 50_000));
        provider
            .tracks
            .lock()
            .unwrap()
            .insert("al1".into(), album_tracks("al1", 4));
        provider
            .artists
            .lock()
            .unwrap()
            .insert("ar1".into(), catalog_artist("ar1", "Weezer", &["power pop", "rock"]));
        *provider.top_tracks.lock().unwrap() = (1..=8)
            .map(|n| track(&format!("top{n}"), &format!("Hit {n}"), "al9", 10))
            .collect();
        *provider.discography.lock().unwrap() = vec![
            simplified_album("al1", "Pinkerton"),
            simplified_album("al2", "Weezer"),
        ];
    }

    #[tokio::test]
    async fn minimal_poll_returns_identity_fields_only() {
        let h = harness(None).await;
        *h.provider.playing.lock().unwrap() = Some(playing(track("T1", "Song A", "al1", 10), 50_000));

        let result = h.service.now_playing("tok", true).await.unwrap();
        let value = serde_json::to_value(&result).unwrap();
        let keys: BTreeSet<&str> = value.as_object().unwrap().keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            BTreeSet::from([
                "id", "name", "artist", "album", "album_id", "image", "is_playing",
                "progress_ms", "duration_ms"
            ])
        );
        assert_eq!(value["id"], "T1");
        assert_eq!(value["name"], "Song A");
        assert_eq!(value["duration_ms"], 200_000);
        assert_eq!(value["progress_ms"], 50_000);
        assert_eq!(h.provider.calls(), vec!["currently_playing".to_string()]);
        assert!(h.store.get_song("T1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn nothing_playing_is_not_an_error() {
        let h = harness(None).await;
        let result = h.service.now_playing("tok", false).await.unwrap();
        assert_eq!(result, NowPlaying::NotPlaying(Idle { is_playing: false }));
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            serde_json::json!({ "is_playing": false })
        );
    }

    #[tokio::test]
    async fn unreachable_provider_fails_the_poll() {
        let h = harness(None).await;
        h.provider.fail("currently_playing", 401);
        let err = h.service.now_playing("tok", false).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotAuthenticated));
    }

    #[tokio::test]
    async fn failing_stats_fall_back_to_zero_counts() {
        let h = harness(None).await;
        stage_album(&h.provider);

        let NowPlaying::Full(snapshot) = h.service.now_playing("tok", false).await.unwrap() else {
            panic!("expected full snapshot");
        };
        assert_eq!(snapshot.stats, UserPlayCounts::default());
        assert_eq!(snapshot.genre, "power pop");
        assert_eq!(snapshot.album_tracks.len(), 4);
        assert_eq!(snapshot.top_tracks.len(), 5);
        assert_eq!(snapshot.artist_albums.len(), 2);
        assert_eq!(snapshot.artist_id.as_deref(), Some("ar1"));
        assert!(!snapshot.is_album_saved);
    }

    #[tokio::test]
    async fn enrichment_failures_use_documented_defaults() {
        let counts = UserPlayCounts {
            artist: 120,
            album: 40,
            track: 9,
            today: 3,
            total: 15_000,
        };
        let h = harness(Some(counts)).await;
        stage_album(&h.provider);
        for call in ["artist", "artist_top_tracks", "artist_albums", "album_tracks"] {
            h.provider.fail(call, 500);
        }

        let NowPlaying::Full(snapshot) = h.service.now_playing("tok", false).await.unwrap() else {
            panic!("expected full snapshot");
        };
        assert_eq!(snapshot.stats, counts);
        assert_eq!(snapshot.genre, "Unknown");
        assert!(snapshot.album_tracks.is_empty());
        assert!(snapshot.top_tracks.is_empty());
        assert!(snapshot.artist_albums.is_empty());
        assert_eq!(snapshot.rating, Rating::DEFAULT);
    }

    #[tokio::test]
    async fn first_sight_rating_overrides_bulk_read() {
        let h = harness(None).await;
        stage_album(&h.provider);

        let NowPlaying::Full(snapshot) = h.service.now_playing("tok", false).await.unwrap() else {
            panic!("expected full snapshot");
        };
        assert_eq!(snapshot.rating, Rating::DEFAULT);
        let current = snapshot
            .album_tracks
            .iter()
            .find(|t| t.id == "al1-t1")
            .unwrap();
        assert_eq!(current.rating, Rating::DEFAULT);
        // 60 points over 4 slots
        assert_eq!(snapshot.album_score, 15.0);

        assert_eq!(
            h.store.get_song("al1-t1").await.unwrap().unwrap().rating,
            Rating::DEFAULT
        );
        let seeded = h.store.album_song_ratings("al1").await.unwrap();
        assert_eq!(seeded.len(), 4);
    }

    #[tokio::test]
    async fn stored_ratings_feed_album_score() {
        let h = harness(None).await;
        stage_album(&h.provider);
        // first poll stores the album and seeds its tracks
        h.service.now_playing("tok", false).await.unwrap();
        for id in ["al1-t2", "al1-t3"] {
            h.store
                .update_song_rating(id, Rating::new(5).unwrap())
                .await
                .unwrap();
        }

        let NowPlaying::Full(snapshot) = h.service.now_playing("tok", false).await.unwrap() else {
            panic!("expected full snapshot");
        };
        let ratings: Vec<u8> = snapshot.album_tracks.iter().map(|t| t.rating.value()).collect();
        assert_eq!(ratings, vec![3, 5, 5, 0]);
        // (60 + 100 + 100 + 0) / 4
        assert_eq!(snapshot.album_score, 65.0);
    }
}
