// SPDX-License-Identifier: GPL-3.0-or-later
use anyhow::{anyhow, Result};
use encore_domain::{
    describe_errors, Album, Artist, Rating, RelatedArtist, RelatedArtistEdge, Song, Validate,
};
use std::collections::HashMap;

// ============================================================================
// Library Store
// ============================================================================

/// Reject a record that fails domain validation before any backend write.
pub fn ensure_valid<T: Validate>(kind: &str, record: &T) -> Result<()> {
    record
        .validate()
        .map_err(|errors| anyhow!("invalid {kind}: {}", describe_errors(&errors)))
}

/// Keyed persistence over the four library record kinds.
///
/// Implemented by the relational backend and the spreadsheet backend; callers
/// never branch on which one they hold.
#[async_trait::async_trait]
pub trait LibraryStore: Send + Sync {
    // Songs
    async fn get_song(&self, id: &str) -> Result<Option<Song>>;
    /// Ratings for the requested ids. Ids with no stored song are absent.
    async fn song_ratings(&self, ids: &[String]) -> Result<HashMap<String, Rating>>;
    /// Insert songs, skipping ids that already exist. Returns the number inserted.
    async fn insert_songs(&self, songs: &[Song]) -> Result<usize>;
    async fn update_song_rating(&self, id: &str, rating: Rating) -> Result<()>;
    async fn album_song_ratings(&self, album_id: &str) -> Result<Vec<Rating>>;

    // Albums
    async fn get_album(&self, id: &str) -> Result<Option<Album>>;
    /// Insert or refresh an album. Score and featured flag of an existing row
    /// are left alone, and absent fields keep their stored values.
    async fn upsert_album(&self, album: &Album) -> Result<()>;
    async fn set_album_score(&self, id: &str, score: f64) -> Result<()>;
    async fn set_album_featured(&self, id: &str, featured: bool) -> Result<()>;

    // Artists
    async fn get_artist(&self, id: &str) -> Result<Option<Artist>>;
    /// Case-insensitive exact match.
    async fn find_artist_by_name(&self, name: &str) -> Result<Option<Artist>>;
    /// Insert or refresh an artist; absent fields keep their stored values.
    async fn upsert_artist(&self, artist: &Artist) -> Result<()>;

    // Related artists
    /// Persisted edges from `source_artist_id`, joined with their targets, oldest first.
    async fn related_artists(&self, source_artist_id: &str) -> Result<Vec<RelatedArtist>>;
    /// Insert edges, ignoring (source, target) pairs that already exist.
    /// Returns the number of new edges.
    async fn insert_related_edges(&self, edges: &[RelatedArtistEdge]) -> Result<usize>;
}
