// SPDX-License-Identifier: GPL-3.0-or-later
use anyhow::{anyhow, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use encore_domain::{Album, Artist, Rating, RelatedArtist, RelatedArtistEdge, Song};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;
use tracing::debug;

use crate::repositories::{ensure_valid, LibraryStore};

/// SQLx-backed library store
#[derive(Clone)]
pub struct SqliteLibraryStore {
    pool: SqlitePool,
}

impl SqliteLibraryStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl LibraryStore for SqliteLibraryStore {
    async fn get_song(&self, id: &str) -> Result<Option<Song>> {
        debug!(target: "repository", %id, "fetching song by id");
        let row = sqlx::query("SELECT * FROM songs WHERE id = ? LIMIT 1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_song).transpose()
    }

    async fn song_ratings(&self, ids: &[String]) -> Result<HashMap<String, Rating>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        debug!(target: "repository", count = ids.len(), "fetching song ratings");
        let placeholders = vec!["?"; ids.len()].join(", ");
        let q = format!("SELECT id, rating FROM songs WHERE id IN ({placeholders})");
        let mut query = sqlx::query(&q);
        for id in ids {
            query = query.bind(id);
        }
        let rows = query.fetch_all(&self.pool).await?;

        let mut out = HashMap::with_capacity(rows.len());
        for r in rows {
            let id: String = r.try_get("id")?;
            out.insert(id, parse_rating(r.try_get("rating")?)?);
        }
        Ok(out)
    }

    async fn insert_songs(&self, songs: &[Song]) -> Result<usize> {
        debug!(target: "repository", count = songs.len(), "inserting songs");
        for song in songs {
            ensure_valid("song", song)?;
        }
        let q = r#"
            INSERT INTO songs (id, album_id, title, url, rating, saved_at, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (id) DO NOTHING
        "#;
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0u64;
        for song in songs {
            inserted += sqlx::query(q)
                .bind(&song.id)
                .bind(&song.album_id)
                .bind(&song.title)
                .bind(&song.url)
                .bind(song.rating.value() as i64)
                .bind(song.saved_at.map(|d| d.to_rfc3339()))
                .bind(song.created_at.to_rfc3339())
                .execute(&mut *tx)
                .await?
                .rows_affected();
        }
        tx.commit().await?;
        Ok(inserted as usize)
    }

    async fn update_song_rating(&self, id: &str, rating: Rating) -> Result<()> {
        debug!(target: "repository", %id, %rating, "updating song rating");
        sqlx::query("UPDATE songs SET rating = ?, saved_at = ? WHERE id = ?")
            .bind(rating.value() as i64)
            .bind(Utc::now().to_rfc3339())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn album_song_ratings(&self, album_id: &str) -> Result<Vec<Rating>> {
        debug!(target: "repository", %album_id, "fetching album song ratings");
        let rows = sqlx::query("SELECT rating FROM songs WHERE album_id = ?")
            .bind(album_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|r| parse_rating(r.try_get("rating")?))
            .collect()
    }

    async fn get_album(&self, id: &str) -> Result<Option<Album>> {
        debug!(target: "repository", %id, "fetching album by id");
        let row = sqlx::query("SELECT * FROM albums WHERE id = ? LIMIT 1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_album).transpose()
    }

    async fn upsert_album(&self, album: &Album) -> Result<()> {
        debug!(target: "repository", album_id = %album.id, "upserting album");
        ensure_valid("album", album)?;
        let q = r#"
            INSERT INTO albums (
                id, artist_id, title, image_url, url, release_date, genre, album_type,
                total_tracks, popularity, score, is_featured, saved_at, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (id) DO UPDATE SET
                artist_id = COALESCE(excluded.artist_id, albums.artist_id),
                title = excluded.title,
                image_url = COALESCE(excluded.image_url, albums.image_url),
                url = COALESCE(excluded.url, albums.url),
                release_date = COALESCE(excluded.release_date, albums.release_date),
                genre = COALESCE(excluded.genre, albums.genre),
                album_type = COALESCE(excluded.album_type, albums.album_type),
                total_tracks = COALESCE(excluded.total_tracks, albums.total_tracks),
                popularity = COALESCE(excluded.popularity, albums.popularity)
        "#;
        sqlx::query(q)
            .bind(&album.id)
            .bind(&album.artist_id)
            .bind(&album.title)
            .bind(&album.image_url)
            .bind(&album.url)
            .bind(&album.release_date)
            .bind(&album.genre)
            .bind(&album.album_type)
            .bind(album.total_tracks.map(i64::from))
            .bind(album.popularity.map(i64::from))
            .bind(album.score)
            .bind(album.is_featured)
            .bind(album.saved_at.map(|d| d.to_rfc3339()))
            .bind(album.created_at.to_rfc3339())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_album_score(&self, id: &str, score: f64) -> Result<()> {
        debug!(target: "repository", %id, score, "setting album score");
        sqlx::query("UPDATE albums SET score = ? WHERE id = ?")
            .bind(score)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_album_featured(&self, id: &str, featured: bool) -> Result<()> {
        debug!(target: "repository", %id, featured, "setting album featured flag");
        let result = sqlx::query("UPDATE albums SET is_featured = ?, saved_at = ? WHERE id = ?")
            .bind(featured)
            .bind(Utc::now().to_rfc3339())
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(anyhow!("album {id} not found"));
        }
        Ok(())
    }

    async fn get_artist(&self, id: &str) -> Result<Option<Artist>> {
        debug!(target: "repository", %id, "fetching artist by id");
        let row = sqlx::query("SELECT * FROM artists WHERE id = ? LIMIT 1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_artist).transpose()
    }

    async fn find_artist_by_name(&self, name: &str) -> Result<Option<Artist>> {
        debug!(target: "repository", name, "fetching artist by name");
        let row = sqlx::query(
            "SELECT * FROM artists WHERE name = ? COLLATE NOCASE ORDER BY created_at LIMIT 1",
        )
        .bind(name.trim())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_artist).transpose()
    }

    async fn upsert_artist(&self, artist: &Artist) -> Result<()> {
        debug!(target: "repository", artist_id = %artist.id, "upserting artist");
        ensure_valid("artist", artist)?;
        let q = r#"
            INSERT INTO artists (id, name, url, image_url, genres, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT (id) DO UPDATE SET
                name = excluded.name,
                url = COALESCE(excluded.url, artists.url),
                image_url = COALESCE(excluded.image_url, artists.image_url),
                genres = CASE WHEN excluded.genres = '[]' THEN artists.genres ELSE excluded.genres END
        "#;
        sqlx::query(q)
            .bind(&artist.id)
            .bind(&artist.name)
            .bind(&artist.url)
            .bind(&artist.image_url)
            .bind(serde_json::to_string(&artist.genres)?)
            .bind(artist.created_at.to_rfc3339())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn related_artists(&self, source_artist_id: &str) -> Result<Vec<RelatedArtist>> {
        debug!(target: "repository", %source_artist_id, "fetching related artists");
        let q = r#"
            SELECT a.*, r.reason AS reason
            FROM related_artists r
            JOIN artists a ON a.id = r.target_artist_id
            WHERE r.source_artist_id = ?
            ORDER BY r.created_at, r.rowid
        "#;
        let rows = sqlx::query(q)
            .bind(source_artist_id)
            .fetch_all(&self.pool)
            .await?;
        let mut out = Vec::with_capacity(rows.len());
        for r in rows {
            let reason: Option<String> = r.try_get("reason")?;
            out.push(RelatedArtist {
                artist: row_to_artist(&r)?,
                reason: reason.unwrap_or_default(),
            });
        }
        Ok(out)
    }

    async fn insert_related_edges(&self, edges: &[RelatedArtistEdge]) -> Result<usize> {
        debug!(target: "repository", count = edges.len(), "inserting related artist edges");
        for edge in edges {
            ensure_valid("related artist edge", edge)?;
        }
        let q = r#"
            INSERT INTO related_artists (id, source_artist_id, target_artist_id, reason, created_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (source_artist_id, target_artist_id) DO NOTHING
        "#;
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0u64;
        for edge in edges {
            inserted += sqlx::query(q)
                .bind(edge.id.to_string())
                .bind(&edge.source_artist_id)
                .bind(&edge.target_artist_id)
                .bind(&edge.reason)
                .bind(edge.created_at.to_rfc3339())
                .execute(&mut *tx)
                .await?
                .rows_affected();
        }
        tx.commit().await?;
        Ok(inserted as usize)
    }
}

// ============================================================================
// Row mapping
// ============================================================================

fn parse_dt(s: String) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(&s) {
        return Ok(dt.with_timezone(&Utc));
    }
    // SQLite CURRENT_TIMESTAMP default: "YYYY-MM-DD HH:MM:SS"
    let ndt = NaiveDateTime::parse_from_str(&s, "%Y-%m-%d %H:%M:%S")?;
    Ok(DateTime::<Utc>::from_naive_utc_and_offset(ndt, Utc))
}

fn parse_dt_opt(s: Option<String>) -> Result<Option<DateTime<Utc>>> {
    s.map(parse_dt).transpose()
}

fn parse_rating(value: i64) -> Result<Rating> {
    u8::try_from(value)
        .ok()
        .and_then(Rating::new)
        .ok_or_else(|| anyhow!("stored rating out of range: {value}"))
}

fn parse_count(value: Option<i64>) -> Option<u32> {
    value.and_then(|v| u32::try_from(v).ok())
}

fn row_to_song(row: &SqliteRow) -> Result<Song> {
    Ok(Song {
        id: row.try_get("id")?,
        album_id: row.try_get("album_id")?,
        title: row.try_get("title")?,
        url: row.try_get("url")?,
        rating: parse_rating(row.try_get("rating")?)?,
        saved_at: parse_dt_opt(row.try_get("saved_at")?)?,
        created_at: parse_dt(row.try_get("created_at")?)?,
    })
}

fn row_to_album(row: &SqliteRow) -> Result<Album> {
    Ok(Album {
        id: row.try_get("id")?,
        artist_id: row.try_get("artist_id")?,
        title: row.try_get("title")?,
        image_url: row.try_get("image_url")?,
        url: row.try_get("url")?,
        release_date: row.try_get("release_date")?,
        genre: row.try_get("genre")?,
        album_type: row.try_get("album_type")?,
        total_tracks: parse_count(row.try_get("total_tracks")?),
        popularity: parse_count(row.try_get("popularity")?),
        score: row.try_get("score")?,
        is_featured: row.try_get("is_featured")?,
        saved_at: parse_dt_opt(row.try_get("saved_at")?)?,
        created_at: parse_dt(row.try_get("created_at")?)?,
    })
}

fn row_to_artist(row: &SqliteRow) -> Result<Artist> {
    let genres: String = row.try_get("genres")?;
    Ok(Artist {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        url: row.try_get("url")?,
        image_url: row.try_get("image_url")?,
        genres: serde_json::from_str(&genres).unwrap_or_default(),
        created_at: parse_dt(row.try_get("created_at")?)?,
    })
}
