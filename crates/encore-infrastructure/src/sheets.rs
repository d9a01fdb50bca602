// SPDX-License-Identifier: GPL-3.0-or-later

//! Spreadsheet-backed library store.
//!
//! Each record kind lives in its own sheet, one record per row, columns in a
//! fixed order. Lookups scan the id column; writes read, then update the
//! matching row or append a new one. There is no atomic upsert.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use encore_config::SheetsConfig;
use encore_domain::{Album, Artist, Rating, RelatedArtist, RelatedArtistEdge, Song};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::repositories::{ensure_valid, LibraryStore};

const SHEETS_API_BASE: &str = "https://sheets.googleapis.com";

#[derive(Debug, Error)]
pub enum SheetsError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("HTTP status {status}: {body}")]
    HttpStatus { status: StatusCode, body: String },
    #[error("invalid sheets url: {0}")]
    InvalidUrl(String),
    #[error("Deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),
}

/// Raw access to spreadsheet cell values in A1 notation.
#[async_trait::async_trait]
pub trait SheetValues: Send + Sync {
    async fn read(&self, spreadsheet_id: &str, range: &str) -> Result<Vec<Vec<String>>, SheetsError>;
    async fn update(
        &self,
        spreadsheet_id: &str,
        range: &str,
        rows: Vec<Vec<String>>,
    ) -> Result<(), SheetsError>;
    async fn append(
        &self,
        spreadsheet_id: &str,
        range: &str,
        rows: Vec<Vec<String>>,
    ) -> Result<(), SheetsError>;
}

// ============================================================================
// Google Sheets v4 values API
// ============================================================================

#[derive(Debug, Clone)]
pub struct GoogleSheetsClient {
    client: Client,
    /// Base URL stored without a trailing slash.
    base_url: String,
    access_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

#[derive(Debug, Serialize)]
struct ValueBody {
    values: Vec<Vec<String>>,
}

impl GoogleSheetsClient {
    pub fn new(client: Client, base_url: Option<String>, access_token: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url
                .unwrap_or_else(|| SHEETS_API_BASE.to_string())
                .trim_end_matches('/')
                .to_string(),
            access_token,
        }
    }

    fn values_url(&self, spreadsheet_id: &str, range: &str) -> Result<Url, SheetsError> {
        let mut url =
            Url::parse(&self.base_url).map_err(|e| SheetsError::InvalidUrl(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| SheetsError::InvalidUrl(self.base_url.clone()))?
            .pop_if_empty()
            .extend(["v4", "spreadsheets", spreadsheet_id, "values", range]);
        Ok(url)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.access_token.as_deref() {
            Some(token) if !token.trim().is_empty() => request.bearer_auth(token.trim()),
            _ => request,
        }
    }

    async fn check(response: reqwest::Response) -> Result<String, SheetsError> {
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(SheetsError::HttpStatus { status, body });
        }
        Ok(body)
    }
}

#[async_trait::async_trait]
impl SheetValues for GoogleSheetsClient {
    async fn read(&self, spreadsheet_id: &str, range: &str) -> Result<Vec<Vec<String>>, SheetsError> {
        let url = self.values_url(spreadsheet_id, range)?;
        debug!(target: "sheets", %range, "reading range");
        let response = self.authorize(self.client.get(url)).send().await?;
        let body = Self::check(response).await?;
        let parsed: ValueRange = serde_json::from_str(&body)?;
        Ok(parsed
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_to_string).collect())
            .collect())
    }

    async fn update(
        &self,
        spreadsheet_id: &str,
        range: &str,
        rows: Vec<Vec<String>>,
    ) -> Result<(), SheetsError> {
        let mut url = self.values_url(spreadsheet_id, range)?;
        url.query_pairs_mut().append_pair("valueInputOption", "RAW");
        debug!(target: "sheets", %range, "updating range");
        let response = self
            .authorize(self.client.put(url))
            .json(&ValueBody { values: rows })
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn append(
        &self,
        spreadsheet_id: &str,
        range: &str,
        rows: Vec<Vec<String>>,
    ) -> Result<(), SheetsError> {
        let mut url = self.values_url(spreadsheet_id, &format!("{range}:append"))?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", "RAW")
            .append_pair("insertDataOption", "INSERT_ROWS");
        debug!(target: "sheets", %range, rows = rows.len(), "appending rows");
        let response = self
            .authorize(self.client.post(url))
            .json(&ValueBody { values: rows })
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}

fn cell_to_string(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

// ============================================================================
// Row layouts
// ============================================================================

/// One sheet inside a spreadsheet, plus the last column its layout uses.
#[derive(Debug, Clone)]
pub struct SheetRef {
    pub spreadsheet_id: String,
    pub sheet: String,
    last_column: char,
}

impl SheetRef {
    fn new(spreadsheet_id: &str, sheet: &str, last_column: char) -> Self {
        Self {
            spreadsheet_id: spreadsheet_id.to_string(),
            sheet: sheet.to_string(),
            last_column,
        }
    }

    fn quoted(&self) -> String {
        format!("'{}'", self.sheet.replace('\'', "''"))
    }

    fn all_rows(&self) -> String {
        format!("{}!A:{}", self.quoted(), self.last_column)
    }

    /// `row` is 1-based, as in A1 notation.
    fn row(&self, row: usize) -> String {
        format!("{}!A{row}:{}{row}", self.quoted(), self.last_column)
    }
}

fn cell(row: &[String], index: usize) -> &str {
    row.get(index).map(String::as_str).unwrap_or("")
}

fn opt(row: &[String], index: usize) -> Option<String> {
    Some(cell(row, index).trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn opt_string(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

fn parse_time(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn format_time(value: Option<DateTime<Utc>>) -> String {
    value.map(|d| d.to_rfc3339()).unwrap_or_default()
}

// Songs: id | album_id | title | url | rating | saved_at | created_at
fn song_to_row(song: &Song) -> Vec<String> {
    vec![
        song.id.clone(),
        opt_string(&song.album_id),
        song.title.clone(),
        opt_string(&song.url),
        song.rating.to_string(),
        format_time(song.saved_at),
        song.created_at.to_rfc3339(),
    ]
}

fn row_to_song(row: &[String]) -> Option<Song> {
    let rating = cell(row, 4).trim().parse::<u8>().ok().and_then(Rating::new)?;
    Some(Song {
        id: opt(row, 0)?,
        album_id: opt(row, 1),
        title: cell(row, 2).to_string(),
        url: opt(row, 3),
        rating,
        saved_at: parse_time(cell(row, 5)),
        created_at: parse_time(cell(row, 6))?,
    })
}

// Albums: id | artist_id | title | image_url | url | release_date | genre |
// album_type | total_tracks | popularity | score | is_featured | saved_at | created_at
fn album_to_row(album: &Album) -> Vec<String> {
    vec![
        album.id.clone(),
        opt_string(&album.artist_id),
        album.title.clone(),
        opt_string(&album.image_url),
        opt_string(&album.url),
        opt_string(&album.release_date),
        opt_string(&album.genre),
        opt_string(&album.album_type),
        album.total_tracks.map(|n| n.to_string()).unwrap_or_default(),
        album.popularity.map(|n| n.to_string()).unwrap_or_default(),
        album.score.map(|s| s.to_string()).unwrap_or_default(),
        if album.is_featured { "TRUE" } else { "FALSE" }.to_string(),
        format_time(album.saved_at),
        album.created_at.to_rfc3339(),
    ]
}

fn row_to_album(row: &[String]) -> Option<Album> {
    Some(Album {
        id: opt(row, 0)?,
        artist_id: opt(row, 1),
        title: cell(row, 2).to_string(),
        image_url: opt(row, 3),
        url: opt(row, 4),
        release_date: opt(row, 5),
        genre: opt(row, 6),
        album_type: opt(row, 7),
        total_tracks: cell(row, 8).trim().parse().ok(),
        popularity: cell(row, 9).trim().parse().ok(),
        score: cell(row, 10).trim().parse().ok(),
        is_featured: cell(row, 11).trim().eq_ignore_ascii_case("true"),
        saved_at: parse_time(cell(row, 12)),
        created_at: parse_time(cell(row, 13))?,
    })
}

// Artists: id | name | url | image_url | genres (JSON) | created_at
fn artist_to_row(artist: &Artist) -> Vec<String> {
    vec![
        artist.id.clone(),
        artist.name.clone(),
        opt_string(&artist.url),
        opt_string(&artist.image_url),
        serde_json::to_string(&artist.genres).unwrap_or_else(|_| "[]".to_string()),
        artist.created_at.to_rfc3339(),
    ]
}

fn row_to_artist(row: &[String]) -> Option<Artist> {
    Some(Artist {
        id: opt(row, 0)?,
        name: cell(row, 1).to_string(),
        url: opt(row, 2),
        image_url: opt(row, 3),
        genres: serde_json::from_str(cell(row, 4)).unwrap_or_default(),
        created_at: parse_time(cell(row, 5))?,
    })
}

// RelatedArtists: id | source_artist_id | target_artist_id | reason | created_at
fn edge_to_row(edge: &RelatedArtistEdge) -> Vec<String> {
    vec![
        edge.id.to_string(),
        edge.source_artist_id.clone(),
        edge.target_artist_id.clone(),
        opt_string(&edge.reason),
        edge.created_at.to_rfc3339(),
    ]
}

// ============================================================================
// Store
// ============================================================================

pub struct SheetLibraryStore {
    values: Arc<dyn SheetValues>,
    songs: SheetRef,
    albums: SheetRef,
    artists: SheetRef,
    related: SheetRef,
}

impl SheetLibraryStore {
    pub fn new(values: Arc<dyn SheetValues>, config: &SheetsConfig) -> Self {
        Self {
            values,
            songs: SheetRef::new(&config.songs_spreadsheet_id, &config.songs_sheet, 'G'),
            albums: SheetRef::new(&config.albums_spreadsheet_id, &config.albums_sheet, 'N'),
            artists: SheetRef::new(&config.library_spreadsheet_id, &config.artists_sheet, 'F'),
            related: SheetRef::new(&config.library_spreadsheet_id, &config.related_sheet, 'E'),
        }
    }

    async fn rows(&self, sheet: &SheetRef) -> Result<Vec<Vec<String>>> {
        Ok(self
            .values
            .read(&sheet.spreadsheet_id, &sheet.all_rows())
            .await?)
    }

    /// 1-based row number and record of the first row whose id column matches.
    async fn find<T>(
        &self,
        sheet: &SheetRef,
        id: &str,
        parse: fn(&[String]) -> Option<T>,
    ) -> Result<Option<(usize, T)>> {
        let rows = self.rows(sheet).await?;
        Ok(rows.iter().enumerate().find_map(|(i, row)| {
            (cell(row, 0) == id)
                .then(|| parse(row))
                .flatten()
                .map(|record| (i + 1, record))
        }))
    }

    async fn write_row(&self, sheet: &SheetRef, row: usize, values: Vec<String>) -> Result<()> {
        self.values
            .update(&sheet.spreadsheet_id, &sheet.row(row), vec![values])
            .await?;
        Ok(())
    }

    async fn append(&self, sheet: &SheetRef, rows: Vec<Vec<String>>) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        self.values
            .append(&sheet.spreadsheet_id, &sheet.all_rows(), rows)
            .await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl LibraryStore for SheetLibraryStore {
    async fn get_song(&self, id: &str) -> Result<Option<Song>> {
        Ok(self.find(&self.songs, id, row_to_song).await?.map(|(_, s)| s))
    }

    async fn song_ratings(&self, ids: &[String]) -> Result<HashMap<String, Rating>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let wanted: HashSet<&str> = ids.iter().map(String::as_str).collect();
        let mut out = HashMap::new();
        for song in self.rows(&self.songs).await?.iter().filter_map(|r| row_to_song(r)) {
            if wanted.contains(song.id.as_str()) {
                out.entry(song.id).or_insert(song.rating);
            }
        }
        Ok(out)
    }

    async fn insert_songs(&self, songs: &[Song]) -> Result<usize> {
        for song in songs {
            ensure_valid("song", song)?;
        }
        let mut known: HashSet<String> = self
            .rows(&self.songs)
            .await?
            .iter()
            .map(|r| cell(r, 0).to_string())
            .collect();
        let fresh: Vec<Vec<String>> = songs
            .iter()
            .filter(|s| known.insert(s.id.clone()))
            .map(song_to_row)
            .collect();
        let count = fresh.len();
        debug!(target: "sheets", count, "appending songs");
        self.append(&self.songs, fresh).await?;
        Ok(count)
    }

    async fn update_song_rating(&self, id: &str, rating: Rating) -> Result<()> {
        let (row, mut song) = self
            .find(&self.songs, id, row_to_song)
            .await?
            .ok_or_else(|| anyhow!("song {id} not found"))?;
        song.rating = rating;
        song.saved_at = Some(Utc::now());
        self.write_row(&self.songs, row, song_to_row(&song)).await
    }

    async fn album_song_ratings(&self, album_id: &str) -> Result<Vec<Rating>> {
        Ok(self
            .rows(&self.songs)
            .await?
            .iter()
            .filter_map(|r| row_to_song(r))
            .filter(|s| s.album_id.as_deref() == Some(album_id))
            .map(|s| s.rating)
            .collect())
    }

    async fn get_album(&self, id: &str) -> Result<Option<Album>> {
        Ok(self.find(&self.albums, id, row_to_album).await?.map(|(_, a)| a))
    }

    async fn upsert_album(&self, album: &Album) -> Result<()> {
        ensure_valid("album", album)?;
        match self.find(&self.albums, &album.id, row_to_album).await? {
            Some((row, stored)) => {
                let merged = Album {
                    id: stored.id,
                    artist_id: album.artist_id.clone().or(stored.artist_id),
                    title: album.title.clone(),
                    image_url: album.image_url.clone().or(stored.image_url),
                    url: album.url.clone().or(stored.url),
                    release_date: album.release_date.clone().or(stored.release_date),
                    genre: album.genre.clone().or(stored.genre),
                    album_type: album.album_type.clone().or(stored.album_type),
                    total_tracks: album.total_tracks.or(stored.total_tracks),
                    popularity: album.popularity.or(stored.popularity),
                    score: stored.score,
                    is_featured: stored.is_featured,
                    saved_at: stored.saved_at,
                    created_at: stored.created_at,
                };
                self.write_row(&self.albums, row, album_to_row(&merged)).await
            }
            None => self.append(&self.albums, vec![album_to_row(album)]).await,
        }
    }

    async fn set_album_score(&self, id: &str, score: f64) -> Result<()> {
        let (row, mut album) = self
            .find(&self.albums, id, row_to_album)
            .await?
            .ok_or_else(|| anyhow!("album {id} not found"))?;
        album.score = Some(score);
        self.write_row(&self.albums, row, album_to_row(&album)).await
    }

    async fn set_album_featured(&self, id: &str, featured: bool) -> Result<()> {
        let (row, mut album) = self
            .find(&self.albums, id, row_to_album)
            .await?
            .ok_or_else(|| anyhow!("album {id} not found"))?;
        album.is_featured = featured;
        album.saved_at = Some(Utc::now());
        self.write_row(&self.albums, row, album_to_row(&album)).await
    }

    async fn get_artist(&self, id: &str) -> Result<Option<Artist>> {
        Ok(self.find(&self.artists, id, row_to_artist).await?.map(|(_, a)| a))
    }

    async fn find_artist_by_name(&self, name: &str) -> Result<Option<Artist>> {
        let needle = name.trim().to_lowercase();
        Ok(self
            .rows(&self.artists)
            .await?
            .iter()
            .filter_map(|r| row_to_artist(r))
            .find(|a| a.name.trim().to_lowercase() == needle))
    }

    async fn upsert_artist(&self, artist: &Artist) -> Result<()> {
        ensure_valid("artist", artist)?;
        match self.find(&self.artists, &artist.id, row_to_artist).await? {
            Some((row, stored)) => {
                let merged = Artist {
                    id: stored.id,
                    name: artist.name.clone(),
                    url: artist.url.clone().or(stored.url),
                    image_url: artist.image_url.clone().or(stored.image_url),
                    genres: if artist.genres.is_empty() {
                        stored.genres
                    } else {
                        artist.genres.clone()
                    },
                    created_at: stored.created_at,
                };
                self.write_row(&self.artists, row, artist_to_row(&merged)).await
            }
            None => self.append(&self.artists, vec![artist_to_row(artist)]).await,
        }
    }

    async fn related_artists(&self, source_artist_id: &str) -> Result<Vec<RelatedArtist>> {
        let edges = self.rows(&self.related).await?;
        let artists: HashMap<String, Artist> = self
            .rows(&self.artists)
            .await?
            .iter()
            .filter_map(|r| row_to_artist(r))
            .map(|a| (a.id.clone(), a))
            .collect();

        let mut seen = HashSet::new();
        Ok(edges
            .iter()
            .filter(|r| cell(r, 1) == source_artist_id)
            .filter(|r| seen.insert(cell(r, 2).to_string()))
            .filter_map(|r| {
                artists.get(cell(r, 2)).map(|artist| RelatedArtist {
                    artist: artist.clone(),
                    reason: cell(r, 3).to_string(),
                })
            })
            .collect())
    }

    async fn insert_related_edges(&self, edges: &[RelatedArtistEdge]) -> Result<usize> {
        for edge in edges {
            ensure_valid("related artist edge", edge)?;
        }
        let mut known: HashSet<(String, String)> = self
            .rows(&self.related)
            .await?
            .iter()
            .map(|r| (cell(r, 1).to_string(), cell(r, 2).to_string()))
            .collect();
        let fresh: Vec<Vec<String>> = edges
            .iter()
            .filter(|e| known.insert((e.source_artist_id.clone(), e.target_artist_id.clone())))
            .map(edge_to_row)
            .collect();
        let count = fresh.len();
        debug!(target: "sheets", count, "appending related artist edges");
        self.append(&self.related, fresh).await?;
        Ok(count)
    }
}

#[cfg(test)]
pub(crate) mod memory {
    use super::*;
    use std::sync::Mutex;

    /// Sheet values held in memory, addressed the way the store addresses them.
    #[derive(Default)]
    pub struct MemorySheets {
        pub sheets: Mutex<HashMap<(String, String), Vec<Vec<String>>>>,
    }

    fn split(range: &str) -> (String, Option<usize>) {
        let (sheet, cells) = range.rsplit_once('!').unwrap_or((range, ""));
        let sheet = sheet
            .trim_start_matches('\'')
            .trim_end_matches('\'')
            .replace("''", "'");
        let row = cells
            .split(':')
            .next()
            .map(|c| c.trim_start_matches(|ch: char| ch.is_ascii_alphabetic()))
            .and_then(|digits| digits.parse().ok());
        (sheet, row)
    }

    #[async_trait::async_trait]
    impl SheetValues for MemorySheets {
        async fn read(&self, id: &str, range: &str) -> Result<Vec<Vec<String>>, SheetsError> {
            let (sheet, _) = split(range);
            let sheets = self.sheets.lock().unwrap();
            Ok(sheets.get(&(id.to_string(), sheet)).cloned().unwrap_or_default())
        }

        async fn update(&self, id: &str, range: &str, rows: Vec<Vec<String>>) -> Result<(), SheetsError> {
            let (sheet, row) = split(range);
            let row = row.expect("update targets a row");
            let mut sheets = self.sheets.lock().unwrap();
            let data = sheets.entry((id.to_string(), sheet)).or_default();
            for (offset, values) in rows.into_iter().enumerate() {
                let index = row - 1 + offset;
                if data.len() <= index {
                    data.resize(index + 1, Vec::new());
                }
                data[index] = values;
            }
            Ok(())
        }

        async fn append(&self, id: &str, range: &str, rows: Vec<Vec<String>>) -> Result<(), SheetsError> {
            let (sheet, _) = split(range);
            let mut sheets = self.sheets.lock().unwrap();
            sheets.entry((id.to_string(), sheet)).or_default().extend(rows);
            Ok(())
        }
    }
}
