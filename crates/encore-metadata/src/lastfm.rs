// SPDX-License-Identifier: GPL-3.0-or-later

//! Last.fm API client implementation

use chrono::{Local, NaiveTime, TimeZone, Utc};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, instrument, warn};

const LASTFM_API_BASE: &str = "https://ws.audioscrobbler.com/2.0";
const RECENT_TRACKS_PAGE: &str = "200";

/// Per-user play counts for the track being listened to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPlayCounts {
    pub artist: u64,
    pub album: u64,
    pub track: u64,
    /// Scrobbles since local midnight.
    pub today: u64,
    pub total: u64,
}

/// Struct representing the Last.fm API client.
#[derive(Debug, Clone)]
pub struct LastFmClient {
    api_key: String,
    username: String,
    client: Client,
    /// Base URL stored without a trailing slash.
    base_url: String,
}

impl LastFmClient {
    pub fn new(api_key: String, username: String, base_url: Option<String>) -> Self {
        Self::with_client(Client::new(), api_key, username, base_url)
    }

    pub fn with_client(
        client: Client,
        api_key: String,
        username: String,
        base_url: Option<String>,
    ) -> Self {
        let base_url = base_url
            .unwrap_or_else(|| LASTFM_API_BASE.to_string())
            .trim_end_matches('/')
            .to_string();
        debug!(target: "lastfm", base_url = %base_url, "Initialized Last.fm client");
        Self {
            api_key,
            username,
            client,
            base_url,
        }
    }

    /// Play counts for the configured user, scoped to the given artist, album and track.
    ///
    /// The lookups run concurrently and each count falls back to zero on its
    /// own. Artist, album and track lookups are skipped when their names are
    /// empty. Only when every attempted lookup fails is the first error returned.
    #[instrument(skip(self))]
    pub async fn user_play_counts(
        &self,
        artist: &str,
        album: &str,
        track: &str,
    ) -> Result<UserPlayCounts, LastFmError> {
        let user = self.username.as_str();
        let from = local_midnight_timestamp().to_string();
        let total_q: [(&str, &str); 0] = [];
        let artist_q = [("artist", artist), ("username", user)];
        let album_q = [("artist", artist), ("album", album), ("username", user)];
        let track_q = [("artist", artist), ("track", track), ("username", user)];
        let today_q = [("limit", RECENT_TRACKS_PAGE), ("from", from.as_str())];

        let (total, artist_count, album_count, track_count, today) = tokio::join!(
            self.lookup("user.getinfo", true, &total_q),
            self.lookup("artist.getinfo", !artist.is_empty(), &artist_q),
            self.lookup("album.getinfo", !artist.is_empty() && !album.is_empty(), &album_q),
            self.lookup("track.getinfo", !artist.is_empty() && !track.is_empty(), &track_q),
            self.lookup("user.getrecenttracks", true, &today_q),
        );

        let mut tally = Tally::default();
        let counts = UserPlayCounts {
            total: tally.count("user.getinfo", total, &["user", "playcount"]),
            artist: tally.count("artist.getinfo", artist_count, &["artist", "stats", "userplaycount"]),
            album: tally.count("album.getinfo", album_count, &["album", "userplaycount"]),
            track: tally.count("track.getinfo", track_count, &["track", "userplaycount"]),
            today: tally.count("user.getrecenttracks", today, &["recenttracks", "@attr", "total"]),
        };
        tally.finish(counts)
    }

    /// `None` when the lookup is skipped.
    async fn lookup(
        &self,
        method: &str,
        enabled: bool,
        params: &[(&str, &str)],
    ) -> Option<Result<Value, LastFmError>> {
        if !enabled {
            debug!(target: "lastfm", method, "Skipping lookup with empty name");
            return None;
        }
        Some(self.call(method, params).await)
    }

    async fn call(&self, method: &str, params: &[(&str, &str)]) -> Result<Value, LastFmError> {
        let url = format!("{}/", self.base_url);
        debug!(target: "lastfm", method, "Calling Last.fm");

        let response = self
            .client
            .get(&url)
            .query(&[
                ("method", method),
                ("api_key", self.api_key.as_str()),
                ("user", self.username.as_str()),
                ("format", "json"),
            ])
            .query(params)
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        parse_lastfm_body(status, &body)
    }
}

/// Error type returned by the Last.fm API client.
#[derive(Debug, Error)]
pub enum LastFmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("HTTP status {status}: {body}")]
    HttpStatus { status: StatusCode, body: String },
    /// Last.fm reports most failures in-band as `{ "error": n, "message": "..." }`.
    #[error("Last.fm API error {code}: {message}")]
    Api { code: i64, message: String },
    #[error("Deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),
}

fn parse_lastfm_body(status: StatusCode, body: &str) -> Result<Value, LastFmError> {
    let value: Result<Value, _> = serde_json::from_str(body);
    if let Ok(value) = &value {
        if let Some(code) = value.get("error").and_then(Value::as_i64) {
            let message = value
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            return Err(LastFmError::Api { code, message });
        }
    }
    if !status.is_success() {
        return Err(LastFmError::HttpStatus {
            status,
            body: body.to_string(),
        });
    }
    Ok(value?)
}

/// Collects per-lookup outcomes so one failure only zeroes its own count.
#[derive(Default)]
struct Tally {
    attempted: usize,
    errors: Vec<LastFmError>,
}

impl Tally {
    fn count(
        &mut self,
        method: &str,
        result: Option<Result<Value, LastFmError>>,
        path: &[&str],
    ) -> u64 {
        let Some(result) = result else {
            return 0;
        };
        self.attempted += 1;
        match result {
            Ok(value) => count_at(&value, path),
            Err(err) => {
                warn!(target: "lastfm", method, error = %err, "Play count lookup failed, using 0");
                self.errors.push(err);
                0
            }
        }
    }

    fn finish(mut self, counts: UserPlayCounts) -> Result<UserPlayCounts, LastFmError> {
        if self.attempted > 0 && self.errors.len() == self.attempted {
            return Err(self.errors.swap_remove(0));
        }
        Ok(counts)
    }
}

/// Last.fm sends counts as strings; missing or unparsable counts are zero.
fn count_at(value: &Value, path: &[&str]) -> u64 {
    let node = path.iter().try_fold(value, |node, key| node.get(key));
    match node {
        Some(Value::String(s)) => s.parse().unwrap_or(0),
        Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
        _ => 0,
    }
}

fn local_midnight_timestamp() -> i64 {
    let today = Local::now().date_naive().and_time(NaiveTime::default());
    match Local.from_local_datetime(&today).earliest() {
        Some(midnight) => midnight.timestamp(),
        None => Utc.from_utc_datetime(&today).timestamp(),
    }
}
