// SPDX-License-Identifier: GPL-3.0-or-later
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Value Objects & IDs
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelatedArtistEdgeId(pub Uuid);

impl RelatedArtistEdgeId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RelatedArtistEdgeId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RelatedArtistEdgeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A track rating on the 0..=5 scale, where 0 means "unrated".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Rating(u8);

impl Rating {
    pub const UNRATED: Rating = Rating(0);
    /// Assigned the first time a track is seen without a prior rating.
    pub const DEFAULT: Rating = Rating(3);
    pub const MAX: u8 = 5;

    pub fn new(value: u8) -> Option<Self> {
        (value <= Self::MAX).then_some(Self(value))
    }

    /// Parse a user-supplied rating, which must be in 1..=5.
    pub fn user(value: i64) -> Option<Self> {
        if (1..=Self::MAX as i64).contains(&value) {
            Some(Self(value as u8))
        } else {
            None
        }
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn is_rated(self) -> bool {
        self.0 > 0
    }

    /// Score contribution of this rating; unrated tracks contribute nothing.
    pub fn points(self) -> f64 {
        RATING_POINTS[self.0 as usize]
    }
}

impl Default for Rating {
    fn default() -> Self {
        Self::UNRATED
    }
}

impl TryFrom<u8> for Rating {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Rating::new(value).ok_or_else(|| format!("rating out of range: {value}"))
    }
}

impl From<Rating> for u8 {
    fn from(value: Rating) -> Self {
        value.0
    }
}

impl std::fmt::Display for Rating {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Points per rating, indexed by the rating value (index 0 is "unrated").
pub const RATING_POINTS: [f64; 6] = [0.0, 0.0, 10.0, 60.0, 80.0, 100.0];

/// Album score in 0..=100 with one decimal place.
///
/// `total_slots` is the album's track count, not the number of rated tracks,
/// so a partially rated album is never inflated. An empty album scores 0.
pub fn album_score<I>(ratings: I, total_slots: usize) -> f64
where
    I: IntoIterator<Item = Rating>,
{
    if total_slots == 0 {
        return 0.0;
    }
    let total: f64 = ratings.into_iter().map(Rating::points).sum();
    round_one_decimal(total / total_slots as f64)
}

fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

// ============================================================================
// Entities
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artist {
    /// Provider catalog id when known, otherwise a locally minted UUID.
    pub id: String,
    pub name: String,
    pub url: Option<String>,
    pub image_url: Option<String>,
    pub genres: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Artist {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            url: None,
            image_url: None,
            genres: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// An artist the provider catalog does not know about.
    pub fn minted(name: impl Into<String>) -> Self {
        Self::new(Uuid::new_v4().to_string(), name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Album {
    pub id: String,
    pub artist_id: Option<String>,
    pub title: String,
    pub image_url: Option<String>,
    pub url: Option<String>,
    pub release_date: Option<String>,
    pub genre: Option<String>,
    pub album_type: Option<String>,
    pub total_tracks: Option<u32>,
    pub popularity: Option<u32>,
    pub score: Option<f64>,
    pub is_featured: bool,
    pub saved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Album {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            artist_id: None,
            title: title.into(),
            image_url: None,
            url: None,
            release_date: None,
            genre: None,
            album_type: None,
            total_tracks: None,
            popularity: None,
            score: None,
            is_featured: false,
            saved_at: Some(now),
            created_at: now,
        }
    }

    /// Stub created when only the flattened now-playing data is available.
    pub fn stub(id: impl Into<String>, title: impl Into<String>, image_url: Option<String>) -> Self {
        let id = id.into();
        let mut album = Self::new(id.clone(), title);
        album.url = Some(format!("https://open.spotify.com/album/{id}"));
        album.image_url = image_url;
        album
    }

    /// Recompute the score from the album's persisted ratings.
    /// Returns `None` when the track count is unknown.
    pub fn score_from<I>(&self, ratings: I) -> Option<f64>
    where
        I: IntoIterator<Item = Rating>,
    {
        match self.total_tracks {
            Some(total) if total > 0 => Some(album_score(ratings, total as usize)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Song {
    pub id: String,
    pub album_id: Option<String>,
    pub title: String,
    pub url: Option<String>,
    pub rating: Rating,
    pub saved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Song {
    pub fn new(id: impl Into<String>, title: impl Into<String>, rating: Rating) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            album_id: None,
            title: title.into(),
            url: None,
            rating,
            saved_at: Some(now),
            created_at: now,
        }
    }

    pub fn default_url(id: &str) -> String {
        format!("https://open.spotify.com/track/{id}")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelatedArtistEdge {
    pub id: RelatedArtistEdgeId,
    pub source_artist_id: String,
    pub target_artist_id: String,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl RelatedArtistEdge {
    pub fn new(
        source_artist_id: impl Into<String>,
        target_artist_id: impl Into<String>,
        reason: Option<String>,
    ) -> Self {
        Self {
            id: RelatedArtistEdgeId::new(),
            source_artist_id: source_artist_id.into(),
            target_artist_id: target_artist_id.into(),
            reason,
            created_at: Utc::now(),
        }
    }
}

/// A persisted edge joined with its target artist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelatedArtist {
    pub artist: Artist,
    pub reason: String,
}

/// Case- and width-insensitive key used to de-duplicate artist names.
pub fn artist_name_key(name: &str) -> String {
    use unicode_normalization::UnicodeNormalization;
    name.trim().nfkc().collect::<String>().to_lowercase()
}

// ============================================================================
// Domain Validation
// ============================================================================

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

pub trait Validate {
    fn validate(&self) -> Result<(), Vec<ValidationError>>;
}

fn finish(errors: Vec<ValidationError>) -> Result<(), Vec<ValidationError>> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

impl Validate for Artist {
    fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();
        if self.id.trim().is_empty() {
            errors.push(ValidationError {
                field: "id",
                message: "id cannot be empty".into(),
            });
        }
        if self.name.trim().is_empty() {
            errors.push(ValidationError {
                field: "name",
                message: "name cannot be empty".into(),
            });
        }
        finish(errors)
    }
}

impl Validate for Album {
    fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();
        if self.id.trim().is_empty() {
            errors.push(ValidationError {
                field: "id",
                message: "id cannot be empty".into(),
            });
        }
        if let Some(score) = self.score {
            if !(0.0..=100.0).contains(&score) {
                errors.push(ValidationError {
                    field: "score",
                    message: format!("score must be within 0..=100, got {score}"),
                });
            }
        }
        finish(errors)
    }
}

impl Validate for Song {
    fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();
        if self.id.trim().is_empty() {
            errors.push(ValidationError {
                field: "id",
                message: "id cannot be empty".into(),
            });
        }
        finish(errors)
    }
}

impl Validate for RelatedArtistEdge {
    fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();
        if self.source_artist_id == self.target_artist_id {
            errors.push(ValidationError {
                field: "target_artist_id",
                message: "an artist cannot be related to itself".into(),
            });
        }
        finish(errors)
    }
}

/// Flatten validation errors into a single message for logs and error values.
pub fn describe_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}
