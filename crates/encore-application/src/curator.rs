// SPDX-License-Identifier: GPL-3.0-or-later
use std::sync::Arc;

use encore_metadata::gemini::genre_profile;
use encore_metadata::{CuratedPick, CurationProfile};
use encore_spotify::models::first_image;
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::error::{ServiceError, ServiceResult};
use crate::ports::{PlaybackProvider, RecommendationGenerator};

const DEFAULT_SLIDER: u8 = 50;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurationRequest {
    pub genre: String,
    #[serde(default)]
    pub melancholy: Option<u8>,
    #[serde(default)]
    pub energy: Option<u8>,
    #[serde(default)]
    pub obscurity: Option<u8>,
}

/// A pick plus whatever the catalog could tell us about it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CuratedArtist {
    #[serde(flatten)]
    pub pick: CuratedPick,
    pub spotify_artist_id: Option<String>,
    pub spotify_album_id: Option<String>,
    pub album_image_url: Option<String>,
    pub album_spotify_url: Option<String>,
}

impl From<CuratedPick> for CuratedArtist {
    fn from(pick: CuratedPick) -> Self {
        Self {
            pick,
            spotify_artist_id: None,
            spotify_album_id: None,
            album_image_url: None,
            album_spotify_url: None,
        }
    }
}

fn slider(value: Option<u8>, name: &str) -> ServiceResult<u8> {
    match value.unwrap_or(DEFAULT_SLIDER) {
        v if v <= 100 => Ok(v),
        _ => Err(ServiceError::InvalidInput(format!(
            "{name} must be between 0 and 100"
        ))),
    }
}

pub struct CuratorService {
    generator: Option<Arc<dyn RecommendationGenerator>>,
    provider: Option<Arc<dyn PlaybackProvider>>,
    count: usize,
}

impl CuratorService {
    pub fn new(
        generator: Option<Arc<dyn RecommendationGenerator>>,
        provider: Option<Arc<dyn PlaybackProvider>>,
        count: usize,
    ) -> Self {
        Self {
            generator,
            provider,
            count,
        }
    }

    pub fn profile(request: &CurationRequest) -> ServiceResult<CurationProfile> {
        if request.genre.trim().is_empty() {
            return Err(ServiceError::InvalidInput("Genre is required".into()));
        }
        let genre = genre_profile(request.genre.trim())
            .ok_or_else(|| ServiceError::InvalidInput("Invalid genre".into()))?;
        Ok(CurationProfile {
            genre,
            melancholy: slider(request.melancholy, "melancholy")?,
            energy: slider(request.energy, "energy")?,
            obscurity: slider(request.obscurity, "obscurity")?,
        })
    }

    /// Curated picks for a mood profile. With a token each pick is matched to
    /// the catalog; a pick that cannot be matched is returned as generated.
    #[instrument(skip(self, token))]
    pub async fn generate(
        &self,
        request: &CurationRequest,
        token: Option<&str>,
    ) -> ServiceResult<Vec<CuratedArtist>> {
        let profile = Self::profile(request)?;
        let generator = self.generator.as_ref().ok_or_else(|| {
            ServiceError::Upstream("recommendation generator is not configured".into())
        })?;
        let picks = generator.curate(&profile, self.count).await?;
        debug!(target: "curator", genre = profile.genre.key, picks = picks.len(), "curated picks generated");

        let (Some(provider), Some(token)) = (self.provider.as_ref(), token) else {
            return Ok(picks.into_iter().map(CuratedArtist::from).collect());
        };
        Ok(join_all(
            picks
                .into_iter()
                .map(|pick| enrich(provider.as_ref(), token, pick)),
        )
        .await)
    }
}

async fn enrich(provider: &dyn PlaybackProvider, token: &str, pick: CuratedPick) -> CuratedArtist {
    let mut curated = CuratedArtist::from(pick);
    let album_query = format!(
        "artist:{} album:{}",
        curated.pick.artist_name, curated.pick.representative_album
    );

    match provider.search_albums(token, &album_query, 1).await {
        Ok(albums) => {
            if let Some(album) = albums.into_iter().next() {
                curated.album_image_url = first_image(&album.images);
                curated.album_spotify_url = album.external_urls.spotify;
                curated.spotify_artist_id = album.artists.first().and_then(|a| a.id.clone());
                curated.spotify_album_id = Some(album.id);
                return curated;
            }
        }
        Err(err) => {
            warn!(target: "curator", artist = %curated.pick.artist_name, error = %err, "album search failed");
            return curated;
        }
    }

    match provider
        .search_artists(token, &curated.pick.artist_name, 1)
        .await
    {
        Ok(artists) => {
            if let Some(artist) = artists.into_iter().next() {
                // the artist image stands in for the album cover
                curated.album_image_url = first_image(&artist.images);
                curated.album_spotify_url = artist.external_urls.spotify;
                curated.spotify_artist_id = Some(artist.id);
            }
        }
        Err(err) => {
            warn!(target: "curator", artist = %curated.pick.artist_name, error = %err, "artist search failed");
        }
    }
    curated
}
