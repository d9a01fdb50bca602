// SPDX-License-Identifier: GPL-3.0-or-later
//! Related-artist recommendations backed by the library, an in-process cache
//! and the text generator, in that order.

use std::collections::HashSet;
use std::sync::Arc;

use encore_config::{PersistenceMode, RecommendationConfig};
use encore_domain::{artist_name_key, Artist, RelatedArtist, RelatedArtistEdge};
use encore_infrastructure::LibraryStore;
use encore_metadata::ArtistSuggestion;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::catalog;
use crate::error::{ServiceError, ServiceResult};
use crate::ports::{PlaybackProvider, RecommendationGenerator};
use crate::recommendation_cache::RecommendationCache;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelatedArtistView {
    /// Library id; absent for suggestions that were never stored.
    pub id: Option<String>,
    pub name: String,
    pub reason: String,
    pub image_url: Option<String>,
    pub url: Option<String>,
    pub genres: Vec<String>,
}

impl From<RelatedArtist> for RelatedArtistView {
    fn from(related: RelatedArtist) -> Self {
        Self {
            id: Some(related.artist.id),
            name: related.artist.name,
            reason: related.reason,
            image_url: related.artist.image_url,
            url: related.artist.url,
            genres: related.artist.genres,
        }
    }
}

impl From<&ArtistSuggestion> for RelatedArtistView {
    fn from(suggestion: &ArtistSuggestion) -> Self {
        Self {
            id: None,
            name: suggestion.name.clone(),
            reason: suggestion.reason.clone(),
            image_url: None,
            url: None,
            genres: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelatedSource {
    Database,
    Cache,
    Generated,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelatedArtistsQuery {
    pub artist_name: String,
    pub artist_id: Option<String>,
    pub force_refresh: bool,
}

#[derive(Debug)]
pub struct RelatedArtistsOutcome {
    pub artists: Vec<RelatedArtistView>,
    pub source: RelatedSource,
    /// Background write of newly generated edges; resolves to the number stored.
    /// Dropping the handle does not cancel the write.
    pub persistence: Option<JoinHandle<anyhow::Result<usize>>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArtistDetail {
    pub artist: Artist,
    pub related: Vec<RelatedArtistView>,
}

/// Writes generated suggestions as edges. Owns its handles so it can run detached.
#[derive(Clone)]
struct EdgeWriter {
    store: Arc<dyn LibraryStore>,
    provider: Option<Arc<dyn PlaybackProvider>>,
}

impl EdgeWriter {
    async fn persist(
        self,
        source: Artist,
        suggestions: Vec<ArtistSuggestion>,
        token: Option<String>,
    ) -> anyhow::Result<usize> {
        self.store.upsert_artist(&source).await?;

        let mut edges = Vec::with_capacity(suggestions.len());
        for suggestion in &suggestions {
            let target = self.resolve(&suggestion.name, token.as_deref()).await?;
            if target.id == source.id {
                debug!(target: "related_artists", name = %suggestion.name, "suggestion resolved to the source artist");
                continue;
            }
            let reason = Some(suggestion.reason.clone()).filter(|r| !r.is_empty());
            edges.push(RelatedArtistEdge::new(source.id.clone(), target.id, reason));
        }
        let stored = self.store.insert_related_edges(&edges).await?;
        info!(target: "related_artists", source_artist_id = %source.id, stored, "related artists persisted");
        Ok(stored)
    }

    /// Library match by name, then catalog search, then a locally minted artist.
    async fn resolve(&self, name: &str, token: Option<&str>) -> anyhow::Result<Artist> {
        if let Some(existing) = self.store.find_artist_by_name(name).await? {
            return Ok(existing);
        }

        let hit = match (self.provider.as_ref(), token) {
            (Some(provider), Some(token)) => match provider.search_artists(token, name, 1).await {
                Ok(hits) => hits.first().map(catalog::artist_record),
                Err(err) => {
                    warn!(target: "related_artists", name, error = %err, "catalog search failed");
                    None
                }
            },
            _ => None,
        };
        let artist = hit.unwrap_or_else(|| Artist::minted(name));
        self.store.upsert_artist(&artist).await?;
        Ok(artist)
    }
}

pub struct RelatedArtistService {
    store: Arc<dyn LibraryStore>,
    generator: Option<Arc<dyn RecommendationGenerator>>,
    cache: RecommendationCache,
    writer: EdgeWriter,
    min_related: usize,
    target_count: usize,
    mode: PersistenceMode,
}

impl RelatedArtistService {
    pub fn new(
        store: Arc<dyn LibraryStore>,
        provider: Option<Arc<dyn PlaybackProvider>>,
        generator: Option<Arc<dyn RecommendationGenerator>>,
        cache: RecommendationCache,
        config: &RecommendationConfig,
    ) -> Self {
        Self {
            writer: EdgeWriter {
                store: store.clone(),
                provider,
            },
            store,
            generator,
            cache,
            min_related: config.min_related,
            target_count: config.target_count,
            mode: config.persistence,
        }
    }

    #[instrument(skip(self, token))]
    pub async fn related(
        &self,
        query: &RelatedArtistsQuery,
        token: Option<&str>,
    ) -> ServiceResult<RelatedArtistsOutcome> {
        let name = query.artist_name.trim();
        if name.is_empty() {
            return Err(ServiceError::InvalidInput("Artist name is required".into()));
        }
        let artist_id = query.artist_id.as_deref().filter(|id| !id.is_empty());

        let persisted = match artist_id {
            Some(id) => self.persisted(id).await,
            None => Vec::new(),
        };

        if !query.force_refresh {
            if persisted.len() >= self.min_related {
                debug!(target: "related_artists", count = persisted.len(), "serving persisted related artists");
                return Ok(RelatedArtistsOutcome {
                    artists: persisted,
                    source: RelatedSource::Database,
                    persistence: None,
                });
            }
            // library artists regenerate so their stored edges catch up
            if artist_id.is_none() {
                if let Some(cached) = self.cache.get(name) {
                    debug!(target: "related_artists", "serving cached related artists");
                    return Ok(RelatedArtistsOutcome {
                        artists: cached.as_ref().clone(),
                        source: RelatedSource::Cache,
                        persistence: None,
                    });
                }
            }
        }

        let outcome = self
            .generate(name, artist_id, persisted, token, self.mode)
            .await?;
        if !outcome.artists.is_empty() {
            self.cache.put(name, outcome.artists.clone());
        }
        Ok(outcome)
    }

    /// Generate and persist synchronously for an artist already in the library.
    #[instrument(skip(self, token))]
    pub async fn refresh_from_source(
        &self,
        source_artist_id: &str,
        token: Option<&str>,
    ) -> ServiceResult<Vec<RelatedArtistView>> {
        let source = self
            .store
            .get_artist(source_artist_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Source artist not found".into()))?;
        let persisted = self.persisted(&source.id).await;

        let outcome = self
            .generate(
                &source.name,
                Some(&source.id),
                persisted,
                token,
                PersistenceMode::Foreground,
            )
            .await?;
        self.cache.evict(&source.name);
        Ok(outcome.artists)
    }

    pub async fn artist_detail(&self, artist_id: &str) -> ServiceResult<ArtistDetail> {
        let artist = self
            .store
            .get_artist(artist_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Artist not found".into()))?;
        let related = self
            .store
            .related_artists(artist_id)
            .await?
            .into_iter()
            .map(RelatedArtistView::from)
            .collect();
        Ok(ArtistDetail { artist, related })
    }

    async fn persisted(&self, source_artist_id: &str) -> Vec<RelatedArtistView> {
        match self.store.related_artists(source_artist_id).await {
            Ok(related) => related.into_iter().map(RelatedArtistView::from).collect(),
            Err(err) => {
                warn!(target: "related_artists", source_artist_id, error = %err, "failed to read persisted related artists");
                Vec::new()
            }
        }
    }

    async fn generate(
        &self,
        name: &str,
        artist_id: Option<&str>,
        persisted: Vec<RelatedArtistView>,
        token: Option<&str>,
        mode: PersistenceMode,
    ) -> ServiceResult<RelatedArtistsOutcome> {
        let generator = self.generator.as_ref().ok_or_else(|| {
            ServiceError::Upstream("recommendation generator is not configured".into())
        })?;
        let suggestions = generator.related_artists(name, self.target_count).await?;

        let mut known: HashSet<String> = persisted.iter().map(|a| artist_name_key(&a.name)).collect();
        known.insert(artist_name_key(name));
        let fresh: Vec<ArtistSuggestion> = suggestions
            .into_iter()
            .filter(|s| !s.name.trim().is_empty() && known.insert(artist_name_key(&s.name)))
            .collect();
        debug!(target: "related_artists", fresh = fresh.len(), "deduplicated suggestions");

        let combined = || {
            let mut artists = persisted.clone();
            artists.extend(fresh.iter().map(RelatedArtistView::from));
            artists
        };

        let Some(source_id) = artist_id.filter(|_| !fresh.is_empty()) else {
            return Ok(RelatedArtistsOutcome {
                artists: combined(),
                source: RelatedSource::Generated,
                persistence: None,
            });
        };

        let source = Artist::new(source_id, name);
        let write = self
            .writer
            .clone()
            .persist(source, fresh.clone(), token.map(str::to_string));

        match mode {
            PersistenceMode::Foreground => {
                if let Err(err) = write.await {
                    error!(target: "related_artists", error = %err, "failed to persist related artists");
                    return Ok(RelatedArtistsOutcome {
                        artists: combined(),
                        source: RelatedSource::Generated,
                        persistence: None,
                    });
                }
                let artists = self.persisted(source_id).await;
                Ok(RelatedArtistsOutcome {
                    artists,
                    source: RelatedSource::Generated,
                    persistence: None,
                })
            }
            PersistenceMode::Background => {
                let handle = tokio::spawn(async move {
                    let result = write.await;
                    if let Err(err) = &result {
                        error!(target: "related_artists", error = %err, "background persistence failed");
                    }
                    result
                });
                Ok(RelatedArtistsOutcome {
                    artists: combined(),
                    source: RelatedSource::Generated,
                    persistence: Some(handle),
                })
            }
        }
    }
}
