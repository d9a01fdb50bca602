// SPDX-License-Identifier: GPL-3.0-or-later
pub mod auth;
pub mod catalog;
pub mod curator;
pub mod error;
pub mod now_playing;
pub mod playback;
pub mod ports;
pub mod ratings;
pub mod recommendation_cache;
pub mod related_artists;
#[cfg(test)]
pub(crate) mod test_support;

pub use auth::{AuthService, Credentials, LoginRedirect};
pub use curator::{CuratedArtist, CurationRequest, CuratorService};
pub use error::{ServiceError, ServiceResult};
pub use now_playing::{NowPlaying, NowPlayingService, PlaybackSnapshot};
pub use playback::{PlaybackCommand, PlaybackService};
pub use ports::{PlaybackProvider, RecommendationGenerator, ScrobbleStats, SpotifyPlayback};
pub use ratings::{
    FeaturedStatus, PlaylistSync, RateOutcome, RatingService, SaveStatus, TrackContext,
};
pub use recommendation_cache::RecommendationCache;
pub use related_artists::{
    ArtistDetail, RelatedArtistService, RelatedArtistView, RelatedArtistsOutcome, RelatedArtistsQuery,
    RelatedSource,
};

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use encore_config::AppConfig;
use encore_infrastructure::{http_client, LibraryStore};
use encore_metadata::{GeminiClient, LastFmClient};
use encore_spotify::SpotifyClient;
use tracing::{info, warn};

/// External collaborators the services are wired to.
pub struct Ports {
    pub playback: Arc<dyn PlaybackProvider>,
    pub stats: Option<Arc<dyn ScrobbleStats>>,
    pub generator: Option<Arc<dyn RecommendationGenerator>>,
}

impl Ports {
    /// Clients for every service the configuration has credentials for.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let spotify = &config.spotify;
        let mut builder = SpotifyClient::builder()
            .credentials(spotify.client_id.clone(), spotify.client_secret.clone())
            .redirect_uri(spotify.redirect_uri.clone());
        if let Some(url) = &spotify.api_base_url {
            builder = builder.api_base_url(url.clone());
        }
        if let Some(url) = &spotify.accounts_base_url {
            builder = builder.accounts_base_url(url.clone());
        }
        let playback: Arc<dyn PlaybackProvider> =
            Arc::new(SpotifyPlayback::new(builder.build()?, spotify.market.clone()));

        let stats: Option<Arc<dyn ScrobbleStats>> =
            match (&config.lastfm.api_key, &config.lastfm.username) {
                (Some(key), Some(user)) => Some(Arc::new(LastFmClient::with_client(
                    http_client()?,
                    key.clone(),
                    user.clone(),
                    config.lastfm.base_url.clone(),
                ))),
                _ => {
                    warn!(target: "application", "lastfm credentials missing, play counts disabled");
                    None
                }
            };

        let generator: Option<Arc<dyn RecommendationGenerator>> = match &config.gemini.api_key {
            Some(key) => Some(Arc::new(GeminiClient::with_client(
                http_client()?,
                key.clone(),
                Some(config.gemini.model.clone()),
                config.gemini.base_url.clone(),
            ))),
            None => {
                warn!(target: "application", "gemini api key missing, recommendations disabled");
                None
            }
        };

        Ok(Self {
            playback,
            stats,
            generator,
        })
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub auth: Arc<AuthService>,
    pub now_playing: Arc<NowPlayingService>,
    pub ratings: Arc<RatingService>,
    pub playback: Arc<PlaybackService>,
    pub related: Arc<RelatedArtistService>,
    pub curator: Arc<CuratorService>,
}

impl AppState {
    pub fn new(config: AppConfig, store: Arc<dyn LibraryStore>, ports: Ports) -> Self {
        let recommendations = &config.recommendations;
        let ratings = Arc::new(RatingService::new(
            store.clone(),
            Some(ports.playback.clone()),
            config.spotify.liked_playlist_id.clone(),
        ));
        let cache = RecommendationCache::new(
            Duration::from_secs(recommendations.cache_ttl_secs),
            recommendations.cache_capacity,
        );
        let related = RelatedArtistService::new(
            store,
            Some(ports.playback.clone()),
            ports.generator.clone(),
            cache,
            recommendations,
        );
        let curator = CuratorService::new(
            ports.generator,
            Some(ports.playback.clone()),
            recommendations.target_count,
        );

        Self {
            auth: Arc::new(AuthService::new(ports.playback.clone())),
            now_playing: Arc::new(NowPlayingService::new(
                ports.playback.clone(),
                ports.stats,
                ratings.clone(),
            )),
            playback: Arc::new(PlaybackService::new(ports.playback)),
            ratings,
            related: Arc::new(related),
            curator: Arc::new(curator),
            config: Arc::new(config),
        }
    }

    pub fn from_config(config: AppConfig, store: Arc<dyn LibraryStore>) -> Result<Self> {
        let ports = Ports::from_config(&config)?;
        Ok(Self::new(config, store, ports))
    }

    pub fn on_start(&self) {
        info!(
            target: "application",
            backend = ?self.config.storage.backend,
            persistence = ?self.config.recommendations.persistence,
            "application state initialized"
        );
    }
}
