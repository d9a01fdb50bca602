// SPDX-License-Identifier: GPL-3.0-or-later
use encore_metadata::GeminiError;
use encore_spotify::SpotifyError;
use thiserror::Error;

pub const FORBIDDEN_GUIDANCE: &str = "Spotify action is restricted. Sign in again at /auth/login to grant the player scopes, and make sure Spotify is not in a Private Session with an active device.";
pub const NO_ACTIVE_DEVICE: &str =
    "No active Spotify device found. Please open Spotify on your phone or computer.";

/// Request-level failure, classified for the presentation layer.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Not authenticated")]
    NotAuthenticated,
    #[error("{0}")]
    Forbidden(String),
    #[error("{NO_ACTIVE_DEVICE}")]
    NoActiveDevice,
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    InvalidInput(String),
    #[error("failed to parse recommendations: {0}")]
    RecommendationParse(String),
    #[error("{0}")]
    Upstream(String),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl ServiceError {
    /// Classification for playback commands, where a 404 means nothing can receive the command.
    pub fn from_playback(err: SpotifyError) -> Self {
        match err {
            SpotifyError::NotFound(_) => ServiceError::NoActiveDevice,
            other => other.into(),
        }
    }

    /// Whether the caller should prompt the user to act (sign in or open a player).
    pub fn needs_user_action(&self) -> bool {
        matches!(
            self,
            ServiceError::NotAuthenticated | ServiceError::NoActiveDevice
        )
    }
}

impl From<SpotifyError> for ServiceError {
    fn from(err: SpotifyError) -> Self {
        match err {
            SpotifyError::Unauthorized => ServiceError::NotAuthenticated,
            SpotifyError::Forbidden(_) => ServiceError::Forbidden(FORBIDDEN_GUIDANCE.to_string()),
            SpotifyError::NotFound(message) => ServiceError::NotFound(message),
            other => ServiceError::Upstream(other.to_string()),
        }
    }
}

impl From<GeminiError> for ServiceError {
    fn from(err: GeminiError) -> Self {
        match err {
            GeminiError::Parse(message) => ServiceError::RecommendationParse(message),
            other => ServiceError::Upstream(other.to_string()),
        }
    }
}

impl From<anyhow::Error> for ServiceError {
    fn from(err: anyhow::Error) -> Self {
        ServiceError::Upstream(err.to_string())
    }
}
