// SPDX-License-Identifier: GPL-3.0-or-later

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SpotifyError>;

#[derive(Debug, Error)]
pub enum SpotifyError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("Access token rejected by Spotify")]
    Unauthorized,

    #[error("Spotify refused the action: {0}")]
    Forbidden(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Invalid response from Spotify API: {0}")]
    InvalidResponse(String),

    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },
}

impl SpotifyError {
    /// Spotify answers 404 on player endpoints when no device is active.
    pub fn is_not_found(&self) -> bool {
        matches!(self, SpotifyError::NotFound(_))
    }
}
