// SPDX-License-Identifier: GPL-3.0-or-later
use std::sync::Arc;

use encore_spotify::TokenResponse;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::error::{ServiceError, ServiceResult};
use crate::ports::PlaybackProvider;

/// Tokens presented by a request, from a header or cookies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

impl Credentials {
    pub fn bearer(token: impl Into<String>) -> Self {
        Self {
            access_token: Some(token.into()),
            refresh_token: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        non_empty(&self.access_token).is_none() && non_empty(&self.refresh_token).is_none()
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Where to send the browser, and the state value to remember for the callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginRedirect {
    pub url: String,
    pub state: String,
}

pub struct AuthService {
    provider: Arc<dyn PlaybackProvider>,
}

impl AuthService {
    pub fn new(provider: Arc<dyn PlaybackProvider>) -> Self {
        Self { provider }
    }

    /// An access token usable for provider calls.
    ///
    /// A presented access token wins. Otherwise a refresh token is traded for
    /// a fresh one. With neither, the caller is not authenticated.
    #[instrument(skip_all)]
    pub async fn resolve(&self, credentials: &Credentials) -> ServiceResult<String> {
        if let Some(token) = non_empty(&credentials.access_token) {
            return Ok(token.to_string());
        }
        let Some(refresh) = non_empty(&credentials.refresh_token) else {
            return Err(ServiceError::NotAuthenticated);
        };

        debug!(target: "auth", "minting access token from refresh token");
        match self.provider.refresh_access_token(refresh).await {
            Ok(tokens) => Ok(tokens.access_token),
            Err(err) => {
                warn!(target: "auth", error = %err, "refresh grant failed");
                Err(ServiceError::NotAuthenticated)
            }
        }
    }

    /// Like [`resolve`](Self::resolve) but for callers that can proceed without a token.
    pub async fn resolve_optional(&self, credentials: &Credentials) -> Option<String> {
        if credentials.is_empty() {
            return None;
        }
        self.resolve(credentials).await.ok()
    }

    pub fn login(&self) -> ServiceResult<LoginRedirect> {
        let state = Uuid::new_v4().simple().to_string();
        let url = self.provider.authorize_url(&state)?;
        Ok(LoginRedirect { url, state })
    }

    /// Trade the authorization code from the callback for tokens.
    ///
    /// When the login flow remembered a state value, the callback must echo it.
    #[instrument(skip_all)]
    pub async fn complete_login(
        &self,
        code: Option<&str>,
        returned_state: Option<&str>,
        expected_state: Option<&str>,
    ) -> ServiceResult<TokenResponse> {
        let code = code
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| ServiceError::InvalidInput("Missing code".into()))?;

        if let Some(expected) = expected_state {
            if returned_state != Some(expected) {
                warn!(target: "auth", "authorization state mismatch");
                return Err(ServiceError::InvalidInput("State mismatch".into()));
            }
        }

        let tokens = self.provider.exchange_code(code).await?;
        info!(
            target: "auth",
            expires_in = ?tokens.expires_in,
            has_refresh = tokens.refresh_token.is_some(),
            "authorization code exchanged"
        );
        Ok(tokens)
    }
}
