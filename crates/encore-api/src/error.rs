// SPDX-License-Identifier: GPL-3.0-or-later
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use encore_application::ServiceError;
use serde::Serialize;
use tracing::{error, warn};
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    /// The user has to sign in or open a player before retrying.
    pub action_required: bool,
}

impl From<&ServiceError> for ErrorResponse {
    fn from(err: &ServiceError) -> Self {
        Self {
            success: false,
            error: err.to_string(),
            action_required: err.needs_user_action(),
        }
    }
}

/// A classified service failure on its way out as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub ServiceError);

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        Self(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            ServiceError::NotAuthenticated => StatusCode::UNAUTHORIZED,
            ServiceError::Forbidden(_) => StatusCode::FORBIDDEN,
            ServiceError::NoActiveDevice | ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ServiceError::RecommendationParse(_) => StatusCode::BAD_GATEWAY,
            ServiceError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(target: "api", error = %self.0, "request failed");
        } else {
            warn!(target: "api", %status, error = %self.0, "request rejected");
        }
        (status, Json(ErrorResponse::from(&self.0))).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
