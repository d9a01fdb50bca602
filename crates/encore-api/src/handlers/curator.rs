// SPDX-License-Identifier: GPL-3.0-or-later
use axum::{extract::State, Extension, Json};
use encore_application::{AppState, Credentials, CuratedArtist, CurationRequest, CuratorService};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::{ApiResult, ErrorResponse};

/// Mood profile for a curation run. Sliders are percentages.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CurateRequest {
    #[serde(default)]
    pub genre: String,
    pub melancholy: Option<u8>,
    pub energy: Option<u8>,
    pub obscurity: Option<u8>,
}

impl From<CurateRequest> for CurationRequest {
    fn from(request: CurateRequest) -> Self {
        Self {
            genre: request.genre,
            melancholy: request.melancholy,
            energy: request.energy,
            obscurity: request.obscurity,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CurateResponse {
    pub success: bool,
    #[schema(value_type = Vec<Object>)]
    pub data: Vec<CuratedArtist>,
}

#[utoipa::path(
    post,
    path = "/api/v1/curator/generate",
    request_body = CurateRequest,
    responses(
        (status = 200, description = "Curated picks", body = CurateResponse),
        (status = 400, description = "Missing or unknown genre", body = ErrorResponse),
        (status = 502, description = "Recommendations could not be parsed", body = ErrorResponse)
    ),
    tag = "curator"
)]
pub async fn generate(
    State(state): State<AppState>,
    Extension(credentials): Extension<Credentials>,
    Json(request): Json<CurateRequest>,
) -> ApiResult<Json<CurateResponse>> {
    let request = CurationRequest::from(request);
    CuratorService::profile(&request)?;
    let token = state.auth.resolve_optional(&credentials).await;
    let data = state.curator.generate(&request, token.as_deref()).await?;
    Ok(Json(CurateResponse {
        success: true,
        data,
    }))
}
