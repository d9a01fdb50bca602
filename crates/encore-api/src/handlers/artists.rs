// SPDX-License-Identifier: GPL-3.0-or-later
use axum::{
    extract::{Path, State},
    Extension, Json,
};
use encore_application::{AppState, ArtistDetail, Credentials, RelatedArtistView, ServiceError};
use encore_domain::Artist;
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;

use crate::error::{ApiError, ApiResult, ErrorResponse};

#[derive(Debug, Deserialize, ToSchema)]
pub struct SaveRelatedRequest {
    pub source_artist_id: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SaveRelatedResponse {
    pub success: bool,
    pub count: usize,
    #[schema(value_type = Vec<Object>)]
    pub data: Vec<RelatedArtistView>,
}

#[utoipa::path(
    post,
    path = "/api/v1/artists/related/save",
    request_body = SaveRelatedRequest,
    responses(
        (status = 200, description = "Related artists generated and stored", body = SaveRelatedResponse),
        (status = 400, description = "Missing source artist id", body = ErrorResponse),
        (status = 404, description = "Source artist not found", body = ErrorResponse)
    ),
    tag = "artists"
)]
pub async fn save_related(
    State(state): State<AppState>,
    Extension(credentials): Extension<Credentials>,
    Json(request): Json<SaveRelatedRequest>,
) -> ApiResult<Json<SaveRelatedResponse>> {
    let source_id = request
        .source_artist_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| ApiError(ServiceError::InvalidInput("source_artist_id is required".into())))?;

    let token = state.auth.resolve_optional(&credentials).await;
    let data = state
        .related
        .refresh_from_source(&source_id, token.as_deref())
        .await?;
    info!(target: "api", source_id, count = data.len(), "related artists saved");
    Ok(Json(SaveRelatedResponse {
        success: true,
        count: data.len(),
        data,
    }))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ArtistDetailResponse {
    pub success: bool,
    #[schema(value_type = Object)]
    pub artist: Artist,
    #[schema(value_type = Vec<Object>)]
    pub related: Vec<RelatedArtistView>,
}

#[utoipa::path(
    get,
    path = "/api/v1/artists/{id}",
    params(
        ("id" = String, Path, description = "Library artist id")
    ),
    responses(
        (status = 200, description = "Artist and its stored related artists", body = ArtistDetailResponse),
        (status = 404, description = "Artist not found", body = ErrorResponse)
    ),
    tag = "artists"
)]
pub async fn artist_detail(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ArtistDetailResponse>> {
    let ArtistDetail { artist, related } = state.related.artist_detail(&id).await?;
    Ok(Json(ArtistDetailResponse {
        success: true,
        artist,
        related,
    }))
}
