// SPDX-License-Identifier: GPL-3.0-or-later
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use encore_application::{
    AppState, Credentials, FeaturedStatus, PlaybackCommand, PlaylistSync, RelatedArtistView,
    RelatedArtistsQuery, RelatedSource, SaveStatus, ServiceError, TrackContext,
};
use encore_domain::Rating;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, error};
use utoipa::{IntoParams, ToSchema};

use crate::error::{ApiError, ApiResult, ErrorResponse};

#[derive(Debug, Serialize, ToSchema)]
pub struct SuccessResponse {
    pub success: bool,
}

impl SuccessResponse {
    fn ok() -> Json<Self> {
        Json(Self { success: true })
    }
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct NowPlayingParams {
    /// Identity and progress only.
    #[serde(default)]
    pub minimal: bool,
}

fn not_playing(status: StatusCode, key: &str, message: &str) -> Response {
    let mut body = Map::new();
    body.insert("is_playing".into(), Value::Bool(false));
    body.insert(key.into(), Value::String(message.into()));
    (status, Json(Value::Object(body))).into_response()
}

#[utoipa::path(
    get,
    path = "/api/v1/player/now-playing",
    params(NowPlayingParams),
    responses(
        (status = 200, description = "Current playback snapshot, or is_playing false"),
        (status = 401, description = "Not authenticated"),
        (status = 500, description = "Playback could not be fetched")
    ),
    tag = "player"
)]
pub async fn now_playing(
    State(state): State<AppState>,
    Extension(credentials): Extension<Credentials>,
    Query(params): Query<NowPlayingParams>,
) -> Response {
    let token = match state.auth.resolve(&credentials).await {
        Ok(token) => token,
        Err(_) => return not_playing(StatusCode::UNAUTHORIZED, "message", "Not authenticated"),
    };

    match state.now_playing.now_playing(&token, params.minimal).await {
        Ok(snapshot) => Json(snapshot).into_response(),
        Err(ServiceError::NotAuthenticated) => {
            not_playing(StatusCode::UNAUTHORIZED, "message", "Not authenticated")
        }
        Err(err) => {
            error!(target: "api", error = %err, "now playing lookup failed");
            not_playing(StatusCode::INTERNAL_SERVER_ERROR, "error", "Failed to fetch")
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ControlRequest {
    /// One of play, pause, next, previous.
    #[serde(default)]
    pub action: String,
}

#[utoipa::path(
    post,
    path = "/api/v1/player/control",
    request_body = ControlRequest,
    responses(
        (status = 200, description = "Command sent", body = SuccessResponse),
        (status = 400, description = "Invalid action", body = ErrorResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 403, description = "Command restricted by Spotify", body = ErrorResponse),
        (status = 404, description = "No active device", body = ErrorResponse)
    ),
    tag = "player"
)]
pub async fn control(
    State(state): State<AppState>,
    Extension(credentials): Extension<Credentials>,
    Json(request): Json<ControlRequest>,
) -> ApiResult<Json<SuccessResponse>> {
    let command: PlaybackCommand = request.action.parse()?;
    let token = state.auth.resolve(&credentials).await?;
    state.playback.control(&token, command).await?;
    Ok(SuccessResponse::ok())
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RateRequest {
    #[schema(value_type = Option<Object>)]
    pub track: Option<TrackContext>,
    pub rating: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RateResponse {
    pub success: bool,
    /// `added` for a new song, `updated` for a re-rating.
    #[schema(value_type = String)]
    pub status: SaveStatus,
    /// `added`, `skipped` or `failed`.
    #[schema(value_type = String)]
    pub playlist: PlaylistSync,
}

#[utoipa::path(
    post,
    path = "/api/v1/player/rate",
    request_body = RateRequest,
    responses(
        (status = 200, description = "Rating stored", body = RateResponse),
        (status = 400, description = "Missing track or rating", body = ErrorResponse)
    ),
    tag = "player"
)]
pub async fn rate(
    State(state): State<AppState>,
    Extension(credentials): Extension<Credentials>,
    Json(request): Json<RateRequest>,
) -> ApiResult<Json<RateResponse>> {
    let (Some(track), Some(rating)) = (request.track, request.rating) else {
        return Err(ApiError(ServiceError::InvalidInput(
            "Missing track or rating".into(),
        )));
    };
    let rating = Rating::user(rating).ok_or_else(|| {
        ServiceError::InvalidInput("Rating must be between 1 and 5".into())
    })?;

    let token = state.auth.resolve_optional(&credentials).await;
    let outcome = state
        .ratings
        .rate_track(token.as_deref(), &track, rating)
        .await?;
    debug!(target: "api", status = ?outcome.status, playlist = ?outcome.playlist, "track rated");
    Ok(Json(RateResponse {
        success: true,
        status: outcome.status,
        playlist: outcome.playlist,
    }))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SaveAlbumRequest {
    #[serde(default)]
    pub album_id: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SaveAlbumResponse {
    pub success: bool,
    /// `featured` or `unfeatured`.
    #[schema(value_type = String)]
    pub status: FeaturedStatus,
    pub is_featured: bool,
}

#[utoipa::path(
    post,
    path = "/api/v1/player/save-album",
    request_body = SaveAlbumRequest,
    responses(
        (status = 200, description = "Featured flag toggled", body = SaveAlbumResponse),
        (status = 400, description = "Missing album id", body = ErrorResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    ),
    tag = "player"
)]
pub async fn save_album(
    State(state): State<AppState>,
    Extension(credentials): Extension<Credentials>,
    Json(request): Json<SaveAlbumRequest>,
) -> ApiResult<Json<SaveAlbumResponse>> {
    if request.album_id.trim().is_empty() {
        return Err(ApiError(ServiceError::InvalidInput("Missing Album ID".into())));
    }
    let token = state.auth.resolve(&credentials).await?;
    let status = state.ratings.save_album(&token, &request.album_id).await?;
    Ok(Json(SaveAlbumResponse {
        success: true,
        status,
        is_featured: status.is_featured(),
    }))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct QueueRequest {
    #[serde(default)]
    pub uri: String,
}

#[utoipa::path(
    post,
    path = "/api/v1/player/queue",
    request_body = QueueRequest,
    responses(
        (status = 200, description = "Track queued", body = SuccessResponse),
        (status = 400, description = "Missing track URI", body = ErrorResponse),
        (status = 404, description = "No active device", body = ErrorResponse)
    ),
    tag = "player"
)]
pub async fn queue(
    State(state): State<AppState>,
    Extension(credentials): Extension<Credentials>,
    Json(request): Json<QueueRequest>,
) -> ApiResult<Json<SuccessResponse>> {
    if request.uri.trim().is_empty() {
        return Err(ApiError(ServiceError::InvalidInput("Missing track URI".into())));
    }
    let token = state.auth.resolve(&credentials).await?;
    state.playback.enqueue(&token, &request.uri).await?;
    Ok(SuccessResponse::ok())
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RelatedArtistsParams {
    /// Name of the artist to find neighbours for.
    pub artist: Option<String>,
    /// Library id of that artist, enables persisted lookups.
    pub artist_id: Option<String>,
    /// Skip persisted and cached results.
    #[serde(default)]
    pub refresh: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RelatedArtistsResponse {
    pub success: bool,
    #[schema(value_type = Vec<Object>)]
    pub artists: Vec<RelatedArtistView>,
    /// `database`, `cache` or `generated`.
    #[schema(value_type = String)]
    pub source: RelatedSource,
}

#[utoipa::path(
    get,
    path = "/api/v1/player/related-artists",
    params(RelatedArtistsParams),
    responses(
        (status = 200, description = "Related artists", body = RelatedArtistsResponse),
        (status = 400, description = "Artist name is required", body = ErrorResponse),
        (status = 502, description = "Recommendations could not be parsed", body = ErrorResponse)
    ),
    tag = "player"
)]
pub async fn related_artists(
    State(state): State<AppState>,
    Extension(credentials): Extension<Credentials>,
    Query(params): Query<RelatedArtistsParams>,
) -> ApiResult<Json<RelatedArtistsResponse>> {
    let query = RelatedArtistsQuery {
        artist_name: params.artist.unwrap_or_default(),
        artist_id: params.artist_id,
        force_refresh: params.refresh,
    };
    if query.artist_name.trim().is_empty() {
        return Err(ApiError(ServiceError::InvalidInput(
            "Artist name is required".into(),
        )));
    }
    let token = state.auth.resolve_optional(&credentials).await;
    // a background write keeps running after the handle is dropped
    let outcome = state.related.related(&query, token.as_deref()).await?;
    Ok(Json(RelatedArtistsResponse {
        success: true,
        artists: outcome.artists,
        source: outcome.source,
    }))
}
