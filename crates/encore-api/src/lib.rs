// SPDX-License-Identifier: GPL-3.0-or-later
pub mod error;
pub mod handlers;
pub mod middleware;

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Json, Router,
};
use encore_application::AppState;
use handlers::artists::{
    artist_detail, save_related, ArtistDetailResponse, SaveRelatedRequest, SaveRelatedResponse,
    __path_artist_detail, __path_save_related,
};
use handlers::auth::{__path_callback, __path_login, callback, login};
use handlers::curator::{generate, CurateRequest, CurateResponse, __path_generate};
use handlers::player::{
    control, now_playing, queue, rate, related_artists, save_album, ControlRequest, QueueRequest,
    RateRequest, RateResponse, RelatedArtistsResponse, SaveAlbumRequest, SaveAlbumResponse,
    SuccessResponse, __path_control, __path_now_playing, __path_queue, __path_rate,
    __path_related_artists, __path_save_album,
};
use middleware::auth::credentials_middleware;
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::error::ErrorResponse;

#[derive(Serialize, utoipa::ToSchema)]
struct HealthResponse {
    status: &'static str,
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    ),
    tag = "system"
)]
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        login,
        callback,
        now_playing,
        control,
        rate,
        save_album,
        queue,
        related_artists,
        save_related,
        artist_detail,
        generate,
    ),
    components(
        schemas(
            HealthResponse,
            ErrorResponse,
            SuccessResponse,
            ControlRequest,
            RateRequest,
            RateResponse,
            SaveAlbumRequest,
            SaveAlbumResponse,
            QueueRequest,
            RelatedArtistsResponse,
            SaveRelatedRequest,
            SaveRelatedResponse,
            ArtistDetailResponse,
            CurateRequest,
            CurateResponse,
        )
    ),
    tags(
        (name = "system", description = "System health and status endpoints"),
        (name = "auth", description = "Spotify login flow"),
        (name = "player", description = "Now playing, ratings and playback control"),
        (name = "artists", description = "Library artists and their related artists"),
        (name = "curator", description = "Mood based recommendations")
    ),
    info(
        title = "Encore API",
        version = "0.1.0",
        description = "Music dashboard backend: now playing, ratings and recommendations",
    )
)]
pub struct ApiDoc;

pub fn router(state: AppState) -> Router {
    info!(target: "api", "building router");

    let api_v1 = Router::new()
        .route("/player/now-playing", get(now_playing))
        .route("/player/control", post(control))
        .route("/player/rate", post(rate))
        .route("/player/save-album", post(save_album))
        .route("/player/queue", post(queue))
        .route("/player/related-artists", get(related_artists))
        .route("/artists/related/save", post(save_related))
        .route("/artists/:id", get(artist_detail))
        .route("/curator/generate", post(generate));

    let openapi = ApiDoc::openapi();

    Router::new()
        .route("/health", get(health))
        .route("/auth/login", get(login))
        .route("/auth/callback", get(callback))
        .nest("/api/v1", api_v1)
        .layer(axum_middleware::from_fn(credentials_middleware))
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", openapi))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
