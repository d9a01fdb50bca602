// SPDX-License-Identifier: GPL-3.0-or-later
use axum::{
    extract::{Query, State},
    response::Redirect,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use encore_application::{AppState, ServiceError};
use serde::Deserialize;
use tracing::info;
use utoipa::IntoParams;

use crate::error::{ApiError, ApiResult, ErrorResponse};
use crate::middleware::auth::{
    cookie_value, ACCESS_TOKEN_COOKIE, AUTH_STATE_COOKIE, REFRESH_TOKEN_COOKIE,
};

const STATE_MAX_AGE: u64 = 600;
const DEFAULT_ACCESS_MAX_AGE: u64 = 3600;
const REFRESH_MAX_AGE: u64 = 30 * 24 * 3600;

fn cookie(name: &'static str, value: String, max_age: u64) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .max_age(time::Duration::seconds(i64::try_from(max_age).unwrap_or(i64::MAX)))
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

#[utoipa::path(
    get,
    path = "/auth/login",
    responses(
        (status = 303, description = "Redirect to the Spotify authorization page")
    ),
    tag = "auth"
)]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
) -> ApiResult<(CookieJar, Redirect)> {
    let redirect = state.auth.login()?;
    let jar = jar.add(cookie(AUTH_STATE_COOKIE, redirect.state, STATE_MAX_AGE));
    Ok((jar, Redirect::to(&redirect.url)))
}

#[utoipa::path(
    get,
    path = "/auth/callback",
    params(CallbackQuery),
    responses(
        (status = 303, description = "Tokens stored in cookies, redirect to the dashboard"),
        (status = 400, description = "Missing code or state mismatch", body = ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn callback(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(query): Query<CallbackQuery>,
) -> ApiResult<(CookieJar, Redirect)> {
    if let Some(error) = query.error.as_deref() {
        return Err(ApiError(ServiceError::InvalidInput(format!(
            "Authorization denied: {error}"
        ))));
    }
    let expected = cookie_value(&jar, AUTH_STATE_COOKIE);
    let tokens = state
        .auth
        .complete_login(
            query.code.as_deref(),
            query.state.as_deref(),
            expected.as_deref(),
        )
        .await?;

    let access_max_age = tokens.expires_in.unwrap_or(DEFAULT_ACCESS_MAX_AGE);
    let mut jar = jar
        .remove(Cookie::build(AUTH_STATE_COOKIE).path("/"))
        .add(cookie(ACCESS_TOKEN_COOKIE, tokens.access_token, access_max_age));
    if let Some(refresh) = tokens.refresh_token {
        jar = jar.add(cookie(REFRESH_TOKEN_COOKIE, refresh, REFRESH_MAX_AGE));
    }
    info!(target: "api", "login completed");
    Ok((jar, Redirect::to("/")))
}
