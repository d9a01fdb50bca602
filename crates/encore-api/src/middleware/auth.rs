// SPDX-License-Identifier: GPL-3.0-or-later
use axum::{
    extract::Request,
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use encore_application::Credentials;
use tracing::debug;

pub const ACCESS_TOKEN_COOKIE: &str = "spotify_access_token";
pub const REFRESH_TOKEN_COOKIE: &str = "spotify_refresh_token";
pub const AUTH_STATE_COOKIE: &str = "spotify_auth_state";

/// Non-empty value of a named cookie.
pub fn cookie_value(jar: &CookieJar, name: &str) -> Option<String> {
    jar.get(name)
        .map(|cookie| cookie.value().trim().to_string())
        .filter(|value| !value.is_empty())
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then(|| token.to_string())
}

/// Tokens presented by the request. The bearer header wins over the cookie.
pub fn credentials_from_headers(headers: &HeaderMap) -> Credentials {
    let jar = CookieJar::from_headers(headers);
    Credentials {
        access_token: bearer_token(headers).or_else(|| cookie_value(&jar, ACCESS_TOKEN_COOKIE)),
        refresh_token: cookie_value(&jar, REFRESH_TOKEN_COOKIE),
    }
}

/// Attaches the request's [`Credentials`] as an extension. Never rejects;
/// handlers decide whether a token is required.
pub async fn credentials_middleware(mut request: Request, next: Next) -> Response {
    let credentials = credentials_from_headers(request.headers());
    debug!(
        target: "api",
        has_access = credentials.access_token.is_some(),
        has_refresh = credentials.refresh_token.is_some(),
        "request credentials extracted"
    );
    request.extensions_mut().insert(credentials);
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_header_beats_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer from-header"));
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("spotify_access_token=from-cookie; spotify_refresh_token=r1"),
        );
        let credentials = credentials_from_headers(&headers);
        assert_eq!(credentials.access_token.as_deref(), Some("from-header"));
        assert_eq!(credentials.refresh_token.as_deref(), Some("r1"));
    }

    #[test]
    fn cookies_are_read_across_headers() {
        let mut headers = HeaderMap::new();
        headers.append(header::COOKIE, HeaderValue::from_static("theme=dark"));
        headers.append(header::COOKIE, HeaderValue::from_static("spotify_access_token=abc"));
        let jar = CookieJar::from_headers(&headers);
        assert_eq!(cookie_value(&jar, ACCESS_TOKEN_COOKIE).as_deref(), Some("abc"));
        assert!(cookie_value(&jar, REFRESH_TOKEN_COOKIE).is_none());
    }

    #[test]
    fn empty_values_count_as_missing() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
        headers.insert(header::COOKIE, HeaderValue::from_static("spotify_access_token="));
        assert!(credentials_from_headers(&headers).is_empty());
    }
}
