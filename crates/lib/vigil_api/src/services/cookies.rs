//! Build and clear the httpOnly cookies set by the auth endpoints.

use axum_extra::extract::cookie::{Cookie, SameSite};
use time::Duration;

/// Cookie name for the refresh session token.
pub const REFRESH_COOKIE: &str = "vigil_refresh";
/// Cookie name for the relayed OAuth2 authorization request.
pub const AUTHORIZATION_REQUEST_COOKIE: &str = "vigil_oauth2_auth_request";

/// Per-deployment cookie attributes.
#[derive(Clone, Debug, Default)]
pub struct CookieSettings {
    pub secure: bool,
    pub domain: Option<String>,
}

fn build(
    name: &'static str,
    value: String,
    same_site: SameSite,
    max_age: Duration,
    settings: &CookieSettings,
) -> Cookie<'static> {
    let builder = Cookie::build((name, value))
        .http_only(true)
        .secure(settings.secure)
        .same_site(same_site)
        .path("/")
        .max_age(max_age);
    match &settings.domain {
        Some(domain) => builder.domain(domain.clone()).build(),
        None => builder.build(),
    }
}

/// Refresh cookie: `SameSite=Strict`, lives `max_age`.
pub fn refresh_cookie(
    token: &str,
    max_age: chrono::Duration,
    settings: &CookieSettings,
) -> Cookie<'static> {
    build(
        REFRESH_COOKIE,
        token.to_string(),
        SameSite::Strict,
        Duration::seconds(max_age.num_seconds()),
        settings,
    )
}

/// Expired refresh cookie to clear the session on the client.
pub fn clear_refresh_cookie(settings: &CookieSettings) -> Cookie<'static> {
    build(
        REFRESH_COOKIE,
        String::new(),
        SameSite::Strict,
        Duration::ZERO,
        settings,
    )
}

/// Authorization request cookie: `SameSite=Lax` so it survives the
/// provider's top-level cross-site redirect back to us.
pub fn authorization_request_cookie(
    value: String,
    max_age: Duration,
    settings: &CookieSettings,
) -> Cookie<'static> {
    build(
        AUTHORIZATION_REQUEST_COOKIE,
        value,
        SameSite::Lax,
        max_age,
        settings,
    )
}

/// Expired authorization request cookie.
pub fn clear_authorization_request_cookie(settings: &CookieSettings) -> Cookie<'static> {
    build(
        AUTHORIZATION_REQUEST_COOKIE,
        String::new(),
        SameSite::Lax,
        Duration::ZERO,
        settings,
    )
}
