//! Authentication request handlers.

use axum::Json;
use axum::extract::State;
use axum_extra::extract::cookie::CookieJar;
use tracing::{debug, info, warn};
use vigil_core::auth::AuthError;

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::SecurityContext;
use crate::models::{
    AuthUser, LoginRequest, LogoutResponse, RefreshSessionResponse, TokenResponse,
};
use crate::services::client::ClientFingerprint;
use crate::services::cookies::{REFRESH_COOKIE, clear_refresh_cookie, refresh_cookie};

fn unauthorized() -> AppError {
    AppError::Unauthorized("Unauthorized".into())
}

/// `POST /auth/login`: check credentials, open a refresh session, return an access token.
///
/// A client with too many recent failures, or with as many attempts still
/// being checked, is refused before its credentials are even looked at.
pub async fn login_handler(
    State(state): State<AppState>,
    ClientFingerprint(client): ClientFingerprint,
    jar: CookieJar,
    Json(body): Json<LoginRequest>,
) -> AppResult<(CookieJar, Json<TokenResponse>)> {
    let Some(attempt) = state.throttle.try_begin(&client) else {
        debug!(client, "login refused while blocked");
        return Err(AppError::TooManyRequests);
    };

    let Some(user) = state
        .credentials
        .verify(&body.username, &body.password)
        .await?
    else {
        attempt.failed();
        return Err(unauthorized());
    };
    attempt.succeeded();

    let issued = state.refresh_sessions.create_session(&user.username).await?;
    let grant = state.refresh_sessions.issue_access_token(&user)?;
    info!(user_id = %user.id, "login succeeded");

    let cookies = state.config.cookie_settings();
    let jar = jar.add(refresh_cookie(
        &issued.session.token,
        issued.max_age,
        &cookies,
    ));
    Ok((jar, Json(grant.into())))
}

/// `POST /auth/refresh`: trade the refresh cookie for a new access token.
///
/// The presented session is consumed and a new cookie replaces it. A rejected
/// cookie is cleared.
pub async fn refresh_handler(
    State(state): State<AppState>,
    jar: CookieJar,
) -> (CookieJar, AppResult<Json<TokenResponse>>) {
    let cookies = state.config.cookie_settings();
    let Some(token) = jar.get(REFRESH_COOKIE).map(|c| c.value().to_string()) else {
        return (jar.add(clear_refresh_cookie(&cookies)), Err(unauthorized()));
    };

    match state.refresh_sessions.rotate(&token).await {
        Ok((grant, issued)) => {
            let jar = jar.add(refresh_cookie(
                &issued.session.token,
                issued.max_age,
                &cookies,
            ));
            (jar, Ok(Json(grant.into())))
        }
        Err(e @ AuthError::Unauthorized(_)) => {
            (jar.add(clear_refresh_cookie(&cookies)), Err(e.into()))
        }
        Err(e) => (jar, Err(e.into())),
    }
}

/// `POST /auth/logout`: revoke the cookie's session and clear the cookie.
///
/// Always succeeds from the client's point of view.
pub async fn logout_handler(
    State(state): State<AppState>,
    jar: CookieJar,
) -> (CookieJar, Json<LogoutResponse>) {
    if let Some(token) = jar.get(REFRESH_COOKIE).map(|c| c.value().to_string())
        && let Err(e) = state.refresh_sessions.revoke(&token).await
    {
        warn!(error = %e, "refresh session revocation failed during logout");
    }
    let jar = jar.add(clear_refresh_cookie(&state.config.cookie_settings()));
    (jar, Json(LogoutResponse { success: true }))
}

/// `POST /auth/logout-all`: revoke every refresh session of the caller and
/// clear this client's cookie.
pub async fn logout_all_handler(
    State(state): State<AppState>,
    context: SecurityContext,
    jar: CookieJar,
) -> AppResult<(CookieJar, Json<LogoutResponse>)> {
    let user = state
        .facade
        .current_user(&context)
        .await?
        .ok_or_else(unauthorized)?;
    let revoked = state.refresh_sessions.revoke_all_for_owner(user.id).await?;
    info!(user_id = %user.id, revoked, "all refresh sessions revoked");
    let jar = jar.add(clear_refresh_cookie(&state.config.cookie_settings()));
    Ok((jar, Json(LogoutResponse { success: true })))
}

/// `POST /auth/refresh-session`: open a new refresh session for the caller.
pub async fn refresh_session_handler(
    State(state): State<AppState>,
    context: SecurityContext,
    jar: CookieJar,
) -> AppResult<(CookieJar, Json<RefreshSessionResponse>)> {
    let user = state
        .facade
        .current_user(&context)
        .await?
        .ok_or_else(unauthorized)?;
    let issued = state.refresh_sessions.create_session(&user.username).await?;
    let jar = jar.add(refresh_cookie(
        &issued.session.token,
        issued.max_age,
        &state.config.cookie_settings(),
    ));
    Ok((
        jar,
        Json(RefreshSessionResponse {
            expires_in: issued.max_age.num_seconds(),
        }),
    ))
}

/// `GET /auth/me`: the authenticated caller.
pub async fn me_handler(
    State(state): State<AppState>,
    context: SecurityContext,
) -> AppResult<Json<AuthUser>> {
    let user = state
        .facade
        .current_user(&context)
        .await?
        .ok_or_else(unauthorized)?;
    Ok(Json(user.into()))
}
