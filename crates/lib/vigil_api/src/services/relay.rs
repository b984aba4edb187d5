//! Authorization request relay: carries the in-flight OAuth2 request in a cookie.
//!
//! The server keeps nothing between the redirect to the identity provider and
//! the callback, so any instance behind a load balancer can finish the flow.
//! The price is that the request must fit in one cookie.

use axum_extra::extract::cookie::CookieJar;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use time::Duration;
use tracing::debug;
use vigil_core::auth::AuthError;
use vigil_core::models::oauth::AuthorizationRequest;

use super::cookies::{
    AUTHORIZATION_REQUEST_COOKIE, CookieSettings, authorization_request_cookie,
    clear_authorization_request_cookie,
};

/// Lifetime of the authorization request cookie.
pub const AUTHORIZATION_REQUEST_MAX_AGE_MINUTES: i64 = 3;

/// Browsers drop cookies larger than this.
const MAX_COOKIE_VALUE_BYTES: usize = 4096;

/// Serialize a request to its cookie value: JSON, then URL-safe base64.
pub fn encode(request: &AuthorizationRequest) -> Result<String, AuthError> {
    let json = serde_json::to_vec(request)
        .map_err(|e| AuthError::Serialization(format!("authorization request: {e}")))?;
    let value = URL_SAFE_NO_PAD.encode(json);
    if value.len() > MAX_COOKIE_VALUE_BYTES {
        return Err(AuthError::Serialization(format!(
            "authorization request is {} bytes encoded, limit is {MAX_COOKIE_VALUE_BYTES}",
            value.len()
        )));
    }
    Ok(value)
}

/// Inverse of [`encode`]; anything undecodable is treated as absent.
pub fn decode(value: &str) -> Option<AuthorizationRequest> {
    if value.is_empty() {
        return None;
    }
    let bytes = match URL_SAFE_NO_PAD.decode(value) {
        Ok(bytes) => bytes,
        Err(e) => {
            debug!(error = %e, "authorization request cookie is not base64");
            return None;
        }
    };
    match serde_json::from_slice(&bytes) {
        Ok(request) => Some(request),
        Err(e) => {
            debug!(error = %e, "authorization request cookie does not deserialize");
            None
        }
    }
}

/// Saves, loads and removes the authorization request cookie.
#[derive(Clone, Debug)]
pub struct AuthorizationRequestRelay {
    cookies: CookieSettings,
}

impl AuthorizationRequestRelay {
    pub fn new(cookies: CookieSettings) -> Self {
        Self { cookies }
    }

    /// Write `request` into the relay cookie. Fails without touching `jar`.
    pub fn save(
        &self,
        request: &AuthorizationRequest,
        jar: CookieJar,
    ) -> Result<CookieJar, AuthError> {
        let value = encode(request)?;
        debug!(state = %request.state, "authorization request saved");
        Ok(jar.add(authorization_request_cookie(
            value,
            Duration::minutes(AUTHORIZATION_REQUEST_MAX_AGE_MINUTES),
            &self.cookies,
        )))
    }

    /// Read the relayed request; `None` when there is none or it is unreadable.
    pub fn load(&self, jar: &CookieJar) -> Option<AuthorizationRequest> {
        jar.get(AUTHORIZATION_REQUEST_COOKIE)
            .and_then(|cookie| decode(cookie.value()))
    }

    /// [`load`](Self::load), then clear the cookie whether or not it held anything.
    pub fn remove(&self, jar: CookieJar) -> (CookieJar, Option<AuthorizationRequest>) {
        let request = self.load(&jar);
        let jar = jar.add(clear_authorization_request_cookie(&self.cookies));
        (jar, request)
    }
}
