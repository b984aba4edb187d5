//! Bearer token extraction and security context population.

use std::collections::BTreeMap;
use std::convert::Infallible;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};
use tracing::{debug, warn};
use uuid::Uuid;
use vigil_core::models::auth::{Principal, User};

use crate::AppState;

/// Scheme prefix of the `Authorization` header.
pub const BEARER_PREFIX: &str = "Bearer ";

/// Identity of the current request, set once by [`bearer_auth`].
///
/// Handlers receive it as an extractor; a request that never passed through
/// the middleware is anonymous.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecurityContext {
    principal: Principal,
}

impl SecurityContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn authenticated(user: User) -> Self {
        Self {
            principal: Principal::user(user),
        }
    }

    /// Context for a principal vouched for by an external identity provider.
    pub fn external(subject: impl Into<String>, attributes: BTreeMap<String, String>) -> Self {
        Self {
            principal: Principal::External {
                subject: subject.into(),
                attributes,
            },
        }
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }
}

impl<S> FromRequestParts<S> for SecurityContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<SecurityContext>()
            .cloned()
            .unwrap_or_default())
    }
}

/// Axum middleware: resolves `Authorization: Bearer <token>` to a user and
/// installs the resulting [`SecurityContext`].
///
/// Never rejects. Missing, invalid or orphaned tokens leave the request
/// anonymous; route handlers decide whether that is acceptable.
pub async fn bearer_auth(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let context = authenticate(&state, request.headers()).await;
    request.extensions_mut().insert(context);
    next.run(request).await
}

async fn authenticate(state: &AppState, headers: &HeaderMap) -> SecurityContext {
    let Some(header) = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    else {
        return SecurityContext::anonymous();
    };

    let Some(token) = header.strip_prefix(BEARER_PREFIX).map(str::trim) else {
        debug!("authorization header without bearer scheme");
        return SecurityContext::anonymous();
    };

    if !state.codec.validate(token) {
        debug!("bearer token rejected");
        return SecurityContext::anonymous();
    }

    let claims = match state.codec.claims(token) {
        Ok(claims) => claims,
        Err(e) => {
            debug!(error = %e, "bearer token claims unreadable");
            return SecurityContext::anonymous();
        }
    };

    let Ok(user_id) = Uuid::parse_str(&claims.sub) else {
        debug!("bearer token subject is not a user id");
        return SecurityContext::anonymous();
    };

    match state.users.find_by_public_id(user_id).await {
        Ok(Some(user)) => {
            debug!(%user_id, "bearer token accepted");
            SecurityContext::authenticated(user)
        }
        Ok(None) => {
            debug!(%user_id, "bearer token subject has no user");
            SecurityContext::anonymous()
        }
        Err(e) => {
            warn!(%user_id, error = %e, "user lookup failed during bearer authentication");
            SecurityContext::anonymous()
        }
    }
}
