//! # vigil_api
//!
//! HTTP security pipeline for Vigil: CSP nonces, sanitized request views,
//! bearer authentication, refresh sessions, login throttling and the OAuth2
//! authorization request relay.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use std::sync::Arc;

use axum::Router;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{get, post};
use sqlx::PgPool;
use tower_http::cors::{Any, CorsLayer};
use vigil_core::auth::jwt::TokenCodec;
use vigil_core::auth::queries::{
    PgCredentialVerifier, PgRefreshSessionRepository, PgUserRepository,
};
use vigil_core::auth::refresh::RefreshSessionStore;
use vigil_core::auth::repository::{CredentialVerifier, RefreshSessionRepository, UserRepository};
use vigil_core::auth::throttle::LoginAttemptThrottle;

use crate::config::ApiConfig;
use crate::handlers::{auth, oauth};
use crate::middleware::auth::bearer_auth;
use crate::middleware::csp::csp_nonce;
use crate::middleware::sanitize::sanitize_request;
use crate::services::facade::AuthenticationFacade;
use crate::services::relay::AuthorizationRequestRelay;

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// API configuration.
    pub config: ApiConfig,
    pub codec: TokenCodec,
    pub users: Arc<dyn UserRepository>,
    pub credentials: Arc<dyn CredentialVerifier>,
    pub refresh_sessions: RefreshSessionStore,
    pub throttle: Arc<LoginAttemptThrottle>,
    pub relay: AuthorizationRequestRelay,
    pub facade: AuthenticationFacade,
}

impl AppState {
    /// Wire the pipeline over the given stores.
    pub fn new(
        config: ApiConfig,
        users: Arc<dyn UserRepository>,
        sessions: Arc<dyn RefreshSessionRepository>,
        credentials: Arc<dyn CredentialVerifier>,
    ) -> Self {
        let codec = TokenCodec::new(config.jwt_secret.as_bytes());
        let refresh_sessions = RefreshSessionStore::new(
            sessions,
            Arc::clone(&users),
            codec.clone(),
            config.refresh_session_config(),
        );
        Self {
            codec,
            credentials,
            refresh_sessions,
            throttle: Arc::new(LoginAttemptThrottle::new(config.login_throttle_config())),
            relay: AuthorizationRequestRelay::new(config.cookie_settings()),
            facade: AuthenticationFacade::new(Arc::clone(&users)),
            users,
            config,
        }
    }

    /// State backed by PostgreSQL.
    pub fn postgres(pool: PgPool, config: ApiConfig) -> Self {
        Self::new(
            config,
            Arc::new(PgUserRepository::new(pool.clone())),
            Arc::new(PgRefreshSessionRepository::new(pool.clone())),
            Arc::new(PgCredentialVerifier::new(pool)),
        )
    }
}

/// Run embedded database migrations.
///
/// Delegates to `vigil_core::migrate::migrate()` which owns the migration files.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    vigil_core::migrate::migrate(pool).await
}

/// Builds the Axum router with all routes and shared state.
///
/// Every response carries a CSP header and every handler sees a sanitized
/// request view. Session cookie routes skip bearer authentication.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let session = Router::new()
        .route(routes::POST_AUTH_REFRESH, post(auth::refresh_handler))
        .route(routes::POST_AUTH_LOGOUT, post(auth::logout_handler));

    let app = Router::new()
        .route(routes::POST_AUTH_LOGIN, post(auth::login_handler))
        .route(routes::POST_AUTH_LOGOUT_ALL, post(auth::logout_all_handler))
        .route(
            routes::POST_AUTH_REFRESH_SESSION,
            post(auth::refresh_session_handler),
        )
        .route(routes::GET_AUTH_ME, get(auth::me_handler))
        .route(routes::GET_OAUTH2_AUTHORIZE, get(oauth::authorize_handler))
        .route(routes::GET_OAUTH2_CALLBACK, get(oauth::callback_handler))
        .layer(from_fn_with_state(state.clone(), bearer_auth));

    Router::new()
        .merge(session)
        .merge(app)
        .layer(from_fn(sanitize_request))
        .layer(from_fn_with_state(state.clone(), csp_nonce))
        .layer(cors)
        .with_state(state)
}
