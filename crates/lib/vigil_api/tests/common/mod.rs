//! In-memory stores and request helpers shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, Response, header};
use chrono::{DateTime, Utc};
use tower::ServiceExt;
use uuid::Uuid;
use vigil_api::AppState;
use vigil_api::config::ApiConfig;
use vigil_core::auth::AuthError;
use vigil_core::auth::repository::{CredentialVerifier, RefreshSessionRepository, UserRepository};
use vigil_core::models::auth::{RefreshSession, User};

pub const PASSWORD: &str = "hunter2";

pub struct MemoryUsers(pub Vec<User>);

#[async_trait]
impl UserRepository for MemoryUsers {
    async fn find_by_public_id(&self, id: Uuid) -> Result<Option<User>, AuthError> {
        Ok(self.0.iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AuthError> {
        Ok(self.0.iter().find(|u| u.username == username).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AuthError> {
        Ok(self.0.iter().find(|u| u.email == email).cloned())
    }
}

/// Every known user shares [`PASSWORD`].
pub struct MemoryCredentials(pub Arc<MemoryUsers>);

#[async_trait]
impl CredentialVerifier for MemoryCredentials {
    async fn verify(&self, username: &str, password: &str) -> Result<Option<User>, AuthError> {
        if password != PASSWORD {
            return Ok(None);
        }
        self.0.find_by_username(username).await
    }
}

#[derive(Default)]
pub struct MemorySessions(pub Mutex<HashMap<Uuid, RefreshSession>>);

#[async_trait]
impl RefreshSessionRepository for MemorySessions {
    async fn insert(&self, session: &RefreshSession) -> Result<(), AuthError> {
        self.0.lock().unwrap().insert(session.id, session.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<RefreshSession>, AuthError> {
        Ok(self.0.lock().unwrap().get(&id).cloned())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, AuthError> {
        Ok(self.0.lock().unwrap().remove(&id).is_some())
    }

    async fn delete_by_owner(&self, owner_id: Uuid) -> Result<u64, AuthError> {
        let mut map = self.0.lock().unwrap();
        let before = map.len();
        map.retain(|_, s| s.owner_id != owner_id);
        Ok((before - map.len()) as u64)
    }

    async fn delete_created_before(&self, cutoff: DateTime<Utc>) -> Result<u64, AuthError> {
        let mut map = self.0.lock().unwrap();
        let before = map.len();
        map.retain(|_, s| s.created_at >= cutoff);
        Ok((before - map.len()) as u64)
    }
}

pub fn ihsahn() -> User {
    User {
        id: Uuid::new_v4(),
        username: "ihsahn".into(),
        email: "ihsahn@emperor.example".into(),
        name: Some("Vegard Sverre Tveitan".into()),
        roles: vec!["ROLE_USER".into()],
    }
}

pub struct Harness {
    pub state: AppState,
    pub sessions: Arc<MemorySessions>,
    pub user: User,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(ApiConfig::with_secret("integration-test-secret"))
    }

    pub fn with_config(config: ApiConfig) -> Self {
        Self::with_credentials(config, |users| Arc::new(MemoryCredentials(users)))
    }

    pub fn with_credentials(
        config: ApiConfig,
        credentials: impl FnOnce(Arc<MemoryUsers>) -> Arc<dyn CredentialVerifier>,
    ) -> Self {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_env_filter("vigil_api=debug,vigil_core=debug")
            .try_init();
        let user = ihsahn();
        let users = Arc::new(MemoryUsers(vec![user.clone()]));
        let sessions = Arc::new(MemorySessions::default());
        let state = AppState::new(
            config,
            users.clone(),
            sessions.clone(),
            credentials(users),
        );
        Self {
            state,
            sessions,
            user,
        }
    }

    pub fn router(&self) -> Router {
        vigil_api::router(self.state.clone())
    }

    pub fn session_count(&self) -> usize {
        self.sessions.0.lock().unwrap().len()
    }
}

pub async fn send(app: Router, request: Request<Body>) -> Response<Body> {
    app.oneshot(request).await.expect("request")
}

pub async fn json_body(response: Response<Body>) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("parse JSON")
}

pub fn login_request(username: &str, password: &str) -> Request<Body> {
    let body = serde_json::json!({ "username": username, "password": password });
    Request::builder()
        .method("POST")
        .uri("/auth/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Full `Set-Cookie` line for cookie `name`, if the response sets it.
pub fn set_cookie<'a>(response: &'a Response<Body>, name: &str) -> Option<&'a str> {
    let prefix = format!("{name}=");
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with(&prefix))
}

/// Value part of a `Set-Cookie` line.
pub fn cookie_value(set_cookie: &str) -> &str {
    set_cookie
        .split(';')
        .next()
        .and_then(|pair| pair.split_once('='))
        .map(|(_, value)| value)
        .unwrap_or_default()
}
