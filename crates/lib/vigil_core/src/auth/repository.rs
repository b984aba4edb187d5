//! Persistence seams consumed by the security pipeline.
//!
//! PostgreSQL implementations live in [`super::queries`]; anything else
//! (test doubles, another store) only has to implement these traits.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::AuthError;
use crate::models::auth::{RefreshSession, User};

/// Read access to user accounts.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_public_id(&self, id: Uuid) -> Result<Option<User>, AuthError>;

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AuthError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AuthError>;
}

/// Storage for refresh session rows.
#[async_trait]
pub trait RefreshSessionRepository: Send + Sync {
    async fn insert(&self, session: &RefreshSession) -> Result<(), AuthError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<RefreshSession>, AuthError>;

    /// Delete a session. Returns `false` when no row matched.
    async fn delete(&self, id: Uuid) -> Result<bool, AuthError>;

    /// Delete every session of one owner, returning how many went away.
    async fn delete_by_owner(&self, owner_id: Uuid) -> Result<u64, AuthError>;

    /// Delete every session created before `cutoff`, returning how many went away.
    async fn delete_created_before(&self, cutoff: DateTime<Utc>) -> Result<u64, AuthError>;
}

/// Username + password check, owned by the account service.
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    /// `Ok(None)` for an unknown user or a wrong password alike.
    async fn verify(&self, username: &str, password: &str) -> Result<Option<User>, AuthError>;
}
