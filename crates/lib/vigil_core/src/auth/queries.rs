//! PostgreSQL-backed repositories.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::AuthError;
use super::password::verify_password;
use super::repository::{CredentialVerifier, RefreshSessionRepository, UserRepository};
use crate::models::auth::{RefreshSession, User};

type UserRow = (Uuid, String, String, Option<String>, Vec<String>);

fn user_from_row((id, username, email, name, roles): UserRow) -> User {
    User {
        id,
        username,
        email,
        name,
        roles,
    }
}

/// Users read from the `users` table.
#[derive(Clone, Debug)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_by_public_id(&self, id: Uuid) -> Result<Option<User>, AuthError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, username, email, name, roles FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(user_from_row))
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AuthError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, username, email, name, roles FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(user_from_row))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AuthError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, username, email, name, roles FROM users WHERE lower(email) = lower($1)",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(user_from_row))
    }
}

/// Refresh sessions in the `refresh_sessions` table.
#[derive(Clone, Debug)]
pub struct PgRefreshSessionRepository {
    pool: PgPool,
}

impl PgRefreshSessionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RefreshSessionRepository for PgRefreshSessionRepository {
    async fn insert(&self, session: &RefreshSession) -> Result<(), AuthError> {
        sqlx::query(
            "INSERT INTO refresh_sessions (id, token, user_id, created_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(session.id)
        .bind(&session.token)
        .bind(session.owner_id)
        .bind(session.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<RefreshSession>, AuthError> {
        let row = sqlx::query_as::<_, (Uuid, String, Uuid, DateTime<Utc>)>(
            "SELECT id, token, user_id, created_at FROM refresh_sessions WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(id, token, owner_id, created_at)| RefreshSession {
            id,
            token,
            owner_id,
            created_at,
        }))
    }

    async fn delete(&self, id: Uuid) -> Result<bool, AuthError> {
        let result = sqlx::query("DELETE FROM refresh_sessions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_by_owner(&self, owner_id: Uuid) -> Result<u64, AuthError> {
        let result = sqlx::query("DELETE FROM refresh_sessions WHERE user_id = $1")
            .bind(owner_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_created_before(&self, cutoff: DateTime<Utc>) -> Result<u64, AuthError> {
        let result = sqlx::query("DELETE FROM refresh_sessions WHERE created_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

/// Checks passwords against the bcrypt hashes in `users.password_hash`.
#[derive(Clone, Debug)]
pub struct PgCredentialVerifier {
    pool: PgPool,
}

impl PgCredentialVerifier {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialVerifier for PgCredentialVerifier {
    async fn verify(&self, username: &str, password: &str) -> Result<Option<User>, AuthError> {
        let row = sqlx::query_as::<_, (Uuid, String, String, Option<String>, Vec<String>, Option<String>)>(
            "SELECT id, username, email, name, roles, password_hash FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        let Some((id, username, email, name, roles, Some(hash))) = row else {
            return Ok(None);
        };
        if !verify_password(password, &hash)? {
            return Ok(None);
        }
        Ok(Some(user_from_row((id, username, email, name, roles))))
    }
}
