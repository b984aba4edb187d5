//! Authentication building blocks.
//!
//! Token signing, refresh sessions, login throttling and nonce generation,
//! plus the repository seams the HTTP layer plugs persistence into.

pub mod jwt;
pub mod nonce;
pub mod password;
pub mod queries;
pub mod refresh;
pub mod repository;
pub mod throttle;

use thiserror::Error;

/// Authentication errors.
///
/// Several variants describe failures that must never be told apart by a
/// client; the HTTP layer collapses them into one response.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    CredentialError,

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Malformed token: {0}")]
    MalformedToken(String),

    #[error("Token error: {0}")]
    TokenError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Database error: {0}")]
    DbError(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}
