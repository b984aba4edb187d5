//! Authentication domain models.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Domain user, as resolved from the account store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Public identifier; the subject of access tokens.
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub name: Option<String>,
    /// Granted authorities (e.g. `["ROLE_USER"]`).
    pub roles: Vec<String>,
}

/// Claims embedded in every token minted by [`crate::auth::jwt::TokenCodec`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject: a user id for access tokens, a session id for refresh tokens.
    pub sub: String,
    /// Issued at (unix timestamp).
    pub iat: i64,
    /// Expiry (unix timestamp).
    pub exp: i64,
}

/// Persisted refresh session.
///
/// `token` is itself a signed token whose subject is `id`, so presenting it
/// resolves back to exactly this row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshSession {
    pub id: Uuid,
    pub token: String,
    pub owner_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Attribute carrying the email of an external identity-provider principal.
pub const EMAIL_ATTRIBUTE: &str = "email";

/// Who the current request acts as.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Principal {
    #[default]
    Anonymous,
    /// Authenticated through a Vigil-issued bearer token.
    User { user: User, authorities: Vec<String> },
    /// Authenticated by an external OAuth2 / OIDC provider.
    External {
        subject: String,
        attributes: BTreeMap<String, String>,
    },
}

impl Principal {
    /// Principal for a domain user, carrying the user's roles as authorities.
    pub fn user(user: User) -> Self {
        let authorities = user.roles.clone();
        Self::User { user, authorities }
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self, Self::Anonymous)
    }
}
