//! Refresh sessions: persisted, cookie-carried credentials that mint access tokens.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::AuthError;
use super::jwt::TokenCodec;
use super::repository::{RefreshSessionRepository, UserRepository};
use crate::models::auth::{RefreshSession, User};

/// Default access token lifetime: 15 minutes.
pub const DEFAULT_ACCESS_TOKEN_MINUTES: i64 = 15;

/// Default refresh session lifetime: 30 days.
pub const DEFAULT_REFRESH_TOKEN_MINUTES: i64 = 30 * 24 * 60;

/// Default gap between cookie expiry and token expiry.
pub const DEFAULT_REFRESH_OFFSET_MINUTES: i64 = 1;

/// Lifetimes used by [`RefreshSessionStore`].
#[derive(Debug, Clone, Copy)]
pub struct RefreshSessionConfig {
    pub access_token_ttl: Duration,
    /// Lifetime of the refresh token itself. The token's `exp` claim is
    /// issue time plus this full duration, and its row is purged once it is
    /// this old.
    pub expiration: Duration,
    /// How much earlier the carrying cookie expires than the token. Only the
    /// cookie max-age is shortened by it, never the token.
    pub expiration_offset: Duration,
}

impl Default for RefreshSessionConfig {
    fn default() -> Self {
        Self {
            access_token_ttl: Duration::minutes(DEFAULT_ACCESS_TOKEN_MINUTES),
            expiration: Duration::minutes(DEFAULT_REFRESH_TOKEN_MINUTES),
            expiration_offset: Duration::minutes(DEFAULT_REFRESH_OFFSET_MINUTES),
        }
    }
}

impl RefreshSessionConfig {
    /// Cookie max-age: `expiration - expiration_offset`, floored at zero.
    /// Strictly shorter than the token lifetime whenever the offset is positive.
    pub fn cookie_max_age(&self) -> Duration {
        (self.expiration - self.expiration_offset).max(Duration::zero())
    }
}

/// A freshly persisted session plus how long its cookie may live.
#[derive(Debug, Clone)]
pub struct IssuedRefreshSession {
    pub session: RefreshSession,
    pub max_age: Duration,
}

/// A newly minted access token for `user`.
#[derive(Debug, Clone)]
pub struct AccessGrant {
    pub access_token: String,
    pub expires_in: i64,
    pub user: User,
}

/// Creates, resolves and rotates refresh sessions.
///
/// Every way a presented refresh token can be wrong (bad signature, expired,
/// unknown or superseded session, vanished owner) yields the same
/// [`AuthError::Unauthorized`]; only the debug log tells them apart.
#[derive(Clone)]
pub struct RefreshSessionStore {
    sessions: Arc<dyn RefreshSessionRepository>,
    users: Arc<dyn UserRepository>,
    codec: TokenCodec,
    config: RefreshSessionConfig,
}

impl fmt::Debug for RefreshSessionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshSessionStore")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn rejected() -> AuthError {
    AuthError::Unauthorized("invalid refresh session".into())
}

impl RefreshSessionStore {
    pub fn new(
        sessions: Arc<dyn RefreshSessionRepository>,
        users: Arc<dyn UserRepository>,
        codec: TokenCodec,
        config: RefreshSessionConfig,
    ) -> Self {
        Self {
            sessions,
            users,
            codec,
            config,
        }
    }

    pub fn config(&self) -> &RefreshSessionConfig {
        &self.config
    }

    /// Create a refresh session for the user named `owner_username`.
    pub async fn create_session(
        &self,
        owner_username: &str,
    ) -> Result<IssuedRefreshSession, AuthError> {
        let owner = self
            .users
            .find_by_username(owner_username)
            .await?
            .ok_or_else(|| AuthError::NotFound(format!("user {owner_username}")))?;
        self.create_session_for(&owner).await
    }

    /// The token is signed for the full `expiration`; only the cookie
    /// max-age in the result is shortened by `expiration_offset`.
    async fn create_session_for(&self, owner: &User) -> Result<IssuedRefreshSession, AuthError> {
        let id = Uuid::now_v7();
        let token = self.codec.issue(&id.to_string(), self.config.expiration)?;
        let session = RefreshSession {
            id,
            token,
            owner_id: owner.id,
            created_at: Utc::now(),
        };
        self.sessions.insert(&session).await?;
        info!(session_id = %id, user_id = %owner.id, "refresh session created");
        Ok(IssuedRefreshSession {
            session,
            max_age: self.config.cookie_max_age(),
        })
    }

    /// Mint an access token whose subject is the user's public id.
    pub fn issue_access_token(&self, user: &User) -> Result<AccessGrant, AuthError> {
        let access_token = self
            .codec
            .issue(&user.id.to_string(), self.config.access_token_ttl)?;
        Ok(AccessGrant {
            access_token,
            expires_in: self.config.access_token_ttl.num_seconds(),
            user: user.clone(),
        })
    }

    /// Resolve a presented refresh token to its live session and owner.
    async fn resolve(&self, token: &str) -> Result<(RefreshSession, User), AuthError> {
        if !self.codec.validate(token) {
            debug!("refresh token failed signature or expiry check");
            return Err(rejected());
        }
        let claims = self.codec.claims(token).map_err(|e| {
            debug!(error = %e, "refresh token claims unreadable");
            rejected()
        })?;
        let session_id = Uuid::parse_str(&claims.sub).map_err(|_| {
            debug!("refresh token subject is not a session id");
            rejected()
        })?;
        let Some(session) = self.sessions.find_by_id(session_id).await? else {
            debug!(%session_id, "refresh session not found");
            return Err(rejected());
        };
        if session.token != token {
            debug!(%session_id, "refresh token does not match its session");
            return Err(rejected());
        }
        let Some(user) = self.users.find_by_public_id(session.owner_id).await? else {
            debug!(%session_id, "refresh session owner not found");
            return Err(rejected());
        };
        Ok((session, user))
    }

    /// Exchange a refresh token for a new access token, leaving the session in place.
    pub async fn refresh_access_token(&self, token: &str) -> Result<AccessGrant, AuthError> {
        let (_, user) = self.resolve(token).await?;
        self.issue_access_token(&user)
    }

    /// Consume the presented session and replace it with a new one.
    ///
    /// A session can be consumed once; a concurrent second rotation of the
    /// same token loses the delete and is rejected.
    pub async fn rotate(
        &self,
        token: &str,
    ) -> Result<(AccessGrant, IssuedRefreshSession), AuthError> {
        let (session, user) = self.resolve(token).await?;
        if !self.sessions.delete(session.id).await? {
            debug!(session_id = %session.id, "refresh session consumed concurrently");
            return Err(rejected());
        }
        let replacement = self.create_session_for(&user).await?;
        let grant = self.issue_access_token(&user)?;
        debug!(
            consumed = %session.id,
            replacement = %replacement.session.id,
            "refresh session rotated"
        );
        Ok((grant, replacement))
    }

    /// Delete the session a refresh token points at, if it still exists.
    ///
    /// Tokens that don't resolve are ignored; logout never fails on them.
    pub async fn revoke(&self, token: &str) -> Result<(), AuthError> {
        match self.resolve(token).await {
            Ok((session, _)) => {
                self.sessions.delete(session.id).await?;
                info!(session_id = %session.id, "refresh session revoked");
                Ok(())
            }
            Err(AuthError::Unauthorized(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Delete every refresh session of one user.
    pub async fn revoke_all_for_owner(&self, owner_id: Uuid) -> Result<u64, AuthError> {
        let removed = self.sessions.delete_by_owner(owner_id).await?;
        info!(user_id = %owner_id, removed, "refresh sessions revoked");
        Ok(removed)
    }

    /// Delete every session whose token has expired. Returns how many rows went away.
    pub async fn purge_expired(&self) -> Result<u64, AuthError> {
        self.purge_expired_at(Utc::now()).await
    }

    async fn purge_expired_at(&self, now: DateTime<Utc>) -> Result<u64, AuthError> {
        self.sessions
            .delete_created_before(now - self.config.expiration)
            .await
    }

    /// Spawn a periodic sweeper for expired refresh session rows.
    pub fn spawn_purge_task(&self, every: std::time::Duration) -> tokio::task::JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                match store.purge_expired().await {
                    Ok(0) => {}
                    Ok(purged) => debug!(purged, "purged expired refresh sessions"),
                    Err(e) => warn!(error = %e, "refresh session purge failed"),
                }
            }
        })
    }
}
