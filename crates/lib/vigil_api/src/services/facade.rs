//! Authentication facade: "who is calling" for handlers.

use std::fmt;
use std::sync::Arc;

use vigil_core::auth::AuthError;
use vigil_core::auth::repository::UserRepository;
use vigil_core::models::auth::{EMAIL_ATTRIBUTE, Principal, User};

use crate::middleware::auth::SecurityContext;

/// Read-only accessor over a request's [`SecurityContext`].
#[derive(Clone)]
pub struct AuthenticationFacade {
    users: Arc<dyn UserRepository>,
}

impl fmt::Debug for AuthenticationFacade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthenticationFacade").finish_non_exhaustive()
    }
}

impl AuthenticationFacade {
    pub fn new(users: Arc<dyn UserRepository>) -> Self {
        Self { users }
    }

    /// True for any principal other than anonymous.
    pub fn is_authenticated(&self, context: &SecurityContext) -> bool {
        !context.principal().is_anonymous()
    }

    /// Resolve the caller to a fresh copy of their user row.
    ///
    /// Anonymous callers get `Ok(None)`. A principal whose row has vanished is
    /// [`AuthError::NotFound`]: the context and the store disagree.
    pub async fn current_user(&self, context: &SecurityContext) -> Result<Option<User>, AuthError> {
        match context.principal() {
            Principal::Anonymous => Ok(None),
            Principal::User { user, .. } => self
                .users
                .find_by_public_id(user.id)
                .await?
                .map(Some)
                .ok_or_else(|| AuthError::NotFound(format!("user {}", user.id))),
            Principal::External {
                subject,
                attributes,
            } => {
                let email = attributes.get(EMAIL_ATTRIBUTE).ok_or_else(|| {
                    AuthError::NotFound(format!("external principal {subject} has no email"))
                })?;
                self.users
                    .find_by_email(email)
                    .await?
                    .map(Some)
                    .ok_or_else(|| AuthError::NotFound(format!("user with email {email}")))
            }
        }
    }
}
