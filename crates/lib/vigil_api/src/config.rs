//! API server configuration.

use std::fmt;
use std::str::FromStr;

use chrono::Duration;
use tracing::warn;
use vigil_core::auth::jwt::resolve_jwt_secret;
use vigil_core::auth::refresh::{
    DEFAULT_ACCESS_TOKEN_MINUTES, DEFAULT_REFRESH_OFFSET_MINUTES, DEFAULT_REFRESH_TOKEN_MINUTES,
    RefreshSessionConfig,
};
use vigil_core::auth::throttle::{DEFAULT_LOCKOUT_MINUTES, LoginThrottleConfig};

use crate::middleware::csp::DEFAULT_CONTENT_SECURITY_POLICY;
use crate::services::cookies::CookieSettings;

/// OAuth2 client registration used by the authorize endpoint.
#[derive(Clone, Debug)]
pub struct OAuthClientConfig {
    /// Registration name, kept as a request attribute (e.g. "spotify").
    pub registration_id: String,
    pub client_id: String,
    pub authorization_uri: String,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
}

/// Configuration for the API server.
#[derive(Clone)]
pub struct ApiConfig {
    /// Address to bind the HTTP listener (e.g. "127.0.0.1:3100").
    pub bind_addr: String,
    /// PostgreSQL connection URL.
    pub pg_connection_url: String,
    /// Token signing secret.
    pub jwt_secret: String,
    pub access_token_expiration_minutes: i64,
    pub refresh_token_expiration_minutes: i64,
    /// Refresh cookie expires this many minutes before its token.
    pub refresh_token_expiration_offset_minutes: i64,
    /// `Secure` attribute on every cookie we set.
    pub secure_cookies: bool,
    /// `Domain` attribute on every cookie we set.
    pub cookie_domain: Option<String>,
    pub login_lockout_minutes: i64,
    pub login_max_failures: u32,
    /// Policy template; every `{nonce}` is replaced per request.
    pub content_security_policy: String,
    /// Take the client address from `X-Forwarded-For` (only behind a trusted proxy).
    pub trust_forwarded_for: bool,
    pub oauth: Option<OAuthClientConfig>,
}

impl fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiConfig")
            .field("bind_addr", &self.bind_addr)
            .field("jwt_secret", &"<redacted>")
            .field(
                "access_token_expiration_minutes",
                &self.access_token_expiration_minutes,
            )
            .field(
                "refresh_token_expiration_minutes",
                &self.refresh_token_expiration_minutes,
            )
            .field("secure_cookies", &self.secure_cookies)
            .field("cookie_domain", &self.cookie_domain)
            .field("login_lockout_minutes", &self.login_lockout_minutes)
            .field("login_max_failures", &self.login_max_failures)
            .field("trust_forwarded_for", &self.trust_forwarded_for)
            .field("oauth", &self.oauth)
            .finish_non_exhaustive()
    }
}

impl ApiConfig {
    /// Defaults everywhere except the signing secret.
    pub fn with_secret(jwt_secret: impl Into<String>) -> Self {
        Self {
            bind_addr: "127.0.0.1:3100".into(),
            pg_connection_url: "postgres://localhost:5432/vigil".into(),
            jwt_secret: jwt_secret.into(),
            access_token_expiration_minutes: DEFAULT_ACCESS_TOKEN_MINUTES,
            refresh_token_expiration_minutes: DEFAULT_REFRESH_TOKEN_MINUTES,
            refresh_token_expiration_offset_minutes: DEFAULT_REFRESH_OFFSET_MINUTES,
            secure_cookies: false,
            cookie_domain: None,
            login_lockout_minutes: DEFAULT_LOCKOUT_MINUTES,
            login_max_failures: 1,
            content_security_policy: DEFAULT_CONTENT_SECURITY_POLICY.into(),
            trust_forwarded_for: false,
            oauth: None,
        }
    }

    /// Reads configuration from environment variables with sensible defaults.
    ///
    /// | Variable                                   | Default                           |
    /// |--------------------------------------------|-----------------------------------|
    /// | `BIND_ADDR`                                | `127.0.0.1:3100`                  |
    /// | `DATABASE_URL`                             | `postgres://localhost:5432/vigil` |
    /// | `JWT_SECRET` / `AUTH_SECRET`               | generated & persisted to file     |
    /// | `ACCESS_TOKEN_EXPIRATION_MINUTES`          | `15`                              |
    /// | `REFRESH_TOKEN_EXPIRATION_MINUTES`         | `43200`                           |
    /// | `REFRESH_TOKEN_EXPIRATION_OFFSET_MINUTES`  | `1`                               |
    /// | `SECURE_COOKIES`                           | `false`                           |
    /// | `COOKIE_DOMAIN`                            | unset                             |
    /// | `LOGIN_LOCKOUT_MINUTES`                    | `15`                              |
    /// | `LOGIN_MAX_FAILURES`                       | `1`                               |
    /// | `CONTENT_SECURITY_POLICY`                  | built-in template                 |
    /// | `TRUST_FORWARDED_FOR`                      | `false`                           |
    /// | `OAUTH_CLIENT_ID` (+ `OAUTH_*`)            | unset (OAuth2 login disabled)     |
    pub fn from_env() -> Self {
        let defaults = Self::with_secret(resolve_jwt_secret());
        Self {
            bind_addr: env_or("BIND_ADDR", defaults.bind_addr),
            pg_connection_url: env_or("DATABASE_URL", defaults.pg_connection_url),
            access_token_expiration_minutes: env_or(
                "ACCESS_TOKEN_EXPIRATION_MINUTES",
                defaults.access_token_expiration_minutes,
            ),
            refresh_token_expiration_minutes: env_or(
                "REFRESH_TOKEN_EXPIRATION_MINUTES",
                defaults.refresh_token_expiration_minutes,
            ),
            refresh_token_expiration_offset_minutes: env_or(
                "REFRESH_TOKEN_EXPIRATION_OFFSET_MINUTES",
                defaults.refresh_token_expiration_offset_minutes,
            ),
            secure_cookies: env_or("SECURE_COOKIES", defaults.secure_cookies),
            cookie_domain: std::env::var("COOKIE_DOMAIN")
                .ok()
                .filter(|d| !d.is_empty()),
            login_lockout_minutes: env_or("LOGIN_LOCKOUT_MINUTES", defaults.login_lockout_minutes),
            login_max_failures: env_or("LOGIN_MAX_FAILURES", defaults.login_max_failures),
            content_security_policy: env_or(
                "CONTENT_SECURITY_POLICY",
                defaults.content_security_policy,
            ),
            trust_forwarded_for: env_or("TRUST_FORWARDED_FOR", defaults.trust_forwarded_for),
            oauth: oauth_from_env(),
            jwt_secret: defaults.jwt_secret,
        }
    }

    pub fn refresh_session_config(&self) -> RefreshSessionConfig {
        RefreshSessionConfig {
            access_token_ttl: Duration::minutes(self.access_token_expiration_minutes),
            expiration: Duration::minutes(self.refresh_token_expiration_minutes),
            expiration_offset: Duration::minutes(self.refresh_token_expiration_offset_minutes),
        }
    }

    pub fn login_throttle_config(&self) -> LoginThrottleConfig {
        LoginThrottleConfig {
            lockout: Duration::minutes(self.login_lockout_minutes),
            max_failures: self.login_max_failures,
        }
    }

    pub fn cookie_settings(&self) -> CookieSettings {
        CookieSettings {
            secure: self.secure_cookies,
            domain: self.cookie_domain.clone(),
        }
    }
}

/// Parse an env var, falling back to `default` when unset or unparsable.
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) if !raw.is_empty() => raw.parse().unwrap_or_else(|_| {
            warn!(key, value = %raw, "ignoring unparsable configuration value");
            default
        }),
        _ => default,
    }
}

fn oauth_from_env() -> Option<OAuthClientConfig> {
    let client_id = std::env::var("OAUTH_CLIENT_ID").ok().filter(|v| !v.is_empty())?;
    let authorization_uri = std::env::var("OAUTH_AUTHORIZATION_URI").ok()?;
    let redirect_uri = std::env::var("OAUTH_REDIRECT_URI").ok()?;
    let scopes = std::env::var("OAUTH_SCOPES")
        .unwrap_or_default()
        .split([' ', ','])
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    Some(OAuthClientConfig {
        registration_id: env_or("OAUTH_REGISTRATION_ID", "default".to_string()),
        client_id,
        authorization_uri,
        redirect_uri,
        scopes,
    })
}
