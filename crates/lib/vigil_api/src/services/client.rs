//! Client address fingerprinting for login throttling.

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::{HeaderMap, request::Parts};
use vigil_core::auth::throttle::fingerprint;

use crate::AppState;

const FORWARDED_FOR: &str = "x-forwarded-for";

/// Fingerprint of the calling client's address.
///
/// The raw address is hashed immediately and never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientFingerprint(pub String);

/// Left-most `X-Forwarded-For` entry, if any.
fn forwarded_for(headers: &HeaderMap) -> Option<String> {
    headers
        .get(FORWARDED_FOR)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// The address a request came from, as configured.
pub fn client_address(parts: &Parts, trust_forwarded_for: bool) -> String {
    if trust_forwarded_for && let Some(addr) = forwarded_for(&parts.headers) {
        return addr;
    }
    parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

impl FromRequestParts<AppState> for ClientFingerprint {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let addr = client_address(parts, state.config.trust_forwarded_for);
        Ok(ClientFingerprint(fingerprint(&addr)))
    }
}

#[cfg(test)]
mod tests {
    use axum::http::Request;

    use super::*;

    fn parts(forwarded: Option<&str>, peer: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/auth/login");
        if let Some(f) = forwarded {
            builder = builder.header(FORWARDED_FOR, f);
        }
        if let Some(p) = peer {
            builder = builder.extension(ConnectInfo(p.parse::<SocketAddr>().unwrap()));
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn peer_address_without_port() {
        let parts = parts(None, Some("198.51.100.4:50123"));
        assert_eq!(client_address(&parts, false), "198.51.100.4");
    }

    #[test]
    fn forwarded_for_only_when_trusted() {
        let parts = parts(Some("203.0.113.9, 10.0.0.1"), Some("10.0.0.1:443"));
        assert_eq!(client_address(&parts, false), "10.0.0.1");
        assert_eq!(client_address(&parts, true), "203.0.113.9");
    }

    #[test]
    fn unknown_peer_falls_back() {
        assert_eq!(client_address(&parts(None, None), true), "unknown");
    }
}
