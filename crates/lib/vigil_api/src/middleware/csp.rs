//! CSP nonce middleware: one fresh nonce per request, echoed in the policy header.

use axum::{
    extract::{Request, State},
    http::{HeaderValue, header::CONTENT_SECURITY_POLICY},
    middleware::Next,
    response::Response,
};
use tracing::warn;
use vigil_core::auth::nonce::generate_nonce;

use crate::AppState;

/// Placeholder replaced by the request's nonce in the policy template.
pub const NONCE_PLACEHOLDER: &str = "{nonce}";

/// Default policy: inline scripts and styles only with the request nonce.
pub const DEFAULT_CONTENT_SECURITY_POLICY: &str = concat!(
    "default-src 'self'; ",
    "script-src 'self' 'nonce-{nonce}'; ",
    "style-src 'self' 'nonce-{nonce}'; ",
    "img-src 'self' data: https:; ",
    "font-src 'self' data:; ",
    "connect-src 'self'; ",
    "form-action 'self'; ",
    "base-uri 'self'; ",
    "object-src 'none'; ",
    "frame-ancestors 'none'"
);

/// The nonce issued for the current request, stored in request extensions.
///
/// Views tag their inline `<script>`/`<style>` with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CspNonce(pub String);

/// Fill every nonce placeholder of `template` with `nonce`.
pub fn render_policy(template: &str, nonce: &str) -> String {
    template.replace(NONCE_PLACEHOLDER, nonce)
}

/// Axum middleware: issues a nonce, exposes it as [`CspNonce`], and sets the
/// `Content-Security-Policy` header on the response.
pub async fn csp_nonce(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let nonce = generate_nonce();
    let policy = render_policy(&state.config.content_security_policy, &nonce);
    request.extensions_mut().insert(CspNonce(nonce));

    let mut response = next.run(request).await;
    match HeaderValue::from_str(&policy) {
        Ok(value) => {
            response.headers_mut().insert(CONTENT_SECURITY_POLICY, value);
        }
        Err(e) => warn!(error = %e, "content security policy is not a valid header value"),
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_directives_get_the_same_nonce() {
        let policy = render_policy(DEFAULT_CONTENT_SECURITY_POLICY, "abc+/=");
        assert!(policy.contains("script-src 'self' 'nonce-abc+/='"));
        assert!(policy.contains("style-src 'self' 'nonce-abc+/='"));
        assert!(!policy.contains(NONCE_PLACEHOLDER));
    }
}
