//! Per-request middleware, outermost first: CSP nonce, sanitizing view, bearer auth.

pub mod auth;
pub mod csp;
pub mod sanitize;
