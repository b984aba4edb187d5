//! # vigil_core
//!
//! Core security primitives for Vigil: access tokens, refresh sessions,
//! login throttling, CSP nonces and input sanitizing.

pub mod auth;
pub mod cache;
pub mod migrate;
pub mod models;
pub mod sanitize;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
