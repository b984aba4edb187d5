//! Random per-request values: CSP nonces and OAuth2 `state` parameters.

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Random bytes drawn per CSP nonce.
const NONCE_BYTES: usize = 32;

/// Random bytes drawn per OAuth2 `state`.
const STATE_BYTES: usize = 24;

/// Generate a fresh CSP nonce: 32 random bytes, SHA-256, standard base64.
pub fn generate_nonce() -> String {
    let mut bytes = [0u8; NONCE_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    STANDARD.encode(Sha256::digest(bytes))
}

/// Generate a cryptographic OAuth2 `state` parameter (CSRF token).
pub fn generate_state() -> String {
    let mut bytes = [0u8; STATE_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
