//! Domain models shared by the security pipeline.

pub mod auth;
pub mod oauth;
