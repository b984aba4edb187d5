//! Services shared by the handlers.

pub mod client;
pub mod cookies;
pub mod facade;
pub mod relay;
