//! HTTP surface
//!
//! Thin wrapper over the relay facade: JSON in, JSON out, compatible with
//! the polling client's expectations. No registry state lives here.

pub mod config;
pub mod routes;

pub use config::ServerConfig;
pub use routes::router;
