//! Buffered chat relay
//!
//! Relays live chat from streaming platforms into per-serverId buffers that
//! an external client polls over HTTP, for consumers (such as game servers)
//! that cannot hold a persistent connection themselves.
//!
//! # Architecture
//!
//! - [`transport`]: connector traits plus the production Twitch IRC
//!   implementation; everything platform-specific lives here.
//! - [`supervisor`]: connect-with-retry and the per-connection reader task
//!   that pushes normalized events into the buffer.
//! - [`registry`]: the serverId → registration table, per-registration
//!   bounded buffers, and override/teardown semantics.
//! - [`relay`]: the register/poll/unregister facade the HTTP layer calls.
//! - [`server`]: axum routes and configuration.
//!
//! All state is in process memory; registrations do not survive a restart.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use chat_relay::transport::twitch::TwitchConnector;
//! use chat_relay::{Platform, Registry, RegistryConfig, Relay};
//!
//! # async fn run() -> chat_relay::Result<()> {
//! let registry = Registry::new(RegistryConfig::default())
//!     .with_connector(Arc::new(TwitchConnector::new()));
//! let relay = Relay::new(Arc::new(registry));
//!
//! relay.register("my-server", "somechannel", Platform::Twitch).await?;
//! let events = relay.poll("my-server").await;
//! # drop(events);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod registry;
pub mod relay;
pub mod server;
pub mod stats;
pub mod supervisor;
pub mod transport;
pub mod validate;

pub use error::{RelayError, Result};
pub use registry::{ChatEvent, Platform, RegisterOutcome, Registry, RegistryConfig};
pub use relay::{Relay, UnregisterOutcome};
pub use server::{router, ServerConfig};
