//! Relay facade
//!
//! The operation surface the HTTP handlers call: register, poll, unregister,
//! stats. Validates request fields, then delegates to the registry. Poll
//! never errors on an unknown serverId; it degrades to an empty result.

use std::sync::Arc;

use crate::error::{RelayError, Result};
use crate::registry::{ChatEvent, Platform, RegisterOutcome, Registry};
use crate::stats::StatsSnapshot;

/// Result of an unregister operation
///
/// Both variants are success from the caller's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnregisterOutcome {
    /// A registration existed and was removed
    Removed,
    /// No registration existed for the serverId
    NotFound,
}

/// The relay's operation surface
pub struct Relay {
    registry: Arc<Registry>,
}

impl Relay {
    /// Create a facade over `registry`
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    /// The underlying registry
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Register `channel` on `platform` for `server_id`
    ///
    /// Channel names are lowercased before registration, matching upstream
    /// chat conventions. Empty fields are rejected before anything else.
    pub async fn register(
        &self,
        server_id: &str,
        channel: &str,
        platform: Platform,
    ) -> Result<RegisterOutcome> {
        let server_id = server_id.trim();
        let channel = channel.trim().to_lowercase();

        if server_id.is_empty() || channel.is_empty() {
            return Err(RelayError::InvalidRequest(
                "Missing username or serverId".to_string(),
            ));
        }

        let outcome = self.registry.register(server_id, &channel, platform).await?;
        Ok(outcome)
    }

    /// Drain and return all buffered events for `server_id`
    ///
    /// An unknown or never-registered serverId is a normal "nothing yet"
    /// condition, not a fault.
    pub async fn poll(&self, server_id: &str) -> Vec<ChatEvent> {
        self.registry.stats().record_poll();

        match self.registry.lookup(server_id).await {
            Some(registration) => registration.drain(),
            None => Vec::new(),
        }
    }

    /// Remove the registration for `server_id`, if any
    ///
    /// Idempotent; always succeeds.
    pub async fn unregister(&self, server_id: &str) -> UnregisterOutcome {
        if self.registry.remove(server_id.trim()).await {
            UnregisterOutcome::Removed
        } else {
            UnregisterOutcome::NotFound
        }
    }

    /// Snapshot of the relay counters
    pub async fn stats(&self) -> StatsSnapshot {
        let active = self.registry.len().await;
        self.registry.stats().snapshot(active)
    }

    /// Disconnect every live registration
    ///
    /// Called once at process shutdown.
    pub async fn shutdown(&self) {
        self.registry.shutdown().await;
    }
}
