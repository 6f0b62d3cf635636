//! Registration registry implementation
//!
//! The central table mapping serverIds to registrations. The map itself is
//! guarded by an `RwLock` taken only for brief get/insert/remove operations;
//! each registration carries its own async gate that serializes
//! create/override/remove for that key. Connect-with-retry runs while
//! holding only the key's gate, so a slow upstream never blocks other
//! serverIds or in-flight polls.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use super::config::RegistryConfig;
use super::entry::{LinkState, LinkTable, PlatformLink, Registration};
use super::error::RegistryError;
use super::event::Platform;
use crate::stats::RelayStats;
use crate::supervisor;
use crate::transport::ChatConnector;
use crate::validate::{ChannelStatus, ChannelValidator};

/// Result of a successful register operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterOutcome {
    /// A new connection was established for this (serverId, platform)
    Registered,
    /// An identical registration already existed; nothing changed
    AlreadyActive,
    /// An existing link for this platform was torn down and replaced
    Overridden,
}

/// Central registry for all active registrations
pub struct Registry {
    entries: RwLock<HashMap<String, Arc<Registration>>>,
    connectors: HashMap<Platform, Arc<dyn ChatConnector>>,
    validator: Option<Arc<dyn ChannelValidator>>,
    config: RegistryConfig,
    stats: Arc<RelayStats>,
}

impl Registry {
    /// Create an empty registry with the given configuration
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            connectors: HashMap::new(),
            validator: None,
            config,
            stats: Arc::new(RelayStats::new()),
        }
    }

    /// Add a connector, keyed by its platform tag
    pub fn with_connector(mut self, connector: Arc<dyn ChatConnector>) -> Self {
        self.connectors.insert(connector.platform(), connector);
        self
    }

    /// Set the channel-existence validator
    pub fn with_validator(mut self, validator: Arc<dyn ChannelValidator>) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Get the registry configuration
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Shared relay counters
    pub fn stats(&self) -> Arc<RelayStats> {
        Arc::clone(&self.stats)
    }

    /// Number of live registrations
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether the registry has no registrations
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Look up a registration without creating one
    pub async fn lookup(&self, server_id: &str) -> Option<Arc<Registration>> {
        self.entries.read().await.get(server_id).cloned()
    }

    /// Register `channel` on `platform` for `server_id`
    ///
    /// Creates the registration if absent; returns
    /// [`RegisterOutcome::AlreadyActive`] when an identical link exists;
    /// tears down and replaces the platform's link when the channel differs
    /// (override), resetting the buffer; adds a link when the registration
    /// exists but the platform is new.
    ///
    /// Two concurrent calls for the same serverId are serialized by the
    /// registration's gate, so they can never create independent
    /// connections for the same key.
    pub async fn register(
        &self,
        server_id: &str,
        channel: &str,
        platform: Platform,
    ) -> Result<RegisterOutcome, RegistryError> {
        let connector = self
            .connectors
            .get(&platform)
            .ok_or(RegistryError::UnsupportedPlatform(platform))?;

        loop {
            let registration = self.get_or_insert(server_id).await;
            let mut table = registration.table.lock().await;
            if table.defunct {
                // Raced a removal (or a failed create); start over with a
                // fresh entry.
                continue;
            }

            if let Some(link) = table.links.get(&platform) {
                if link.channel == channel {
                    tracing::debug!(
                        server_id = %server_id,
                        channel = %channel,
                        platform = %platform,
                        "Registration already active"
                    );
                    return Ok(RegisterOutcome::AlreadyActive);
                }
            }

            // Consult the validator before any teardown or connect attempt.
            if let Some(validator) = &self.validator {
                if validator.check(channel).await == ChannelStatus::NotFound {
                    self.abandon_if_empty(server_id, &registration, &mut table)
                        .await;
                    return Err(RegistryError::ChannelRejected {
                        channel: channel.to_string(),
                    });
                }
            }

            // Override: the old link is fully torn down before the new
            // connection is attempted, and the buffer is reset.
            let overriding = table.links.contains_key(&platform);
            if overriding {
                if let Some(link) = table.links.get_mut(&platform) {
                    link.state = LinkState::Disconnecting;
                }
                if let Some(mut old) = table.links.remove(&platform) {
                    tracing::info!(
                        server_id = %server_id,
                        platform = %platform,
                        old_channel = %old.channel,
                        new_channel = %channel,
                        "Overriding registration"
                    );
                    if let Some(handle) = old.handle.take() {
                        handle.disconnect(self.config.disconnect_timeout).await;
                    }
                }
                registration.buffer().clear();
            }

            table.links.insert(
                platform,
                PlatformLink {
                    channel: channel.to_string(),
                    state: LinkState::Connecting,
                    handle: None,
                },
            );

            let connected = supervisor::establish(
                connector.as_ref(),
                server_id,
                channel,
                &self.config.retry,
                registration.buffer(),
                Arc::clone(&self.stats),
            )
            .await;

            return match connected {
                Ok(handle) => {
                    if let Some(link) = table.links.get_mut(&platform) {
                        link.state = LinkState::Active;
                        link.handle = Some(handle);
                    }
                    if overriding {
                        self.stats.record_overridden();
                        Ok(RegisterOutcome::Overridden)
                    } else {
                        self.stats.record_registered();
                        tracing::info!(
                            server_id = %server_id,
                            channel = %channel,
                            platform = %platform,
                            "Registration active"
                        );
                        Ok(RegisterOutcome::Registered)
                    }
                }
                Err(source) => {
                    table.links.remove(&platform);
                    self.abandon_if_empty(server_id, &registration, &mut table)
                        .await;
                    Err(RegistryError::ConnectFailed {
                        channel: channel.to_string(),
                        attempts: self.config.retry.attempts.max(1),
                        source,
                    })
                }
            };
        }
    }

    /// Remove a registration, disconnecting all of its links
    ///
    /// Idempotent: removing a non-existent key is a no-op that returns
    /// `false`. Disconnect failures are logged by the supervisor and never
    /// block removal.
    pub async fn remove(&self, server_id: &str) -> bool {
        let registration = self.entries.read().await.get(server_id).cloned();
        let Some(registration) = registration else {
            return false;
        };

        let mut table = registration.table.lock().await;
        if table.defunct {
            // Lost the race with another removal.
            return false;
        }
        table.defunct = true;

        self.teardown_links(&mut table).await;

        {
            let mut entries = self.entries.write().await;
            if let Some(current) = entries.get(server_id) {
                if Arc::ptr_eq(current, &registration) {
                    entries.remove(server_id);
                }
            }
        }

        self.stats.record_removed();
        tracing::info!(server_id = %server_id, "Registration removed");
        true
    }

    /// Disconnect every live registration and clear the table
    ///
    /// Called once at process shutdown.
    pub async fn shutdown(&self) {
        let drained: Vec<Arc<Registration>> =
            self.entries.write().await.drain().map(|(_, v)| v).collect();

        for registration in drained {
            let mut table = registration.table.lock().await;
            table.defunct = true;
            self.teardown_links(&mut table).await;
            tracing::info!(
                server_id = %registration.server_id(),
                "Disconnected at shutdown"
            );
        }
    }

    async fn get_or_insert(&self, server_id: &str) -> Arc<Registration> {
        let mut entries = self.entries.write().await;
        Arc::clone(
            entries
                .entry(server_id.to_string())
                .or_insert_with(|| {
                    Arc::new(Registration::new(server_id, self.config.buffer_capacity))
                }),
        )
    }

    /// Drop the registration from the map if it ended up with no links
    ///
    /// Keeps a failed first-time register from leaving an empty entry
    /// behind. Caller must hold the registration's gate.
    async fn abandon_if_empty(
        &self,
        server_id: &str,
        registration: &Arc<Registration>,
        table: &mut LinkTable,
    ) {
        if !table.links.is_empty() {
            return;
        }
        table.defunct = true;

        let mut entries = self.entries.write().await;
        if let Some(current) = entries.get(server_id) {
            if Arc::ptr_eq(current, registration) {
                entries.remove(server_id);
            }
        }
    }

    async fn teardown_links(&self, table: &mut LinkTable) {
        for (_, mut link) in table.links.drain() {
            link.state = LinkState::Disconnecting;
            if let Some(handle) = link.handle.take() {
                handle.disconnect(self.config.disconnect_timeout).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::registry::ChatEvent;
    use crate::supervisor::RetryPolicy;
    use crate::transport::testing::ScriptedConnector;
    use crate::transport::{ChatSignal, InboundMessage};

    fn fast_config() -> RegistryConfig {
        RegistryConfig::default()
            .retry(RetryPolicy::new(1, Duration::ZERO))
            .disconnect_timeout(Duration::from_secs(1))
    }

    fn message(text: &str) -> ChatSignal {
        ChatSignal::Message(InboundMessage {
            channel: "somechannel".to_string(),
            display_name: Some("Viewer".to_string()),
            login: Some("viewer".to_string()),
            text: text.to_string(),
        })
    }

    #[tokio::test]
    async fn test_register_creates_active_link() {
        let connector = Arc::new(ScriptedConnector::new(Platform::Twitch));
        let registry = Registry::new(fast_config()).with_connector(Arc::clone(&connector) as _);

        let outcome = registry
            .register("srv-1", "somechannel", Platform::Twitch)
            .await
            .unwrap();

        assert_eq!(outcome, RegisterOutcome::Registered);
        assert_eq!(registry.len().await, 1);
        assert_eq!(connector.live_connections(), 1);

        let registration = registry.lookup("srv-1").await.unwrap();
        assert_eq!(
            registration.link_state(Platform::Twitch).await,
            LinkState::Active
        );
    }

    #[tokio::test]
    async fn test_duplicate_register_is_idempotent() {
        let connector = Arc::new(ScriptedConnector::new(Platform::Twitch));
        let registry = Registry::new(fast_config()).with_connector(Arc::clone(&connector) as _);

        registry
            .register("srv-1", "somechannel", Platform::Twitch)
            .await
            .unwrap();
        let outcome = registry
            .register("srv-1", "somechannel", Platform::Twitch)
            .await
            .unwrap();

        assert_eq!(outcome, RegisterOutcome::AlreadyActive);
        assert_eq!(connector.connect_attempts(), 1);
        assert_eq!(connector.live_connections(), 1);
    }

    #[tokio::test]
    async fn test_override_tears_down_before_connecting() {
        let connector = Arc::new(ScriptedConnector::new(Platform::Twitch));
        let registry = Registry::new(fast_config()).with_connector(Arc::clone(&connector) as _);

        registry
            .register("srv-1", "oldchannel", Platform::Twitch)
            .await
            .unwrap();
        let outcome = registry
            .register("srv-1", "newchannel", Platform::Twitch)
            .await
            .unwrap();

        assert_eq!(outcome, RegisterOutcome::Overridden);
        assert_eq!(connector.live_connections(), 1);
        assert_eq!(
            connector.event_log(),
            vec![
                "connect:oldchannel",
                "disconnect:oldchannel",
                "connect:newchannel"
            ]
        );

        let registration = registry.lookup("srv-1").await.unwrap();
        let links = registration.links().await;
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].channel, "newchannel");
    }

    #[tokio::test]
    async fn test_override_resets_buffer() {
        let connector = Arc::new(ScriptedConnector::new(Platform::Twitch));
        let registry = Registry::new(fast_config()).with_connector(Arc::clone(&connector) as _);

        registry
            .register("srv-1", "oldchannel", Platform::Twitch)
            .await
            .unwrap();
        connector.push(message("from old channel"));
        connector.drained().await;

        registry
            .register("srv-1", "newchannel", Platform::Twitch)
            .await
            .unwrap();

        let registration = registry.lookup("srv-1").await.unwrap();
        assert!(registration.drain().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_exhaustion_leaves_no_registration() {
        let connector = Arc::new(ScriptedConnector::failing(Platform::Twitch));
        let registry = Registry::new(
            RegistryConfig::default().retry(RetryPolicy::new(5, Duration::from_secs(2))),
        )
        .with_connector(Arc::clone(&connector) as _);

        let result = registry
            .register("srv-1", "somechannel", Platform::Twitch)
            .await;

        assert!(matches!(
            result,
            Err(RegistryError::ConnectFailed { attempts: 5, .. })
        ));
        assert_eq!(connector.connect_attempts(), 5);
        assert!(registry.lookup("srv-1").await.is_none());
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_failed_override_drops_the_registration() {
        let connector = Arc::new(ScriptedConnector::new(Platform::Twitch));
        let registry = Registry::new(fast_config()).with_connector(Arc::clone(&connector) as _);

        registry
            .register("srv-1", "oldchannel", Platform::Twitch)
            .await
            .unwrap();

        // The old link is gone by the time the replacement connect fails,
        // so the whole registration goes with it.
        connector.fail_next(1);
        let result = registry
            .register("srv-1", "newchannel", Platform::Twitch)
            .await;

        assert!(result.is_err());
        assert!(registry.lookup("srv-1").await.is_none());
        assert_eq!(connector.live_connections(), 0);
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let connector = Arc::new(ScriptedConnector::new(Platform::Twitch));
        let registry = Registry::new(fast_config()).with_connector(Arc::clone(&connector) as _);

        registry
            .register("srv-1", "somechannel", Platform::Twitch)
            .await
            .unwrap();

        assert!(registry.remove("srv-1").await);
        assert!(!registry.remove("srv-1").await);
        assert!(!registry.remove("never-registered").await);
        assert_eq!(connector.live_connections(), 0);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_unsupported_platform_is_rejected() {
        let registry = Registry::new(fast_config());

        let result = registry
            .register("srv-1", "somechannel", Platform::Twitch)
            .await;

        assert!(matches!(
            result,
            Err(RegistryError::UnsupportedPlatform(Platform::Twitch))
        ));
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_multi_platform_links_share_one_registration() {
        let twitch = Arc::new(ScriptedConnector::new(Platform::Twitch));
        let kick = Arc::new(ScriptedConnector::new(Platform::Kick));
        let registry = Registry::new(fast_config())
            .with_connector(Arc::clone(&twitch) as _)
            .with_connector(Arc::clone(&kick) as _);

        let first = registry
            .register("srv-1", "somechannel", Platform::Twitch)
            .await
            .unwrap();
        let second = registry
            .register("srv-1", "somechannel", Platform::Kick)
            .await
            .unwrap();

        assert_eq!(first, RegisterOutcome::Registered);
        assert_eq!(second, RegisterOutcome::Registered);
        assert_eq!(registry.len().await, 1);

        let registration = registry.lookup("srv-1").await.unwrap();
        assert_eq!(registration.links().await.len(), 2);

        // Events from both platforms land in the shared buffer with their
        // own tags.
        twitch.push(message("from twitch"));
        kick.push(message("from kick"));
        twitch.drained().await;
        kick.drained().await;

        let events: Vec<ChatEvent> = registration.drain();
        assert_eq!(events.len(), 2);
        assert!(events.iter().any(|e| e.platform == Platform::Twitch));
        assert!(events.iter().any(|e| e.platform == Platform::Kick));

        // Removal tears down both links.
        registry.remove("srv-1").await;
        assert_eq!(twitch.live_connections(), 0);
        assert_eq!(kick.live_connections(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_registers_serialize_per_key() {
        let connector = Arc::new(ScriptedConnector::new(Platform::Twitch));
        let registry = Arc::new(
            Registry::new(fast_config()).with_connector(Arc::clone(&connector) as _),
        );

        let a = {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move {
                registry
                    .register("srv-1", "channel-a", Platform::Twitch)
                    .await
            })
        };
        let b = {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move {
                registry
                    .register("srv-1", "channel-b", Platform::Twitch)
                    .await
            })
        };

        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        // Whichever order the two calls ran in, exactly one connection
        // survives and the key exists once.
        assert_eq!(registry.len().await, 1);
        assert_eq!(connector.live_connections(), 1);
    }

    struct DenyList(&'static str);

    #[async_trait]
    impl ChannelValidator for DenyList {
        async fn check(&self, channel: &str) -> ChannelStatus {
            if channel == self.0 {
                ChannelStatus::NotFound
            } else {
                ChannelStatus::Exists
            }
        }
    }

    #[tokio::test]
    async fn test_validator_rejects_before_connecting() {
        let connector = Arc::new(ScriptedConnector::new(Platform::Twitch));
        let registry = Registry::new(fast_config())
            .with_connector(Arc::clone(&connector) as _)
            .with_validator(Arc::new(DenyList("missing")));

        let result = registry.register("srv-1", "missing", Platform::Twitch).await;

        assert!(matches!(
            result,
            Err(RegistryError::ChannelRejected { .. })
        ));
        assert_eq!(connector.connect_attempts(), 0);
        assert!(registry.is_empty().await);

        // Other channels still pass.
        registry
            .register("srv-1", "somechannel", Platform::Twitch)
            .await
            .unwrap();
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_shutdown_disconnects_everything() {
        let connector = Arc::new(ScriptedConnector::new(Platform::Twitch));
        let registry = Registry::new(fast_config()).with_connector(Arc::clone(&connector) as _);

        registry
            .register("srv-1", "channel-one", Platform::Twitch)
            .await
            .unwrap();
        registry
            .register("srv-2", "channel-two", Platform::Twitch)
            .await
            .unwrap();
        assert_eq!(connector.live_connections(), 2);

        registry.shutdown().await;

        assert!(registry.is_empty().await);
        assert_eq!(connector.live_connections(), 0);
    }
}
