//! Registration entry and state types
//!
//! This module defines the per-serverId state stored in the registry: the
//! shared message buffer and the table of live platform links. The link
//! table sits behind a per-registration async mutex that serializes
//! create/override/remove for that key; the buffer has its own internal lock
//! so the poll path never contends with an in-flight (re)connect.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;

use super::buffer::MessageBuffer;
use super::event::{ChatEvent, Platform};
use crate::supervisor::ConnectionHandle;

/// State of one platform link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkState {
    /// Attempting the upstream connect (bounded retry in progress)
    Connecting,
    /// Upstream connection live, reader task appending to the buffer
    Active,
    /// Teardown in progress (unregister or override)
    Disconnecting,
    /// Terminal; the link no longer exists in the table
    Removed,
}

/// One upstream connection within a registration
#[derive(Debug)]
pub(crate) struct PlatformLink {
    /// Upstream channel this link relays
    pub channel: String,
    /// Current lifecycle state
    pub state: LinkState,
    /// Shutdown signal + reader task handle; `None` while connecting or
    /// once teardown has taken the handle
    pub handle: Option<ConnectionHandle>,
}

/// Read-only view of one platform link
#[derive(Debug, Clone, Serialize)]
pub struct LinkInfo {
    /// Source platform
    pub platform: Platform,
    /// Upstream channel being relayed
    pub channel: String,
    /// Current lifecycle state
    pub state: LinkState,
}

/// Platform-tag keyed link table, guarded by the registration's gate
#[derive(Debug, Default)]
pub(crate) struct LinkTable {
    pub links: HashMap<Platform, PlatformLink>,
    /// Set when this registration has been removed from the registry map.
    /// A register() call that raced the removal re-checks this after taking
    /// the gate and starts over with a fresh entry.
    pub defunct: bool,
}

/// Entry for a single serverId in the registry
#[derive(Debug)]
pub struct Registration {
    server_id: String,
    buffer: Arc<MessageBuffer>,
    pub(crate) table: Mutex<LinkTable>,
}

impl Registration {
    pub(super) fn new(server_id: impl Into<String>, buffer_capacity: usize) -> Self {
        Self {
            server_id: server_id.into(),
            buffer: Arc::new(MessageBuffer::with_capacity(buffer_capacity)),
            table: Mutex::new(LinkTable::default()),
        }
    }

    /// The external identifier this registration is keyed by
    pub fn server_id(&self) -> &str {
        &self.server_id
    }

    /// Atomically take all buffered events
    ///
    /// Does not touch the link gate, so polling never waits behind an
    /// in-flight register or unregister for the same key.
    pub fn drain(&self) -> Vec<ChatEvent> {
        self.buffer.drain()
    }

    /// Shared handle to this registration's buffer
    pub(crate) fn buffer(&self) -> Arc<MessageBuffer> {
        Arc::clone(&self.buffer)
    }

    /// Snapshot of the current platform links
    pub async fn links(&self) -> Vec<LinkInfo> {
        let table = self.table.lock().await;
        table
            .links
            .iter()
            .map(|(platform, link)| LinkInfo {
                platform: *platform,
                channel: link.channel.clone(),
                state: link.state,
            })
            .collect()
    }

    /// State of the link for `platform`, [`LinkState::Removed`] if absent
    pub async fn link_state(&self, platform: Platform) -> LinkState {
        let table = self.table.lock().await;
        table
            .links
            .get(&platform)
            .map(|link| link.state)
            .unwrap_or(LinkState::Removed)
    }
}
