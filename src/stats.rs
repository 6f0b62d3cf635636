//! Relay-wide counters
//!
//! Process-level counters updated from the request path and the per-link
//! reader tasks, snapshotted by the stats endpoint.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Shared relay counters
#[derive(Debug, Default)]
pub struct RelayStats {
    registered: AtomicU64,
    overridden: AtomicU64,
    removed: AtomicU64,
    events_relayed: AtomicU64,
    events_dropped: AtomicU64,
    polls: AtomicU64,
}

/// Point-in-time view of the relay counters
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    /// Registrations currently live
    pub active_registrations: usize,
    /// Registrations created over the process lifetime
    pub registered: u64,
    /// Links replaced by override
    pub overridden: u64,
    /// Registrations removed by unregister
    pub removed: u64,
    /// Events appended to buffers
    pub events_relayed: u64,
    /// Events dropped to buffer overflow
    pub events_dropped: u64,
    /// Poll requests served
    pub polls: u64,
}

impl RelayStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_registered(&self) {
        self.registered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_overridden(&self) {
        self.overridden.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_removed(&self) {
        self.removed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_relayed(&self) {
        self.events_relayed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.events_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_poll(&self) {
        self.polls.fetch_add(1, Ordering::Relaxed);
    }

    /// Snapshot the counters together with the current registration count
    pub fn snapshot(&self, active_registrations: usize) -> StatsSnapshot {
        StatsSnapshot {
            active_registrations,
            registered: self.registered.load(Ordering::Relaxed),
            overridden: self.overridden.load(Ordering::Relaxed),
            removed: self.removed.load(Ordering::Relaxed),
            events_relayed: self.events_relayed.load(Ordering::Relaxed),
            events_dropped: self.events_dropped.load(Ordering::Relaxed),
            polls: self.polls.load(Ordering::Relaxed),
        }
    }
}
