//! Scripted in-memory connector for tests
//!
//! Lets tests drive the supervisor and registry without network I/O: pushed
//! signals flow through a real reader task, connects can be scripted to
//! fail, and connect/disconnect ordering is recorded for assertions.

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{ChatConnection, ChatConnector, ChatSignal, TransportError};
use crate::registry::Platform;

#[derive(Debug, Default)]
struct Shared {
    /// Signals pushed but not yet fully processed by a reader task
    pending: AtomicUsize,
    /// Currently open connections
    live: AtomicUsize,
    /// Total connect calls
    attempts: AtomicU32,
    /// Remaining connects that should fail before one succeeds
    failures_left: AtomicU32,
}

/// Test connector whose connections are driven by pushed signals
pub(crate) struct ScriptedConnector {
    platform: Platform,
    shared: Arc<Shared>,
    senders: Mutex<Vec<mpsc::UnboundedSender<ChatSignal>>>,
    /// Ordered log of "connect:<channel>" / "disconnect:<channel>" entries
    log: Arc<Mutex<Vec<String>>>,
}

impl ScriptedConnector {
    /// Connector whose connects always succeed
    pub fn new(platform: Platform) -> Self {
        Self::failing_times(platform, 0)
    }

    /// Connector whose connects always fail
    pub fn failing(platform: Platform) -> Self {
        Self::failing_times(platform, u32::MAX)
    }

    /// Connector whose first `failures` connects fail, then succeed
    pub fn failing_times(platform: Platform, failures: u32) -> Self {
        let shared = Shared {
            failures_left: AtomicU32::new(failures),
            ..Shared::default()
        };
        Self {
            platform,
            shared: Arc::new(shared),
            senders: Mutex::new(Vec::new()),
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Deliver a signal to the most recently established connection
    pub fn push(&self, signal: ChatSignal) {
        self.shared.pending.fetch_add(1, Ordering::SeqCst);
        let senders = self.senders.lock().unwrap();
        senders
            .last()
            .expect("push with no live connection")
            .send(signal)
            .expect("connection receiver dropped");
    }

    /// Wait until every pushed signal has been processed by the reader
    pub async fn drained(&self) {
        while self.shared.pending.load(Ordering::SeqCst) > 0 {
            tokio::task::yield_now().await;
        }
    }

    pub fn live_connections(&self) -> usize {
        self.shared.live.load(Ordering::SeqCst)
    }

    pub fn connect_attempts(&self) -> u32 {
        self.shared.attempts.load(Ordering::SeqCst)
    }

    /// Ordered connect/disconnect log for teardown-ordering assertions
    pub fn event_log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    /// Make the next `failures` connect calls fail
    pub fn fail_next(&self, failures: u32) {
        self.shared.failures_left.store(failures, Ordering::SeqCst);
    }
}

#[async_trait]
impl ChatConnector for ScriptedConnector {
    fn platform(&self) -> Platform {
        self.platform
    }

    async fn connect(&self, channel: &str) -> Result<Box<dyn ChatConnection>, TransportError> {
        self.shared.attempts.fetch_add(1, Ordering::SeqCst);

        let failures = self.shared.failures_left.load(Ordering::SeqCst);
        if failures > 0 {
            if failures != u32::MAX {
                self.shared.failures_left.fetch_sub(1, Ordering::SeqCst);
            }
            return Err(TransportError::Connect("scripted failure".to_string()));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        self.senders.lock().unwrap().push(tx);
        self.shared.live.fetch_add(1, Ordering::SeqCst);
        self.log
            .lock()
            .unwrap()
            .push(format!("connect:{}", channel));

        Ok(Box::new(ScriptedConnection {
            rx,
            channel: channel.to_string(),
            shared: Arc::clone(&self.shared),
            log: Arc::clone(&self.log),
            owes_ack: false,
            closed: false,
        }))
    }
}

struct ScriptedConnection {
    rx: mpsc::UnboundedReceiver<ChatSignal>,
    channel: String,
    shared: Arc<Shared>,
    log: Arc<Mutex<Vec<String>>>,
    /// The previously returned signal is acknowledged as processed when the
    /// reader comes back for the next one
    owes_ack: bool,
    closed: bool,
}

impl ScriptedConnection {
    fn ack(&mut self) {
        if self.owes_ack {
            self.shared.pending.fetch_sub(1, Ordering::SeqCst);
            self.owes_ack = false;
        }
    }
}

#[async_trait]
impl ChatConnection for ScriptedConnection {
    async fn next_signal(&mut self) -> Option<ChatSignal> {
        self.ack();
        match self.rx.recv().await {
            Some(signal) => {
                self.owes_ack = true;
                Some(signal)
            }
            None => None,
        }
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        self.ack();
        if !self.closed {
            self.closed = true;
            self.shared.live.fetch_sub(1, Ordering::SeqCst);
            self.log
                .lock()
                .unwrap()
                .push(format!("disconnect:{}", self.channel));
        }
        Ok(())
    }
}
