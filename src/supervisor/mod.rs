//! Connection supervisor
//!
//! Manages the lifecycle of one upstream chat connection for one
//! (registration, platform) link: connect with bounded retry, then hand the
//! connection to a dedicated reader task that owns it and appends normalized
//! events to the registration's buffer. Teardown signals the task, which
//! closes the upstream and exits; the supervisor joins it with a timeout.
//!
//! After the initial connect succeeds, the upstream's own reconnect logic is
//! trusted. Lifecycle signals (disconnected, reconnecting, transport error)
//! are logged as diagnostics and do not change the link's externally-visible
//! state; a permanently dead upstream stays registered until an explicit
//! unregister or override.

pub mod retry;

pub use retry::RetryPolicy;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::registry::{ChatEvent, MessageBuffer, Platform};
use crate::stats::RelayStats;
use crate::transport::{ChatConnection, ChatConnector, ChatSignal, TransportError};

/// Handle to one live upstream connection
///
/// Holds the reader task's shutdown signal and join handle. Dropping the
/// handle without calling [`disconnect`](Self::disconnect) leaves the reader
/// task running; the registry always disconnects before discarding a link.
#[derive(Debug)]
pub struct ConnectionHandle {
    platform: Platform,
    channel: String,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl ConnectionHandle {
    /// Platform this connection belongs to
    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Channel this connection relays
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Signal the reader task to close the upstream and wait for it to exit
    ///
    /// Best-effort: failures are logged and swallowed so teardown never
    /// blocks removal from the registry. A task that does not acknowledge
    /// within `timeout` is aborted.
    pub async fn disconnect(mut self, timeout: Duration) {
        if let Some(shutdown) = self.shutdown.take() {
            // The task may already have exited on its own.
            let _ = shutdown.send(());
        }

        let Some(task) = self.task.take() else {
            return;
        };

        let abort = task.abort_handle();
        match tokio::time::timeout(timeout, task).await {
            Ok(Ok(())) => {
                tracing::debug!(
                    platform = %self.platform,
                    channel = %self.channel,
                    "Reader task stopped"
                );
            }
            Ok(Err(join_error)) if join_error.is_panic() => {
                tracing::error!(
                    platform = %self.platform,
                    channel = %self.channel,
                    "Reader task panicked during shutdown"
                );
            }
            Ok(Err(_)) => {}
            Err(_) => {
                tracing::warn!(
                    platform = %self.platform,
                    channel = %self.channel,
                    timeout_secs = timeout.as_secs(),
                    "Reader task did not stop in time, aborting"
                );
                abort.abort();
            }
        }
    }
}

/// Connect to `channel` and spawn the reader task for it
///
/// Retries per `retry`, blocking only the calling register() request. On
/// success the returned handle owns the spawned task; on exhaustion the last
/// transport error is returned and nothing is left running.
pub(crate) async fn establish(
    connector: &dyn ChatConnector,
    server_id: &str,
    channel: &str,
    retry: &RetryPolicy,
    buffer: Arc<MessageBuffer>,
    stats: Arc<RelayStats>,
) -> Result<ConnectionHandle, TransportError> {
    let platform = connector.platform();

    let connection = retry
        .run(|attempt| {
            tracing::debug!(
                server_id = %server_id,
                channel = %channel,
                platform = %platform,
                attempt,
                "Connecting upstream chat"
            );
            connector.connect(channel)
        })
        .await?;

    tracing::info!(
        server_id = %server_id,
        channel = %channel,
        platform = %platform,
        "Upstream chat connected"
    );

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let task = tokio::spawn(read_loop(
        connection,
        shutdown_rx,
        platform,
        server_id.to_string(),
        channel.to_string(),
        buffer,
        stats,
    ));

    Ok(ConnectionHandle {
        platform,
        channel: channel.to_string(),
        shutdown: Some(shutdown_tx),
        task: Some(task),
    })
}

/// Reader task body: owns the connection until shutdown or stream end
async fn read_loop(
    mut connection: Box<dyn ChatConnection>,
    mut shutdown: oneshot::Receiver<()>,
    platform: Platform,
    server_id: String,
    channel: String,
    buffer: Arc<MessageBuffer>,
    stats: Arc<RelayStats>,
) {
    enum Step {
        Shutdown,
        Signal(Option<ChatSignal>),
    }

    loop {
        let step = tokio::select! {
            _ = &mut shutdown => Step::Shutdown,
            signal = connection.next_signal() => Step::Signal(signal),
        };

        match step {
            Step::Shutdown => {
                if let Err(error) = connection.disconnect().await {
                    tracing::warn!(
                        server_id = %server_id,
                        channel = %channel,
                        error = %error,
                        "Upstream disconnect failed"
                    );
                }
                return;
            }
            Step::Signal(Some(ChatSignal::Message(message))) => {
                let user = message.sender_name().to_string();
                let stored = buffer.append(ChatEvent::new(platform, user, message.text));
                stats.record_relayed();
                if !stored {
                    stats.record_dropped();
                }
            }
            Step::Signal(Some(ChatSignal::Disconnected { reason })) => {
                tracing::warn!(
                    server_id = %server_id,
                    channel = %channel,
                    reason = ?reason,
                    "Upstream disconnected, trusting its reconnect"
                );
            }
            Step::Signal(Some(ChatSignal::Reconnecting)) => {
                tracing::info!(
                    server_id = %server_id,
                    channel = %channel,
                    "Upstream reconnecting"
                );
            }
            Step::Signal(Some(ChatSignal::TransportError(error))) => {
                tracing::warn!(
                    server_id = %server_id,
                    channel = %channel,
                    error = %error,
                    "Upstream transport error"
                );
            }
            Step::Signal(None) => {
                tracing::info!(
                    server_id = %server_id,
                    channel = %channel,
                    "Upstream event stream ended"
                );
                return;
            }
        }
    }
}
