//! Upstream chat transport
//!
//! The registry consumes upstream chat as two opaque capabilities: a
//! [`ChatConnector`] that establishes a connection to a channel, and the
//! resulting [`ChatConnection`] that yields [`ChatSignal`]s until it is
//! disconnected. Everything platform-specific (wire protocol, reconnect
//! behavior, authentication) lives behind these traits; the core never sees
//! protocol internals.
//!
//! The production implementation is [`twitch::TwitchConnector`], anonymous
//! Twitch IRC over WebSocket. Tests use a scripted in-memory connector.

pub mod twitch;

#[cfg(test)]
pub(crate) mod testing;

use async_trait::async_trait;

use crate::registry::Platform;

/// Error type for transport operations
#[derive(Debug)]
pub enum TransportError {
    /// Failed to establish the upstream connection
    Connect(String),
    /// The connection closed while an operation was in flight
    Closed,
    /// The upstream violated its protocol
    Protocol(String),
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportError::Connect(reason) => write!(f, "Connect failed: {}", reason),
            TransportError::Closed => write!(f, "Connection closed"),
            TransportError::Protocol(reason) => write!(f, "Protocol error: {}", reason),
        }
    }
}

impl std::error::Error for TransportError {}

/// One inbound chat message, before normalization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Channel the message was posted in
    pub channel: String,
    /// Sender display name, if the platform provided one
    pub display_name: Option<String>,
    /// Sender login name, if the platform provided one
    pub login: Option<String>,
    /// Message body, verbatim
    pub text: String,
}

impl InboundMessage {
    /// Sender name for relaying: display name, else login, else "unknown"
    pub fn sender_name(&self) -> &str {
        self.display_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .or(self.login.as_deref())
            .filter(|name| !name.is_empty())
            .unwrap_or("unknown")
    }
}

/// Event delivered by a live chat connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatSignal {
    /// An inbound chat message
    Message(InboundMessage),
    /// The upstream dropped the connection; its own reconnect may restore it
    Disconnected {
        /// Reason reported by the upstream, if any
        reason: Option<String>,
    },
    /// The upstream is re-establishing its session
    Reconnecting,
    /// A transport-level fault that did not end the connection
    TransportError(String),
}

/// A live connection to one upstream chat channel
///
/// Owned by exactly one reader task. `next_signal` returning `None` means
/// the connection is permanently finished and no further signals will come.
#[async_trait]
pub trait ChatConnection: Send {
    /// Wait for the next signal from the upstream
    async fn next_signal(&mut self) -> Option<ChatSignal>;

    /// Close the upstream connection, best-effort
    async fn disconnect(&mut self) -> Result<(), TransportError>;
}

/// Factory for connections to one chat platform
#[async_trait]
pub trait ChatConnector: Send + Sync {
    /// Platform tag stamped on events from connections made by this connector
    fn platform(&self) -> Platform;

    /// Establish a connection to `channel`
    ///
    /// One attempt; the caller owns retry.
    async fn connect(&self, channel: &str) -> Result<Box<dyn ChatConnection>, TransportError>;
}
