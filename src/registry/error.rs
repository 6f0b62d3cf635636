//! Registry error types

use super::event::Platform;
use crate::transport::TransportError;

/// Error type for registry operations
#[derive(Debug)]
pub enum RegistryError {
    /// No connector is configured for the requested platform
    UnsupportedPlatform(Platform),
    /// The channel-existence probe reported the channel as missing
    ChannelRejected {
        /// Channel that failed validation
        channel: String,
    },
    /// Connection establishment failed after exhausting the retry bound
    ConnectFailed {
        /// Channel the connection was for
        channel: String,
        /// Number of attempts made
        attempts: u32,
        /// Error from the final attempt
        source: TransportError,
    },
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryError::UnsupportedPlatform(platform) => {
                write!(f, "No connector configured for platform: {}", platform)
            }
            RegistryError::ChannelRejected { channel } => {
                write!(f, "Channel does not exist or is unavailable: {}", channel)
            }
            RegistryError::ConnectFailed {
                channel, attempts, ..
            } => {
                write!(
                    f,
                    "Failed to connect to {} after {} attempts",
                    channel, attempts
                )
            }
        }
    }
}

impl std::error::Error for RegistryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RegistryError::ConnectFailed { source, .. } => Some(source),
            _ => None,
        }
    }
}
