//! Chat event and platform types
//!
//! This module defines the platform tag for upstream sources and the
//! normalized event that is buffered per registration and returned to
//! pollers.

use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Upstream chat platform tag
///
/// Carried on every [`ChatEvent`] so pollers can tell sources apart when a
/// registration relays more than one platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// Twitch chat (IRC over WebSocket)
    Twitch,
    /// Kick chat
    Kick,
}

impl Platform {
    /// Stable lowercase name used on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Twitch => "twitch",
            Platform::Kick => "kick",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown platform tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownPlatform(pub String);

impl std::fmt::Display for UnknownPlatform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Unknown platform: {}", self.0)
    }
}

impl std::error::Error for UnknownPlatform {}

impl FromStr for Platform {
    type Err = UnknownPlatform;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "twitch" => Ok(Platform::Twitch),
            "kick" => Ok(Platform::Kick),
            other => Err(UnknownPlatform(other.to_string())),
        }
    }
}

/// One relayed chat message
///
/// `user` is already normalized (display name, falling back to login name,
/// falling back to `"unknown"`). `timestamp` is the capture-time instant in
/// milliseconds since the Unix epoch, assigned at receipt rather than taken
/// from the upstream, which keeps ordering consistent within a registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatEvent {
    /// Source platform
    pub platform: Platform,
    /// Sender display name
    pub user: String,
    /// Message body, verbatim
    pub text: String,
    /// Capture time, milliseconds since epoch
    pub timestamp: u64,
}

impl ChatEvent {
    /// Create an event stamped with the current time
    pub fn new(platform: Platform, user: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            platform,
            user: user.into(),
            text: text.into(),
            timestamp: epoch_millis(),
        }
    }
}

fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
