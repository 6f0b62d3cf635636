//! Crate-level error types
//!
//! The relay distinguishes request-validation failures (reported as 400 to
//! callers, no state mutated) from connection-establishment failures
//! (reported as 500, registration not created). Disconnect failures are never
//! surfaced here; they are logged at the point of teardown.

use crate::registry::RegistryError;

/// Convenience result type used throughout the crate
pub type Result<T> = std::result::Result<T, RelayError>;

/// Error type for relay facade operations
#[derive(Debug)]
pub enum RelayError {
    /// The request was malformed (missing or empty fields)
    InvalidRequest(String),
    /// A registry operation failed
    Registry(RegistryError),
}

impl RelayError {
    /// Whether this error rejects the request before any connection attempt
    ///
    /// Validation errors map to 400 at the HTTP surface; everything else is
    /// a server-side failure and maps to 500.
    pub fn is_validation(&self) -> bool {
        match self {
            RelayError::InvalidRequest(_) => true,
            RelayError::Registry(e) => matches!(
                e,
                RegistryError::ChannelRejected { .. } | RegistryError::UnsupportedPlatform(_)
            ),
        }
    }
}

impl std::fmt::Display for RelayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RelayError::InvalidRequest(msg) => write!(f, "{}", msg),
            RelayError::Registry(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for RelayError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RelayError::InvalidRequest(_) => None,
            RelayError::Registry(e) => Some(e),
        }
    }
}

impl From<RegistryError> for RelayError {
    fn from(e: RegistryError) -> Self {
        RelayError::Registry(e)
    }
}
