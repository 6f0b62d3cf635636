//! Registry configuration

use std::time::Duration;

use super::buffer::DEFAULT_BUFFER_CAPACITY;
use crate::supervisor::RetryPolicy;

/// Configuration for the registration table and its connections
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Maximum buffered events per registration (oldest dropped on overflow)
    pub buffer_capacity: usize,

    /// Retry policy for upstream connection establishment
    pub retry: RetryPolicy,

    /// How long to wait for a reader task to acknowledge disconnect before
    /// aborting it
    pub disconnect_timeout: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            retry: RetryPolicy::default(),
            disconnect_timeout: Duration::from_secs(5),
        }
    }
}

impl RegistryConfig {
    /// Set the per-registration buffer capacity
    pub fn buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = capacity;
        self
    }

    /// Set the connection retry policy
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Set the disconnect acknowledgment timeout
    pub fn disconnect_timeout(mut self, timeout: Duration) -> Self {
        self.disconnect_timeout = timeout;
        self
    }
}
