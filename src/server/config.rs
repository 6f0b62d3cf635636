//! Server configuration

use std::net::SocketAddr;

use crate::registry::RegistryConfig;

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the HTTP listener to
    pub bind_addr: SocketAddr,

    /// Registry and connection settings
    pub registry: RegistryConfig,

    /// Base URL for the channel-existence probe; `None` disables validation
    pub validate_base_url: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".parse().unwrap(),
            registry: RegistryConfig::default(),
            validate_base_url: None,
        }
    }
}

impl ServerConfig {
    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set the registry configuration
    pub fn registry(mut self, registry: RegistryConfig) -> Self {
        self.registry = registry;
        self
    }

    /// Enable the channel-existence probe against `base_url`
    pub fn validate_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.validate_base_url = Some(base_url.into());
        self
    }

    /// Build a config from the environment
    ///
    /// `PORT` overrides the listen port (default 3000), `RELAY_VALIDATE_URL`
    /// enables the channel probe, `RELAY_BUFFER_CAPACITY` overrides the
    /// per-registration buffer bound. Unparsable values are logged and
    /// ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(port) = std::env::var("PORT") {
            match port.parse::<u16>() {
                Ok(port) => config.bind_addr.set_port(port),
                Err(_) => tracing::warn!(value = %port, "Ignoring unparsable PORT"),
            }
        }

        if let Ok(url) = std::env::var("RELAY_VALIDATE_URL") {
            if !url.trim().is_empty() {
                config.validate_base_url = Some(url);
            }
        }

        if let Ok(capacity) = std::env::var("RELAY_BUFFER_CAPACITY") {
            match capacity.parse::<usize>() {
                Ok(capacity) => config.registry.buffer_capacity = capacity,
                Err(_) => {
                    tracing::warn!(value = %capacity, "Ignoring unparsable RELAY_BUFFER_CAPACITY")
                }
            }
        }

        config
    }
}
