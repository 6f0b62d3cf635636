//! Chat relay service binary
//!
//! Wires the Twitch connector, registry and HTTP router together and serves
//! until interrupted, then disconnects every live registration.

use std::sync::Arc;

use chat_relay::transport::twitch::TwitchConnector;
use chat_relay::validate::HttpChannelValidator;
use chat_relay::{Registry, Relay, ServerConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("chat_relay=info".parse()?),
        )
        .init();

    let config = ServerConfig::from_env();

    let mut registry =
        Registry::new(config.registry.clone()).with_connector(Arc::new(TwitchConnector::new()));
    if let Some(base_url) = &config.validate_base_url {
        tracing::info!(base_url = %base_url, "Channel validation enabled");
        registry = registry.with_validator(Arc::new(HttpChannelValidator::new(base_url)));
    }
    let relay = Arc::new(Relay::new(Arc::new(registry)));

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "Chat relay listening");

    axum::serve(listener, chat_relay::router(Arc::clone(&relay)))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
        })
        .await?;

    relay.shutdown().await;
    Ok(())
}
