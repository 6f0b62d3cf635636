//! Simple relay example with a replayed chat feed
//!
//! Run with: cargo run --example simple_relay [BIND_ADDR]
//!
//! Examples:
//!   cargo run --example simple_relay                  # binds to 127.0.0.1:3000
//!   cargo run --example simple_relay 127.0.0.1:3100   # binds to 127.0.0.1:3100
//!
//! Instead of a real Twitch connection, this example uses a connector that
//! replays a canned chat feed, so it works offline. Try it:
//!
//!   curl -X POST localhost:3000/register \
//!        -H 'content-type: application/json' \
//!        -d '{"username": "demo_channel", "serverId": "demo"}'
//!   curl 'localhost:3000/getMessages?serverId=demo'
//!   curl -X DELETE localhost:3000/unregister \
//!        -H 'content-type: application/json' \
//!        -d '{"serverId": "demo"}'
//!
//! Each /getMessages call drains the buffer; poll repeatedly to follow the
//! feed.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use chat_relay::transport::{
    ChatConnection, ChatConnector, ChatSignal, InboundMessage, TransportError,
};
use chat_relay::{Platform, Registry, RegistryConfig, Relay, ServerConfig};

/// Connector that replays a canned chat feed, one line per second
struct ReplayConnector;

const FEED: &[(&str, &str)] = &[
    ("StreamFan42", "hello chat!"),
    ("moderatrix", "welcome everyone"),
    ("lurker_9000", "PogChamp"),
    ("StreamFan42", "gg"),
    ("casual_carl", "what did I miss?"),
];

#[async_trait]
impl ChatConnector for ReplayConnector {
    fn platform(&self) -> Platform {
        Platform::Twitch
    }

    async fn connect(&self, channel: &str) -> Result<Box<dyn ChatConnection>, TransportError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let channel = channel.to_string();

        tokio::spawn(async move {
            for (line, (user, text)) in FEED.iter().cycle().enumerate() {
                tokio::time::sleep(Duration::from_secs(1)).await;
                let sent = tx.send(ChatSignal::Message(InboundMessage {
                    channel: channel.clone(),
                    display_name: Some(user.to_string()),
                    login: Some(user.to_lowercase()),
                    text: format!("{} (line {})", text, line + 1),
                }));
                if sent.is_err() {
                    // Receiver dropped: the registration was removed.
                    return;
                }
            }
        });

        Ok(Box::new(ReplayConnection { rx }))
    }
}

struct ReplayConnection {
    rx: mpsc::UnboundedReceiver<ChatSignal>,
}

#[async_trait]
impl ChatConnection for ReplayConnection {
    async fn next_signal(&mut self) -> Option<ChatSignal> {
        self.rx.recv().await
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        self.rx.close();
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("chat_relay=debug".parse()?)
                .add_directive("simple_relay=info".parse()?),
        )
        .init();

    let bind_addr: SocketAddr = match std::env::args().nth(1) {
        Some(addr) => addr.parse()?,
        None => "127.0.0.1:3000".parse()?,
    };

    let config = ServerConfig::default().bind(bind_addr).registry(
        RegistryConfig::default().buffer_capacity(256),
    );

    let registry = Registry::new(config.registry.clone()).with_connector(Arc::new(ReplayConnector));
    let relay = Arc::new(Relay::new(Arc::new(registry)));

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    println!("Chat relay (replayed feed) listening on {}", config.bind_addr);
    println!();
    println!("=== Register a serverId ===");
    println!(
        "curl -X POST {}/register -H 'content-type: application/json' -d '{{\"username\": \"demo_channel\", \"serverId\": \"demo\"}}'",
        config.bind_addr
    );
    println!();
    println!("=== Poll it ===");
    println!("curl '{}/getMessages?serverId=demo'", config.bind_addr);
    println!();

    axum::serve(listener, chat_relay::router(Arc::clone(&relay)))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            println!("\nShutting down...");
        })
        .await?;

    relay.shutdown().await;
    Ok(())
}
