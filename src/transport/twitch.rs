//! Twitch chat connector
//!
//! Anonymous Twitch IRC over WebSocket: no credentials, read-only, one
//! channel per connection, which is all the relay needs. The connector
//! requests IRCv3 tags so sender display names are available, answers
//! PINGs, and re-dials on its own when the server drops the session or
//! sends RECONNECT. If re-dialing fails permanently the event stream ends;
//! the registration stays put until an explicit unregister or override.

use std::collections::VecDeque;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::tungstenite::Error as WsError;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use url::Url;

use super::{ChatConnection, ChatConnector, ChatSignal, InboundMessage, TransportError};
use crate::registry::Platform;

/// Twitch's IRC-over-WebSocket endpoint
pub const TWITCH_WS_URL: &str = "wss://irc-ws.chat.twitch.tv:443";

/// Re-dial attempts after the server drops the session
const REDIAL_ATTEMPTS: u32 = 3;

/// Delay before each re-dial attempt
const REDIAL_DELAY: Duration = Duration::from_secs(1);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connector for anonymous Twitch chat
pub struct TwitchConnector {
    ws_url: Url,
}

impl TwitchConnector {
    /// Connector against the production Twitch endpoint
    pub fn new() -> Self {
        Self {
            ws_url: Url::parse(TWITCH_WS_URL).unwrap(),
        }
    }

    /// Connector against a custom endpoint
    pub fn with_url(ws_url: Url) -> Self {
        Self { ws_url }
    }
}

impl Default for TwitchConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatConnector for TwitchConnector {
    fn platform(&self) -> Platform {
        Platform::Twitch
    }

    async fn connect(&self, channel: &str) -> Result<Box<dyn ChatConnection>, TransportError> {
        let nick = anonymous_nick();
        let ws = dial(&self.ws_url, &nick, channel).await?;

        Ok(Box::new(TwitchChatConnection {
            ws,
            ws_url: self.ws_url.clone(),
            nick,
            channel: channel.to_string(),
            pending: VecDeque::new(),
            finished: false,
        }))
    }
}

/// Open the WebSocket and send the IRC handshake
async fn dial(ws_url: &Url, nick: &str, channel: &str) -> Result<WsStream, TransportError> {
    let (mut ws, _) = connect_async(ws_url.as_str())
        .await
        .map_err(|e| TransportError::Connect(e.to_string()))?;

    let handshake = [
        "CAP REQ :twitch.tv/tags twitch.tv/commands".to_string(),
        format!("NICK {}", nick),
        format!("JOIN #{}", channel),
    ];
    for line in handshake {
        ws.send(Message::text(line))
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;
    }

    Ok(ws)
}

/// Anonymous login of the justinfan family, accepted without authentication
fn anonymous_nick() -> String {
    let nonce = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_micros() as u64)
        .unwrap_or(0);
    format!("justinfan{}", 10_000 + nonce % 80_000)
}

/// One live anonymous connection to a Twitch channel
struct TwitchChatConnection {
    ws: WsStream,
    ws_url: Url,
    nick: String,
    channel: String,
    /// Signals parsed but not yet delivered (one frame can carry several
    /// IRC lines)
    pending: VecDeque<ChatSignal>,
    /// Set once re-dialing has given up or disconnect was requested
    finished: bool,
}

impl TwitchChatConnection {
    /// The session dropped; emit diagnostics and try to re-dial
    async fn handle_drop(&mut self, reason: Option<String>) {
        self.pending
            .push_back(ChatSignal::Disconnected { reason });
        self.pending.push_back(ChatSignal::Reconnecting);

        for attempt in 1..=REDIAL_ATTEMPTS {
            tokio::time::sleep(REDIAL_DELAY).await;
            match dial(&self.ws_url, &self.nick, &self.channel).await {
                Ok(ws) => {
                    self.ws = ws;
                    tracing::info!(channel = %self.channel, attempt, "Twitch session re-established");
                    return;
                }
                Err(error) => {
                    tracing::debug!(channel = %self.channel, attempt, error = %error, "Re-dial failed");
                }
            }
        }

        self.pending.push_back(ChatSignal::TransportError(
            "reconnect attempts exhausted".to_string(),
        ));
        self.finished = true;
    }
}

#[async_trait]
impl ChatConnection for TwitchChatConnection {
    async fn next_signal(&mut self) -> Option<ChatSignal> {
        loop {
            if let Some(signal) = self.pending.pop_front() {
                return Some(signal);
            }
            if self.finished {
                return None;
            }

            match self.ws.next().await {
                Some(Ok(Message::Text(text))) => {
                    let mut reconnect_requested = false;

                    for raw in text.as_str().lines() {
                        let line = raw.trim_end_matches('\r');
                        if line.is_empty() {
                            continue;
                        }
                        match ingest_line(line) {
                            LineAction::Deliver(signal) => self.pending.push_back(signal),
                            LineAction::Pong(reply) => {
                                if let Err(error) = self.ws.send(Message::text(reply)).await {
                                    tracing::debug!(
                                        channel = %self.channel,
                                        error = %error,
                                        "PONG send failed"
                                    );
                                }
                            }
                            LineAction::Reconnect => reconnect_requested = true,
                            LineAction::Ignore => {}
                        }
                    }

                    if reconnect_requested {
                        self.handle_drop(Some("server requested reconnect".to_string()))
                            .await;
                    }
                }
                Some(Ok(Message::Ping(payload))) => {
                    let _ = self.ws.send(Message::Pong(payload)).await;
                }
                Some(Ok(Message::Close(frame))) => {
                    let reason = frame.map(|f| f.reason.to_string());
                    self.handle_drop(reason).await;
                }
                Some(Ok(_)) => {}
                Some(Err(error)) => {
                    self.handle_drop(Some(error.to_string())).await;
                }
                None => {
                    self.handle_drop(None).await;
                }
            }
        }
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        self.finished = true;
        match self.ws.close(None).await {
            Ok(()) | Err(WsError::ConnectionClosed) | Err(WsError::AlreadyClosed) => Ok(()),
            Err(error) => Err(TransportError::Protocol(error.to_string())),
        }
    }
}

/// What to do with one parsed IRC line
#[derive(Debug, PartialEq, Eq)]
enum LineAction {
    Deliver(ChatSignal),
    Pong(String),
    Reconnect,
    Ignore,
}

/// Parse one IRC line into an action
///
/// Only PRIVMSG, PING and RECONNECT matter; join confirmations, numerics
/// and capability acks are ignored.
fn ingest_line(line: &str) -> LineAction {
    let mut rest = line;

    let tags = if let Some(stripped) = rest.strip_prefix('@') {
        let (tags, remainder) = split_word(stripped);
        rest = remainder;
        Some(tags)
    } else {
        None
    };

    let prefix = if let Some(stripped) = rest.strip_prefix(':') {
        let (prefix, remainder) = split_word(stripped);
        rest = remainder;
        Some(prefix)
    } else {
        None
    };

    let (command, params) = split_word(rest);

    match command {
        "PING" => {
            let token = params.strip_prefix(':').unwrap_or("tmi.twitch.tv");
            LineAction::Pong(format!("PONG :{}", token))
        }
        "RECONNECT" => LineAction::Reconnect,
        "PRIVMSG" => {
            let (target, trailing) = split_word(params);
            let text = trailing.strip_prefix(':').unwrap_or(trailing);

            let display_name = tags
                .and_then(|t| tag_value(t, "display-name"))
                .filter(|v| !v.is_empty())
                .map(unescape_tag);
            let login = prefix
                .and_then(|p| p.split('!').next())
                .filter(|l| !l.is_empty())
                .map(String::from);

            LineAction::Deliver(ChatSignal::Message(InboundMessage {
                channel: target.trim_start_matches('#').to_string(),
                display_name,
                login,
                text: text.to_string(),
            }))
        }
        _ => LineAction::Ignore,
    }
}

/// Split off the first space-delimited word
fn split_word(input: &str) -> (&str, &str) {
    match input.split_once(' ') {
        Some((word, rest)) => (word, rest.trim_start()),
        None => (input, ""),
    }
}

/// Find a raw tag value by key in a semicolon-separated tag string
fn tag_value<'a>(tags: &'a str, key: &str) -> Option<&'a str> {
    tags.split(';').find_map(|pair| {
        let (k, v) = pair.split_once('=')?;
        (k == key).then_some(v)
    })
}

/// Undo IRCv3 tag-value escaping
fn unescape_tag(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('s') => out.push(' '),
            Some(':') => out.push(';'),
            Some('\\') => out.push('\\'),
            Some('r') => out.push('\r'),
            Some('n') => out.push('\n'),
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}
