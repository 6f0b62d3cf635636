//! Channel-existence validation
//!
//! Optional collaborator consulted before any connection attempt. A negative
//! result rejects the registration with a validation error and no side
//! effects. Probe unavailability must not block registration, so transport
//! failures report [`ChannelStatus::Unknown`] rather than an error.

use async_trait::async_trait;

/// Result of a channel-existence probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelStatus {
    /// The channel exists
    Exists,
    /// The channel does not exist (or is suspended)
    NotFound,
    /// The probe could not determine either way
    Unknown,
}

/// Collaborator that checks whether an upstream channel exists
#[async_trait]
pub trait ChannelValidator: Send + Sync {
    /// Probe `channel`, never erroring: indeterminate results are `Unknown`
    async fn check(&self, channel: &str) -> ChannelStatus;
}

/// HTTP HEAD probe against a channel page base URL
///
/// `HEAD {base_url}/{channel}`: a 2xx response means the channel exists,
/// 404/410 means it does not, anything else (including transport failures)
/// is indeterminate and treated as existing by the registry.
pub struct HttpChannelValidator {
    client: reqwest::Client,
    base_url: String,
}

impl HttpChannelValidator {
    /// Create a probe against `base_url` (trailing slash optional)
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ChannelValidator for HttpChannelValidator {
    async fn check(&self, channel: &str) -> ChannelStatus {
        let url = format!("{}/{}", self.base_url, channel);

        match self.client.head(&url).send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    ChannelStatus::Exists
                } else if status == reqwest::StatusCode::NOT_FOUND
                    || status == reqwest::StatusCode::GONE
                {
                    tracing::info!(channel = %channel, status = %status, "Channel probe negative");
                    ChannelStatus::NotFound
                } else {
                    tracing::warn!(
                        channel = %channel,
                        status = %status,
                        "Channel probe inconclusive"
                    );
                    ChannelStatus::Unknown
                }
            }
            Err(error) => {
                tracing::warn!(channel = %channel, error = %error, "Channel probe failed");
                ChannelStatus::Unknown
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use axum::routing::head;
    use axum::Router;

    use super::*;

    async fn probe_server() -> String {
        let app = Router::new()
            .route("/channels/alive", head(|| async { StatusCode::OK }))
            .route("/channels/gone", head(|| async { StatusCode::NOT_FOUND }))
            .route(
                "/channels/flaky",
                head(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        format!("http://{}/channels", addr)
    }

    #[tokio::test]
    async fn test_probe_statuses() {
        let base = probe_server().await;
        let validator = HttpChannelValidator::new(&base);

        assert_eq!(validator.check("alive").await, ChannelStatus::Exists);
        assert_eq!(validator.check("gone").await, ChannelStatus::NotFound);
        assert_eq!(validator.check("flaky").await, ChannelStatus::Unknown);
    }

    #[tokio::test]
    async fn test_unreachable_probe_is_unknown() {
        // Nothing listens on this port.
        let validator = HttpChannelValidator::new("http://127.0.0.1:9/channels");
        assert_eq!(validator.check("anything").await, ChannelStatus::Unknown);
    }
}
