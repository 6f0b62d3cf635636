//! HTTP routes
//!
//! | Method        | Path         | Body/Query              |
//! |---------------|--------------|-------------------------|
//! | POST          | /register    | `{username, serverId, platform?}` |
//! | GET           | /getMessages | `?serverId=...`         |
//! | DELETE / POST | /unregister  | `{serverId}`            |
//! | GET           | /health      |                         |
//! | GET           | /stats       |                         |
//!
//! Handler panics are converted to 500 responses by the catch-panic layer,
//! so one bad request can never take the process down with it.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;

use crate::registry::{ChatEvent, Platform, RegisterOutcome};
use crate::relay::{Relay, UnregisterOutcome};
use crate::stats::StatsSnapshot;

/// Build the relay's HTTP router
pub fn router(relay: Arc<Relay>) -> Router {
    Router::new()
        .route("/register", post(register_handler))
        .route("/getMessages", get(get_messages_handler))
        .route(
            "/unregister",
            delete(unregister_handler).post(unregister_handler),
        )
        .route("/health", get(health_handler))
        .route("/stats", get(stats_handler))
        .layer(CatchPanicLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(relay)
}

/// Request to register an upstream channel for a serverId
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisterBody {
    username: Option<String>,
    server_id: Option<String>,
    /// Platform tag; defaults to "twitch"
    platform: Option<String>,
}

#[derive(Serialize)]
struct RegisterResponse {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    overridden: Option<bool>,
}

#[derive(Serialize)]
struct StatusResponse {
    status: &'static str,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

async fn register_handler(
    State(relay): State<Arc<Relay>>,
    body: Option<Json<RegisterBody>>,
) -> Response {
    let Some(Json(body)) = body else {
        return bad_request("Missing username or serverId");
    };

    let username = body.username.unwrap_or_default();
    let server_id = body.server_id.unwrap_or_default();
    let platform = match body.platform.as_deref() {
        None => Platform::Twitch,
        Some(tag) => match tag.parse::<Platform>() {
            Ok(platform) => platform,
            Err(unknown) => return bad_request(&unknown.to_string()),
        },
    };

    match relay.register(&server_id, &username, platform).await {
        Ok(RegisterOutcome::Registered) => Json(RegisterResponse {
            status: "ok",
            overridden: None,
        })
        .into_response(),
        Ok(RegisterOutcome::AlreadyActive) => Json(RegisterResponse {
            status: "already_registered",
            overridden: None,
        })
        .into_response(),
        Ok(RegisterOutcome::Overridden) => Json(RegisterResponse {
            status: "ok",
            overridden: Some(true),
        })
        .into_response(),
        Err(error) if error.is_validation() => bad_request(&error.to_string()),
        Err(error) => {
            tracing::error!(server_id = %server_id, error = %error, "Registration failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: error.to_string(),
                }),
            )
                .into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessagesQuery {
    server_id: Option<String>,
}

async fn get_messages_handler(
    State(relay): State<Arc<Relay>>,
    Query(query): Query<MessagesQuery>,
) -> Json<Vec<ChatEvent>> {
    match query.server_id {
        Some(server_id) => Json(relay.poll(&server_id).await),
        None => Json(Vec::new()),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UnregisterBody {
    server_id: Option<String>,
}

async fn unregister_handler(
    State(relay): State<Arc<Relay>>,
    body: Option<Json<UnregisterBody>>,
) -> Json<StatusResponse> {
    let server_id = body.and_then(|Json(body)| body.server_id).unwrap_or_default();

    match relay.unregister(&server_id).await {
        UnregisterOutcome::Removed => Json(StatusResponse { status: "removed" }),
        UnregisterOutcome::NotFound => Json(StatusResponse {
            status: "not_found",
        }),
    }
}

async fn health_handler() -> Json<StatusResponse> {
    Json(StatusResponse { status: "ok" })
}

async fn stats_handler(State(relay): State<Arc<Relay>>) -> Json<StatsSnapshot> {
    Json(relay.stats().await)
}

fn bad_request(message: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
        .into_response()
}
