use crate::config::AppState;
use async_stream::stream;
use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
};
use serde::Deserialize;
use serde_json::Value;
use std::convert::Infallible;
use std::sync::Arc;
use tracing::{debug, info, warn};

const EVENT_STREAM: &str = "text/event-stream";

#[derive(Debug, Deserialize)]
pub struct SessionQuery {
    #[serde(rename = "sessionId")]
    pub session_id: Option<String>,
}

fn accepts_event_stream(headers: &HeaderMap) -> bool {
    headers
        .get_all(header::ACCEPT)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .any(|value| value.contains(EVENT_STREAM))
}

/// Health check, or SSE session negotiation when the client accepts an event stream
pub async fn mcp_get(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    if !accepts_event_stream(&headers) {
        return (StatusCode::OK, "OK").into_response();
    }

    let (guard, mut outbound) = state.sessions.open();
    let endpoint = format!("{}?sessionId={}", state.mcp_path, guard.id());

    // The guard lives inside the body; the session ends when the client goes away
    let events = stream! {
        let guard = guard;
        yield Ok::<Event, Infallible>(Event::default().event("endpoint").data(endpoint));

        while let Some(message) = outbound.recv().await {
            match Event::default().event("message").json_data(&message) {
                Ok(event) => yield Ok(event),
                Err(e) => warn!(session_id = %guard.id(), error = %e, "Failed to encode SSE message"),
            }
        }
    };

    Sse::new(events)
        .keep_alive(KeepAlive::default())
        .into_response()
}

/// Deliver a JSON-RPC message to the session named by `sessionId`
pub async fn mcp_post(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SessionQuery>,
    body: Bytes,
) -> Response {
    let Some(session_id) = query.session_id.filter(|id| !id.is_empty()) else {
        debug!("POST without sessionId");
        return (StatusCode::BAD_REQUEST, "Missing sessionId").into_response();
    };

    let Some(session) = state.sessions.get(&session_id) else {
        warn!(session_id = %session_id, "POST for unknown session");
        return (StatusCode::BAD_REQUEST, "Unknown sessionId").into_response();
    };

    let message: Value = match serde_json::from_slice(&body) {
        Ok(message) => message,
        Err(e) => {
            debug!(session_id = %session_id, error = %e, "Malformed message body");
            return (StatusCode::BAD_REQUEST, format!("Invalid JSON: {}", e)).into_response();
        }
    };

    // Answered on the session's stream; a closed stream just drops the result
    let server = state.server.clone();
    tokio::spawn(async move {
        if let Some(response) = server.handle_value(message).await {
            if !session.send(response) {
                info!(session_id = %session.id(), "Session closed before response was delivered");
            }
        }
    });

    (StatusCode::ACCEPTED, "Accepted").into_response()
}
