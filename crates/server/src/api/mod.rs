use crate::config::AppState;
use anyhow::{Context, Result};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use std::any::Any;
use std::sync::Arc;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};

mod handlers;

/// Start the HTTP/SSE server
pub async fn serve(addr: &str, state: AppState) -> Result<()> {
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("MCP HTTP server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the router: one MCP path, everything else is 404
pub fn create_router(state: AppState) -> Router {
    let path = state.mcp_path.clone();

    let routes = Router::new()
        .route(
            &path,
            get(handlers::mcp_get)
                .post(handlers::mcp_post)
                .fallback(not_found),
        )
        .fallback(not_found);

    with_middleware(routes).with_state(Arc::new(state))
}

/// Panic recovery, request tracing and CORS
fn with_middleware<S>(router: Router<S>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().include_headers(false))
                .on_response(DefaultOnResponse::new()),
        )
        .layer(CorsLayer::permissive())
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "Not Found")
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let details = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    tracing::error!(details = %details, "Request handler panicked");

    (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, BodyDataStream};
    use axum::http::{header, Request};
    use futures::StreamExt;
    use marketing_miner_core::{ClientConfig, MarketingMinerClient, TokenResolver};
    use marketing_miner_mcp::tools::keyword_registry;
    use marketing_miner_mcp::McpServer;
    use serde_json::{json, Value};
    use std::time::Duration;
    use tower::ServiceExt;

    fn create_state() -> AppState {
        let config = ClientConfig::from_base(Some("http://127.0.0.1:9")).unwrap();
        let client =
            MarketingMinerClient::new(config, TokenResolver::with_lookup(|_| None)).unwrap();
        AppState::new(McpServer::new(keyword_registry(client)), "/mcp")
    }

    fn get(uri: &str, accept: &str) -> Request<Body> {
        Request::builder()
            .method("GET")
            .uri(uri)
            .header(header::ACCEPT, accept)
            .body(Body::empty())
            .unwrap()
    }

    fn post(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    /// Read SSE chunks until a full event named `name` arrives; returns its data line.
    async fn next_event(stream: &mut BodyDataStream, name: &str) -> String {
        let mut buffer = String::new();
        let marker = format!("event: {}\n", name);
        loop {
            if let Some(start) = buffer.find(&marker) {
                let rest = &buffer[start + marker.len()..];
                if let Some(end) = rest.find("\n\n") {
                    return rest[..end]
                        .lines()
                        .filter_map(|line| line.strip_prefix("data: "))
                        .collect::<Vec<_>>()
                        .join("\n");
                }
            }
            let chunk = tokio::time::timeout(Duration::from_secs(5), stream.next())
                .await
                .expect("timed out waiting for SSE event")
                .expect("stream ended")
                .unwrap();
            buffer.push_str(&String::from_utf8_lossy(&chunk));
        }
    }

    #[tokio::test]
    async fn test_plain_get_is_health_check() {
        let state = create_state();
        let sessions = state.sessions.clone();
        let app = create_router(state);

        let response = app.oneshot(get("/mcp", "text/plain")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "OK");
        assert!(sessions.is_empty());
    }

    #[tokio::test]
    async fn test_event_stream_get_opens_one_session() {
        let state = create_state();
        let sessions = state.sessions.clone();
        let app = create_router(state);

        let response = app.oneshot(get("/mcp", "text/event-stream")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/event-stream"));
        assert_eq!(sessions.len(), 1);

        drop(response);
        assert!(sessions.is_empty());
    }

    #[tokio::test]
    async fn test_post_without_valid_session_is_rejected() {
        let state = create_state();
        let app = create_router(state);
        let message = json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"});

        let response = app
            .clone()
            .oneshot(post("/mcp?sessionId=does-not-exist", message.clone()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app.oneshot(post("/mcp", message)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_malformed_body_is_rejected() {
        let state = create_state();
        let sessions = state.sessions.clone();
        let app = create_router(state);
        let (guard, _outbound) = sessions.open();

        let request = Request::builder()
            .method("POST")
            .uri(format!("/mcp?sessionId={}", guard.id()))
            .body(Body::from("{not json"))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_other_routes_are_not_found() {
        let app = create_router(create_state());

        let response = app
            .clone()
            .oneshot(get("/health", "text/plain"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let request = Request::builder()
            .method("PUT")
            .uri("/mcp")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    async fn explode() -> &'static str {
        panic!("handler exploded")
    }

    #[tokio::test]
    async fn test_handler_panic_becomes_500() {
        let app = with_middleware(Router::new().route("/boom", axum::routing::get(explode)));

        let response = app.oneshot(get("/boom", "text/plain")).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/plain"));
        assert_eq!(body_text(response).await, "Internal Server Error");
    }

    #[tokio::test]
    async fn test_message_is_delivered_to_its_own_session_only() {
        let state = create_state();
        let sessions = state.sessions.clone();
        let app = create_router(state);

        let (a, mut outbound_a) = sessions.open();
        let (_b, mut outbound_b) = sessions.open();

        let response = app
            .oneshot(post(
                &format!("/mcp?sessionId={}", a.id()),
                json!({"jsonrpc": "2.0", "id": 42, "method": "ping"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let delivered = tokio::time::timeout(Duration::from_secs(5), outbound_a.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(delivered.id, json!(42));
        assert!(outbound_a.try_recv().is_err());
        assert!(outbound_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_sse_round_trip() {
        let state = create_state();
        let sessions = state.sessions.clone();
        let app = create_router(state);

        let response = app
            .clone()
            .oneshot(get("/mcp", "text/event-stream"))
            .await
            .unwrap();
        let mut events = response.into_body().into_data_stream();

        let endpoint = next_event(&mut events, "endpoint").await;
        assert!(endpoint.starts_with("/mcp?sessionId="));

        let response = app
            .clone()
            .oneshot(post(
                &endpoint,
                json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let message: Value = serde_json::from_str(&next_event(&mut events, "message").await).unwrap();
        assert_eq!(message["id"], 1);
        let names: Vec<&str> = message["result"]["tools"]
            .as_array()
            .unwrap()
            .iter()
            .map(|tool| tool["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["get_keyword_suggestions", "get_search_volume_data"]);

        let response = app
            .oneshot(post(
                &endpoint,
                json!({"jsonrpc": "2.0", "id": 2, "method": "tools/call", "params": {"name": "get_trends", "arguments": {}}}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let message: Value = serde_json::from_str(&next_event(&mut events, "message").await).unwrap();
        assert_eq!(message["id"], 2);
        assert_eq!(message["error"]["message"], "Unknown tool: get_trends");

        drop(events);
        assert!(sessions.is_empty());
    }
}
