//! HTTP API module - health probe, SSE stream and synchronous RPC

pub mod limits;
mod sse;

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::rpc::RpcHandler;
pub use limits::{CallerId, LimitError, RateLimiter, CLIENT_ID_HEADER};
pub use sse::SessionManager;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub handler: RpcHandler,
    pub limiter: Arc<RateLimiter>,
    pub sessions: Arc<SessionManager>,
}

/// Build the API router
pub fn router(handler: RpcHandler, limiter: Arc<RateLimiter>) -> Router {
    let state = AppState {
        handler,
        limiter,
        sessions: Arc::new(SessionManager::new()),
    };

    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/rpc", post(rpc))
        .route("/sse", get(sse::sse_handler))
        .route("/messages", post(sse::message_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// Root endpoint
async fn root() -> impl IntoResponse {
    Json(RootResponse {
        name: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
struct RootResponse {
    name: &'static str,
    version: &'static str,
}

/// Health check endpoint
async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, Json(HealthResponse { status: "healthy" }))
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

/// Synchronous JSON-RPC call; notifications get 204
async fn rpc(State(state): State<AppState>, caller: CallerId, body: String) -> Response {
    if let Err(e) = state.limiter.check(&caller) {
        return e.into_response();
    }

    match state.handler.handle_blocking(body).await {
        Some(response) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/json")],
            response.to_line(),
        )
            .into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::service::DiceService;

    fn app(min_interval: Duration) -> Router {
        let handler = RpcHandler::new(Arc::new(DiceService::new(Some(99))));
        let limiter = Arc::new(RateLimiter::new(min_interval, 10, Duration::from_secs(60)));
        router(handler, limiter)
    }

    fn post_rpc(caller: &str, body: Value) -> Request<Body> {
        Request::post("/rpc")
            .header(CLIENT_ID_HEADER, caller)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(resp: Response) -> Value {
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let resp = app(Duration::ZERO)
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(json_body(resp).await["status"], "healthy");
    }

    #[tokio::test]
    async fn test_rpc_roll() {
        let body = json!({
            "jsonrpc": "2.0", "id": "abc", "method": "tools/call",
            "params": { "name": "roll_dice", "arguments": { "dice_count": 2, "dice_sides": 6, "modifier": -1 } }
        });
        let resp = app(Duration::ZERO).oneshot(post_rpc("t", body)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let value = json_body(resp).await;
        assert_eq!(value["id"], "abc");
        assert_eq!(value["result"]["isError"], false);
        assert_eq!(
            value["result"]["structuredContent"]["result"]["notation"],
            "2d6-1"
        );
    }

    #[tokio::test]
    async fn test_notification_is_no_content() {
        let body = json!({ "jsonrpc": "2.0", "method": "notifications/initialized" });
        let resp = app(Duration::ZERO).oneshot(post_rpc("t", body)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_spacing_enforced_per_caller() {
        let app = app(Duration::from_secs(60));
        let ping = json!({ "jsonrpc": "2.0", "id": 1, "method": "ping" });

        let resp = app.clone().oneshot(post_rpc("same", ping.clone())).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = app.oneshot(post_rpc("same", ping)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn test_message_for_unknown_session() {
        let req = Request::post("/messages?session_id=missing")
            .body(Body::from(r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#))
            .unwrap();
        let resp = app(Duration::ZERO).oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
