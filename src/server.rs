use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use teloxide::types::Update;
use tracing::{error, warn};

/// Consumer of updates pushed by the chat platform.
#[async_trait]
pub trait UpdateHandler: Send + Sync {
    async fn handle_update(&self, update: Update) -> Result<()>;
}

#[derive(Clone)]
struct ServerState {
    secret: Arc<str>,
    handler: Arc<dyn UpdateHandler>,
}

/// `POST /webhook/{token}` for updates and `GET /` for liveness.
pub fn router(secret: &str, handler: Arc<dyn UpdateHandler>) -> Router {
    let state = ServerState {
        secret: Arc::from(secret),
        handler,
    };

    Router::new()
        .route("/", get(health))
        .route("/webhook/{token}", post(webhook))
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({"status": "ok", "message": "Bot is running"}))
}

async fn webhook(
    State(state): State<ServerState>,
    Path(token): Path<String>,
    body: Bytes,
) -> StatusCode {
    if token != *state.secret {
        warn!("Rejected webhook call with a wrong token");
        return StatusCode::FORBIDDEN;
    }

    let update: Update = match serde_json::from_slice(&body) {
        Ok(update) => update,
        Err(e) => {
            warn!("Malformed webhook payload: {}", e);
            return StatusCode::BAD_REQUEST;
        }
    };

    // Errors are ours to log; Telegram would only redeliver the same update.
    if let Err(e) = state.handler.handle_update(update).await {
        error!("Error handling update: {:#}", e);
    }
    StatusCode::OK
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::ServiceExt;

    const SECRET: &str = "123456:ABC-secret";

    const UPDATE: &str = r#"{
        "update_id": 42,
        "message": {
            "message_id": 7,
            "date": 1441645532,
            "chat": {"id": 555, "type": "private", "first_name": "Jane"},
            "from": {"id": 555, "is_bot": false, "first_name": "Jane"},
            "text": "hello"
        }
    }"#;

    #[derive(Default)]
    struct CountingHandler {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl UpdateHandler for CountingHandler {
        async fn handle_update(&self, _update: Update) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn post_to(path: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(path)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    #[tokio::test]
    async fn test_wrong_token_is_forbidden() {
        let handler = Arc::new(CountingHandler::default());
        let app = router(SECRET, handler.clone());

        let response = app
            .oneshot(post_to("/webhook/WRONGTOKEN", UPDATE))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(handler.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_correct_token_dispatches_once() {
        let handler = Arc::new(CountingHandler::default());
        let app = router(SECRET, handler.clone());

        let response = app
            .oneshot(post_to(&format!("/webhook/{SECRET}"), UPDATE))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(body.is_empty());
        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_malformed_payload_is_rejected() {
        let handler = Arc::new(CountingHandler::default());
        let app = router(SECRET, handler.clone());

        let response = app
            .oneshot(post_to(&format!("/webhook/{SECRET}"), "not json"))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(handler.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = router(SECRET, Arc::new(CountingHandler::default()));

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let parsed: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed["status"], "ok");
        assert_eq!(parsed["message"], "Bot is running");
    }
}
