#![allow(dead_code)]

use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;
use uuid::Uuid;

use custody_api::config::{LedgerBackend, ServerConfig};
use custody_api::middleware::acting_user::ACTING_USER_HEADER;
use custody_api::router::build_app_router;
use custody_api::state::AppState;
use custody_core::memory::MemoryStore;

/// Build a test `ServerConfig` on the in-memory backend.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        default_language: "en".to_string(),
        ledger_backend: LedgerBackend::Memory,
        database_url: None,
    }
}

/// Directory entries seeded into every test app.
pub struct Seed {
    pub laptop: Uuid,
    pub monitor: Uuid,
    pub warehouse_a: Uuid,
    pub warehouse_b: Uuid,
    pub jane: Uuid,
    pub clerk: Uuid,
}

/// Build the production router over a freshly seeded in-memory store.
pub async fn build_test_app() -> (Router, Seed) {
    let store = Arc::new(MemoryStore::new());
    let seed = Seed {
        laptop: store.add_asset("LAPTOP-001", Some("SN-0001")).await,
        monitor: store.add_asset("MONITOR-007", None).await,
        warehouse_a: store.add_location("Warehouse A").await,
        warehouse_b: store.add_location("Warehouse B").await,
        jane: store.add_user("Jane Doe").await,
        clerk: store.add_user("Clerk").await,
    };

    let app = build_app_router(AppState::memory(test_config(), store));
    (app, seed)
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

async fn send(
    app: Router,
    method: Method,
    uri: &str,
    user: Option<Uuid>,
    body: Option<serde_json::Value>,
) -> Response<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header(ACTING_USER_HEADER, user.to_string());
    }
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    app.oneshot(builder.body(body).unwrap()).await.unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::GET, uri, None, None).await
}

pub async fn post_json(
    app: Router,
    uri: &str,
    user: Option<Uuid>,
    body: serde_json::Value,
) -> Response<Body> {
    send(app, Method::POST, uri, user, Some(body)).await
}

pub async fn put_json(
    app: Router,
    uri: &str,
    user: Option<Uuid>,
    body: serde_json::Value,
) -> Response<Body> {
    send(app, Method::PUT, uri, user, Some(body)).await
}

pub async fn delete(app: Router, uri: &str, user: Option<Uuid>) -> Response<Body> {
    send(app, Method::DELETE, uri, user, None).await
}

/// Collect a response body into raw bytes.
pub async fn body_bytes(response: Response<Body>) -> Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

/// Collect a response body into JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}
