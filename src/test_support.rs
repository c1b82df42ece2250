use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::Value as JsonValue;
use std::sync::Mutex;
use tower::ServiceExt;

use crate::memory::MemoryStore;
use crate::routes;
use crate::state::AppState;
use crate::store::ItemStore;

/// Serializes tests that touch process-wide environment variables
pub static ENV_LOCK: Mutex<()> = Mutex::new(());

/// Full router over a fresh in-memory store
pub fn memory_app() -> Router {
    routes::router(AppState {
        store: ItemStore::Memory(MemoryStore::new()),
    })
}

/// Full router over a store that fails every call
pub fn unavailable_app() -> Router {
    routes::router(AppState {
        store: ItemStore::Unavailable,
    })
}

/// Send one request and decode the JSON response body
pub async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    body: Option<JsonValue>,
) -> (StatusCode, JsonValue) {
    let mut request = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            request = request.header("content-type", "application/json");
            Body::from(serde_json::to_string(&json).unwrap())
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(request.body(body).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        JsonValue::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(JsonValue::Null)
    };

    (status, json)
}
