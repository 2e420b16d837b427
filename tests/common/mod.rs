//! Shared utilities for integration tests.

use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

use folio_guard::config::GuardConfig;
use folio_guard::security::MemoryStore;
use folio_guard::HttpServer;

pub const ADMIN_KEY: &str = "test-admin-key";

/// A server over a fresh in-memory store, plus a handle on that store.
#[allow(dead_code)]
pub fn test_server(config: GuardConfig) -> (HttpServer, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new(None));
    let server = HttpServer::new(config, store.clone());
    (server, store)
}

/// Default config with the admin API enabled.
#[allow(dead_code)]
pub fn admin_config() -> GuardConfig {
    let mut config = GuardConfig::default();
    config.admin.enabled = true;
    config.admin.api_key = ADMIN_KEY.to_string();
    config
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    #[allow(dead_code)]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// Drive one request through the router without a socket.
pub async fn send(router: &Router, request: Request<Body>) -> TestResponse {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    TestResponse { status, headers, body }
}

/// JSON POST with the given extra headers.
#[allow(dead_code)]
pub fn post_json(uri: &str, body: Value, headers: &[(&str, &str)]) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    for (k, v) in headers {
        builder = builder.header(*k, *v);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

/// Bodiless request with the given method and headers.
#[allow(dead_code)]
pub fn empty(method: &str, uri: &str, headers: &[(&str, &str)]) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    for (k, v) in headers {
        builder = builder.header(*k, *v);
    }
    builder.body(Body::empty()).unwrap()
}
