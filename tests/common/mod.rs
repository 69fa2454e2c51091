//! Shared utilities for integration testing.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::{
    body::Bytes,
    http::{HeaderMap, Method, StatusCode, Uri},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};

use event_bridge::{EndpointAllocator, EndpointId, RestartPolicy, ServerHandle};

/// An application that reflects every request back as JSON.
///
/// `/teapot` answers 418 with a plain-text body.
pub fn echo_app() -> Router {
    Router::new()
        .route("/teapot", get(teapot).post(teapot))
        .fallback(echo)
}

async fn teapot() -> (StatusCode, &'static str) {
    (StatusCode::IM_A_TEAPOT, "short and stout")
}

async fn echo(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Json<Value> {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_owned);
    let body = serde_json::from_slice::<Value>(&body)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&body).into_owned()));

    Json(json!({
        "method": method.as_str(),
        "path": uri.path(),
        "eventSource": header("x-event-source"),
        "contentType": header("content-type"),
        "contentLength": header("content-length"),
        "requestId": header("x-request-id"),
        "body": body,
    }))
}

/// A handle whose sockets live in `dir`.
pub fn server_in(dir: &Path) -> Arc<ServerHandle> {
    Arc::new(ServerHandle::new(
        echo_app(),
        EndpointAllocator::new(dir, "server", 13),
        RestartPolicy::default(),
    ))
}

/// A handle whose first bind targets an endpoint already held by another
/// listener. The squatter must be kept alive for the conflict to happen.
#[allow(dead_code)]
pub fn server_with_squatter(
    dir: &Path,
    policy: RestartPolicy,
) -> (Arc<ServerHandle>, EndpointId, std::os::unix::net::UnixListener) {
    let allocator = EndpointAllocator::new(dir, "server", 13);
    let taken = EndpointId::from("taken");
    let squatter = std::os::unix::net::UnixListener::bind(allocator.socket_path(&taken)).unwrap();

    let server = ServerHandle::with_endpoint(echo_app(), allocator, policy, taken.clone());
    (Arc::new(server), taken, squatter)
}

/// Counts how often a mapper ran.
#[allow(dead_code)]
#[derive(Clone, Default)]
pub struct CallCounter(Arc<AtomicUsize>);

#[allow(dead_code)]
impl CallCounter {
    pub fn hit(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}
