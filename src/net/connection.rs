//! Outbound HTTP/1.1 connections over the Unix socket.
//!
//! # Responsibilities
//! - Connect to the backing server's socket
//! - Perform the HTTP/1.1 handshake and drive the connection in a task
//! - Send exactly one request per connection
//!
//! One connection per invocation keeps invocations independent: a broken
//! connection never leaks into the next request.

use std::path::Path;

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use tokio::net::UnixStream;

use crate::error::TransportError;

/// Send `request` to the server listening at `socket_path`.
pub async fn send(
    socket_path: &Path,
    request: Request<Full<Bytes>>,
) -> Result<Response<Incoming>, TransportError> {
    let stream = UnixStream::connect(socket_path)
        .await
        .map_err(|source| TransportError::Connect {
            path: socket_path.to_path_buf(),
            source,
        })?;

    let (mut sender, connection) = hyper::client::conn::http1::handshake(TokioIo::new(stream))
        .await
        .map_err(TransportError::Handshake)?;

    let path = socket_path.to_path_buf();
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            tracing::debug!(path = %path.display(), error = %e, "Connection closed with error");
        }
    });

    tracing::trace!(
        method = %request.method(),
        uri = %request.uri(),
        "Dispatching request"
    );

    sender.send_request(request).await.map_err(TransportError::Send)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connect_failure_is_reported_with_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nobody-home.sock");
        let request = Request::builder()
            .uri("/")
            .header("host", "localhost")
            .body(Full::new(Bytes::new()))
            .unwrap();

        let err = send(&path, request).await.unwrap_err();
        match err {
            TransportError::Connect { path: p, .. } => assert_eq!(p, path),
            other => panic!("unexpected error: {other}"),
        }
    }
}
