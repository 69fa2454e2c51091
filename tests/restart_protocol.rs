//! Lazy start, conflict restarts and shutdown of the backing server.

mod common;

use std::time::Duration;

use serde_json::json;

use common::{server_in, server_with_squatter};
use event_bridge::{
    invoke, BridgeError, Event, MappingPipeline, PathMapping, ProxyOptions, Rejection, RequestDefaults,
    RestartPolicy,
};

fn default_pipeline() -> MappingPipeline {
    MappingPipeline::general(PathMapping::Default, RequestDefaults::default())
}

#[tokio::test]
async fn test_listening_server_is_reused() {
    let dir = tempfile::tempdir().unwrap();
    let server = server_in(dir.path());
    assert!(!server.is_listening());

    invoke(&server, Event::new(json!({})), ProxyOptions::default(), &default_pipeline())
        .await
        .unwrap();
    let endpoint = server.endpoint_id();

    invoke(&server, Event::new(json!({})), ProxyOptions::default(), &default_pipeline())
        .await
        .unwrap();

    assert!(server.is_listening());
    assert_eq!(server.binds(), 1);
    assert_eq!(server.restarts(), 0);
    assert_eq!(server.endpoint_id(), endpoint);
    server.shutdown().await;
}

#[tokio::test]
async fn test_conflict_moves_to_fresh_endpoint() {
    let dir = tempfile::tempdir().unwrap();
    let (server, taken, _squatter) = server_with_squatter(dir.path(), RestartPolicy::default());
    let taken_path = dir.path().join(format!("server-{taken}.sock"));

    let body = invoke(&server, Event::new(json!({})), ProxyOptions::default(), &default_pipeline())
        .await
        .unwrap();

    assert!(body.contains("/custom-event"));
    assert_eq!(server.restarts(), 1);
    assert_eq!(server.binds(), 1);
    assert_ne!(server.endpoint_id(), taken);
    assert!(server.socket_path().exists());
    // The foreign socket is left alone.
    assert!(taken_path.exists());
    server.shutdown().await;
}

#[tokio::test]
async fn test_exhausted_restarts_go_to_library_mapper() {
    let dir = tempfile::tempdir().unwrap();
    let policy = RestartPolicy {
        max_bind_attempts: 1,
        shutdown_timeout: Duration::from_secs(1),
    };
    let (server, _taken, _squatter) = server_with_squatter(dir.path(), policy);
    let pipeline = default_pipeline()
        .with_library_error_mapper(|error, _ctx| async move { Ok(json!({ "library": error.to_string() })) });

    let err = invoke(&server, Event::new(json!({})), ProxyOptions::default(), &pipeline)
        .await
        .unwrap_err();

    let mapped = err.mapped_value().unwrap();
    assert!(mapped["library"].as_str().unwrap().contains("1 bind attempts"));
    assert!(!server.is_listening());
}

#[tokio::test]
async fn test_exhausted_restarts_without_mapper() {
    let dir = tempfile::tempdir().unwrap();
    let policy = RestartPolicy {
        max_bind_attempts: 1,
        shutdown_timeout: Duration::from_secs(1),
    };
    let (server, _taken, _squatter) = server_with_squatter(dir.path(), policy);

    let err = invoke(&server, Event::new(json!({})), ProxyOptions::default(), &default_pipeline())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Rejection::Unmapped(BridgeError::BindRetriesExhausted { attempts: 1, .. })
    ));
}

#[tokio::test]
async fn test_fatal_bind_error_is_not_retried() {
    let dir = tempfile::tempdir().unwrap();
    let server = server_in(&dir.path().join("missing"));
    let endpoint = server.endpoint_id();

    let err = invoke(&server, Event::new(json!({})), ProxyOptions::default(), &default_pipeline())
        .await
        .unwrap_err();

    assert!(matches!(err, Rejection::Unmapped(BridgeError::Bind { .. })));
    assert_eq!(server.restarts(), 0);
    assert_eq!(server.binds(), 0);
    assert_eq!(server.endpoint_id(), endpoint);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_invocations_share_one_bind() {
    let dir = tempfile::tempdir().unwrap();
    let server = server_in(dir.path());
    let pipeline = default_pipeline();

    let tasks: Vec<_> = (0..32)
        .map(|i| {
            let server = server.clone();
            let pipeline = pipeline.clone();
            tokio::spawn(async move {
                invoke(&server, Event::new(json!({ "n": i })), ProxyOptions::default(), &pipeline).await
            })
        })
        .collect();

    for task in tasks {
        let body = task.await.unwrap().unwrap();
        assert!(body.contains("/custom-event"));
    }

    assert_eq!(server.binds(), 1);
    assert!(server.is_listening());
    server.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_invocations_share_one_conflict_restart() {
    let dir = tempfile::tempdir().unwrap();
    let (server, taken, _squatter) = server_with_squatter(dir.path(), RestartPolicy::default());
    let pipeline = default_pipeline();

    let tasks: Vec<_> = (0..16)
        .map(|i| {
            let server = server.clone();
            let pipeline = pipeline.clone();
            tokio::spawn(async move {
                invoke(&server, Event::new(json!({ "n": i })), ProxyOptions::default(), &pipeline).await
            })
        })
        .collect();

    for task in tasks {
        let body = task.await.unwrap().unwrap();
        assert!(body.contains("/custom-event"));
    }

    assert_eq!(server.binds(), 1);
    assert_eq!(server.restarts(), 1);
    assert_ne!(server.endpoint_id(), taken);
    assert!(server.is_listening());
    server.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_then_invoke_rebinds() {
    let dir = tempfile::tempdir().unwrap();
    let server = server_in(dir.path());

    invoke(&server, Event::new(json!({})), ProxyOptions::default(), &default_pipeline())
        .await
        .unwrap();
    let path = server.socket_path();

    server.shutdown().await;
    assert!(!server.is_listening());
    assert!(!path.exists());

    invoke(&server, Event::new(json!({})), ProxyOptions::default(), &default_pipeline())
        .await
        .unwrap();

    assert!(server.is_listening());
    assert_eq!(server.binds(), 2);
    assert_eq!(server.socket_path(), path);
    server.shutdown().await;
}
