//! event-bridge host
//!
//! Reads newline-delimited JSON events from stdin, drives the built-in echo
//! application through the bridge, and prints one JSON outcome per event.
//!
//! ```text
//!   stdin (events) ──▶ invoke ──▶ ensure_ready ──▶ /tmp/server-<id>.sock ──▶ echo app
//!   stdout (outcomes) ◀── response / mapped error ◀──────────────────────────────┘
//! ```

use std::future::Future;
use std::io::Write;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    body::Bytes,
    http::{HeaderMap, Method, Uri},
    Json, Router,
};
use clap::Parser;
use futures_util::{Stream, StreamExt};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, BufReader};
use tower_http::trace::TraceLayer;

use event_bridge::config::{load_config, BridgeConfig};
use event_bridge::lifecycle::signals;
use event_bridge::observability::{logging, metrics};
use event_bridge::{
    invoke, Event, MappingPipeline, PathMapping, ProxyOptions, Rejection, RequestDefaults,
    ServerHandle,
};

#[derive(Parser)]
#[command(name = "event-bridge")]
#[command(about = "Drive an HTTP application with invocation events over a Unix socket", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long, env = "EVENT_BRIDGE_CONFIG")]
    config: Option<PathBuf>,

    /// Request path for every event (defaults to the configured default path).
    #[arg(short, long)]
    path: Option<String>,

    /// Events processed at once. Output order always follows input order.
    #[arg(long, default_value_t = 1)]
    concurrency: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => BridgeConfig::default(),
    };

    logging::init(&config.observability)?;
    tracing::info!("event-bridge v{} starting", env!("CARGO_PKG_VERSION"));

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let server = Arc::new(ServerHandle::from_config(echo_app(), &config));
    tracing::info!(
        socket_dir = %config.transport.socket_dir.display(),
        max_bind_attempts = config.restart.max_bind_attempts,
        "Bridge configured"
    );

    let paths = cli.path.map(PathMapping::Fixed).unwrap_or_default();
    let pipeline: MappingPipeline = MappingPipeline::general(paths, RequestDefaults::from(&config.request))
        .with_library_error_mapper(|error, ctx| async move {
            Ok(json!({
                "statusCode": 500,
                "error": error.to_string(),
                "invocationId": ctx.invocation_id,
            }))
        })
        .with_runtime_error_mapper(|error, ctx| async move {
            Ok(json!({
                "statusCode": 502,
                "error": error.to_string(),
                "invocationId": ctx.invocation_id,
            }))
        });

    let stop = async {
        signals::wait_for_termination().await;
        tracing::info!("Stopping before end of input; draining in-flight invocations");
    };
    run_events(
        &server,
        &pipeline,
        stdin_lines(),
        stop,
        cli.concurrency.max(1),
        &mut std::io::stdout(),
    )
    .await?;

    server.shutdown().await;
    tracing::info!("Shutdown complete");
    Ok(())
}

fn stdin_lines() -> impl Stream<Item = std::io::Result<String>> {
    let lines = BufReader::new(tokio::io::stdin()).lines();
    futures_util::stream::unfold(lines, |mut lines| async move {
        match lines.next_line().await {
            Ok(Some(line)) => Some((Ok(line), lines)),
            Ok(None) => None,
            Err(e) => Some((Err(e), lines)),
        }
    })
}

/// Run every input line through the bridge, writing outcomes in input order.
///
/// Once `stop` completes no further lines are read, but invocations already
/// in flight still finish and are written.
async fn run_events<S, F, W>(
    server: &Arc<ServerHandle>,
    pipeline: &MappingPipeline,
    lines: S,
    stop: F,
    concurrency: usize,
    out: &mut W,
) -> std::io::Result<()>
where
    S: Stream<Item = std::io::Result<String>>,
    F: Future<Output = ()>,
    W: Write,
{
    let outcomes = lines
        .take_until(stop)
        .filter(|line| std::future::ready(!matches!(line, Ok(l) if l.trim().is_empty())))
        .map(|line| async move {
            match line {
                Ok(line) => Ok(handle_line(server, pipeline, &line).await),
                Err(e) => Err(e),
            }
        })
        .buffered(concurrency);
    let mut outcomes = std::pin::pin!(outcomes);

    while let Some(outcome) = outcomes.next().await {
        writeln!(out, "{}", outcome?)?;
    }
    out.flush()
}

async fn handle_line(server: &Arc<ServerHandle>, pipeline: &MappingPipeline, line: &str) -> Value {
    let event: Event = match serde_json::from_str(line) {
        Ok(event) => event,
        Err(e) => return json!({ "error": format!("invalid event: {e}") }),
    };

    match invoke(server, event, ProxyOptions::default(), pipeline).await {
        Ok(body) => json!({ "result": body }),
        Err(Rejection::Mapped(value)) => json!({ "error": value }),
        Err(other) => json!({ "error": other.to_string() }),
    }
}

/// Stand-in application: reflects what it received.
fn echo_app() -> Router {
    Router::new()
        .fallback(echo)
        .layer(TraceLayer::new_for_http())
}

async fn echo(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Json<Value> {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_owned);
    let body = serde_json::from_slice::<Value>(&body)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&body).into_owned()));

    Json(json!({
        "method": method.as_str(),
        "path": uri.path(),
        "eventSource": header("x-event-source"),
        "requestId": header("x-request-id"),
        "body": body,
    }))
}
