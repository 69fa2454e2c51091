//! Backing server lifecycle.
//!
//! [`ServerHandle`] owns the one HTTP server a process keeps alive across
//! invocations. The server is bound lazily by the first invocation that needs
//! it; later invocations see `listening == true` and skip straight to sending
//! their request.
//!
//! # State
//! ```text
//!              ensure_ready                      serve task ends / shutdown()
//!   Stopped ────────────────▶ bind ──ok──▶ Listening ─────────────────────────▶ Stopped
//!                              │
//!                              ├─ AddrInUse ─▶ warn, new endpoint id, bind again (bounded)
//!                              └─ other ─────▶ BridgeError::Bind
//! ```
//!
//! Writers of the shared state are the bind path (holding the bind lock) and
//! the serve task's stop observer, which only touches the generation it
//! started. Readers take cheap snapshots from a watch channel.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::net::UnixListener;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::{BridgeConfig, RestartConfig};
use crate::error::BridgeError;
use crate::lifecycle::shutdown::Shutdown;
use crate::net::listener::{self, ListenerError};
use crate::net::{EndpointAllocator, EndpointId};
use crate::observability::metrics;

/// Bounds on the bind-conflict restart loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartPolicy {
    /// Total bind attempts per `ensure_ready`, including the first. At least 1.
    pub max_bind_attempts: u32,
    /// How long a stopping server may drain before its task is aborted.
    pub shutdown_timeout: Duration,
}

impl Default for RestartPolicy {
    fn default() -> Self {
        Self::from(&RestartConfig::default())
    }
}

impl From<&RestartConfig> for RestartPolicy {
    fn from(config: &RestartConfig) -> Self {
        Self {
            max_bind_attempts: config.max_bind_attempts.max(1),
            shutdown_timeout: config.shutdown_timeout(),
        }
    }
}

/// Snapshot of the shared server state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerState {
    pub endpoint_id: EndpointId,
    pub listening: bool,
    generation: u64,
}

/// A serve task and the means to stop it.
struct RunningServer {
    shutdown: Shutdown,
    task: JoinHandle<()>,
    socket_path: PathBuf,
}

/// The process-wide backing server.
///
/// Create one per process and share it by `Arc` with every invocation.
pub struct ServerHandle {
    app: Router,
    allocator: EndpointAllocator,
    policy: RestartPolicy,
    state: Arc<watch::Sender<ServerState>>,
    /// Bind lock. Held for the whole bind/restart sequence.
    running: Mutex<Option<RunningServer>>,
    binds: AtomicU64,
    restarts: AtomicU64,
}

impl ServerHandle {
    /// Create a handle with a freshly allocated endpoint. Nothing is bound yet.
    pub fn new(app: Router, allocator: EndpointAllocator, policy: RestartPolicy) -> Self {
        let endpoint_id = allocator.allocate();
        Self::with_endpoint(app, allocator, policy, endpoint_id)
    }

    /// Create a handle whose first bind uses `endpoint_id`.
    pub fn with_endpoint(
        app: Router,
        allocator: EndpointAllocator,
        policy: RestartPolicy,
        endpoint_id: EndpointId,
    ) -> Self {
        let (state, _) = watch::channel(ServerState {
            endpoint_id,
            listening: false,
            generation: 0,
        });
        Self {
            app,
            allocator,
            policy: RestartPolicy {
                max_bind_attempts: policy.max_bind_attempts.max(1),
                ..policy
            },
            state: Arc::new(state),
            running: Mutex::new(None),
            binds: AtomicU64::new(0),
            restarts: AtomicU64::new(0),
        }
    }

    pub fn from_config(app: Router, config: &BridgeConfig) -> Self {
        Self::new(
            app,
            EndpointAllocator::from_config(&config.transport),
            RestartPolicy::from(&config.restart),
        )
    }

    pub fn state(&self) -> ServerState {
        self.state.borrow().clone()
    }

    pub fn is_listening(&self) -> bool {
        self.state.borrow().listening
    }

    pub fn endpoint_id(&self) -> EndpointId {
        self.state.borrow().endpoint_id.clone()
    }

    /// Socket path derived from the current endpoint id.
    pub fn socket_path(&self) -> PathBuf {
        self.allocator.socket_path(&self.state.borrow().endpoint_id)
    }

    /// Successful bind+listen sequences so far.
    pub fn binds(&self) -> u64 {
        self.binds.load(Ordering::Relaxed)
    }

    /// Conflict-driven endpoint reallocations so far.
    pub fn restarts(&self) -> u64 {
        self.restarts.load(Ordering::Relaxed)
    }

    /// Make sure the backing server is listening.
    ///
    /// Returns immediately when it already is. Otherwise binds the current
    /// endpoint, transparently moving to a new endpoint on address-in-use
    /// conflicts, up to the policy's attempt budget.
    pub async fn ensure_ready(&self) -> Result<(), BridgeError> {
        if self.is_listening() {
            return Ok(());
        }

        let mut running = self.running.lock().await;
        if self.is_listening() {
            // Another invocation finished binding while we waited for the lock.
            return Ok(());
        }

        // A server that stopped on its own leaves its handle behind.
        if let Some(stale) = running.take() {
            self.stop_server(stale).await;
        }

        let mut attempt = 1;
        loop {
            let endpoint_id = self.endpoint_id();
            let path = self.allocator.socket_path(&endpoint_id);

            match listener::bind(&path) {
                Ok(listener) => {
                    *running = Some(self.start_serving(listener, endpoint_id, path));
                    return Ok(());
                }
                Err(ListenerError::Conflict(path)) => {
                    if attempt >= self.policy.max_bind_attempts {
                        error!(
                            path = %path.display(),
                            attempts = attempt,
                            "Socket still in use after every allowed bind attempt"
                        );
                        return Err(BridgeError::BindRetriesExhausted {
                            attempts: attempt,
                            path,
                        });
                    }

                    warn!(
                        path = %path.display(),
                        attempt,
                        "Attempting to listen on socket {} but it is already in use. \
                         This is likely the result of a previous invocation error or timeout. \
                         Check the logs of the invocation(s) immediately prior to this one for the root cause, \
                         and consider increasing the timeout and/or CPU/memory allocation if it was purely a timeout. \
                         The server will restart on a new socket and continue with this request.",
                        path.display()
                    );
                    self.reallocate_endpoint();
                    attempt += 1;
                }
                Err(ListenerError::Bind(path, source)) => {
                    error!(path = %path.display(), error = %source, "Backing server failed to bind");
                    return Err(BridgeError::Bind { path, source });
                }
            }
        }
    }

    /// Stop the backing server, if any, and mark the handle not listening.
    ///
    /// The next `ensure_ready` binds again on the current endpoint.
    pub async fn shutdown(&self) {
        let mut running = self.running.lock().await;
        if let Some(server) = running.take() {
            self.stop_server(server).await;
        }

        let was_listening = self.state.send_if_modified(|state| {
            let was_listening = state.listening;
            state.listening = false;
            was_listening
        });
        if was_listening {
            metrics::set_listening(false);
        }
    }

    fn reallocate_endpoint(&self) {
        let fresh = self.allocator.allocate();
        debug!(endpoint_id = %fresh, "Allocated new endpoint");
        self.state.send_modify(|state| {
            state.endpoint_id = fresh;
            state.listening = false;
            state.generation += 1;
        });
        self.restarts.fetch_add(1, Ordering::Relaxed);
        metrics::record_restart();
    }

    /// On-ready: flip to listening and spawn the serve task, whose exit is the
    /// on-stopped observer.
    fn start_serving(
        &self,
        listener: UnixListener,
        endpoint_id: EndpointId,
        socket_path: PathBuf,
    ) -> RunningServer {
        let mut generation = 0;
        self.state.send_modify(|state| {
            state.generation += 1;
            state.listening = true;
            generation = state.generation;
        });
        self.binds.fetch_add(1, Ordering::Relaxed);
        metrics::record_bind();
        metrics::set_listening(true);

        info!(
            endpoint_id = %endpoint_id,
            path = %socket_path.display(),
            "Backing server listening"
        );

        let shutdown = Shutdown::new();
        let signal = shutdown.subscribe();
        let app = self.app.clone();
        let state = Arc::clone(&self.state);
        let path = socket_path.clone();

        let task = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(signal.recv())
                .await
            {
                error!(path = %path.display(), error = %e, "Backing server error");
            }

            let stopped = state.send_if_modified(|state| {
                if state.generation == generation && state.listening {
                    state.listening = false;
                    true
                } else {
                    false
                }
            });
            if stopped {
                metrics::set_listening(false);
            }

            remove_socket_file(&path).await;
            info!(path = %path.display(), "Backing server stopped");
        });

        RunningServer {
            shutdown,
            task,
            socket_path,
        }
    }

    async fn stop_server(&self, server: RunningServer) {
        let RunningServer {
            shutdown,
            mut task,
            socket_path,
        } = server;
        shutdown.trigger();

        match tokio::time::timeout(self.policy.shutdown_timeout, &mut task).await {
            Ok(Ok(())) => debug!(path = %socket_path.display(), "Previous server task finished"),
            Ok(Err(e)) => warn!(path = %socket_path.display(), error = %e, "Previous server task panicked"),
            Err(_) => {
                warn!(path = %socket_path.display(), "Server stop timed out; aborting task");
                task.abort();
                remove_socket_file(&socket_path).await;
            }
        }
    }
}

impl std::fmt::Debug for ServerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("ServerHandle")
            .field("endpoint_id", &state.endpoint_id)
            .field("listening", &state.listening)
            .field("binds", &self.binds())
            .field("restarts", &self.restarts())
            .finish()
    }
}

async fn remove_socket_file(path: &std::path::Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "Failed to remove socket file");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::get;

    fn app() -> Router {
        Router::new().route("/", get(|| async { "ok" }))
    }

    fn handle_in(dir: &std::path::Path) -> ServerHandle {
        ServerHandle::new(app(), EndpointAllocator::new(dir, "server", 13), RestartPolicy::default())
    }

    #[tokio::test]
    async fn binds_lazily_and_only_once() {
        let dir = tempfile::tempdir().unwrap();
        let server = handle_in(dir.path());
        assert!(!server.is_listening());
        assert_eq!(server.binds(), 0);

        server.ensure_ready().await.unwrap();
        let endpoint = server.endpoint_id();
        assert!(server.is_listening());
        assert!(server.socket_path().exists());

        server.ensure_ready().await.unwrap();
        assert_eq!(server.binds(), 1);
        assert_eq!(server.endpoint_id(), endpoint);
        assert_eq!(server.restarts(), 0);

        server.shutdown().await;
    }

    #[tokio::test]
    async fn conflict_moves_to_a_new_endpoint() {
        let dir = tempfile::tempdir().unwrap();
        let allocator = EndpointAllocator::new(dir.path(), "server", 13);
        let taken = EndpointId::from("taken");
        let _squatter = std::os::unix::net::UnixListener::bind(allocator.socket_path(&taken)).unwrap();

        let server = ServerHandle::with_endpoint(app(), allocator, RestartPolicy::default(), taken.clone());
        server.ensure_ready().await.unwrap();

        assert!(server.is_listening());
        assert_ne!(server.endpoint_id(), taken);
        assert_eq!(server.restarts(), 1);
        assert_eq!(server.binds(), 1);

        server.shutdown().await;
    }

    #[tokio::test]
    async fn other_bind_errors_are_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let server = handle_in(&dir.path().join("does-not-exist"));
        let endpoint = server.endpoint_id();

        let err = server.ensure_ready().await.unwrap_err();
        assert!(matches!(err, BridgeError::Bind { .. }));
        assert!(!server.is_listening());
        assert_eq!(server.endpoint_id(), endpoint);
        assert_eq!(server.restarts(), 0);
    }

    #[tokio::test]
    async fn exhausted_budget_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let allocator = EndpointAllocator::new(dir.path(), "server", 13);
        let taken = EndpointId::from("taken");
        let _squatter = std::os::unix::net::UnixListener::bind(allocator.socket_path(&taken)).unwrap();

        let policy = RestartPolicy {
            max_bind_attempts: 1,
            ..RestartPolicy::default()
        };
        let server = ServerHandle::with_endpoint(app(), allocator, policy, taken);

        let err = server.ensure_ready().await.unwrap_err();
        assert!(matches!(err, BridgeError::BindRetriesExhausted { attempts: 1, .. }));
        assert!(!server.is_listening());
    }

    #[tokio::test]
    async fn shutdown_releases_the_socket() {
        let dir = tempfile::tempdir().unwrap();
        let server = handle_in(dir.path());
        server.ensure_ready().await.unwrap();
        let path = server.socket_path();

        server.shutdown().await;
        assert!(!server.is_listening());
        assert!(!path.exists());

        server.ensure_ready().await.unwrap();
        assert_eq!(server.binds(), 2);
        assert_eq!(server.socket_path(), path);

        server.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_callers_share_one_bind() {
        let dir = tempfile::tempdir().unwrap();
        let server = Arc::new(handle_in(dir.path()));

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let server = Arc::clone(&server);
                tokio::spawn(async move { server.ensure_ready().await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(server.binds(), 1);
        assert!(server.is_listening());

        server.shutdown().await;
    }
}
