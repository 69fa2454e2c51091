//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Backing server (server.rs):
//!     first invocation → ensure_ready → bind → serve task → Listening
//!     AddrInUse        → new endpoint id → bind again (bounded)
//!     shutdown()       → stop signal → drain → socket file removed
//!
//! Stop signal (shutdown.rs):
//!     owner triggers → serve task's graceful shutdown future resolves
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → host stops reading events, shuts the server down
//! ```

pub mod server;
pub mod shutdown;
pub mod signals;

pub use server::{RestartPolicy, ServerHandle, ServerState};
pub use shutdown::{Shutdown, ShutdownSignal};
