//! Unix listener binding.
//!
//! # Responsibilities
//! - Bind a Unix domain socket at a given path
//! - Classify bind failures: a conflict (address in use) is recoverable,
//!   anything else is fatal

use std::path::{Path, PathBuf};

use tokio::net::UnixListener;

/// Error type for bind operations.
#[derive(Debug)]
pub enum ListenerError {
    /// Another listener (or a stale socket file) holds the path.
    Conflict(PathBuf),
    /// Failed to bind for any other reason.
    Bind(PathBuf, std::io::Error),
}

impl std::fmt::Display for ListenerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListenerError::Conflict(path) => write!(f, "Address in use: {}", path.display()),
            ListenerError::Bind(path, e) => write!(f, "Failed to bind {}: {}", path.display(), e),
        }
    }
}

impl std::error::Error for ListenerError {}

/// Bind a listener at `path`.
///
/// Must be called from within a tokio runtime.
pub fn bind(path: &Path) -> Result<UnixListener, ListenerError> {
    match UnixListener::bind(path) {
        Ok(listener) => {
            tracing::debug!(path = %path.display(), "Listener bound");
            Ok(listener)
        }
        Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => {
            Err(ListenerError::Conflict(path.to_path_buf()))
        }
        Err(e) => Err(ListenerError::Bind(path.to_path_buf(), e)),
    }
}
