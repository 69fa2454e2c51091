//! Error types shared across the bridge.
//!
//! # Taxonomy
//! ```text
//! bind conflict (AddrInUse)  → absorbed by the restart loop
//! bind failure (other)       → BridgeError::Bind          → library-error path
//! retry budget exhausted     → BridgeError::BindRetriesExhausted → library-error path
//! request build failure      → Serialize / BuildRequest   → library-error path
//! transport failure          → BridgeError::Transport     → runtime-error path
//! response mapper failure    → ResponseMapping            → library-error path
//! ```

use std::path::PathBuf;

/// Boxed error produced by caller-supplied mapper functions.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failure inside the bridge itself, before any error mapper runs.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// Binding the backing server failed for a reason other than a conflict.
    #[error("failed to bind {}: {source}", .path.display())]
    Bind {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Every allowed bind attempt hit an address-in-use conflict.
    #[error("socket still in use after {attempts} bind attempts (last: {})", .path.display())]
    BindRetriesExhausted { attempts: u32, path: PathBuf },

    /// The event could not be serialized into a request body.
    #[error("failed to serialize event: {0}")]
    Serialize(#[from] serde_json::Error),

    /// A request mapper or body getter failed, or produced an invalid request.
    #[error("failed to build request: {0}")]
    BuildRequest(#[source] BoxError),

    /// The outbound request failed at the transport level.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The custom response mapper failed.
    #[error("response mapping failed: {0}")]
    ResponseMapping(#[source] BoxError),
}

impl BridgeError {
    /// True for failures that belong on the runtime-error path.
    pub fn is_transport(&self) -> bool {
        matches!(self, BridgeError::Transport(_))
    }
}

/// Transport-level failure talking to the backing server.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("failed to connect to {}: {source}", .path.display())]
    Connect {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP handshake failed: {0}")]
    Handshake(#[source] hyper::Error),

    #[error("request failed: {0}")]
    Send(#[source] hyper::Error),

    #[error("failed to read response body: {0}")]
    Body(#[source] hyper::Error),
}

/// The rejection side of an invocation outcome.
#[derive(Debug, thiserror::Error)]
pub enum Rejection {
    /// No error mapper was configured; the original error is returned unchanged.
    #[error(transparent)]
    Unmapped(#[from] BridgeError),

    /// An error mapper translated the failure into a runtime value.
    #[error("invocation rejected: {0}")]
    Mapped(serde_json::Value),

    /// The error mapper itself failed. Not re-mapped.
    #[error("error mapper failed: {0}")]
    MapperFailed(#[source] BoxError),
}

impl Rejection {
    /// The mapped value, if an error mapper produced one.
    pub fn mapped_value(&self) -> Option<&serde_json::Value> {
        match self {
            Rejection::Mapped(value) => Some(value),
            _ => None,
        }
    }
}
