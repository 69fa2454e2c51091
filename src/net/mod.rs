//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! endpoint.rs   → random id → "<dir>/<prefix>-<id>.sock"
//! listener.rs   → bind the backing server's Unix listener (conflict vs fatal)
//! connection.rs → HTTP/1.1 client connection to that socket, one per invocation
//! ```
//!
//! # Design Decisions
//! - The transport is local and unshared: one socket path per process
//! - Socket paths are regenerated on every conflict restart

pub mod connection;
pub mod endpoint;
pub mod listener;

pub use endpoint::{EndpointAllocator, EndpointId};
pub use listener::ListenerError;
