//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the bridge.
//! All types derive Serde traits for deserialization from config files.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the event bridge.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct BridgeConfig {
    /// Where and how socket paths are allocated.
    pub transport: TransportConfig,

    /// Bind-conflict restart policy.
    pub restart: RestartConfig,

    /// Defaults used by the built-in event-to-request mapper.
    pub request: RequestConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Transport endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Directory holding the Unix sockets.
    pub socket_dir: PathBuf,

    /// File name prefix, e.g. `server` for `server-<suffix>.sock`.
    pub socket_prefix: String,

    /// Length of the random suffix.
    pub suffix_len: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            socket_dir: PathBuf::from("/tmp"),
            socket_prefix: "server".to_string(),
            suffix_len: 13,
        }
    }
}

/// Restart policy for address-in-use conflicts.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RestartConfig {
    /// Total bind attempts per `ensure_ready`, including the first.
    pub max_bind_attempts: u32,

    /// How long a stopping listener may drain before it is aborted.
    pub shutdown_timeout_ms: u64,
}

impl RestartConfig {
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

impl Default for RestartConfig {
    fn default() -> Self {
        Self {
            max_bind_attempts: 3,
            shutdown_timeout_ms: 5_000,
        }
    }
}

/// Defaults for the built-in request mapper.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RequestConfig {
    /// Path used when no path mapping yields one.
    pub default_path: String,

    /// `x-event-source` value for events without an `eventSource` tag.
    pub default_event_source: String,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            default_path: "/custom-event".to_string(),
            default_event_source: "aws:custom-event".to_string(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Human-readable or JSON log lines.
    pub log_format: LogFormat,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
