//! Configuration validation.
//!
//! Serde handles syntax; this module checks value ranges and cross-field
//! constraints. All problems are reported, not just the first.

use std::net::SocketAddr;

use axum::http::HeaderValue;

use crate::config::schema::BridgeConfig;

/// Longest path a Unix socket address can hold (`sun_path` minus the NUL).
pub const MAX_SOCKET_PATH_LEN: usize = 107;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("transport.socket_dir must be absolute, got {0}")]
    RelativeSocketDir(String),

    #[error("transport.socket_prefix must be non-empty and must not contain '/'")]
    InvalidSocketPrefix,

    #[error("transport.suffix_len must be between 6 and 32, got {0}")]
    SuffixLength(usize),

    #[error("socket path would be {0} bytes, limit is {max}", max = MAX_SOCKET_PATH_LEN)]
    SocketPathTooLong(usize),

    #[error("restart.max_bind_attempts must be at least 1")]
    NoBindAttempts,

    #[error("request.default_path must not be empty")]
    EmptyDefaultPath,

    #[error("request.default_event_source is not a valid header value")]
    InvalidEventSource,

    #[error("observability.log_level must be one of {levels:?}, got {0}", levels = LOG_LEVELS)]
    LogLevel(String),

    #[error("observability.metrics_address is not a socket address: {0}")]
    MetricsAddress(String),
}

/// Validate a parsed configuration.
pub fn validate_config(config: &BridgeConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let transport = &config.transport;

    if !transport.socket_dir.is_absolute() {
        errors.push(ValidationError::RelativeSocketDir(
            transport.socket_dir.display().to_string(),
        ));
    }
    if transport.socket_prefix.is_empty() || transport.socket_prefix.contains('/') {
        errors.push(ValidationError::InvalidSocketPrefix);
    }
    if !(6..=32).contains(&transport.suffix_len) {
        errors.push(ValidationError::SuffixLength(transport.suffix_len));
    }

    // "<dir>/<prefix>-<suffix>.sock"
    let path_len = transport.socket_dir.as_os_str().len()
        + 1
        + transport.socket_prefix.len()
        + 1
        + transport.suffix_len
        + ".sock".len();
    if path_len > MAX_SOCKET_PATH_LEN {
        errors.push(ValidationError::SocketPathTooLong(path_len));
    }

    if config.restart.max_bind_attempts == 0 {
        errors.push(ValidationError::NoBindAttempts);
    }

    if config.request.default_path.is_empty() {
        errors.push(ValidationError::EmptyDefaultPath);
    }
    if HeaderValue::from_str(&config.request.default_event_source).is_err() {
        errors.push(ValidationError::InvalidEventSource);
    }

    let level = config.observability.log_level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ValidationError::LogLevel(config.observability.log_level.clone()));
    }
    if config.observability.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::MetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
