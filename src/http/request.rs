//! Event-to-request mapping.
//!
//! # Responsibilities
//! - Describe the outbound request (`RequestDescriptor`)
//! - Select and normalize the request path
//! - Build the default headers and JSON body from the event
//!
//! # Default Policy
//! - `POST` to the mapped path, or `/custom-event` when nothing maps
//! - `x-event-source` from a truthy scalar `eventSource`, else `aws:custom-event`
//! - `content-type: application/json`, `content-length` from the body

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Method, Request};
use bytes::Bytes;
use http_body_util::Full;
use serde_json::Value;

use crate::config::RequestConfig;
use crate::error::BridgeError;
use crate::proxy::context::{Event, InvocationContext, ProxyOptions};
use crate::proxy::pipeline::EventToRequestMapper;

/// Header carrying the event's source tag.
pub const X_EVENT_SOURCE: HeaderName = HeaderName::from_static("x-event-source");

/// Header carrying the invocation id.
pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// One outbound request, built fresh per invocation.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// Target transport endpoint.
    pub socket_path: PathBuf,
}

impl RequestDescriptor {
    /// Empty-bodied request to `path` (normalized) on `socket_path`.
    pub fn new(method: Method, path: impl AsRef<str>, socket_path: PathBuf) -> Self {
        let mut descriptor = Self {
            method,
            path: normalize_path(path.as_ref()),
            headers: HeaderMap::new(),
            body: Bytes::new(),
            socket_path,
        };
        descriptor.set_body(Bytes::new());
        descriptor
    }

    /// Replace the body and keep `content-length` in step with it.
    pub fn set_body(&mut self, body: Bytes) {
        self.headers
            .insert(header::CONTENT_LENGTH, HeaderValue::from(body.len()));
        self.body = body;
    }

    /// Convert into a hyper request. Adds `host: localhost` when absent.
    pub fn into_request(self) -> Result<Request<Full<Bytes>>, BridgeError> {
        let mut request = Request::builder()
            .method(self.method)
            .uri(self.path)
            .body(Full::new(self.body))
            .map_err(|e| BridgeError::BuildRequest(Box::new(e)))?;

        *request.headers_mut() = self.headers;
        request
            .headers_mut()
            .entry(header::HOST)
            .or_insert(HeaderValue::from_static("localhost"));
        Ok(request)
    }
}

/// Prepend `/` to paths that lack it.
pub fn normalize_path(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}

/// Computes a path from the event and options. `None` or empty means default.
pub type PathMapperFn = Arc<dyn Fn(&Event, &ProxyOptions) -> Option<String> + Send + Sync>;

/// How the default mapper selects the request path.
#[derive(Clone, Default)]
pub enum PathMapping {
    /// Always the configured default path.
    #[default]
    Default,
    /// A fixed path.
    Fixed(String),
    /// A function of the event and options.
    Mapper(PathMapperFn),
}

impl PathMapping {
    pub fn fixed(path: impl Into<String>) -> Self {
        PathMapping::Fixed(path.into())
    }

    pub fn mapper<F>(f: F) -> Self
    where
        F: Fn(&Event, &ProxyOptions) -> Option<String> + Send + Sync + 'static,
    {
        PathMapping::Mapper(Arc::new(f))
    }

    /// Resolve to a normalized path.
    pub fn resolve(&self, event: &Event, options: &ProxyOptions, default_path: &str) -> String {
        let mapped = match self {
            PathMapping::Default => None,
            PathMapping::Fixed(path) => Some(path.clone()),
            PathMapping::Mapper(f) => f(event, options),
        };

        match mapped {
            Some(path) if !path.is_empty() => normalize_path(&path),
            _ => normalize_path(default_path),
        }
    }
}

impl fmt::Debug for PathMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathMapping::Default => f.write_str("Default"),
            PathMapping::Fixed(path) => f.debug_tuple("Fixed").field(path).finish(),
            PathMapping::Mapper(_) => f.write_str("Mapper(..)"),
        }
    }
}

/// Fallbacks used by the default mapper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDefaults {
    pub default_path: String,
    pub default_event_source: String,
}

impl Default for RequestDefaults {
    fn default() -> Self {
        Self::from(&RequestConfig::default())
    }
}

impl From<&RequestConfig> for RequestDefaults {
    fn from(config: &RequestConfig) -> Self {
        Self {
            default_path: config.default_path.clone(),
            default_event_source: config.default_event_source.clone(),
        }
    }
}

/// The built-in event-to-request mapper.
pub fn general_event_to_request_mapper(
    paths: PathMapping,
    defaults: RequestDefaults,
) -> EventToRequestMapper {
    Arc::new(move |ctx: &InvocationContext| -> Result<RequestDescriptor, BridgeError> {
        let path = paths.resolve(&ctx.event, &ctx.options, &defaults.default_path);
        let body = ctx.event.to_json_bytes()?;

        let mut descriptor = RequestDescriptor::new(Method::POST, path, ctx.server.socket_path());
        descriptor
            .headers
            .insert(X_EVENT_SOURCE, event_source_header(&ctx.event, &defaults));
        descriptor.headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        descriptor.set_body(body);
        Ok(descriptor)
    })
}

fn event_source_header(event: &Event, defaults: &RequestDefaults) -> HeaderValue {
    event
        .as_value()
        .get("eventSource")
        .and_then(event_source_tag)
        .and_then(|source| HeaderValue::from_str(&source).ok())
        .or_else(|| HeaderValue::from_str(&defaults.default_event_source).ok())
        .unwrap_or_else(|| HeaderValue::from_static("aws:custom-event"))
}

/// Tag for a truthy scalar `eventSource`. Empty strings, `0`, `false`,
/// `null` and containers have no tag.
fn event_source_tag(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) if n.as_f64() != Some(0.0) => Some(n.to_string()),
        Value::Bool(true) => Some("true".to_owned()),
        _ => None,
    }
}
