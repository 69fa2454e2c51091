//! Caller-supplied mapping functions.
//!
//! Only the event-to-request mapper is required. Every other slot is optional
//! and falls back to the built-in behaviour when empty:
//!
//! | slot                   | when empty                                  |
//! |------------------------|---------------------------------------------|
//! | `response_mapper`      | buffer the body, resolve with it as a string |
//! | `request_body_getter`  | keep the mapper's body (JSON of the event)   |
//! | `library_error_mapper` | reject with the original error               |
//! | `runtime_error_mapper` | reject with the original error               |

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use hyper::body::Incoming;
use hyper::Response;
use serde_json::Value;

use crate::error::{BoxError, BridgeError};
use crate::http::request::{general_event_to_request_mapper, PathMapping, RequestDefaults, RequestDescriptor};
use crate::proxy::context::InvocationContext;

pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

/// Builds the outbound request for an event.
pub type EventToRequestMapper =
    Arc<dyn Fn(&InvocationContext) -> Result<RequestDescriptor, BridgeError> + Send + Sync>;

/// Produces the request body, replacing the mapper's.
pub type RequestBodyGetter = Arc<dyn Fn(&InvocationContext) -> Result<Bytes, BoxError> + Send + Sync>;

/// Turns the backing server's response into the invocation result.
pub type ResponseMapper<T> =
    Arc<dyn Fn(Response<Incoming>, InvocationContext) -> BoxFuture<Result<T, BoxError>> + Send + Sync>;

/// Turns a failure into the value the invocation rejects with.
pub type ErrorMapper =
    Arc<dyn Fn(BridgeError, InvocationContext) -> BoxFuture<Result<Value, BoxError>> + Send + Sync>;

/// The set of mapping functions for one invocation call.
pub struct MappingPipeline<T = String> {
    pub event_to_request: EventToRequestMapper,
    pub response_mapper: Option<ResponseMapper<T>>,
    pub request_body_getter: Option<RequestBodyGetter>,
    pub library_error_mapper: Option<ErrorMapper>,
    pub runtime_error_mapper: Option<ErrorMapper>,
}

impl<T: Send + 'static> MappingPipeline<T> {
    pub fn new(event_to_request: EventToRequestMapper) -> Self {
        Self {
            event_to_request,
            response_mapper: None,
            request_body_getter: None,
            library_error_mapper: None,
            runtime_error_mapper: None,
        }
    }

    /// Pipeline around the built-in request mapper.
    pub fn general(paths: PathMapping, defaults: RequestDefaults) -> Self {
        Self::new(general_event_to_request_mapper(paths, defaults))
    }

    /// Pipeline around a custom request mapper.
    pub fn from_request_mapper<F>(f: F) -> Self
    where
        F: Fn(&InvocationContext) -> Result<RequestDescriptor, BridgeError> + Send + Sync + 'static,
    {
        Self::new(Arc::new(f))
    }

    pub fn with_response_mapper<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Response<Incoming>, InvocationContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, BoxError>> + Send + 'static,
    {
        self.response_mapper = Some(Arc::new(
            move |response, ctx| -> BoxFuture<Result<T, BoxError>> { Box::pin(f(response, ctx)) },
        ));
        self
    }

    pub fn with_request_body_getter<F>(mut self, f: F) -> Self
    where
        F: Fn(&InvocationContext) -> Result<Bytes, BoxError> + Send + Sync + 'static,
    {
        self.request_body_getter = Some(Arc::new(f));
        self
    }

    /// Handles bind, request-build and response-mapping failures.
    pub fn with_library_error_mapper<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(BridgeError, InvocationContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, BoxError>> + Send + 'static,
    {
        self.library_error_mapper = Some(error_mapper(f));
        self
    }

    /// Handles transport-level request failures.
    pub fn with_runtime_error_mapper<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(BridgeError, InvocationContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, BoxError>> + Send + 'static,
    {
        self.runtime_error_mapper = Some(error_mapper(f));
        self
    }
}

fn error_mapper<F, Fut>(f: F) -> ErrorMapper
where
    F: Fn(BridgeError, InvocationContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, BoxError>> + Send + 'static,
{
    Arc::new(move |error, ctx| -> BoxFuture<Result<Value, BoxError>> { Box::pin(f(error, ctx)) })
}

impl<T> Clone for MappingPipeline<T> {
    fn clone(&self) -> Self {
        Self {
            event_to_request: Arc::clone(&self.event_to_request),
            response_mapper: self.response_mapper.clone(),
            request_body_getter: self.request_body_getter.clone(),
            library_error_mapper: self.library_error_mapper.clone(),
            runtime_error_mapper: self.runtime_error_mapper.clone(),
        }
    }
}

impl<T> fmt::Debug for MappingPipeline<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MappingPipeline")
            .field("response_mapper", &self.response_mapper.is_some())
            .field("request_body_getter", &self.request_body_getter.is_some())
            .field("library_error_mapper", &self.library_error_mapper.is_some())
            .field("runtime_error_mapper", &self.runtime_error_mapper.is_some())
            .finish_non_exhaustive()
    }
}
