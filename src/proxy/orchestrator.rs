//! Invocation orchestration.
//!
//! # State Machine
//! ```text
//! Idle → AwaitingServer → BuildingRequest → AwaitingResponse → Resolved
//!              │                 │                  │
//!              └─────────────────┴──────────────────┴──────────→ Rejected
//! ```
//!
//! | failure                     | error mapper used      |
//! |-----------------------------|------------------------|
//! | bind (non-conflict)         | `library_error_mapper` |
//! | request mapper / body getter| `library_error_mapper` |
//! | transport / body read       | `runtime_error_mapper` |
//! | custom response mapper      | `library_error_mapper` |
//!
//! Every path ends in exactly one `Ok` or `Err`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use axum::http::HeaderValue;
use bytes::Bytes;
use http_body_util::Full;
use hyper::Request;
use tracing::{debug, info_span, warn, Instrument};

use crate::error::{BridgeError, Rejection};
use crate::http::request::X_REQUEST_ID;
use crate::http::response::read_body_string;
use crate::lifecycle::ServerHandle;
use crate::net::connection;
use crate::observability::metrics;
use crate::proxy::context::{Event, InvocationContext, ProxyOptions};
use crate::proxy::pipeline::{ErrorMapper, MappingPipeline};

/// Where an invocation currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationState {
    Idle,
    AwaitingServer,
    BuildingRequest,
    AwaitingResponse,
    Resolved,
    Rejected,
}

impl InvocationState {
    pub fn can_transition_to(self, next: InvocationState) -> bool {
        use InvocationState::*;
        matches!(
            (self, next),
            (Idle, AwaitingServer)
                | (AwaitingServer, BuildingRequest)
                | (AwaitingServer, Rejected)
                | (BuildingRequest, AwaitingResponse)
                | (BuildingRequest, Rejected)
                | (AwaitingResponse, Resolved)
                | (AwaitingResponse, Rejected)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, InvocationState::Resolved | InvocationState::Rejected)
    }
}

/// Which error mapper a failure is routed through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ErrorPath {
    Library,
    Runtime,
}

struct Invocation<'p, T> {
    state: InvocationState,
    ctx: InvocationContext,
    pipeline: &'p MappingPipeline<T>,
}

impl<'p, T> Invocation<'p, T>
where
    T: From<String> + Send + 'static,
{
    fn advance(&mut self, next: InvocationState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal transition {:?} -> {:?}",
            self.state,
            next
        );
        debug!(from = ?self.state, to = ?next, "Invocation state");
        self.state = next;
    }

    async fn run(mut self) -> Result<T, Rejection> {
        self.advance(InvocationState::AwaitingServer);
        let ready = self.ctx.server.ensure_ready().await;
        if let Err(e) = ready {
            return self.reject(ErrorPath::Library, e).await;
        }

        self.advance(InvocationState::BuildingRequest);
        let (socket_path, request) = match self.build_request() {
            Ok(built) => built,
            Err(e) => return self.reject(ErrorPath::Library, e).await,
        };

        self.advance(InvocationState::AwaitingResponse);
        let response = match connection::send(&socket_path, request).await {
            Ok(response) => response,
            Err(e) => return self.reject(ErrorPath::Runtime, e.into()).await,
        };
        debug!(status = %response.status(), "Response received");

        let mapped = match &self.pipeline.response_mapper {
            None => read_body_string(response)
                .await
                .map(T::from)
                .map_err(|e| (ErrorPath::Runtime, BridgeError::from(e))),
            Some(mapper) => mapper(response, self.ctx.clone())
                .await
                .map_err(|e| (ErrorPath::Library, BridgeError::ResponseMapping(e))),
        };

        match mapped {
            Ok(value) => {
                self.advance(InvocationState::Resolved);
                Ok(value)
            }
            Err((path, e)) => self.reject(path, e).await,
        }
    }

    fn build_request(&self) -> Result<(PathBuf, Request<Full<Bytes>>), BridgeError> {
        let mut descriptor = (self.pipeline.event_to_request)(&self.ctx)?;

        if let Some(getter) = &self.pipeline.request_body_getter {
            let body = getter(&self.ctx).map_err(BridgeError::BuildRequest)?;
            descriptor.set_body(body);
        }

        if !descriptor.headers.contains_key(X_REQUEST_ID) {
            let id = HeaderValue::from_str(&self.ctx.invocation_id.to_string())
                .map_err(|e| BridgeError::BuildRequest(Box::new(e)))?;
            descriptor.headers.insert(X_REQUEST_ID, id);
        }

        debug!(
            method = %descriptor.method,
            path = %descriptor.path,
            body_len = descriptor.body.len(),
            "Request built"
        );

        let socket_path = descriptor.socket_path.clone();
        Ok((socket_path, descriptor.into_request()?))
    }

    async fn reject(mut self, path: ErrorPath, error: BridgeError) -> Result<T, Rejection> {
        self.advance(InvocationState::Rejected);
        warn!(error = %error, path = ?path, "Invocation failed");

        let mapper = match path {
            ErrorPath::Library => self.pipeline.library_error_mapper.as_ref(),
            ErrorPath::Runtime => self.pipeline.runtime_error_mapper.as_ref(),
        };
        Err(map_error(mapper, error, self.ctx).await)
    }
}

async fn map_error(mapper: Option<&ErrorMapper>, error: BridgeError, ctx: InvocationContext) -> Rejection {
    let Some(mapper) = mapper else {
        return Rejection::Unmapped(error);
    };

    match mapper(error, ctx).await {
        Ok(value) => Rejection::Mapped(value),
        Err(e) => {
            warn!(error = %e, "Error mapper failed");
            Rejection::MapperFailed(e)
        }
    }
}

/// Run one event through the bridge.
///
/// Ensures the backing server is listening, sends the mapped request over the
/// Unix socket, and maps the response or failure per `pipeline`.
pub async fn invoke<T>(
    server: &Arc<ServerHandle>,
    event: Event,
    options: ProxyOptions,
    pipeline: &MappingPipeline<T>,
) -> Result<T, Rejection>
where
    T: From<String> + Send + 'static,
{
    let ctx = InvocationContext::new(event, Arc::clone(server), options);
    let span = info_span!(
        "invocation",
        invocation_id = %ctx.invocation_id,
        event_source = ctx.event.event_source().unwrap_or("-"),
    );
    let start = Instant::now();

    let invocation = Invocation {
        state: InvocationState::Idle,
        ctx,
        pipeline,
    };
    let outcome = invocation.run().instrument(span).await;

    metrics::record_invocation(if outcome.is_ok() { "resolved" } else { "rejected" }, start);
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use InvocationState::*;

    #[test]
    fn happy_path_transitions() {
        let path = [Idle, AwaitingServer, BuildingRequest, AwaitingResponse, Resolved];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{:?} -> {:?}", pair[0], pair[1]);
        }
    }

    #[test]
    fn every_working_state_can_reject() {
        for state in [AwaitingServer, BuildingRequest, AwaitingResponse] {
            assert!(state.can_transition_to(Rejected));
        }
        assert!(!Idle.can_transition_to(Rejected));
    }

    #[test]
    fn terminal_states_are_final() {
        for terminal in [Resolved, Rejected] {
            assert!(terminal.is_terminal());
            for next in [Idle, AwaitingServer, BuildingRequest, AwaitingResponse, Resolved, Rejected] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn no_skipping_the_server() {
        assert!(!Idle.can_transition_to(BuildingRequest));
        assert!(!AwaitingServer.can_transition_to(AwaitingResponse));
        assert!(!BuildingRequest.can_transition_to(Resolved));
    }
}
