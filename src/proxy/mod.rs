//! Proxy orchestration subsystem.
//!
//! # Data Flow
//! ```text
//! invoke(server, event, options, pipeline)
//!     → context.rs      (invocation id, event, options, server handle)
//!     → lifecycle       (ensure_ready: bind once, restart on conflict)
//!     → pipeline.rs     (request mapper, body getter)
//!     → net::connection (send over the Unix socket)
//!     → pipeline.rs     (response mapper or buffered string)
//!     → Ok(T) | Err(Rejection)
//! ```

pub mod context;
pub mod orchestrator;
pub mod pipeline;

pub use context::{Event, InvocationContext, ProxyOptions};
pub use orchestrator::{invoke, InvocationState};
pub use pipeline::{
    BoxFuture, ErrorMapper, EventToRequestMapper, MappingPipeline, RequestBodyGetter,
    ResponseMapper,
};
