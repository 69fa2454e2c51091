//! Serverless-to-HTTP bridge.
//!
//! Lets a function-invocation runtime that delivers opaque events drive a
//! long-lived HTTP application. One backing server per process listens on a
//! private Unix socket; each event becomes an HTTP request to it, and the
//! response (or failure) becomes the invocation's outcome.
//!
//! ```no_run
//! use std::sync::Arc;
//! use event_bridge::{invoke, BridgeConfig, Event, MappingPipeline, PathMapping, ProxyOptions, RequestDefaults, ServerHandle};
//!
//! # async fn run(app: axum::Router) -> Result<(), event_bridge::Rejection> {
//! let config = BridgeConfig::default();
//! let server = Arc::new(ServerHandle::from_config(app, &config));
//! let pipeline: MappingPipeline = MappingPipeline::general(PathMapping::fixed("hook"), RequestDefaults::default());
//!
//! let event = Event::new(serde_json::json!({ "eventSource": "aws:sqs" }));
//! let body = invoke(&server, event, ProxyOptions::default(), &pipeline).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod proxy;

pub use config::BridgeConfig;
pub use error::{BoxError, BridgeError, Rejection, TransportError};
pub use http::{PathMapping, RequestDefaults, RequestDescriptor};
pub use lifecycle::{RestartPolicy, ServerHandle};
pub use net::{EndpointAllocator, EndpointId};
pub use proxy::{invoke, Event, InvocationContext, MappingPipeline, ProxyOptions};
