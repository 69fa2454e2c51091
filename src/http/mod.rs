//! HTTP mapping subsystem.
//!
//! # Data Flow
//! ```text
//! Event + options
//!     → request.rs (path selection, headers, JSON body → RequestDescriptor)
//!     → net::connection (HTTP/1.1 over the Unix socket)
//!     → response.rs (buffer body → String, or hand off to a custom mapper)
//! ```

pub mod request;
pub mod response;

pub use request::{
    general_event_to_request_mapper, normalize_path, PathMapping, RequestDefaults,
    RequestDescriptor, X_EVENT_SOURCE, X_REQUEST_ID,
};
pub use response::{read_body_json, read_body_string};
