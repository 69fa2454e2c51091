//! Response body handling.
//!
//! The default outcome of an invocation is the backing server's full response
//! body decoded as UTF-8. Custom response mappers can reuse the helpers here.

use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::Response;
use serde::de::DeserializeOwned;

use crate::error::{BoxError, TransportError};

/// Buffer the whole body. Invalid UTF-8 is replaced, not rejected.
pub async fn read_body_string(response: Response<Incoming>) -> Result<String, TransportError> {
    let bytes = response
        .into_body()
        .collect()
        .await
        .map_err(TransportError::Body)?
        .to_bytes();
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Buffer the whole body and parse it as JSON.
pub async fn read_body_json<T: DeserializeOwned>(response: Response<Incoming>) -> Result<T, BoxError> {
    let bytes = response
        .into_body()
        .collect()
        .await
        .map_err(TransportError::Body)?
        .to_bytes();
    Ok(serde_json::from_slice(&bytes)?)
}
