//! Values that flow through one invocation.

use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use uuid::Uuid;

use crate::lifecycle::ServerHandle;

/// Opaque inbound event. Cheap to clone; never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct Event(Arc<Value>);

impl Event {
    pub fn new(value: Value) -> Self {
        Self(Arc::new(value))
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// The optional `eventSource` tag.
    pub fn event_source(&self) -> Option<&str> {
        self.0.get("eventSource").and_then(Value::as_str)
    }

    /// JSON encoding of the event, used as the default request body.
    pub fn to_json_bytes(&self) -> Result<Bytes, serde_json::Error> {
        serde_json::to_vec(self.0.as_ref()).map(Bytes::from)
    }
}

impl From<Value> for Event {
    fn from(value: Value) -> Self {
        Self::new(value)
    }
}

impl Serialize for Event {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.as_ref().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Event {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(Self::new)
    }
}

/// Caller options passed through untouched to every mapper.
#[derive(Debug, Clone, PartialEq)]
pub struct ProxyOptions(Arc<Value>);

impl ProxyOptions {
    pub fn new(value: Value) -> Self {
        Self(Arc::new(value))
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }
}

impl Default for ProxyOptions {
    fn default() -> Self {
        Self::new(Value::Null)
    }
}

impl From<Value> for ProxyOptions {
    fn from(value: Value) -> Self {
        Self::new(value)
    }
}

/// Everything a mapper may look at. Owned so async mappers can keep it.
#[derive(Debug, Clone)]
pub struct InvocationContext {
    pub invocation_id: Uuid,
    pub event: Event,
    pub server: Arc<ServerHandle>,
    pub options: ProxyOptions,
}

impl InvocationContext {
    pub fn new(event: Event, server: Arc<ServerHandle>, options: ProxyOptions) -> Self {
        Self {
            invocation_id: Uuid::new_v4(),
            event,
            server,
            options,
        }
    }
}
