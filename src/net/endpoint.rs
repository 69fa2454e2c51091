//! Transport endpoint allocation.
//!
//! An [`EndpointId`] is a short random token. The allocator turns it into a
//! socket path of the form `<dir>/<prefix>-<id>.sock`. Allocation does no I/O
//! and can be repeated freely; every restart gets a fresh id.

use std::fmt;
use std::path::PathBuf;

use rand::Rng;

use crate::config::TransportConfig;

const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Opaque identifier of one transport address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EndpointId(String);

impl EndpointId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EndpointId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for EndpointId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Produces endpoint ids and maps them to socket paths.
#[derive(Debug, Clone)]
pub struct EndpointAllocator {
    dir: PathBuf,
    prefix: String,
    suffix_len: usize,
}

impl EndpointAllocator {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>, suffix_len: usize) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
            suffix_len,
        }
    }

    pub fn from_config(config: &TransportConfig) -> Self {
        Self::new(&config.socket_dir, &config.socket_prefix, config.suffix_len)
    }

    /// Generate a fresh random id. 36^13 possibilities at the default length.
    pub fn allocate(&self) -> EndpointId {
        let mut rng = rand::thread_rng();
        let suffix: String = (0..self.suffix_len)
            .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
            .collect();
        EndpointId(suffix)
    }

    /// Socket path for the given id.
    pub fn socket_path(&self, id: &EndpointId) -> PathBuf {
        self.dir.join(format!("{}-{}.sock", self.prefix, id))
    }
}

impl Default for EndpointAllocator {
    fn default() -> Self {
        Self::from_config(&TransportConfig::default())
    }
}
