//! Point-in-time copies of the key-value store.
//!
//! The persisted form is a JSON object mapping keys to values. Nothing else is
//! written: log position and membership travel in the engine's snapshot
//! metadata.

use std::collections::HashMap;
use std::io::Write;

/// An immutable deep copy of the store, taken under the store lock.
///
/// Serializing the handle does not touch the live store, so it can happen
/// after the lock is released.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotHandle {
    store: HashMap<String, String>,
}

impl SnapshotHandle {
    pub(crate) fn new(store: HashMap<String, String>) -> Self {
        Self { store }
    }

    /// Serialize the snapshot.
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(&self.store)
    }

    /// Write the serialized snapshot to `sink`.
    pub fn persist<W: Write>(&self, sink: W) -> Result<(), serde_json::Error> {
        serde_json::to_writer(sink, &self.store)
    }

    /// Value of `key` at the time the snapshot was taken.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.store.get(key).map(String::as_str)
    }

    /// Number of keys captured.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Whether the snapshot captured an empty store.
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

/// Decode a serialized snapshot into a full mapping.
pub(crate) fn decode(bytes: &[u8]) -> Result<HashMap<String, String>, serde_json::Error> {
    serde_json::from_slice(bytes)
}
