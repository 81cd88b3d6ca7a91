//! Types for state machine responses and stored snapshots.

use crate::types::ClusterSnapshotMeta;
use serde::{Deserialize, Serialize};

/// Response from applying a command to the state machine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResponse {
    /// Value held by the key before the command, if any.
    pub previous: Option<String>,
}

impl CommandResponse {
    /// Response for a command that replaced or removed `previous`.
    pub fn with_previous(previous: Option<String>) -> Self {
        Self { previous }
    }
}

/// Stored snapshot data.
#[derive(Debug, Clone)]
pub struct StoredSnapshot {
    /// Snapshot metadata.
    pub meta: ClusterSnapshotMeta,
    /// Serialized store.
    pub data: Vec<u8>,
}
