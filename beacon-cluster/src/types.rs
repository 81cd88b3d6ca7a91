//! Type definitions for OpenRaft integration.
//!
//! OpenRaft requires a type configuration that specifies all the concrete types
//! used in the Raft implementation. This module defines beacon's type
//! configuration and the mapping from string server ids to engine node ids.

use crate::command::EncodedCommand;
use crate::state::CommandResponse;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::io::Cursor;

/// Node ID type used by the consensus engine.
///
/// Servers are identified by strings; the engine needs a `Copy` integer.
/// See [`node_key`].
pub type ClusterNodeId = u64;

/// Membership record the engine stores for every server.
///
/// Carries the string id alongside the address so the configuration read back
/// from the engine still names servers the way operators do.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServerNode {
    /// Operator-facing server id.
    pub id: String,
    /// Raft RPC address.
    pub addr: String,
}

impl ServerNode {
    /// Create a node record.
    pub fn new(id: impl Into<String>, addr: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            addr: addr.into(),
        }
    }
}

impl fmt::Display for ServerNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.id, self.addr)
    }
}

/// Derive the engine node id for a server id.
///
/// Every replica must compute the same value, so this is the first eight bytes
/// of the SHA-256 digest, read big-endian.
pub fn node_key(id: &str) -> ClusterNodeId {
    let digest = Sha256::digest(id.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(prefix)
}

openraft::declare_raft_types!(
    /// OpenRaft type configuration for beacon.
    pub TypeConfig:
        D = EncodedCommand,
        R = CommandResponse,
        NodeId = ClusterNodeId,
        Node = ServerNode,
        Entry = openraft::Entry<TypeConfig>,
        SnapshotData = Cursor<Vec<u8>>,
        AsyncRuntime = openraft::TokioRuntime,
);

/// Type alias for Raft instance.
pub type ClusterRaft = openraft::Raft<TypeConfig>;

/// Type alias for log entry.
pub type ClusterEntry = openraft::Entry<TypeConfig>;

/// Type alias for vote.
pub type ClusterVote = openraft::Vote<ClusterNodeId>;

/// Type alias for log ID.
pub type ClusterLogId = openraft::LogId<ClusterNodeId>;

/// Type alias for stored membership.
pub type ClusterStoredMembership = openraft::StoredMembership<ClusterNodeId, ServerNode>;

/// Type alias for snapshot metadata.
pub type ClusterSnapshotMeta = openraft::SnapshotMeta<ClusterNodeId, ServerNode>;

/// Type alias for snapshot.
pub type ClusterSnapshot = openraft::storage::Snapshot<TypeConfig>;

/// Type alias for storage error.
pub type ClusterStorageError = openraft::StorageError<ClusterNodeId>;

/// Type alias for raft metrics.
pub type ClusterMetrics = openraft::RaftMetrics<ClusterNodeId, ServerNode>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_key_is_stable() {
        assert_eq!(node_key("n1"), node_key("n1"));
        assert_ne!(node_key("n1"), node_key("n2"));
    }

    #[test]
    fn node_key_matches_digest_prefix() {
        // sha256("") = e3b0c44298fc1c14...
        assert_eq!(node_key(""), 0xe3b0_c442_98fc_1c14);
    }

    #[test]
    fn server_node_display() {
        assert_eq!(ServerNode::new("n1", "10.0.0.1:9090").to_string(), "n1@10.0.0.1:9090");
    }
}
