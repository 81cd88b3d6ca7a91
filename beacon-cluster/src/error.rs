//! Error types for cluster operations.
//!
//! Two kinds of failure are kept apart:
//!
//! - [`ClusterError`] is an ordinary, recoverable result. Join failures,
//!   transport failures and startup problems are reported through it.
//! - [`ApplyError`] means a committed log entry (or an installed snapshot)
//!   could not be interpreted. Every replica would hit the same entry, so the
//!   only safe reaction is to stop the node. It is never converted into a
//!   `ClusterError`.

use crate::types::{ClusterNodeId, ServerNode};
use std::time::Duration;
use thiserror::Error;

/// Result type for cluster operations.
pub type ClusterResult<T> = std::result::Result<T, ClusterError>;

/// Type alias for OpenRaft Raft errors.
pub type RaftError<E = openraft::error::Infallible> = openraft::error::RaftError<ClusterNodeId, E>;

/// Type alias for OpenRaft RPC errors.
pub type RPCError<E = openraft::error::Infallible> =
    openraft::error::RPCError<ClusterNodeId, ServerNode, RaftError<E>>;

/// Type alias for errors that stop the consensus engine.
pub type Fatal = openraft::error::Fatal<ClusterNodeId>;

/// Type alias for client write errors.
pub type ClientWriteError = openraft::error::ClientWriteError<ClusterNodeId, ServerNode>;

/// Errors that can occur in cluster operations.
#[derive(Debug, Error)]
pub enum ClusterError {
    /// Raft consensus error.
    #[error("Raft error: {0}")]
    Raft(Box<RaftError>),

    /// A configuration change was rejected by the consensus engine.
    #[error("Membership change failed: {0}")]
    Membership(String),

    /// An operation did not complete within its deadline.
    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        /// What was being attempted.
        operation: &'static str,
        /// The deadline that elapsed.
        timeout: Duration,
    },

    /// Not the leader - includes leader hint if known.
    #[error("Not the leader, leader is node {leader:?}")]
    NotLeader {
        /// The current leader if known.
        leader: Option<ClusterNodeId>,
    },

    /// Network/RPC error.
    #[error("Network error: {0}")]
    Network(#[from] tonic::Status),

    /// Transport error.
    #[error("Transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Storage error.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<RaftError> for ClusterError {
    fn from(e: RaftError) -> Self {
        ClusterError::Raft(Box::new(e))
    }
}

impl From<RaftError<ClientWriteError>> for ClusterError {
    fn from(e: RaftError<ClientWriteError>) -> Self {
        match e {
            openraft::error::RaftError::APIError(ClientWriteError::ForwardToLeader(f)) => {
                ClusterError::NotLeader {
                    leader: f.leader_id,
                }
            }
            openraft::error::RaftError::APIError(ClientWriteError::ChangeMembershipError(c)) => {
                ClusterError::Membership(c.to_string())
            }
            openraft::error::RaftError::Fatal(f) => {
                ClusterError::Raft(Box::new(openraft::error::RaftError::Fatal(f)))
            }
        }
    }
}

impl From<serde_json::Error> for ClusterError {
    fn from(e: serde_json::Error) -> Self {
        ClusterError::Serialization(e.to_string())
    }
}

/// A committed entry or snapshot that cannot be applied.
///
/// Reaching this error means the replicated log is corrupt or the replicas run
/// incompatible code. The state machine stops the consensus engine when it sees
/// one and the process supervisor terminates the node.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApplyError {
    /// The bytes are not a well-formed command or snapshot.
    #[error("failed to decode {what}: {cause}")]
    Decode {
        /// What was being decoded ("command" or "snapshot").
        what: &'static str,
        /// Decoder message.
        cause: String,
    },

    /// The command names an operation this node does not know.
    #[error("unrecognized command op: {0:?}")]
    UnknownOperation(String),
}

impl ApplyError {
    pub(crate) fn decode(what: &'static str, cause: impl ToString) -> Self {
        ApplyError::Decode {
            what,
            cause: cause.to_string(),
        }
    }
}
