//! Leader election and a replicated key-value state machine.
//!
//! Each beacon node runs an openraft consensus engine, applies committed
//! set/delete commands to an in-memory store, and exposes a small HTTP control
//! plane through which new servers join the cluster.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                       beacon node                        │
//! │                                                          │
//! │  HTTP :8080 ──► ControlPlaneServer ──► ClusterHandle     │
//! │                                          │               │
//! │                              MembershipCoordinator       │
//! │                                          │               │
//! │  gRPC :9090 ◄─► RaftServer ◄──► openraft::Raft           │
//! │                                   │          │           │
//! │                             MemLogStore  KvStateMachine  │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use beacon_cluster::{ClusterConfig, ClusterNode, Command, ControlPlaneServer};
//! use std::sync::Arc;
//!
//! let config = ClusterConfig::builder()
//!     .node_id("n1")
//!     .raft_addr("127.0.0.1:9090")
//!     .http_addr("127.0.0.1:8080")
//!     .build()?;
//!
//! let node = Arc::new(ClusterNode::start(config.clone()).await?);
//! node.bootstrap().await?;
//!
//! let http = ControlPlaneServer::bind(&config.http_addr, Arc::new(node.coordinator()))
//!     .await?
//!     .spawn();
//!
//! node.propose(Command::set("color", "blue")).await?;
//! ```

pub mod command;
pub mod config;
pub mod error;
pub mod http;
pub mod membership;
pub mod network;
pub mod raft;
pub mod state;
pub mod types;

// Re-export main types
pub use command::{Command, EncodedCommand, Operation};
pub use config::ClusterConfig;
pub use error::{ApplyError, ClusterError, ClusterResult, Fatal};
pub use http::{ClusterHandle, ControlPlaneServer, RunningControlPlane};
pub use membership::{
    ClusterConfiguration, MembershipCoordinator, MembershipEngine, ServerDescriptor,
};
pub use raft::ClusterNode;
pub use state::{CommandResponse, KvStateMachine, SnapshotHandle};
pub use types::{ClusterNodeId, ServerNode, TypeConfig, node_key};

// Generated protobuf code
pub mod proto {
    tonic::include_proto!("beacon.raft");
}
