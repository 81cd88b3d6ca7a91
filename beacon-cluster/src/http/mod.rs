//! HTTP control plane.
//!
//! Two endpoints, served with hyper 1.x:
//!
//! ```text
//! GET  /      -> 200 "I am server <id>.\n" | "I am not the leader.\n"
//! POST /join  {"id": "<id>", "addr": "<raft addr>"}
//!             -> 200 | 400 malformed body | 500 join failed
//! ```
//!
//! Handlers only see a [`ClusterHandle`], never the consensus engine.
//!
//! # Example
//!
//! ```ignore
//! use beacon_cluster::{ClusterNode, ControlPlaneServer};
//! use std::sync::Arc;
//!
//! let node = Arc::new(ClusterNode::start(config).await?);
//! let server = ControlPlaneServer::bind("127.0.0.1:8080", Arc::new(node.coordinator())).await?;
//! let running = server.spawn();
//! ```

mod handlers;
mod response;
mod router;
mod server;

pub use server::{ControlPlaneServer, RunningControlPlane};

use crate::error::ClusterResult;
use crate::membership::{MembershipCoordinator, MembershipEngine};

/// What the control plane needs from the cluster.
#[tonic::async_trait]
pub trait ClusterHandle: Send + Sync + 'static {
    /// Admit `id` at `addr` as a voter.
    async fn join(&self, id: &str, addr: &str) -> ClusterResult<()>;

    /// Whether the local node is the leader.
    fn is_leader(&self) -> bool;

    /// The local node's id.
    fn node_id(&self) -> &str;
}

#[tonic::async_trait]
impl<E: MembershipEngine + 'static> ClusterHandle for MembershipCoordinator<E> {
    async fn join(&self, id: &str, addr: &str) -> ClusterResult<()> {
        MembershipCoordinator::join(self, id, addr).await
    }

    fn is_leader(&self) -> bool {
        MembershipCoordinator::is_leader(self)
    }

    fn node_id(&self) -> &str {
        MembershipCoordinator::node_id(self)
    }
}
