//! ClusterNode - the main entry point for cluster operations.

use crate::command::Command;
use crate::config::ClusterConfig;
use crate::error::{ClusterError, ClusterResult, Fatal};
use crate::membership::{
    ClusterConfiguration, MembershipCoordinator, MembershipEngine, ServerDescriptor, with_timeout,
};
use crate::network::{NetworkClient, RaftServer};
use crate::proto::raft_service_server::RaftServiceServer;
use crate::raft::storage::MemLogStore;
use crate::state::{CommandResponse, KvStateMachine};
use crate::types::{ClusterMetrics, ClusterNodeId, ClusterRaft, ServerNode, node_key};
use openraft::{ChangeMembers, Raft, ServerState};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tonic::transport::Server;
use tonic::transport::server::TcpIncoming;

/// A node in the beacon cluster.
///
/// Owns the consensus engine, the replicated state machine and the Raft RPC
/// server. Share it behind an `Arc` between the control plane and whoever
/// supervises the process.
pub struct ClusterNode {
    /// This node's membership record.
    server: ServerNode,
    /// Engine id derived from the server id.
    node_id: ClusterNodeId,
    /// The Raft instance.
    raft: ClusterRaft,
    /// The state machine (for read-only queries).
    state_machine: Arc<KvStateMachine>,
    /// Address the Raft RPC server is bound to.
    raft_addr: SocketAddr,
    /// Deadline for membership changes.
    join_timeout: Duration,
    /// Shutdown signal sender for the RPC server.
    shutdown_tx: Mutex<Option<oneshot::Sender<()>>>,
}

impl ClusterNode {
    /// Start a new cluster node.
    ///
    /// Binds the Raft RPC listener before returning, so an unusable address is
    /// reported here rather than from a background task. The node is not part
    /// of any cluster until [`bootstrap`](Self::bootstrap) is called or a
    /// leader admits it.
    pub async fn start(config: ClusterConfig) -> ClusterResult<Self> {
        config.validate()?;

        let server = ServerNode::new(config.node_id.clone(), config.advertise_addr());
        let node_id = node_key(&server.id);

        let state_machine = Arc::new(KvStateMachine::new());
        let raft = Raft::new(
            node_id,
            Arc::new(config.to_openraft()?),
            NetworkClient::new(),
            MemLogStore::new(),
            Arc::clone(&state_machine),
        )
        .await
        .map_err(|e| ClusterError::Storage(format!("failed to create raft: {}", e)))?;

        let listener = TcpListener::bind(&config.raft_addr).await?;
        let raft_addr = listener.local_addr()?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let raft_server = RaftServer::new(raft.clone());
        tokio::spawn(async move {
            let result = Server::builder()
                .add_service(RaftServiceServer::new(raft_server))
                .serve_with_incoming_shutdown(TcpIncoming::from(listener), async {
                    let _ = shutdown_rx.await;
                })
                .await;
            if let Err(e) = result {
                tracing::error!(error = %e, "raft rpc server failed");
            }
        });

        tracing::info!(
            node_id = %server.id,
            engine_id = node_id,
            addr = %raft_addr,
            "cluster node started"
        );

        Ok(Self {
            server,
            node_id,
            raft,
            state_machine,
            raft_addr,
            join_timeout: config.join_timeout(),
            shutdown_tx: Mutex::new(Some(shutdown_tx)),
        })
    }

    /// Initialize a new single-node cluster with this node as its only voter.
    ///
    /// Call once, on the first node. The node elects itself shortly after.
    pub async fn bootstrap(&self) -> ClusterResult<()> {
        let members = BTreeMap::from([(self.node_id, self.server.clone())]);

        self.raft
            .initialize(members)
            .await
            .map_err(|e| ClusterError::Membership(e.to_string()))?;

        tracing::info!(node_id = %self.server.id, "cluster bootstrapped");
        Ok(())
    }

    /// Add `id` at `address` as a non-voting member and wait until it has
    /// caught up with the leader's log.
    pub async fn add_learner(&self, id: &str, address: &str) -> ClusterResult<()> {
        self.raft
            .add_learner(node_key(id), ServerNode::new(id, address), true)
            .await?;

        tracing::info!(node_id = %id, addr = %address, "learner added");
        Ok(())
    }

    /// Replicate a command and wait until it is applied locally.
    ///
    /// Only the leader accepts proposals; followers return
    /// [`ClusterError::NotLeader`].
    pub async fn propose(&self, cmd: Command) -> ClusterResult<CommandResponse> {
        let encoded = cmd.encode()?;
        let resp = self.raft.client_write(encoded).await?;
        Ok(resp.data)
    }

    /// Whether this node is currently the leader.
    pub fn is_leader(&self) -> bool {
        self.raft.metrics().borrow().state == ServerState::Leader
    }

    /// The current leader, if known.
    pub fn leader(&self) -> Option<ServerDescriptor> {
        let metrics = self.raft.metrics().borrow().clone();
        let leader = metrics.current_leader?;
        metrics
            .membership_config
            .membership()
            .nodes()
            .find(|(id, _)| **id == leader)
            .map(|(_, node)| ServerDescriptor::new(node.id.clone(), node.addr.clone()))
    }

    /// This node's server id.
    pub fn node_id(&self) -> &str {
        &self.server.id
    }

    /// This node's engine id.
    pub fn engine_id(&self) -> ClusterNodeId {
        self.node_id
    }

    /// Address the Raft RPC server is bound to.
    pub fn raft_addr(&self) -> SocketAddr {
        self.raft_addr
    }

    /// Get a reference to the state machine for read-only queries.
    ///
    /// Reads are served locally and may lag the leader.
    pub fn state_machine(&self) -> &KvStateMachine {
        &self.state_machine
    }

    /// Get cluster metrics.
    pub fn metrics(&self) -> ClusterMetrics {
        self.raft.metrics().borrow().clone()
    }

    /// Ask the engine to build a snapshot now.
    pub async fn trigger_snapshot(&self) -> ClusterResult<()> {
        self.raft
            .trigger()
            .snapshot()
            .await
            .map_err(|e| ClusterError::Storage(e.to_string()))
    }

    /// A coordinator for join requests against this node.
    pub fn coordinator(self: &Arc<Self>) -> MembershipCoordinator<Arc<Self>> {
        MembershipCoordinator::new(Arc::clone(self), self.server.id.clone(), self.join_timeout)
    }

    /// Wait until the engine stops because of a fatal error.
    ///
    /// Resolves with [`Fatal::Stopped`] after a regular shutdown.
    pub async fn fatal_error(&self) -> Fatal {
        let mut metrics = self.raft.metrics();
        loop {
            let running = metrics.borrow().running_state.clone();
            if let Err(fatal) = running {
                return fatal;
            }
            if metrics.changed().await.is_err() {
                return metrics
                    .borrow()
                    .running_state
                    .clone()
                    .err()
                    .unwrap_or(Fatal::Stopped);
            }
        }
    }

    /// Stop the RPC server and the engine.
    pub async fn shutdown(&self) -> ClusterResult<()> {
        if let Some(tx) = self.shutdown_tx.lock().take() {
            let _ = tx.send(());
        }

        self.raft
            .shutdown()
            .await
            .map_err(|e| ClusterError::Storage(format!("shutdown error: {}", e)))?;

        tracing::info!(node_id = %self.server.id, "cluster node shutdown");
        Ok(())
    }
}

impl Drop for ClusterNode {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.lock().take() {
            let _ = tx.send(());
        }
    }
}

#[tonic::async_trait]
impl MembershipEngine for ClusterNode {
    async fn configuration(&self) -> ClusterResult<ClusterConfiguration> {
        let metrics = self.metrics();
        let membership = metrics.membership_config.membership();
        let voter_ids: BTreeSet<ClusterNodeId> = membership.voter_ids().collect();

        let mut voters = Vec::new();
        let mut learners = Vec::new();
        for (id, node) in membership.nodes() {
            let descriptor = ServerDescriptor::new(node.id.clone(), node.addr.clone());
            if voter_ids.contains(id) {
                voters.push(descriptor);
            } else {
                learners.push(descriptor);
            }
        }

        Ok(ClusterConfiguration::new(voters).with_learners(learners))
    }

    async fn remove_server(&self, id: &str, timeout: Duration) -> ClusterResult<()> {
        let target = node_key(id);
        let stored = self.metrics().membership_config;
        let membership = stored.membership();
        let is_voter = membership.voter_ids().any(|v| v == target);
        let is_node = membership.nodes().any(|(n, _)| *n == target);

        let change = if is_voter {
            ChangeMembers::RemoveVoters(BTreeSet::from([target]))
        } else if is_node {
            ChangeMembers::RemoveNodes(BTreeSet::from([target]))
        } else {
            return Ok(());
        };

        with_timeout("remove server", timeout, async {
            self.raft.change_membership(change, false).await?;
            Ok::<(), ClusterError>(())
        })
        .await
    }

    async fn add_voter(&self, id: &str, address: &str, timeout: Duration) -> ClusterResult<()> {
        let target = node_key(id);

        with_timeout("add voter", timeout, async {
            self.add_learner(id, address).await?;
            self.raft
                .change_membership(ChangeMembers::AddVoterIds(BTreeSet::from([target])), false)
                .await?;
            Ok::<(), ClusterError>(())
        })
        .await
    }

    fn is_leader(&self) -> bool {
        ClusterNode::is_leader(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::EncodedCommand;

    async fn bootstrapped(id: &str) -> ClusterNode {
        let config = ClusterConfig::builder()
            .node_id(id)
            .raft_addr("127.0.0.1:0")
            .http_addr("127.0.0.1:0")
            .election_timeout_ms(150, 300)
            .heartbeat_interval_ms(30)
            .build()
            .expect("config");
        let node = ClusterNode::start(config).await.expect("start");
        node.bootstrap().await.expect("bootstrap");
        node.raft
            .wait(Some(Duration::from_secs(10)))
            .state(ServerState::Leader, "single node becomes leader")
            .await
            .expect("leadership");
        node
    }

    #[tokio::test]
    async fn corrupt_committed_entry_stops_the_engine() {
        let node = bootstrapped("n1").await;
        node.propose(Command::set("a", "1")).await.expect("set");

        let raft = node.raft.clone();
        tokio::spawn(async move {
            let _ = raft
                .client_write(EncodedCommand::from_bytes(b"not a command".to_vec()))
                .await;
        });

        let fatal = tokio::time::timeout(Duration::from_secs(10), node.fatal_error())
            .await
            .expect("engine should stop");
        assert!(matches!(fatal, Fatal::StorageError(_)), "unexpected: {:?}", fatal);
        assert_eq!(node.state_machine().get("a").as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn regular_shutdown_reports_stopped() {
        let node = bootstrapped("n1").await;
        node.shutdown().await.expect("shutdown");

        let fatal = tokio::time::timeout(Duration::from_secs(5), node.fatal_error())
            .await
            .expect("engine should report its stop");
        assert!(matches!(fatal, Fatal::Stopped));
    }
}
