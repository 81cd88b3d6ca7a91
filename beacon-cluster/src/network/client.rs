//! Network client implementing OpenRaft's RaftNetwork trait.

use crate::error::{ClusterError, RPCError};
use crate::proto::raft_service_client::RaftServiceClient;
use crate::proto::{AppendEntriesRequest, InstallSnapshotRequest, VoteRequest};
use crate::types::{ClusterNodeId, ServerNode, TypeConfig};
use openraft::error::{InstallSnapshotError, NetworkError, Unreachable};
use openraft::network::{RPCOption, RaftNetwork, RaftNetworkFactory};
use openraft::raft::{
    AppendEntriesRequest as RaftAppendRequest, AppendEntriesResponse as RaftAppendResponse,
    InstallSnapshotRequest as RaftSnapshotRequest, InstallSnapshotResponse as RaftSnapshotResponse,
    VoteRequest as RaftVoteRequest, VoteResponse as RaftVoteResponse,
};
use parking_lot::RwLock;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::Arc;
use tonic::transport::Channel;

/// Cached channel to one peer, remembered with the address it was dialed at.
#[derive(Clone)]
struct CachedChannel {
    addr: String,
    channel: Channel,
}

/// Factory for creating network connections to other nodes.
///
/// A server that rejoins under the same id with a new address gets a fresh
/// channel: the cache is keyed by engine id but checked against the address.
#[derive(Clone, Default)]
pub struct NetworkClient {
    /// Cached connections to other nodes.
    connections: Arc<RwLock<HashMap<ClusterNodeId, CachedChannel>>>,
}

impl NetworkClient {
    /// Create a new network client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or create a connection to a node.
    async fn get_connection(
        &self,
        target: ClusterNodeId,
        addr: &str,
    ) -> Result<Channel, ClusterError> {
        if let Some(cached) = self.connections.read().get(&target) {
            if cached.addr == addr {
                return Ok(cached.channel.clone());
            }
        }

        let channel = Channel::from_shared(format!("http://{}", addr))
            .map_err(|e| ClusterError::Config(e.to_string()))?
            .connect()
            .await?;

        self.connections.write().insert(
            target,
            CachedChannel {
                addr: addr.to_string(),
                channel: channel.clone(),
            },
        );

        Ok(channel)
    }

    /// Forget the channel to `target` so the next RPC redials.
    fn evict(&self, target: ClusterNodeId) {
        self.connections.write().remove(&target);
    }
}

impl RaftNetworkFactory<TypeConfig> for NetworkClient {
    type Network = NetworkConnection;

    async fn new_client(&mut self, target: ClusterNodeId, node: &ServerNode) -> Self::Network {
        NetworkConnection {
            target,
            node: node.clone(),
            client: self.clone(),
        }
    }
}

/// A connection to a specific node.
pub struct NetworkConnection {
    /// Target engine id.
    target: ClusterNodeId,
    /// Target membership record.
    node: ServerNode,
    /// Reference to the client factory.
    client: NetworkClient,
}

impl NetworkConnection {
    async fn connect(&self) -> Result<RaftServiceClient<Channel>, RpcFailure> {
        let channel = self
            .client
            .get_connection(self.target, &self.node.addr)
            .await
            .map_err(|e| {
                tracing::debug!(peer = %self.node, error = %e, "peer unreachable");
                RpcFailure::Unreachable(e)
            })?;
        Ok(RaftServiceClient::new(channel))
    }

    fn request<T>(
        &self,
        msg: &impl Serialize,
        option: &RPCOption,
    ) -> Result<tonic::Request<T>, RpcFailure>
    where
        T: From<Vec<u8>>,
    {
        let data = serde_json::to_vec(msg).map_err(|e| RpcFailure::Network(e.into()))?;
        let mut request = tonic::Request::new(T::from(data));
        request.set_timeout(option.hard_ttl());
        Ok(request)
    }

    fn on_status(&self, status: tonic::Status) -> RpcFailure {
        if status.code() == tonic::Code::Unavailable {
            self.client.evict(self.target);
            RpcFailure::Unreachable(status.into())
        } else {
            RpcFailure::Network(status.into())
        }
    }
}

impl From<Vec<u8>> for AppendEntriesRequest {
    fn from(data: Vec<u8>) -> Self {
        Self { data }
    }
}

impl From<Vec<u8>> for VoteRequest {
    fn from(data: Vec<u8>) -> Self {
        Self { data }
    }
}

impl From<Vec<u8>> for InstallSnapshotRequest {
    fn from(data: Vec<u8>) -> Self {
        Self { data }
    }
}

impl RaftNetwork<TypeConfig> for NetworkConnection {
    async fn append_entries(
        &mut self,
        req: RaftAppendRequest<TypeConfig>,
        option: RPCOption,
    ) -> Result<RaftAppendResponse<ClusterNodeId>, RPCError> {
        let mut client = self.connect().await?;
        let request = self.request::<AppendEntriesRequest>(&req, &option)?;

        let response = client
            .append_entries(request)
            .await
            .map_err(|s| self.on_status(s))?;

        Ok(decode(&response.into_inner().data)?)
    }

    async fn install_snapshot(
        &mut self,
        req: RaftSnapshotRequest<TypeConfig>,
        option: RPCOption,
    ) -> Result<RaftSnapshotResponse<ClusterNodeId>, RPCError<InstallSnapshotError>> {
        let mut client = self.connect().await?;
        let request = self.request::<InstallSnapshotRequest>(&req, &option)?;

        let response = client
            .install_snapshot(request)
            .await
            .map_err(|s| self.on_status(s))?;

        Ok(decode(&response.into_inner().data)?)
    }

    async fn vote(
        &mut self,
        req: RaftVoteRequest<ClusterNodeId>,
        option: RPCOption,
    ) -> Result<RaftVoteResponse<ClusterNodeId>, RPCError> {
        let mut client = self.connect().await?;
        let request = self.request::<VoteRequest>(&req, &option)?;

        let response = client
            .request_vote(request)
            .await
            .map_err(|s| self.on_status(s))?;

        Ok(decode(&response.into_inner().data)?)
    }
}

/// Why an RPC to a peer did not produce a response.
#[derive(Debug)]
enum RpcFailure {
    /// The peer could not be reached; openraft backs off before retrying.
    Unreachable(ClusterError),
    /// The exchange failed after reaching the peer.
    Network(ClusterError),
}

impl<E: std::error::Error> From<RpcFailure> for RPCError<E> {
    fn from(failure: RpcFailure) -> Self {
        match failure {
            RpcFailure::Unreachable(e) => {
                openraft::error::RPCError::Unreachable(Unreachable::new(&e))
            }
            RpcFailure::Network(e) => openraft::error::RPCError::Network(NetworkError::new(&e)),
        }
    }
}

fn decode<T: DeserializeOwned>(data: &[u8]) -> Result<T, RpcFailure> {
    serde_json::from_slice(data).map_err(|e| RpcFailure::Network(e.into()))
}
