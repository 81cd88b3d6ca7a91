//! gRPC server for handling Raft RPC requests.

use crate::proto::raft_service_server::RaftService;
use crate::proto::{
    AppendEntriesRequest, AppendEntriesResponse, InstallSnapshotRequest, InstallSnapshotResponse,
    VoteRequest, VoteResponse,
};
use crate::types::ClusterRaft;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt::Display;
use tonic::{Request, Response, Status};

/// gRPC server implementation for Raft RPC.
///
/// Every message is a JSON-encoded openraft request; the server decodes it,
/// hands it to the local engine and encodes the engine's answer.
#[derive(Clone)]
pub struct RaftServer {
    /// The local Raft instance.
    raft: ClusterRaft,
}

impl RaftServer {
    /// Create a new Raft server.
    pub fn new(raft: ClusterRaft) -> Self {
        Self { raft }
    }
}

fn decode_request<T: DeserializeOwned>(data: &[u8]) -> Result<T, Status> {
    serde_json::from_slice(data).map_err(|e| Status::invalid_argument(e.to_string()))
}

fn encode_response<T: Serialize>(resp: &T) -> Result<Vec<u8>, Status> {
    serde_json::to_vec(resp).map_err(|e| Status::internal(e.to_string()))
}

fn engine_status(rpc: &'static str, err: impl Display) -> Status {
    tracing::debug!(rpc, error = %err, "raft rpc rejected by engine");
    Status::internal(err.to_string())
}

#[tonic::async_trait]
impl RaftService for RaftServer {
    async fn append_entries(
        &self,
        request: Request<AppendEntriesRequest>,
    ) -> Result<Response<AppendEntriesResponse>, Status> {
        let req = decode_request(&request.into_inner().data)?;

        let resp = self
            .raft
            .append_entries(req)
            .await
            .map_err(|e| engine_status("append_entries", e))?;

        Ok(Response::new(AppendEntriesResponse {
            data: encode_response(&resp)?,
        }))
    }

    async fn request_vote(
        &self,
        request: Request<VoteRequest>,
    ) -> Result<Response<VoteResponse>, Status> {
        let req = decode_request(&request.into_inner().data)?;

        let resp = self
            .raft
            .vote(req)
            .await
            .map_err(|e| engine_status("vote", e))?;

        Ok(Response::new(VoteResponse {
            data: encode_response(&resp)?,
        }))
    }

    async fn install_snapshot(
        &self,
        request: Request<InstallSnapshotRequest>,
    ) -> Result<Response<InstallSnapshotResponse>, Status> {
        let req = decode_request(&request.into_inner().data)?;

        let resp = self
            .raft
            .install_snapshot(req)
            .await
            .map_err(|e| engine_status("install_snapshot", e))?;

        Ok(Response::new(InstallSnapshotResponse {
            data: encode_response(&resp)?,
        }))
    }
}
