//! Network layer for Raft RPC communication.
//!
//! Peers talk to each other over the gRPC `RaftService` (see
//! `proto/raft.proto`) using tonic. The HTTP control plane is separate; see
//! [`crate::http`].

mod client;
mod server;

pub use client::NetworkClient;
pub use server::RaftServer;
