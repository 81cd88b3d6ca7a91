//! Node lifecycle: start, join or bootstrap, serve until told to stop.

use crate::join::join_cluster;
use anyhow::{Context, Result, bail};
use beacon_cluster::{ClusterConfig, ClusterNode, ControlPlaneServer};
use std::sync::Arc;

/// How the process should end.
enum Exit {
    /// Ctrl-C was received.
    Interrupted,
    /// The consensus engine stopped on its own.
    Fatal(beacon_cluster::Fatal),
}

/// Run a node until Ctrl-C or a fatal engine error.
///
/// Without `join` the node bootstraps a single-node cluster; with it, the node
/// asks the member at that HTTP address to admit it.
pub async fn run(config: ClusterConfig, join: Option<String>) -> Result<()> {
    let node_id = config.node_id.clone();

    let node = Arc::new(
        ClusterNode::start(config.clone())
            .await
            .context("Failed to open cluster")?,
    );

    let http = ControlPlaneServer::bind(&config.http_addr, Arc::new(node.coordinator()))
        .await
        .with_context(|| format!("Failed to start HTTP service on {}", config.http_addr))?
        .spawn();

    match &join {
        None => node
            .bootstrap()
            .await
            .context("Failed to bootstrap cluster")?,
        Some(join_addr) => join_cluster(
            join_addr,
            &node_id,
            config.advertise_addr(),
            config.join_timeout(),
        )
        .await
        .with_context(|| format!("Failed to join cluster at {}", join_addr))?,
    }

    tracing::info!(
        node_id = %node_id,
        http = %http.local_addr(),
        raft = %node.raft_addr(),
        "Node {} started successfully",
        node_id
    );

    let exit = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for Ctrl-C")?;
            Exit::Interrupted
        }
        fatal = node.fatal_error() => Exit::Fatal(fatal),
    };

    match exit {
        Exit::Interrupted => {
            tracing::info!(node_id = %node_id, "Node {} exiting...", node_id);
            http.shutdown().await;
            node.shutdown().await.context("Failed to shut down node")?;
            Ok(())
        }
        Exit::Fatal(fatal) => {
            tracing::error!(node_id = %node_id, error = %fatal, "consensus engine stopped");
            http.shutdown().await;
            bail!("node {} stopped: {}", node_id, fatal)
        }
    }
}
