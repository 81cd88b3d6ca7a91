//! Asking an existing member to admit this node.

use anyhow::{Context, Result, bail};
use std::time::Duration;

/// Slack for the HTTP exchange around the leader's configuration changes.
const REQUEST_MARGIN: Duration = Duration::from_secs(5);

/// How long to wait for the leader to answer a join.
///
/// The leader bounds each configuration change by `join_timeout` and a join
/// makes at most three of them: one removal per conflicting id or address,
/// then the addition.
pub fn request_timeout(join_timeout: Duration) -> Duration {
    join_timeout.saturating_mul(3).saturating_add(REQUEST_MARGIN)
}

/// Ask the node whose control plane listens on `join_addr` to admit this
/// node as a voter.
///
/// `raft_addr` is the address peers will dial for Raft RPC. `join_timeout` is
/// the cluster's per-change deadline. Any non-2xx answer is an error.
pub async fn join_cluster(
    join_addr: &str,
    node_id: &str,
    raft_addr: &str,
    join_timeout: Duration,
) -> Result<()> {
    let url = format!("http://{}/join", join_addr);
    let body = serde_json::json!({
        "id": node_id,
        "addr": raft_addr,
    });

    tracing::info!(url = %url, node_id, addr = raft_addr, "requesting to join cluster");

    let response = reqwest::Client::builder()
        .timeout(request_timeout(join_timeout))
        .build()
        .context("Failed to build HTTP client")?
        .post(&url)
        .json(&body)
        .send()
        .await
        .with_context(|| format!("Failed to contact {}", url))?;

    let status = response.status();
    if !status.is_success() {
        bail!("join request to {} was rejected with {}", url, status);
    }

    Ok(())
}
