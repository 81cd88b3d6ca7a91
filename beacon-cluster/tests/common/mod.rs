//! Common test utilities for beacon-cluster tests.

use beacon_cluster::{ClusterConfig, ClusterNode, ControlPlaneServer, RunningControlPlane};
use std::sync::Arc;
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::{Duration, Instant};

/// Atomic counter for allocating unique ports.
static PORT_COUNTER: AtomicU16 = AtomicU16::new(15000);

/// Get a unique port for testing.
pub fn get_test_port() -> u16 {
    PORT_COUNTER.fetch_add(1, Ordering::SeqCst)
}

/// A running node with its control plane.
#[allow(dead_code)]
pub struct TestNode {
    /// The cluster node.
    pub node: Arc<ClusterNode>,
    /// HTTP control plane.
    pub http: Option<RunningControlPlane>,
    /// Raft address advertised to peers.
    pub raft_addr: String,
    /// Base URL of the control plane.
    pub url: String,
}

#[allow(dead_code)]
impl TestNode {
    /// Start a node with fast timings and serve its control plane.
    pub async fn start(id: &str) -> Self {
        let raft_addr = format!("127.0.0.1:{}", get_test_port());
        let http_addr = format!("127.0.0.1:{}", get_test_port());

        let config = ClusterConfig::builder()
            .node_id(id)
            .raft_addr(raft_addr.clone())
            .http_addr(http_addr.clone())
            .election_timeout_ms(300, 600)
            .heartbeat_interval_ms(50)
            .max_log_entries(0)
            .join_timeout(Duration::from_secs(5))
            .build()
            .expect("Invalid config");

        let node = Arc::new(
            ClusterNode::start(config)
                .await
                .expect("Failed to start node"),
        );
        let http = ControlPlaneServer::bind(&http_addr, Arc::new(node.coordinator()))
            .await
            .expect("Failed to bind control plane")
            .spawn();
        let url = format!("http://{}", http.local_addr());

        Self {
            node,
            http: Some(http),
            raft_addr,
            url,
        }
    }

    /// Start a node and bootstrap a single-node cluster on it.
    pub async fn bootstrap(id: &str) -> Self {
        let node = Self::start(id).await;
        node.node.bootstrap().await.expect("Failed to bootstrap");
        assert!(
            wait_for(Duration::from_secs(5), || node.node.is_leader()).await,
            "bootstrapped node never became leader"
        );
        node
    }

    /// GET / and return the body.
    pub async fn status(&self) -> String {
        reqwest::get(format!("{}/", self.url))
            .await
            .expect("GET / failed")
            .text()
            .await
            .expect("GET / body")
    }

    /// POST a raw body to /join and return the status code.
    pub async fn post_join(&self, body: &str) -> u16 {
        reqwest::Client::new()
            .post(format!("{}/join", self.url))
            .body(body.to_string())
            .send()
            .await
            .expect("POST /join failed")
            .status()
            .as_u16()
    }

    /// Ask this node to admit `other`.
    pub async fn admit(&self, other: &TestNode) -> u16 {
        let body = serde_json::json!({
            "id": other.node.node_id(),
            "addr": other.raft_addr,
        });
        self.post_join(&body.to_string()).await
    }

    /// Stop the control plane and the node.
    pub async fn shutdown(&mut self) {
        if let Some(http) = self.http.take() {
            http.shutdown().await;
        }
        let _ = self.node.shutdown().await;
    }
}

/// Poll `cond` until it holds or `timeout` elapses.
#[allow(dead_code)]
pub async fn wait_for(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    cond()
}
