//! Single-node cluster tests.
//!
//! Tests basic cluster operations with a single node.

mod common;

use beacon_cluster::{ClusterConfig, ClusterError, ClusterNode, Command, ControlPlaneServer};
use common::TestNode;
use std::collections::HashMap;
use std::sync::Arc;

/// Test that a bootstrapped node leads and says so over HTTP.
#[tokio::test]
async fn test_single_node_bootstrap_and_status() {
    let mut node = TestNode::bootstrap("n1").await;

    assert!(node.node.is_leader());
    let leader = node.node.leader().expect("leader known");
    assert_eq!(leader.id, "n1");
    assert_eq!(leader.address, node.raft_addr);

    assert_eq!(node.status().await, "I am server n1.\n");

    node.shutdown().await;
}

/// A node that was never bootstrapped or admitted is not the leader.
#[tokio::test]
async fn test_unjoined_node_is_not_leader() {
    let mut node = TestNode::start("lonely").await;

    assert!(!node.node.is_leader());
    assert_eq!(node.status().await, "I am not the leader.\n");

    node.shutdown().await;
}

/// Scenario: set a, set b, delete a leaves only b.
#[tokio::test]
async fn test_single_node_set_and_delete() {
    let mut node = TestNode::bootstrap("n1").await;

    let resp = node
        .node
        .propose(Command::set("a", "1"))
        .await
        .expect("set a");
    assert_eq!(resp.previous, None);

    node.node
        .propose(Command::set("b", "2"))
        .await
        .expect("set b");

    let resp = node
        .node
        .propose(Command::delete("a"))
        .await
        .expect("delete a");
    assert_eq!(resp.previous.as_deref(), Some("1"));

    assert_eq!(
        node.node.state_machine().entries(),
        HashMap::from([("b".to_string(), "2".to_string())])
    );

    node.shutdown().await;
}

/// Deleting a key that was never set succeeds and changes nothing.
#[tokio::test]
async fn test_delete_absent_key() {
    let mut node = TestNode::bootstrap("n1").await;

    node.node
        .propose(Command::set("keep", "me"))
        .await
        .expect("set");
    let resp = node
        .node
        .propose(Command::delete("missing"))
        .await
        .expect("delete");
    assert_eq!(resp.previous, None);
    assert_eq!(node.node.state_machine().len(), 1);

    node.shutdown().await;
}

/// Proposals on a node outside any cluster are rejected.
#[tokio::test]
async fn test_propose_without_leadership_fails() {
    let mut node = TestNode::start("n1").await;

    let err = node
        .node
        .propose(Command::set("a", "1"))
        .await
        .expect_err("proposal must fail");
    assert!(matches!(err, ClusterError::NotLeader { .. }), "got {:?}", err);

    node.shutdown().await;
}

/// Triggering a snapshot captures the applied state.
#[tokio::test]
async fn test_trigger_snapshot() {
    let mut node = TestNode::bootstrap("n1").await;

    for i in 0..10 {
        node.node
            .propose(Command::set(format!("k{}", i), i.to_string()))
            .await
            .expect("set");
    }

    node.node.trigger_snapshot().await.expect("trigger");

    let built = common::wait_for(std::time::Duration::from_secs(5), || {
        node.node.metrics().snapshot.is_some()
    })
    .await;
    assert!(built, "snapshot was not built");
    assert_eq!(node.node.state_machine().snapshot().len(), 10);

    node.shutdown().await;
}

/// Joining the exact current pair is a no-op that still returns 200.
#[tokio::test]
async fn test_rejoin_self_is_idempotent() {
    let mut node = TestNode::bootstrap("n1").await;

    let body = serde_json::json!({"id": "n1", "addr": node.raft_addr}).to_string();
    assert_eq!(node.post_join(&body).await, 200);
    assert_eq!(node.post_join(&body).await, 200);
    assert!(node.node.is_leader());

    node.shutdown().await;
}

/// Scenario: a join body without addr is rejected.
#[tokio::test]
async fn test_join_missing_addr_is_bad_request() {
    let mut node = TestNode::bootstrap("n1").await;

    assert_eq!(node.post_join(r#"{"id":"n2"}"#).await, 400);
    assert_eq!(node.post_join("garbage").await, 400);

    node.shutdown().await;
}

/// Binding an address that is already in use fails at startup.
#[tokio::test]
async fn test_control_plane_bind_conflict() {
    let mut node = TestNode::start("n1").await;
    let taken = node.url.trim_start_matches("http://").to_string();

    let result = ControlPlaneServer::bind(&taken, Arc::new(node.node.coordinator())).await;
    assert!(matches!(result, Err(ClusterError::Io(_))));

    node.shutdown().await;
}

/// Starting on an unusable Raft address fails.
#[tokio::test]
async fn test_raft_bind_conflict() {
    let mut first = TestNode::start("n1").await;

    let config = ClusterConfig::builder()
        .node_id("n2")
        .raft_addr(first.raft_addr.clone())
        .build()
        .expect("Invalid config");
    assert!(ClusterNode::start(config).await.is_err());

    first.shutdown().await;
}
