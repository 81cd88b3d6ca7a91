//! Cluster configuration.

use crate::error::ClusterError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a cluster node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// This node's id in the cluster. Must be unique among members.
    pub node_id: String,

    /// Address the Raft RPC server binds to (e.g., "0.0.0.0:9090").
    pub raft_addr: String,

    /// Raft address advertised to other nodes (e.g., "192.168.1.10:9090").
    /// If not set, uses raft_addr.
    pub advertise_addr: Option<String>,

    /// Address the HTTP control plane binds to.
    pub http_addr: String,

    /// Raft timing configuration.
    pub raft: RaftConfig,

    /// Snapshot configuration.
    pub snapshot: SnapshotConfig,

    /// Upper bound on each membership change made for a join, in milliseconds.
    pub join_timeout_ms: u64,
}

/// Raft timing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RaftConfig {
    /// Election timeout range (min, max) in milliseconds.
    /// A random value in this range is chosen for each election.
    pub election_timeout_ms: (u64, u64),

    /// Heartbeat interval in milliseconds.
    pub heartbeat_interval_ms: u64,

    /// Maximum entries per AppendEntries RPC.
    pub max_entries_per_append: u64,
}

/// Snapshot configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotConfig {
    /// Build a snapshot once this many entries were applied since the last one.
    pub snapshot_threshold: u64,

    /// Maximum number of log entries to keep after snapshot.
    pub max_log_entries: u64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            node_id: String::new(),
            raft_addr: "127.0.0.1:9090".to_string(),
            advertise_addr: None,
            http_addr: "127.0.0.1:8080".to_string(),
            raft: RaftConfig::default(),
            snapshot: SnapshotConfig::default(),
            join_timeout_ms: 10_000,
        }
    }
}

impl Default for RaftConfig {
    fn default() -> Self {
        Self {
            election_timeout_ms: (150, 300),
            heartbeat_interval_ms: 50,
            max_entries_per_append: 100,
        }
    }
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            snapshot_threshold: 10_000,
            // Keep up to 1000 entries after snapshot for catch-up
            max_log_entries: 1_000,
        }
    }
}

impl ClusterConfig {
    /// Create a new configuration builder.
    pub fn builder() -> ClusterConfigBuilder {
        ClusterConfigBuilder::default()
    }

    /// Get the advertised Raft address (falls back to raft_addr).
    pub fn advertise_addr(&self) -> &str {
        self.advertise_addr.as_deref().unwrap_or(&self.raft_addr)
    }

    /// Get the join timeout as a Duration.
    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }

    /// Translate into the engine's own configuration.
    pub fn to_openraft(&self) -> Result<openraft::Config, ClusterError> {
        let config = openraft::Config {
            cluster_name: "beacon".to_string(),
            election_timeout_min: self.raft.election_timeout_ms.0,
            election_timeout_max: self.raft.election_timeout_ms.1,
            heartbeat_interval: self.raft.heartbeat_interval_ms,
            max_payload_entries: self.raft.max_entries_per_append,
            snapshot_policy: openraft::SnapshotPolicy::LogsSinceLast(
                self.snapshot.snapshot_threshold,
            ),
            max_in_snapshot_log_to_keep: self.snapshot.max_log_entries,
            ..Default::default()
        };

        config
            .validate()
            .map_err(|e| ClusterError::Config(e.to_string()))
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ClusterError> {
        if self.node_id.is_empty() {
            return Err(ClusterError::Config("node_id is required".to_string()));
        }

        if self.raft_addr.is_empty() {
            return Err(ClusterError::Config("raft_addr is required".to_string()));
        }

        if self.http_addr.is_empty() {
            return Err(ClusterError::Config("http_addr is required".to_string()));
        }

        if self.advertise_addr.as_deref() == Some("") {
            return Err(ClusterError::Config(
                "advertise_addr must not be empty when set".to_string(),
            ));
        }

        let (min_election, max_election) = self.raft.election_timeout_ms;
        if min_election >= max_election {
            return Err(ClusterError::Config(format!(
                "election_timeout_ms range ({}, {}) is empty",
                min_election, max_election
            )));
        }

        // Heartbeat should be much less than election timeout
        if self.raft.heartbeat_interval_ms >= min_election / 2 {
            return Err(ClusterError::Config(format!(
                "heartbeat_interval_ms ({}) should be << election_timeout_ms ({})",
                self.raft.heartbeat_interval_ms, min_election
            )));
        }

        if self.join_timeout_ms == 0 {
            return Err(ClusterError::Config(
                "join_timeout_ms must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Builder for ClusterConfig.
#[derive(Debug, Default)]
pub struct ClusterConfigBuilder {
    config: ClusterConfig,
}

impl ClusterConfigBuilder {
    /// Set the node ID.
    pub fn node_id(mut self, id: impl Into<String>) -> Self {
        self.config.node_id = id.into();
        self
    }

    /// Set the Raft bind address.
    pub fn raft_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.raft_addr = addr.into();
        self
    }

    /// Set the advertised Raft address.
    pub fn advertise_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.advertise_addr = Some(addr.into());
        self
    }

    /// Set the HTTP bind address.
    pub fn http_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.http_addr = addr.into();
        self
    }

    /// Set election timeout range in milliseconds.
    pub fn election_timeout_ms(mut self, min: u64, max: u64) -> Self {
        self.config.raft.election_timeout_ms = (min, max);
        self
    }

    /// Set heartbeat interval in milliseconds.
    pub fn heartbeat_interval_ms(mut self, ms: u64) -> Self {
        self.config.raft.heartbeat_interval_ms = ms;
        self
    }

    /// Set snapshot threshold.
    pub fn snapshot_threshold(mut self, entries: u64) -> Self {
        self.config.snapshot.snapshot_threshold = entries;
        self
    }

    /// Set how many log entries survive compaction.
    pub fn max_log_entries(mut self, entries: u64) -> Self {
        self.config.snapshot.max_log_entries = entries;
        self
    }

    /// Set the join timeout.
    pub fn join_timeout(mut self, timeout: Duration) -> Self {
        self.config.join_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Build the configuration.
    pub fn build(self) -> Result<ClusterConfig, ClusterError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_applies_defaults() {
        let config = ClusterConfig::builder().node_id("n1").build().unwrap();
        assert_eq!(config.raft_addr, "127.0.0.1:9090");
        assert_eq!(config.http_addr, "127.0.0.1:8080");
        assert_eq!(config.advertise_addr(), "127.0.0.1:9090");
        assert_eq!(config.join_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn advertise_addr_overrides_bind_addr() {
        let config = ClusterConfig::builder()
            .node_id("n1")
            .raft_addr("0.0.0.0:9090")
            .advertise_addr("10.0.0.5:9090")
            .build()
            .unwrap();
        assert_eq!(config.advertise_addr(), "10.0.0.5:9090");
    }

    #[test]
    fn missing_node_id_is_rejected() {
        let err = ClusterConfig::builder().build().unwrap_err();
        assert!(matches!(err, ClusterError::Config(msg) if msg.contains("node_id")));
    }

    #[test]
    fn heartbeat_must_be_well_below_election_timeout() {
        let result = ClusterConfig::builder()
            .node_id("n1")
            .election_timeout_ms(100, 200)
            .heartbeat_interval_ms(80)
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn zero_join_timeout_is_rejected() {
        let result = ClusterConfig::builder()
            .node_id("n1")
            .join_timeout(Duration::ZERO)
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn engine_config_carries_timings() {
        let config = ClusterConfig::builder()
            .node_id("n1")
            .election_timeout_ms(300, 600)
            .heartbeat_interval_ms(100)
            .snapshot_threshold(50)
            .build()
            .unwrap();
        let raft = config.to_openraft().unwrap();
        assert_eq!(raft.election_timeout_min, 300);
        assert_eq!(raft.election_timeout_max, 600);
        assert_eq!(raft.heartbeat_interval, 100);
        assert_eq!(raft.max_in_snapshot_log_to_keep, 1_000);
    }
}
