//! Cluster membership: who the voters are and how a new server gets in.
//!
//! The [`MembershipCoordinator`] turns a join request into configuration
//! changes. It talks to the consensus engine only through the
//! [`MembershipEngine`] trait, so the conflict rules can be exercised against
//! an in-memory fake.

mod coordinator;

pub use coordinator::{JoinPlan, MembershipCoordinator, plan_join};

use crate::error::{ClusterError, ClusterResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// A voting member of the cluster.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServerDescriptor {
    /// Server id, unique within a configuration.
    pub id: String,
    /// Raft address, unique within a configuration.
    pub address: String,
}

impl ServerDescriptor {
    /// Create a descriptor.
    pub fn new(id: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            address: address.into(),
        }
    }
}

impl fmt::Display for ServerDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.id, self.address)
    }
}

/// The servers the engine currently considers members.
///
/// Voters and learners are kept apart: a learner is a server whose admission
/// was interrupted before it gained a vote.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterConfiguration {
    voters: Vec<ServerDescriptor>,
    learners: Vec<ServerDescriptor>,
}

impl ClusterConfiguration {
    /// Build a configuration from its voters.
    pub fn new(voters: impl IntoIterator<Item = ServerDescriptor>) -> Self {
        Self {
            voters: voters.into_iter().collect(),
            learners: Vec::new(),
        }
    }

    /// Add non-voting members.
    pub fn with_learners(mut self, learners: impl IntoIterator<Item = ServerDescriptor>) -> Self {
        self.learners.extend(learners);
        self
    }

    /// Voting members.
    pub fn servers(&self) -> &[ServerDescriptor] {
        &self.voters
    }

    /// Non-voting members.
    pub fn learners(&self) -> &[ServerDescriptor] {
        &self.learners
    }

    /// Every member, voters first.
    pub fn members(&self) -> impl Iterator<Item = &ServerDescriptor> {
        self.voters.iter().chain(self.learners.iter())
    }

    /// Whether a voter with exactly this id and address exists.
    pub fn contains(&self, id: &str, address: &str) -> bool {
        self.voters
            .iter()
            .any(|s| s.id == id && s.address == address)
    }

    /// Whether a learner with exactly this id and address exists.
    pub fn is_learner(&self, id: &str, address: &str) -> bool {
        self.learners
            .iter()
            .any(|s| s.id == id && s.address == address)
    }

    /// Number of voters.
    pub fn len(&self) -> usize {
        self.voters.len()
    }

    /// Whether the configuration has no voters.
    pub fn is_empty(&self) -> bool {
        self.voters.is_empty()
    }
}

/// Configuration-change primitives the coordinator needs from the engine.
///
/// Implementations must bound `remove_server` and `add_voter` by the timeout
/// they are given and report an elapsed deadline as
/// [`ClusterError::Timeout`].
#[tonic::async_trait]
pub trait MembershipEngine: Send + Sync {
    /// The current cluster configuration.
    async fn configuration(&self) -> ClusterResult<ClusterConfiguration>;

    /// Remove the member with the given id.
    async fn remove_server(&self, id: &str, timeout: Duration) -> ClusterResult<()>;

    /// Add a voting member.
    async fn add_voter(&self, id: &str, address: &str, timeout: Duration) -> ClusterResult<()>;

    /// Whether the local node currently holds leadership.
    fn is_leader(&self) -> bool;
}

#[tonic::async_trait]
impl<E: MembershipEngine + ?Sized> MembershipEngine for Arc<E> {
    async fn configuration(&self) -> ClusterResult<ClusterConfiguration> {
        (**self).configuration().await
    }

    async fn remove_server(&self, id: &str, timeout: Duration) -> ClusterResult<()> {
        (**self).remove_server(id, timeout).await
    }

    async fn add_voter(&self, id: &str, address: &str, timeout: Duration) -> ClusterResult<()> {
        (**self).add_voter(id, address, timeout).await
    }

    fn is_leader(&self) -> bool {
        (**self).is_leader()
    }
}

/// Run `fut`, failing with [`ClusterError::Timeout`] once `timeout` elapses.
pub(crate) async fn with_timeout<T>(
    operation: &'static str,
    timeout: Duration,
    fut: impl Future<Output = ClusterResult<T>>,
) -> ClusterResult<T> {
    tokio::time::timeout(timeout, fut)
        .await
        .map_err(|_| ClusterError::Timeout { operation, timeout })?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contains_requires_both_fields() {
        let config = ClusterConfiguration::new([ServerDescriptor::new("n1", "a:1")]);
        assert!(config.contains("n1", "a:1"));
        assert!(!config.contains("n1", "a:2"));
        assert!(!config.contains("n2", "a:1"));
    }

    #[test]
    fn learners_are_members_but_not_voters() {
        let config = ClusterConfiguration::new([ServerDescriptor::new("n1", "a:1")])
            .with_learners([ServerDescriptor::new("n2", "b:1")]);
        assert!(!config.contains("n2", "b:1"));
        assert!(config.is_learner("n2", "b:1"));
        assert!(!config.is_learner("n1", "a:1"));
        assert_eq!(config.len(), 1);
        assert_eq!(config.members().count(), 2);
    }

    #[tokio::test]
    async fn elapsed_deadline_becomes_timeout_error() {
        let err = with_timeout("add voter", Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            ClusterError::Timeout {
                operation: "add voter",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn inner_errors_pass_through() {
        let err = with_timeout::<()>("remove server", Duration::from_secs(1), async {
            Err(ClusterError::Membership("rejected".to_string()))
        })
        .await
        .unwrap_err();
        assert!(matches!(err, ClusterError::Membership(_)));
    }
}
