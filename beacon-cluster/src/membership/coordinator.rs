//! Join handling.

use super::{ClusterConfiguration, MembershipEngine, ServerDescriptor};
use crate::error::ClusterResult;
use std::time::Duration;

/// What a join request requires of the current configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinPlan {
    /// The exact (id, address) pair is already a voter.
    AlreadyMember,
    /// Remove every conflicting member, then add the new voter.
    Reconfigure {
        /// Ids of members sharing the new id or the new address.
        remove: Vec<String>,
        /// The voter to add.
        add: ServerDescriptor,
    },
}

/// Decide how to admit `id` at `address` into `config`.
///
/// A member conflicts when it has the same id (the server moved) or the same
/// address (a different server took over the address). A learner at exactly
/// `(id, address)` is not a conflict; adding it as a voter promotes it.
pub fn plan_join(config: &ClusterConfiguration, id: &str, address: &str) -> JoinPlan {
    if config.contains(id, address) {
        return JoinPlan::AlreadyMember;
    }

    let remove = config
        .members()
        .filter(|s| s.id == id || s.address == address)
        .filter(|s| !(s.id == id && s.address == address))
        .map(|s| s.id.clone())
        .collect();

    JoinPlan::Reconfigure {
        remove,
        add: ServerDescriptor::new(id, address),
    }
}

/// Admits servers into the cluster on behalf of the control plane.
///
/// Removals run before the addition, each as its own configuration change.
/// If the addition fails after a removal succeeded, the cluster is left with
/// neither the old nor the new member until the joiner retries.
#[derive(Debug, Clone)]
pub struct MembershipCoordinator<E> {
    engine: E,
    node_id: String,
    timeout: Duration,
}

impl<E: MembershipEngine> MembershipCoordinator<E> {
    /// Create a coordinator for the local node `node_id`.
    ///
    /// `timeout` bounds every configuration change a join makes.
    pub fn new(engine: E, node_id: impl Into<String>, timeout: Duration) -> Self {
        Self {
            engine,
            node_id: node_id.into(),
            timeout,
        }
    }

    /// Admit `id` at `address` as a voter.
    ///
    /// Succeeds without touching the configuration when the pair is already a
    /// voter. The first failing change aborts the join.
    pub async fn join(&self, id: &str, address: &str) -> ClusterResult<()> {
        tracing::info!(node_id = %id, addr = %address, "received join request");

        let config = self.engine.configuration().await?;
        let (remove, add) = match plan_join(&config, id, address) {
            JoinPlan::AlreadyMember => {
                tracing::info!(
                    node_id = %id,
                    addr = %address,
                    "already member of cluster, ignoring join request"
                );
                return Ok(());
            }
            JoinPlan::Reconfigure { remove, add } => (remove, add),
        };

        for existing in &remove {
            tracing::info!(node_id = %existing, "removing conflicting server");
            self.engine
                .remove_server(existing, self.timeout)
                .await
                .inspect_err(|e| {
                    tracing::warn!(node_id = %existing, error = %e, "failed to remove server")
                })?;
        }

        self.engine
            .add_voter(&add.id, &add.address, self.timeout)
            .await
            .inspect_err(|e| tracing::warn!(node_id = %id, error = %e, "failed to add voter"))?;

        tracing::info!(node_id = %id, addr = %address, "joined successfully");
        Ok(())
    }

    /// Whether the local node is the leader.
    pub fn is_leader(&self) -> bool {
        self.engine.is_leader()
    }

    /// The local node's id.
    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    /// The engine this coordinator drives.
    pub fn engine(&self) -> &E {
        &self.engine
    }
}
