//! Trait implementations for OpenRaft integration.

use crate::types::{
    ClusterLogId, ClusterSnapshot, ClusterSnapshotMeta, ClusterStorageError,
    ClusterStoredMembership, TypeConfig,
};
use openraft::storage::RaftStateMachine;
use openraft::{
    EntryPayload, RaftSnapshotBuilder, RaftTypeConfig, StorageIOError, StoredMembership,
};
use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use super::KvStateMachine;
use super::types::{CommandResponse, StoredSnapshot};

/// Implementation of OpenRaft's snapshot builder interface.
///
/// Builds a consistent snapshot of the store for log compaction and state
/// transfer to new nodes.
impl RaftSnapshotBuilder<TypeConfig> for Arc<KvStateMachine> {
    async fn build_snapshot(&mut self) -> Result<ClusterSnapshot, ClusterStorageError> {
        let (handle, last_applied_log, last_membership) = {
            let applied = self.applied.lock();
            (
                self.snapshot(),
                applied.last_applied_log,
                applied.last_membership.clone(),
            )
        };

        let data = handle
            .to_bytes()
            .map_err(|e| StorageIOError::read_state_machine(&e))?;

        let snapshot_idx = self.snapshot_idx.fetch_add(1, Ordering::Relaxed) + 1;
        let snapshot_id = if let Some(last) = last_applied_log {
            format!("{}-{}-{}", last.leader_id, last.index, snapshot_idx)
        } else {
            format!("--{}", snapshot_idx)
        };

        let meta = ClusterSnapshotMeta {
            last_log_id: last_applied_log,
            last_membership,
            snapshot_id,
        };

        tracing::info!(
            snapshot_id = %meta.snapshot_id,
            keys = handle.len(),
            bytes = data.len(),
            "built snapshot"
        );

        *self.current_snapshot.lock() = Some(StoredSnapshot {
            meta: meta.clone(),
            data: data.clone(),
        });

        Ok(ClusterSnapshot {
            meta,
            snapshot: Box::new(Cursor::new(data)),
        })
    }
}

/// Implementation of OpenRaft's state machine interface.
///
/// Applies committed log entries to the store deterministically. A command
/// that fails to decode stops the engine: the returned storage error is fatal
/// to openraft, and the node's supervisor exits the process.
impl RaftStateMachine<TypeConfig> for Arc<KvStateMachine> {
    type SnapshotBuilder = Self;

    async fn applied_state(
        &mut self,
    ) -> Result<(Option<ClusterLogId>, ClusterStoredMembership), ClusterStorageError> {
        let applied = self.applied.lock();
        Ok((applied.last_applied_log, applied.last_membership.clone()))
    }

    async fn apply<I>(&mut self, entries: I) -> Result<Vec<CommandResponse>, ClusterStorageError>
    where
        I: IntoIterator<Item = openraft::Entry<TypeConfig>> + Send,
    {
        let sm: &KvStateMachine = self;
        let mut responses = Vec::new();
        let mut applied = sm.applied.lock();

        for entry in entries {
            tracing::debug!(%entry.log_id, "applying to state machine");

            match entry.payload {
                EntryPayload::Blank => {
                    responses.push(CommandResponse::default());
                }
                EntryPayload::Normal(cmd) => match sm.apply(cmd.as_bytes()) {
                    Ok(resp) => responses.push(resp),
                    Err(e) => {
                        tracing::error!(
                            log_id = %entry.log_id,
                            error = %e,
                            "committed entry cannot be applied"
                        );
                        return Err(StorageIOError::apply(entry.log_id, &e).into());
                    }
                },
                EntryPayload::Membership(membership) => {
                    applied.last_membership = StoredMembership::new(Some(entry.log_id), membership);
                    responses.push(CommandResponse::default());
                }
            }

            applied.last_applied_log = Some(entry.log_id);
        }

        Ok(responses)
    }

    async fn get_snapshot_builder(&mut self) -> Self::SnapshotBuilder {
        Arc::clone(self)
    }

    async fn begin_receiving_snapshot(
        &mut self,
    ) -> Result<Box<<TypeConfig as RaftTypeConfig>::SnapshotData>, ClusterStorageError> {
        Ok(Box::new(Cursor::new(Vec::new())))
    }

    async fn install_snapshot(
        &mut self,
        meta: &ClusterSnapshotMeta,
        snapshot: Box<<TypeConfig as RaftTypeConfig>::SnapshotData>,
    ) -> Result<(), ClusterStorageError> {
        tracing::info!(
            snapshot_id = %meta.snapshot_id,
            snapshot_size = snapshot.get_ref().len(),
            "installing snapshot"
        );

        let new_snapshot = StoredSnapshot {
            meta: meta.clone(),
            data: snapshot.into_inner(),
        };

        {
            let mut applied = self.applied.lock();
            self.restore(&new_snapshot.data).map_err(|e| {
                tracing::error!(error = %e, "snapshot cannot be restored");
                StorageIOError::read_snapshot(Some(new_snapshot.meta.signature()), &e)
            })?;
            applied.last_applied_log = meta.last_log_id;
            applied.last_membership = meta.last_membership.clone();
        }

        *self.current_snapshot.lock() = Some(new_snapshot);
        Ok(())
    }

    async fn get_current_snapshot(
        &mut self,
    ) -> Result<Option<ClusterSnapshot>, ClusterStorageError> {
        match &*self.current_snapshot.lock() {
            Some(snapshot) => {
                let data = snapshot.data.clone();
                Ok(Some(ClusterSnapshot {
                    meta: snapshot.meta.clone(),
                    snapshot: Box::new(Cursor::new(data)),
                }))
            }
            None => Ok(None),
        }
    }
}
