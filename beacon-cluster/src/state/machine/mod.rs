//! Raft state machine for the replicated key-value store.
//!
//! The state machine is the core of the cluster's replicated state. It:
//! - Receives committed log entries (encoded commands)
//! - Applies them deterministically to produce consistent state
//! - Supports snapshots for log compaction and state transfer
//!
//! ## Module Structure
//!
//! - `types`: Response type and stored snapshot
//! - `apply`: Command application logic
//! - `traits`: OpenRaft trait implementations
//!
//! ## Locking
//!
//! The store sits behind its own mutex, covering set, delete and the copy
//! phase of a snapshot. Log position and membership sit behind a second mutex
//! that `apply` holds across a whole batch, so a snapshot built concurrently
//! pairs a store copy with the exact log id it reflects. Lock order is always
//! applied-state first, then store. No lock is held across an await.

mod apply;
mod traits;
mod types;

pub use types::{CommandResponse, StoredSnapshot};

use crate::command::Command;
use crate::error::ApplyError;
use crate::state::snapshot::{self, SnapshotHandle};
use crate::types::{ClusterLogId, ClusterStoredMembership};
use apply::apply_command;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::AtomicU64;

/// The replicated key-value mapping.
pub(crate) type KvStore = HashMap<String, String>;

/// Engine bookkeeping kept next to the store.
#[derive(Debug, Default)]
struct AppliedState {
    /// Last applied log ID.
    last_applied_log: Option<ClusterLogId>,
    /// Last membership configuration.
    last_membership: ClusterStoredMembership,
}

/// The Raft state machine.
///
/// Constructed once per node and shared (via `Arc`) between the consensus
/// engine and the node handle. The store is only ever mutated by [`apply`]
/// and [`restore`].
///
/// [`apply`]: KvStateMachine::apply
/// [`restore`]: KvStateMachine::restore
#[derive(Debug, Default)]
pub struct KvStateMachine {
    /// The replicated store.
    store: Mutex<KvStore>,
    /// Log position and membership of the last applied entry.
    applied: Mutex<AppliedState>,
    /// Snapshot index counter.
    snapshot_idx: AtomicU64,
    /// Current snapshot.
    current_snapshot: Mutex<Option<StoredSnapshot>>,
}

impl KvStateMachine {
    /// Create a new state machine with an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode and apply one committed command.
    ///
    /// A decode failure or an unknown operation is returned as an
    /// [`ApplyError`]; callers must treat it as fatal.
    pub fn apply(&self, command: &[u8]) -> Result<CommandResponse, ApplyError> {
        let cmd = Command::decode(command)?;
        let mut store = self.store.lock();
        Ok(apply_command(&mut store, cmd))
    }

    /// Copy the store under the lock and return the copy.
    pub fn snapshot(&self) -> SnapshotHandle {
        let copy = self.store.lock().clone();
        SnapshotHandle::new(copy)
    }

    /// Replace the whole store with the mapping in `data`.
    ///
    /// The store is left untouched if `data` does not decode.
    pub fn restore(&self, data: &[u8]) -> Result<(), ApplyError> {
        let restored = snapshot::decode(data).map_err(|e| ApplyError::decode("snapshot", e))?;
        *self.store.lock() = restored;
        Ok(())
    }

    /// Local read of a single key.
    ///
    /// Reads are served from this replica and may lag the leader.
    pub fn get(&self, key: &str) -> Option<String> {
        self.store.lock().get(key).cloned()
    }

    /// Number of keys in the store.
    pub fn len(&self) -> usize {
        self.store.lock().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.store.lock().is_empty()
    }

    /// A copy of every key-value pair.
    pub fn entries(&self) -> HashMap<String, String> {
        self.store.lock().clone()
    }

    /// Log id of the last applied entry, if any.
    pub fn last_applied_log(&self) -> Option<ClusterLogId> {
        self.applied.lock().last_applied_log
    }
}
