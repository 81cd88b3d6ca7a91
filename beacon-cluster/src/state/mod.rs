//! Raft state machine implementation.
//!
//! The state machine receives committed log entries (encoded commands) and
//! applies them to an in-memory key-value store. All nodes apply the same
//! commands in the same order, ensuring consistent state.

mod machine;
mod snapshot;

pub use machine::{CommandResponse, KvStateMachine, StoredSnapshot};
pub use snapshot::SnapshotHandle;
