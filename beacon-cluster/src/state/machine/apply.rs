//! Command application logic.

use crate::command::{Command, Operation};

use super::KvStore;
use super::types::CommandResponse;

/// Apply a decoded command to the store.
///
/// Neither operation can fail: set always succeeds and deleting an absent key
/// is a no-op.
pub(super) fn apply_command(store: &mut KvStore, cmd: Command) -> CommandResponse {
    match cmd.op {
        Operation::Set => apply_set(store, cmd.key, cmd.value),
        Operation::Delete => apply_delete(store, &cmd.key),
    }
}

fn apply_set(store: &mut KvStore, key: String, value: String) -> CommandResponse {
    CommandResponse::with_previous(store.insert(key, value))
}

fn apply_delete(store: &mut KvStore, key: &str) -> CommandResponse {
    CommandResponse::with_previous(store.remove(key))
}
