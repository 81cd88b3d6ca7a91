//! In-memory Raft log storage.
//!
//! Log entries, the vote and the committed id live only in process memory. A
//! restarted node comes back empty and catches up from the leader through
//! normal replication or a snapshot install.

use crate::types::{ClusterEntry, ClusterLogId, ClusterStorageError, ClusterVote, TypeConfig};
use openraft::storage::{LogFlushed, RaftLogStorage};
use openraft::{LogState, RaftLogReader};
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::ops::RangeBounds;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Log state shared between the storage handle and its readers.
#[derive(Debug, Default)]
struct LogStoreInner {
    /// Entries keyed by log index.
    logs: BTreeMap<u64, ClusterEntry>,
    /// Last purged log ID.
    last_purged_log_id: Option<ClusterLogId>,
    /// Committed log ID.
    committed: Option<ClusterLogId>,
    /// Current vote state.
    vote: Option<ClusterVote>,
}

/// Volatile storage for Raft logs and vote state.
///
/// Cloning yields another handle onto the same log, which is how openraft
/// obtains its log readers.
#[derive(Debug, Clone, Default)]
pub struct MemLogStore {
    inner: Arc<RwLock<LogStoreInner>>,
}

impl MemLogStore {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries currently retained.
    pub async fn len(&self) -> usize {
        self.inner.read().await.logs.len()
    }

    /// Whether no entries are retained.
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.logs.is_empty()
    }
}

/// Implementation of OpenRaft's log reader interface.
impl RaftLogReader<TypeConfig> for MemLogStore {
    async fn try_get_log_entries<RB: RangeBounds<u64> + Clone + Debug>(
        &mut self,
        range: RB,
    ) -> Result<Vec<ClusterEntry>, ClusterStorageError> {
        let inner = self.inner.read().await;
        let entries: Vec<ClusterEntry> = inner.logs.range(range).map(|(_, e)| e.clone()).collect();
        Ok(entries)
    }
}

/// Implementation of OpenRaft's log storage interface.
impl RaftLogStorage<TypeConfig> for MemLogStore {
    type LogReader = Self;

    async fn get_log_state(&mut self) -> Result<LogState<TypeConfig>, ClusterStorageError> {
        let inner = self.inner.read().await;

        let last_purged_log_id = inner.last_purged_log_id;
        let last_log_id = inner
            .logs
            .values()
            .last()
            .map(|e| e.log_id)
            .or(last_purged_log_id);

        Ok(LogState {
            last_purged_log_id,
            last_log_id,
        })
    }

    async fn save_committed(
        &mut self,
        committed: Option<ClusterLogId>,
    ) -> Result<(), ClusterStorageError> {
        self.inner.write().await.committed = committed;
        Ok(())
    }

    async fn read_committed(&mut self) -> Result<Option<ClusterLogId>, ClusterStorageError> {
        Ok(self.inner.read().await.committed)
    }

    async fn save_vote(&mut self, vote: &ClusterVote) -> Result<(), ClusterStorageError> {
        self.inner.write().await.vote = Some(*vote);
        Ok(())
    }

    async fn read_vote(&mut self) -> Result<Option<ClusterVote>, ClusterStorageError> {
        Ok(self.inner.read().await.vote)
    }

    async fn append<I>(
        &mut self,
        entries: I,
        callback: LogFlushed<TypeConfig>,
    ) -> Result<(), ClusterStorageError>
    where
        I: IntoIterator<Item = ClusterEntry>,
    {
        {
            let mut inner = self.inner.write().await;
            for entry in entries {
                inner.logs.insert(entry.log_id.index, entry);
            }
        }

        callback.log_io_completed(Ok(()));
        Ok(())
    }

    async fn truncate(&mut self, log_id: ClusterLogId) -> Result<(), ClusterStorageError> {
        tracing::debug!(%log_id, "truncating log");
        let mut inner = self.inner.write().await;
        inner.logs.split_off(&log_id.index);
        Ok(())
    }

    async fn purge(&mut self, log_id: ClusterLogId) -> Result<(), ClusterStorageError> {
        tracing::debug!(%log_id, "purging log");
        let mut inner = self.inner.write().await;
        let kept = inner.logs.split_off(&(log_id.index + 1));
        inner.logs = kept;
        inner.last_purged_log_id = Some(log_id);
        Ok(())
    }

    async fn get_log_reader(&mut self) -> Self::LogReader {
        self.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use openraft::{CommittedLeaderId, EntryPayload, Vote};

    fn test_log_id(term: u64, index: u64) -> ClusterLogId {
        ClusterLogId::new(CommittedLeaderId::new(term, 0), index)
    }

    fn test_entries(term: u64, range: std::ops::RangeInclusive<u64>) -> Vec<ClusterEntry> {
        range
            .map(|i| ClusterEntry {
                log_id: test_log_id(term, i),
                payload: EntryPayload::Blank,
            })
            .collect()
    }

    /// Append directly, bypassing the flush callback.
    async fn append_test_entries(storage: &MemLogStore, entries: Vec<ClusterEntry>) {
        let mut inner = storage.inner.write().await;
        for entry in entries {
            inner.logs.insert(entry.log_id.index, entry);
        }
    }

    #[tokio::test]
    async fn test_read_range() {
        let mut storage = MemLogStore::new();
        append_test_entries(&storage, test_entries(1, 1..=10)).await;

        let read = storage.try_get_log_entries(3..=5).await.expect("read");
        let indexes: Vec<u64> = read.iter().map(|e| e.log_id.index).collect();
        assert_eq!(indexes, vec![3, 4, 5]);
        assert_eq!(storage.len().await, 10);
    }

    #[tokio::test]
    async fn test_truncate() {
        let mut storage = MemLogStore::new();
        append_test_entries(&storage, test_entries(1, 1..=100)).await;

        storage.truncate(test_log_id(1, 50)).await.expect("truncate");

        let kept = storage.try_get_log_entries(1..50).await.expect("read");
        assert_eq!(kept.len(), 49);
        let gone = storage.try_get_log_entries(50..=100).await.expect("read");
        assert!(gone.is_empty());
    }

    #[tokio::test]
    async fn test_purge_keeps_log_state() {
        let mut storage = MemLogStore::new();
        append_test_entries(&storage, test_entries(1, 1..=20)).await;

        storage.purge(test_log_id(1, 20)).await.expect("purge");
        assert!(storage.is_empty().await);

        let state = storage.get_log_state().await.expect("log state");
        assert_eq!(state.last_purged_log_id, Some(test_log_id(1, 20)));
        assert_eq!(state.last_log_id, Some(test_log_id(1, 20)));
    }

    #[tokio::test]
    async fn test_partial_purge() {
        let mut storage = MemLogStore::new();
        append_test_entries(&storage, test_entries(1, 1..=30)).await;

        storage.purge(test_log_id(1, 10)).await.expect("purge");

        assert!(storage.try_get_log_entries(1..=10).await.expect("read").is_empty());
        assert_eq!(storage.try_get_log_entries(11..=30).await.expect("read").len(), 20);
        let state = storage.get_log_state().await.expect("log state");
        assert_eq!(state.last_log_id, Some(test_log_id(1, 30)));
    }

    #[tokio::test]
    async fn test_vote_and_committed() {
        let mut storage = MemLogStore::new();
        assert!(storage.read_vote().await.expect("read vote").is_none());

        storage.save_vote(&Vote::new(5, 3)).await.expect("save vote");
        let vote = storage.read_vote().await.expect("read vote").expect("vote");
        assert_eq!(vote.leader_id().term, 5);
        assert_eq!(vote.leader_id().node_id, 3);

        storage
            .save_committed(Some(test_log_id(2, 7)))
            .await
            .expect("save committed");
        assert_eq!(
            storage.read_committed().await.expect("read committed"),
            Some(test_log_id(2, 7))
        );
    }

    #[tokio::test]
    async fn test_reader_shares_the_log() {
        let mut storage = MemLogStore::new();
        let mut reader = storage.get_log_reader().await;
        append_test_entries(&storage, test_entries(1, 1..=3)).await;
        assert_eq!(reader.try_get_log_entries(..).await.expect("read").len(), 3);
    }
}
