use crate::domain::{ChangeRecord, Classification, Snapshot};
use crate::errors::StoreResult;
use chrono::{DateTime, Utc};

/// One row of the change audit trail.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub listing_id: i64,
    pub change: ChangeRecord,
    pub changed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub total: u64,
    /// First seen since UTC midnight.
    pub new_today: u64,
    /// Notified since UTC midnight but first seen before it.
    pub updated_today: u64,
    /// On-disk size of the main database file.
    pub size_bytes: u64,
}

/// Durable snapshot persistence used by the snapshot tracker and the
/// retention sweeper.
pub trait SnapshotStore: Send + Sync {
    fn get(&self, id: i64) -> StoreResult<Option<Snapshot>>;

    /// Inserts or replaces a snapshot. An existing row keeps its first-seen
    /// timestamp and, when the new one has none, its last-notified timestamp.
    fn upsert(&self, snapshot: &Snapshot) -> StoreResult<()>;

    fn mark_seen(&self, id: i64, at: DateTime<Utc>) -> StoreResult<()>;

    fn mark_notified(&self, id: i64, at: DateTime<Utc>) -> StoreResult<()>;

    fn append_change_history(
        &self,
        id: i64,
        change: &ChangeRecord,
        at: DateTime<Utc>,
    ) -> StoreResult<()>;

    /// Most recent first.
    fn change_history(&self, id: i64, limit: usize) -> StoreResult<Vec<HistoryEntry>>;

    /// Removes every snapshot (and its history) last seen before `cutoff`.
    fn delete_older_than(&self, cutoff: DateTime<Utc>) -> StoreResult<usize>;

    fn stats(&self, now: DateTime<Utc>) -> StoreResult<StoreStats>;

    /// Looks up, diffs and persists one sighting as a single atomic unit:
    /// inserts on first sighting, touches last-seen when nothing tracked
    /// changed, otherwise rewrites the tracked fields and appends the deltas
    /// to the history before returning them.
    fn record_sighting(&self, candidate: &Snapshot, now: DateTime<Utc>)
        -> StoreResult<Classification>;
}
