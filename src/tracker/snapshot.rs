use crate::db::SnapshotStore;
use crate::domain::{Classification, Snapshot};
use crate::errors::StoreResult;
use crate::inpars::{Listing, PageRequest};
use crate::tracker::Tracker;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Durable tracker: compares every sighting against the stored snapshot.
///
/// Always pages by most recent update so edits to old listings surface too.
pub struct SnapshotTracker {
    store: Arc<dyn SnapshotStore>,
}

impl SnapshotTracker {
    pub fn new(store: Arc<dyn SnapshotStore>) -> Self {
        Self { store }
    }
}

impl Tracker for SnapshotTracker {
    fn name(&self) -> &'static str {
        "snapshot"
    }

    fn classify(&self, listing: &Listing, now: DateTime<Utc>) -> StoreResult<Classification> {
        let candidate = Snapshot::from_listing(listing, now);
        self.store.record_sighting(&candidate, now)
    }

    fn mark_notified(&self, id: i64, now: DateTime<Utc>) -> StoreResult<()> {
        self.store.mark_notified(id, now)
    }

    fn next_page(&self, limit: u32) -> PageRequest {
        PageRequest::recently_updated(limit)
    }
}
