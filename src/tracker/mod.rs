//! Decides whether a fetched listing is new, unchanged or changed.
//!
//! Two interchangeable strategies:
//! - [`SeenSetTracker`] keeps ids in memory behind a high-water mark. It can
//!   only ever report listings as new, never as updated.
//! - [`SnapshotTracker`] keeps the last tracked-field values in a
//!   [`SnapshotStore`](crate::db::SnapshotStore) and reports field-level deltas.

mod seen_set;
mod snapshot;

pub use seen_set::SeenSetTracker;
pub use snapshot::SnapshotTracker;

use crate::domain::Classification;
use crate::errors::StoreResult;
use crate::inpars::{Listing, PageRequest};
use chrono::{DateTime, Utc};

pub trait Tracker: Send + Sync {
    fn name(&self) -> &'static str;

    /// Classifies one listing and records the sighting.
    fn classify(&self, listing: &Listing, now: DateTime<Utc>) -> StoreResult<Classification>;

    /// Called after at least one subscriber accepted a notification.
    fn mark_notified(&self, id: i64, now: DateTime<Utc>) -> StoreResult<()>;

    /// The page to ask for next.
    fn next_page(&self, limit: u32) -> PageRequest;

    /// True until the tracker has been seeded with pre-existing listings.
    fn needs_seed(&self) -> bool {
        false
    }

    /// Marks listings that existed before startup as already seen.
    fn seed(&self, _listings: &[Listing]) {}

    /// Housekeeping once a page has been processed.
    fn end_cycle(&self) {}
}
