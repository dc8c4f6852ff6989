use crate::domain::Classification;
use crate::errors::StoreResult;
use crate::inpars::{Listing, PageRequest};
use crate::tracker::Tracker;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashSet;
use tracing::{debug, info};

#[derive(Debug, Default)]
struct SeenState {
    seen: HashSet<i64>,
    high_water_mark: Option<i64>,
}

impl SeenState {
    fn observe(&mut self, id: i64) -> bool {
        if self.high_water_mark.map_or(true, |mark| id > mark) {
            self.high_water_mark = Some(id);
        }
        self.seen.insert(id)
    }
}

/// In-memory tracker for deployments without a database.
///
/// Every id not in the set is new; everything else is unchanged without any
/// field comparison, so this strategy never reports updates.
pub struct SeenSetTracker {
    state: Mutex<SeenState>,
    trim_threshold: usize,
    trim_window: i64,
}

impl SeenSetTracker {
    /// `trim_threshold`: set size above which the set is trimmed at the end of
    /// a cycle. `trim_window`: after a trim only ids strictly greater than
    /// `high_water_mark - trim_window` are kept.
    pub fn new(trim_threshold: usize, trim_window: i64) -> Self {
        Self {
            state: Mutex::new(SeenState::default()),
            trim_threshold,
            trim_window,
        }
    }

    pub fn high_water_mark(&self) -> Option<i64> {
        self.state.lock().high_water_mark
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.state.lock().seen.len()
    }

    #[cfg(test)]
    pub fn contains(&self, id: i64) -> bool {
        self.state.lock().seen.contains(&id)
    }

    /// Returns how many ids were dropped.
    pub fn trim(&self) -> usize {
        let mut state = self.state.lock();
        if state.seen.len() <= self.trim_threshold {
            return 0;
        }
        let Some(mark) = state.high_water_mark else {
            return 0;
        };

        let floor = mark.saturating_sub(self.trim_window);
        let before = state.seen.len();
        state.seen.retain(|&id| id > floor);
        let removed = before - state.seen.len();

        debug!(removed, kept = state.seen.len(), high_water_mark = mark, "trimmed seen-set");
        removed
    }
}

impl Tracker for SeenSetTracker {
    fn name(&self) -> &'static str {
        "seen-set"
    }

    fn classify(&self, listing: &Listing, _now: DateTime<Utc>) -> StoreResult<Classification> {
        let inserted = self.state.lock().observe(listing.id);
        Ok(if inserted {
            Classification::New
        } else {
            Classification::Unchanged
        })
    }

    fn mark_notified(&self, _id: i64, _now: DateTime<Utc>) -> StoreResult<()> {
        Ok(())
    }

    fn next_page(&self, limit: u32) -> PageRequest {
        match self.high_water_mark() {
            Some(mark) => PageRequest::after(mark, limit),
            None => PageRequest::recently_updated(limit),
        }
    }

    fn needs_seed(&self) -> bool {
        let state = self.state.lock();
        state.high_water_mark.is_none() && state.seen.is_empty()
    }

    fn seed(&self, listings: &[Listing]) {
        let mut state = self.state.lock();
        for listing in listings {
            state.observe(listing.id);
        }
        info!(
            seeded = listings.len(),
            high_water_mark = ?state.high_water_mark,
            "seen-set initialised"
        );
    }

    fn end_cycle(&self) {
        self.trim();
    }
}
