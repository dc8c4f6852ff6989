// src/domain/snapshot.rs

use crate::inpars::Listing;
use chrono::{DateTime, Utc};

/// The last processed version of a listing, as stored in `listing_snapshots`.
///
/// `price`, `floor`, `image_count` and `area` are the tracked fields; the rest
/// is kept so a stored snapshot can be inspected without re-fetching.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub id: i64,

    // Tracked fields
    pub price: i64,
    pub floor: i32,
    pub image_count: i32,
    pub area: f64,

    // Descriptive fields
    pub floors: i32,
    pub title: String,
    pub address: String,
    pub url: String,
    pub phones: Vec<i64>,
    pub region_id: i32,
    pub city_id: i32,
    pub type_ad: i32,
    pub section_id: i32,
    pub category_id: i32,
    pub agent: i32,

    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub last_notified_at: Option<DateTime<Utc>>,
    /// Upstream "updated" timestamp, stored verbatim.
    pub api_updated_at: String,
}

impl Snapshot {
    /// Builds a first-sighting snapshot: first seen = last seen = `now`.
    pub fn from_listing(listing: &Listing, now: DateTime<Utc>) -> Self {
        Snapshot {
            id: listing.id,
            price: listing.cost,
            floor: listing.floor,
            image_count: listing.image_count(),
            area: listing.sq,
            floors: listing.floors,
            title: listing.title.clone(),
            address: listing.address.clone(),
            url: listing.url.clone(),
            phones: listing.phones.clone(),
            region_id: listing.region_id,
            city_id: listing.city_id,
            type_ad: listing.type_ad,
            section_id: listing.section_id,
            category_id: listing.category_id,
            agent: listing.agent,
            first_seen_at: now,
            last_seen_at: now,
            last_notified_at: None,
            api_updated_at: listing.updated.clone(),
        }
    }

    /// Carries the identity timestamps of `previous` over to this fresher
    /// copy and stamps it as seen at `now`.
    ///
    /// First-seen never moves, and last-seen never drops below it even if the
    /// clock went backwards between polls.
    pub fn succeed(mut self, previous: &Snapshot, now: DateTime<Utc>) -> Self {
        self.first_seen_at = previous.first_seen_at;
        self.last_seen_at = now.max(previous.first_seen_at);
        self.last_notified_at = previous.last_notified_at;
        self
    }
}
