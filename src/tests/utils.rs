use crate::config::MonitorConfig;
use crate::db::{init_db, Database, SqliteStore};
use crate::domain::{ChangeRecord, Classification};
use crate::errors::{StoreError, StoreResult};
use crate::inpars::fetcher::Page;
use crate::inpars::{FetchError, Fetcher, Listing, ListingFilters, PageRequest, RateLimit};
use crate::notifier::{Delivery, Notifier, NotifyError};
use crate::tracker::Tracker;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Fresh schema in a throwaway directory. Keep the guard alive for the
/// duration of the test.
pub struct TestDb {
    _dir: TempDir,
    pub db: Database,
}

pub fn init_test_db() -> TestDb {
    let dir = TempDir::new().unwrap_or_else(|e| panic!("tempdir failed: {e}"));
    let db = Database::new(dir.path().join("test_db.sqlite3"));

    init_db(&db).unwrap_or_else(|e| panic!("Database initialization failed: {e}"));

    TestDb { _dir: dir, db }
}

pub fn test_store() -> (TestDb, Arc<SqliteStore>) {
    let test_db = init_test_db();
    let store = Arc::new(SqliteStore::new(test_db.db.clone()));
    (test_db, store)
}

pub fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, day, hour, 0, 0).unwrap()
}

pub fn listing(id: i64, cost: i64) -> Listing {
    Listing {
        id,
        cost,
        floor: 3,
        floors: 9,
        sq: 42.5,
        title: format!("2-room flat #{id}"),
        address: "Tverskaya 1".to_string(),
        url: format!("https://inpars.ru/estate/{id}"),
        images: vec!["a.jpg".to_string(), "b.jpg".to_string()],
        phones: vec![79_990_001_122],
        region_id: 77,
        city_id: 2,
        type_ad: 1,
        updated: "2026-03-01T10:00:00+03:00".to_string(),
        ..Default::default()
    }
}

pub fn page(listings: Vec<Listing>) -> Page {
    Page {
        listings,
        rate_limit: RateLimit {
            limit: 100,
            remaining: 97,
            reset_secs: 3600,
        },
    }
}

pub fn settings() -> MonitorConfig {
    MonitorConfig {
        poll_interval: Duration::from_secs(60),
        page_limit: 50,
        seed_limit: 500,
        dispatch_delay: Duration::ZERO,
    }
}

/// Hands out scripted results in order, then empty pages.
#[derive(Default)]
pub struct FakeFetcher {
    script: Mutex<VecDeque<Result<Page, FetchError>>>,
    requests: Mutex<Vec<PageRequest>>,
}

impl FakeFetcher {
    pub fn new(script: Vec<Result<Page, FetchError>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<PageRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl Fetcher for FakeFetcher {
    async fn fetch_page(
        &self,
        _filters: &ListingFilters,
        request: &PageRequest,
    ) -> Result<Page, FetchError> {
        self.requests.lock().push(*request);
        self.script
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(Page::default()))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Sent {
    New(i64),
    Changed(i64, Vec<ChangeRecord>),
}

/// Records every event; subscribers listed in `failing` reject everything.
pub struct RecordingNotifier {
    subscribers: Vec<String>,
    failing: HashSet<String>,
    sent: Mutex<Vec<Sent>>,
}

impl RecordingNotifier {
    pub fn new(subscribers: &[&str]) -> Arc<Self> {
        Self::with_failing(subscribers, &[])
    }

    pub fn with_failing(subscribers: &[&str], failing: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            subscribers: subscribers.iter().map(|s| s.to_string()).collect(),
            failing: failing.iter().map(|s| s.to_string()).collect(),
            sent: Mutex::new(Vec::new()),
        })
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().clone()
    }

    fn deliver(&self) -> Vec<Delivery> {
        self.subscribers
            .iter()
            .map(|subscriber| Delivery {
                subscriber: subscriber.clone(),
                result: if self.failing.contains(subscriber) {
                    Err(NotifyError::Rejected {
                        status: 500,
                        body: "boom".to_string(),
                    })
                } else {
                    Ok(())
                },
            })
            .collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    fn has_subscribers(&self) -> bool {
        !self.subscribers.is_empty()
    }

    async fn notify_new(&self, listing: &Listing) -> Vec<Delivery> {
        self.sent.lock().push(Sent::New(listing.id));
        self.deliver()
    }

    async fn notify_changed(&self, listing: &Listing, changes: &[ChangeRecord]) -> Vec<Delivery> {
        self.sent
            .lock()
            .push(Sent::Changed(listing.id, changes.to_vec()));
        self.deliver()
    }
}

/// Wraps another tracker and fails classification for selected ids.
pub struct FlakyTracker<T> {
    pub inner: T,
    pub broken: HashSet<i64>,
}

impl<T: Tracker> Tracker for FlakyTracker<T> {
    fn name(&self) -> &'static str {
        "flaky"
    }

    fn classify(&self, listing: &Listing, now: DateTime<Utc>) -> StoreResult<Classification> {
        if self.broken.contains(&listing.id) {
            return Err(StoreError::Corrupt(format!("listing {}", listing.id)));
        }
        self.inner.classify(listing, now)
    }

    fn mark_notified(&self, id: i64, now: DateTime<Utc>) -> StoreResult<()> {
        self.inner.mark_notified(id, now)
    }

    fn next_page(&self, limit: u32) -> PageRequest {
        self.inner.next_page(limit)
    }
}
