//! Poll cycle orchestration.
//!
//! One cycle: check subscribers, fetch the tracker's next page, classify each
//! listing in order and dispatch an event for every new or changed one. Only a
//! fetch error aborts a cycle; everything else is logged and skipped.

mod sweeper;

pub use sweeper::RetentionSweeper;

use crate::config::MonitorConfig;
use crate::domain::Classification;
use crate::errors::{StoreError, StoreResult};
use crate::inpars::{FetchError, Fetcher, Listing, ListingFilters, PageRequest, RateLimit};
use crate::notifier::{Delivery, Notifier};
use crate::tracker::Tracker;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{interval, sleep, MissedTickBehavior};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleReport {
    pub fetched: usize,
    pub new: usize,
    pub updated: usize,
    pub unchanged: usize,
    /// Listings that could not be classified because the store failed.
    pub skipped: usize,
    pub failed_deliveries: usize,
    pub rate_limit: RateLimit,
    pub finished_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// Nobody to notify, so nothing was fetched.
    Skipped,
    Completed(CycleReport),
}

#[derive(Debug, Clone, Default)]
pub struct MonitorStatus {
    pub cycles_completed: u64,
    pub cycles_skipped: u64,
    pub cycles_failed: u64,
    pub last_cycle_at: Option<DateTime<Utc>>,
    pub last_report: Option<CycleReport>,
}

pub struct Monitor {
    fetcher: Arc<dyn Fetcher>,
    notifier: Arc<dyn Notifier>,
    tracker: Arc<dyn Tracker>,
    filters: ListingFilters,
    settings: MonitorConfig,
    status: Mutex<MonitorStatus>,
}

impl Monitor {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        notifier: Arc<dyn Notifier>,
        tracker: Arc<dyn Tracker>,
        filters: ListingFilters,
        settings: MonitorConfig,
    ) -> Self {
        Self {
            fetcher,
            notifier,
            tracker,
            filters,
            settings,
            status: Mutex::new(MonitorStatus::default()),
        }
    }

    pub fn status(&self) -> MonitorStatus {
        self.status.lock().clone()
    }

    /// Marks the newest listings as already seen so a cold start doesn't
    /// announce the whole feed. A failure leaves the tracker empty.
    pub async fn seed(&self) {
        if !self.tracker.needs_seed() {
            return;
        }

        let request = PageRequest::newest(self.settings.seed_limit);
        match self.fetcher.fetch_page(&self.filters, &request).await {
            Ok(page) => self.tracker.seed(&page.listings),
            Err(e) => warn!(error = %e, "seeding failed, starting with empty tracker state"),
        }
    }

    pub async fn run_cycle(&self) -> Result<CycleOutcome, FetchError> {
        if !self.notifier.has_subscribers() {
            debug!("no subscribers, skipping cycle");
            self.status.lock().cycles_skipped += 1;
            return Ok(CycleOutcome::Skipped);
        }

        let request = self.tracker.next_page(self.settings.page_limit);
        let page = match self.fetcher.fetch_page(&self.filters, &request).await {
            Ok(page) => page,
            Err(e) => {
                self.status.lock().cycles_failed += 1;
                return Err(e);
            }
        };

        let mut report = CycleReport {
            fetched: page.listings.len(),
            rate_limit: page.rate_limit,
            ..Default::default()
        };
        let mut dispatched = false;

        for listing in &page.listings {
            let now = Utc::now();
            let candidate = listing.clone();
            let classified = self
                .offload(move |tracker| tracker.classify(&candidate, now))
                .await;
            let classification = match classified {
                Ok(c) => c,
                Err(e) => {
                    warn!(listing_id = listing.id, error = %e, "could not classify listing, skipping");
                    report.skipped += 1;
                    continue;
                }
            };

            let deliveries = match classification {
                Classification::Unchanged => {
                    report.unchanged += 1;
                    continue;
                }
                Classification::New => {
                    report.new += 1;
                    self.pace(&mut dispatched).await;
                    info!(listing_id = listing.id, cost = listing.cost, "new listing");
                    self.notifier.notify_new(listing).await
                }
                Classification::Changed(changes) => {
                    report.updated += 1;
                    self.pace(&mut dispatched).await;
                    info!(listing_id = listing.id, changes = changes.len(), "listing updated");
                    self.notifier.notify_changed(listing, &changes).await
                }
            };

            report.failed_deliveries += self.settle(listing, &deliveries).await;
        }

        self.tracker.end_cycle();
        report.finished_at = Utc::now();

        info!(
            tracker = self.tracker.name(),
            fetched = report.fetched,
            new = report.new,
            updated = report.updated,
            unchanged = report.unchanged,
            skipped = report.skipped,
            failed_deliveries = report.failed_deliveries,
            "cycle complete"
        );
        info!(
            limit = report.rate_limit.limit,
            remaining = report.rate_limit.remaining,
            reset_secs = report.rate_limit.reset_secs,
            "upstream rate limit"
        );

        let mut status = self.status.lock();
        status.cycles_completed += 1;
        status.last_cycle_at = Some(report.finished_at);
        status.last_report = Some(report.clone());

        Ok(CycleOutcome::Completed(report))
    }

    /// Runs cycles on a fixed interval until `shutdown` flips or its sender
    /// is dropped. Ticks missed while a cycle overruns are skipped, and an
    /// in-flight cycle always finishes before this returns.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        self.seed().await;

        let mut ticker = interval(self.settings.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            tracker = self.tracker.name(),
            interval_secs = self.settings.poll_interval.as_secs(),
            "monitor started"
        );

        loop {
            tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.run_cycle().await {
                        warn!(error = %e, "cycle aborted, retrying on next tick");
                    }
                }
            }
        }

        info!("monitor stopped");
    }

    async fn pace(&self, dispatched: &mut bool) {
        if *dispatched && !self.settings.dispatch_delay.is_zero() {
            sleep(self.settings.dispatch_delay).await;
        }
        *dispatched = true;
    }

    /// Runs a tracker call on the blocking pool. The durable tracker waits on
    /// SQLite locks, which must not stall the runtime's worker threads.
    async fn offload<T, F>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&dyn Tracker) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let tracker = Arc::clone(&self.tracker);
        tokio::task::spawn_blocking(move || f(tracker.as_ref()))
            .await
            .map_err(|e| StoreError::Background(e.to_string()))?
    }

    /// Logs failed deliveries, stamps last-notified when anyone received the
    /// event, and returns the failure count.
    async fn settle(&self, listing: &Listing, deliveries: &[Delivery]) -> usize {
        let mut failed = 0;
        for delivery in deliveries {
            if let Err(e) = &delivery.result {
                failed += 1;
                warn!(
                    listing_id = listing.id,
                    subscriber = %delivery.subscriber,
                    error = %e,
                    "delivery failed"
                );
            }
        }

        if deliveries.iter().any(Delivery::is_ok) {
            let id = listing.id;
            let now = Utc::now();
            if let Err(e) = self
                .offload(move |tracker| tracker.mark_notified(id, now))
                .await
            {
                warn!(listing_id = listing.id, error = %e, "could not record notification");
            }
        }

        failed
    }
}
