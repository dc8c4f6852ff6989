use crate::inpars::{FetchError, ListingFilters, PageRequest};
use crate::monitor::Monitor;
use crate::tests::utils::{listing, page, settings, test_store, FakeFetcher, RecordingNotifier, Sent};
use crate::tracker::{SeenSetTracker, SnapshotTracker, Tracker};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

#[tokio::test]
async fn seeded_seen_set_pages_past_the_high_water_mark() {
    let fetcher = FakeFetcher::new(vec![
        Ok(page(vec![listing(300, 1), listing(299, 1), listing(298, 1)])),
        Ok(page(vec![listing(301, 1), listing(305, 1)])),
    ]);
    let notifier = RecordingNotifier::new(&["https://hooks.example/a"]);
    let tracker = Arc::new(SeenSetTracker::new(10_000, 5_000));
    let monitor = Monitor::new(
        fetcher.clone(),
        notifier.clone(),
        tracker.clone(),
        ListingFilters::default(),
        settings(),
    );

    monitor.seed().await;
    assert!(!tracker.needs_seed());
    assert!(notifier.sent().is_empty());

    monitor.run_cycle().await.unwrap();
    monitor.run_cycle().await.unwrap();

    assert_eq!(
        fetcher.requests(),
        vec![
            PageRequest::newest(500),
            PageRequest::after(300, 50),
            PageRequest::after(305, 50),
        ]
    );
    assert_eq!(notifier.sent(), vec![Sent::New(301), Sent::New(305)]);
}

#[tokio::test]
async fn failed_seed_starts_empty() {
    let fetcher = FakeFetcher::new(vec![
        Err(FetchError::RateLimited("quota exhausted".to_string())),
        Ok(page(vec![listing(7, 1)])),
    ]);
    let notifier = RecordingNotifier::new(&["https://hooks.example/a"]);
    let tracker = Arc::new(SeenSetTracker::new(10_000, 5_000));
    let monitor = Monitor::new(
        fetcher.clone(),
        notifier.clone(),
        tracker.clone(),
        ListingFilters::default(),
        settings(),
    );

    monitor.seed().await;
    assert!(tracker.needs_seed());

    monitor.run_cycle().await.unwrap();
    assert_eq!(fetcher.requests()[1], PageRequest::recently_updated(50));
    assert_eq!(notifier.sent(), vec![Sent::New(7)]);
}

#[tokio::test]
async fn snapshot_tracker_skips_seeding_and_reads_recent_updates() {
    let (_db, store) = test_store();
    let fetcher = FakeFetcher::new(vec![Ok(page(vec![listing(1, 1)]))]);
    let notifier = RecordingNotifier::new(&["https://hooks.example/a"]);
    let monitor = Monitor::new(
        fetcher.clone(),
        notifier,
        Arc::new(SnapshotTracker::new(store)),
        ListingFilters::default(),
        settings(),
    );

    monitor.seed().await;
    monitor.run_cycle().await.unwrap();

    assert_eq!(fetcher.requests(), vec![PageRequest::recently_updated(50)]);
}

#[tokio::test(start_paused = true)]
async fn run_stops_on_shutdown_after_finishing_a_cycle() {
    let fetcher = FakeFetcher::new(vec![Ok(page(vec![listing(1, 1)]))]);
    let notifier = RecordingNotifier::new(&["https://hooks.example/a"]);
    let mut config = settings();
    config.poll_interval = Duration::from_secs(30);
    let monitor = Arc::new(Monitor::new(
        fetcher.clone(),
        notifier.clone(),
        Arc::new(SeenSetTracker::new(10_000, 5_000)),
        ListingFilters::default(),
        config,
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(Arc::clone(&monitor).run(shutdown_rx));

    // seed plus the immediate first tick, then two more ticks
    tokio::time::sleep(Duration::from_secs(65)).await;
    shutdown_tx.send(true).unwrap();
    handle.await.unwrap();

    let status = monitor.status();
    assert_eq!(status.cycles_completed, 3);
    assert_eq!(fetcher.requests().len(), 4);
}
