use crate::inpars::ListingFilters;
use crate::monitor::Monitor;
use crate::tests::utils::{listing, page, settings, FakeFetcher, RecordingNotifier, Sent};
use crate::tracker::SeenSetTracker;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

const DELAY: Duration = Duration::from_millis(500);

fn paced_monitor(fetcher: Arc<FakeFetcher>, notifier: Arc<RecordingNotifier>) -> Monitor {
    let mut config = settings();
    config.dispatch_delay = DELAY;
    Monitor::new(
        fetcher,
        notifier,
        Arc::new(SeenSetTracker::new(10_000, 5_000)),
        ListingFilters::default(),
        config,
    )
}

fn assert_elapsed(start: Instant, expected: Duration) {
    let elapsed = start.elapsed();
    assert!(
        elapsed >= expected && elapsed < expected + Duration::from_millis(10),
        "expected about {expected:?}, took {elapsed:?}"
    );
}

#[tokio::test(start_paused = true)]
async fn waits_between_dispatches_but_not_before_the_first() {
    let fetcher = FakeFetcher::new(vec![Ok(page(vec![
        listing(10, 100),
        listing(11, 200),
        listing(12, 300),
    ]))]);
    let notifier = RecordingNotifier::new(&["https://hooks.example/a"]);
    let monitor = paced_monitor(fetcher, notifier.clone());

    let start = Instant::now();
    monitor.run_cycle().await.unwrap();

    assert_elapsed(start, DELAY * 2);
    assert_eq!(notifier.sent().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn quiet_cycles_are_not_delayed() {
    let fetcher = FakeFetcher::new(vec![
        Ok(page(vec![listing(10, 100), listing(11, 200)])),
        Ok(page(vec![listing(10, 100), listing(11, 200)])),
        Ok(page(vec![listing(11, 200), listing(13, 400)])),
    ]);
    let notifier = RecordingNotifier::new(&["https://hooks.example/a"]);
    let monitor = paced_monitor(fetcher, notifier.clone());

    monitor.run_cycle().await.unwrap();

    // everything already seen
    let start = Instant::now();
    monitor.run_cycle().await.unwrap();
    assert_elapsed(start, Duration::ZERO);

    // a single dispatch has nothing to wait for
    let start = Instant::now();
    monitor.run_cycle().await.unwrap();
    assert_elapsed(start, Duration::ZERO);

    assert_eq!(
        notifier.sent(),
        vec![Sent::New(10), Sent::New(11), Sent::New(13)]
    );
}
