use crate::db::{SnapshotStore, SqliteStore};
use crate::domain::{ChangeRecord, Snapshot, TrackedField};
use crate::monitor::RetentionSweeper;
use crate::tests::utils::{listing, test_store};
use chrono::{TimeDelta, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

fn thirty_day_sweeper(store: &Arc<SqliteStore>) -> RetentionSweeper {
    RetentionSweeper::new(store.clone(), Duration::from_secs(3600), TimeDelta::days(30))
}

#[test]
fn sweep_drops_only_snapshots_past_the_threshold() {
    let (_db, store) = test_store();
    let now = Utc::now();

    let stale = Snapshot::from_listing(&listing(31, 1_000), now - TimeDelta::days(31));
    let fresh = Snapshot::from_listing(&listing(29, 1_000), now - TimeDelta::days(29));
    store.upsert(&stale).unwrap();
    store.upsert(&fresh).unwrap();

    let sweeper = thirty_day_sweeper(&store);
    assert_eq!(sweeper.sweep_once(now).unwrap(), 1);

    assert!(store.get(31).unwrap().is_none());
    assert!(store.get(29).unwrap().is_some());
}

#[test]
fn sweep_removes_history_of_evicted_listings() {
    let (_db, store) = test_store();
    let now = Utc::now();
    let long_ago = now - TimeDelta::days(45);

    store
        .upsert(&Snapshot::from_listing(&listing(5, 1_000), long_ago))
        .unwrap();
    store
        .append_change_history(
            5,
            &ChangeRecord {
                field: TrackedField::Price,
                old_value: "900".to_string(),
                new_value: "1000".to_string(),
            },
            long_ago,
        )
        .unwrap();
    assert_eq!(store.change_history(5, 10).unwrap().len(), 1);

    let sweeper = thirty_day_sweeper(&store);
    sweeper.sweep_once(now).unwrap();

    assert!(store.change_history(5, 10).unwrap().is_empty());
}

#[test]
fn a_seen_listing_survives_the_next_sweep() {
    let (_db, store) = test_store();
    let now = Utc::now();

    store
        .upsert(&Snapshot::from_listing(&listing(8, 1_000), now - TimeDelta::days(40)))
        .unwrap();
    store.mark_seen(8, now - TimeDelta::hours(1)).unwrap();

    let sweeper = thirty_day_sweeper(&store);
    assert_eq!(sweeper.sweep_once(now).unwrap(), 0);
    assert!(store.get(8).unwrap().is_some());
}

#[tokio::test]
async fn background_sweeper_runs_before_the_first_interval() {
    let (_db, store) = test_store();
    let now = Utc::now();
    store
        .upsert(&Snapshot::from_listing(&listing(77, 1_000), now - TimeDelta::days(31)))
        .unwrap();

    let sweeper = Arc::new(thirty_day_sweeper(&store));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(sweeper.run(shutdown_rx));

    // the interval is an hour; the startup sweep must not wait for it
    let mut gone = false;
    for _ in 0..200 {
        if store.get(77).unwrap().is_none() {
            gone = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    shutdown_tx.send(true).unwrap();
    handle.await.unwrap();
    assert!(gone, "stale snapshot survived the startup sweep");
}
