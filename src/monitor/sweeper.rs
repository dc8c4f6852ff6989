use crate::db::SnapshotStore;
use crate::errors::StoreResult;
use chrono::{DateTime, TimeDelta, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info};

/// Periodically drops snapshots that haven't been seen for `max_age`.
pub struct RetentionSweeper {
    store: Arc<dyn SnapshotStore>,
    interval: Duration,
    max_age: TimeDelta,
}

impl RetentionSweeper {
    pub fn new(store: Arc<dyn SnapshotStore>, interval: Duration, max_age: TimeDelta) -> Self {
        Self {
            store,
            interval,
            max_age,
        }
    }

    /// Snapshots last seen before this instant are stale. Saturates at the
    /// earliest representable time instead of overflowing.
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.checked_sub_signed(self.max_age)
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    pub fn sweep_once(&self, now: DateTime<Utc>) -> StoreResult<usize> {
        self.store.delete_older_than(self.cutoff(now))
    }

    /// Sweeps once right away, then on every interval until shutdown.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                _ = ticker.tick() => {
                    let sweeper = Arc::clone(&self);
                    let result =
                        tokio::task::spawn_blocking(move || sweeper.sweep_once(Utc::now())).await;

                    match result {
                        Ok(Ok(removed)) => info!(removed, "retention sweep complete"),
                        Ok(Err(e)) => error!(error = %e, "retention sweep failed"),
                        Err(e) => error!(error = %e, "retention sweep task panicked"),
                    }
                }
            }
        }

        info!("retention sweeper stopped");
    }
}
