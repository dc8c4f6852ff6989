use crate::config::{Config, LoggingConfig};
use crate::db::{init_db, Database, SnapshotStore, SqliteStore};
use crate::inpars::{Fetcher, InParsClient};
use crate::monitor::{Monitor, RetentionSweeper};
use crate::notifier::{Notifier, SubscriberRegistry, WebhookNotifier};
use crate::tracker::{SeenSetTracker, SnapshotTracker, Tracker};
use anyhow::Context;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};

mod config;
mod db;
mod domain;
mod errors;
mod inpars;
mod monitor;
mod notifier;
mod tracker;

#[cfg(test)]
mod tests;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    let config = Config::from_env().context("loading configuration")?;
    init_tracing(&config.logging);

    info!("listing_watch v{} starting", env!("CARGO_PKG_VERSION"));

    let fetcher: Arc<dyn Fetcher> =
        Arc::new(InParsClient::new(&config.inpars).context("building InPars client")?);

    let registry = Arc::new(SubscriberRegistry::new(config.webhooks.subscribers.clone()));
    if registry.is_empty() {
        warn!("no webhook subscribers configured, every cycle will be skipped");
    } else {
        info!(subscribers = registry.len(), "webhook subscribers loaded");
    }
    let notifier: Arc<dyn Notifier> = Arc::new(
        WebhookNotifier::new(registry, config.webhooks.timeout)
            .context("building webhook client")?,
    );

    let store: Option<Arc<dyn SnapshotStore>> = match &config.storage.database_path {
        Some(path) => {
            let db = Database::new(path);
            init_db(&db).with_context(|| format!("initialising {}", path.display()))?;
            Some(Arc::new(SqliteStore::new(db)))
        }
        None => None,
    };

    let tracker: Arc<dyn Tracker> = match &store {
        Some(store) => Arc::new(SnapshotTracker::new(Arc::clone(store))),
        None => Arc::new(SeenSetTracker::new(
            config.seen_set.trim_threshold,
            config.seen_set.trim_window,
        )),
    };
    info!(tracker = tracker.name(), "tracker selected");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut tasks = Vec::new();

    if let Some(store) = &store {
        let sweeper = Arc::new(RetentionSweeper::new(
            Arc::clone(store),
            config.retention.sweep_interval,
            config.retention.max_age,
        ));
        tasks.push(tokio::spawn(sweeper.run(shutdown_rx.clone())));
    }

    let monitor = Arc::new(Monitor::new(
        fetcher,
        notifier,
        tracker,
        config.filters.clone(),
        config.monitor.clone(),
    ));
    tasks.push(tokio::spawn(Arc::clone(&monitor).run(shutdown_rx)));

    tokio::signal::ctrl_c()
        .await
        .context("listening for ctrl-c")?;
    info!("shutdown requested, waiting for in-flight work");

    let _ = shutdown_tx.send(true);
    for task in tasks {
        if let Err(e) = task.await {
            error!(error = %e, "background task ended abnormally");
        }
    }

    let status = monitor.status();
    info!(
        cycles = status.cycles_completed,
        skipped = status.cycles_skipped,
        failed = status.cycles_failed,
        last_cycle_at = ?status.last_cycle_at,
        "monitor summary"
    );

    if let Some(store) = &store {
        match store.stats(Utc::now()) {
            Ok(stats) => info!(
                total = stats.total,
                new_today = stats.new_today,
                updated_today = stats.updated_today,
                size_bytes = stats.size_bytes,
                "snapshot store summary"
            ),
            Err(e) => warn!(error = %e, "could not read store stats"),
        }
    }

    info!("shut down cleanly");
    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&logging.level));

    if logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }
}
