use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::core::StoreError;
use crate::services::store::{PurgeStats, RetentionStore};

/// Shortest period between sweeps; `tokio::time::interval` rejects zero
const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(1);

/// Delete everything created more than `retention_days` before `now`
pub async fn run_retention_once(
    store: &dyn RetentionStore,
    retention_days: i64,
    now: DateTime<Utc>,
) -> Result<PurgeStats, StoreError> {
    let cutoff = now - ChronoDuration::days(retention_days);
    let stats = store.purge_older_than(cutoff).await?;

    tracing::info!(
        "Retention sweep removed {} profiles and {} match results older than {}",
        stats.profiles,
        stats.results,
        cutoff
    );

    Ok(stats)
}

/// Run the retention sweep on a fixed interval
///
/// The first sweep runs immediately. A failed sweep is logged and retried on
/// the next tick. A zero `interval` is raised to the minimum period.
pub fn spawn_retention_job(
    store: Arc<dyn RetentionStore>,
    retention_days: i64,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval.max(MIN_SWEEP_INTERVAL));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if let Err(e) = run_retention_once(store.as_ref(), retention_days, Utc::now()).await {
                tracing::error!("Retention sweep failed: {}", e);
            }
        }
    })
}
