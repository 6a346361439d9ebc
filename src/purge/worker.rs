//! Background worker that runs the purge on a fixed interval.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::PurgeJob;
use crate::{config::PurgeConfig, db::DbPool};

/// Runs a purge, sleeps for the configured interval, and repeats until
/// `shutdown` fires.
///
/// Cancellation is observed between runs only; a run in progress always
/// finishes its current batch loop. A fatal run error is logged and the
/// worker waits for the next tick.
pub async fn start_purge_worker(db: Arc<DbPool>, config: PurgeConfig, shutdown: CancellationToken) {
    let dry_run_msg = if config.dry_run { " (DRY RUN)" } else { "" };

    tracing::info!(
        interval_hours = config.interval_hours,
        retention_days = config.retention_days,
        batch_size_setting = %config.batch_size_setting,
        dry_run = config.dry_run,
        "Starting purge worker{}",
        dry_run_msg
    );

    let job = PurgeJob::from_config(&db, &config);
    run_worker_loop(&job, config.interval(), &shutdown).await;

    tracing::info!("Purge worker stopped");
}

pub(crate) async fn run_worker_loop(
    job: &PurgeJob,
    interval: std::time::Duration,
    shutdown: &CancellationToken,
) -> usize {
    let mut runs = 0;
    while !shutdown.is_cancelled() {
        match job.run().await {
            Ok(summary) if summary.customers_purged > 0 || summary.has_failures() => {
                tracing::info!(
                    purged = summary.customers_purged,
                    batches_failed = summary.batches_failed,
                    "Scheduled purge finished"
                );
            }
            Ok(_) => tracing::debug!("Scheduled purge finished, nothing purged"),
            Err(e) => tracing::error!(error = %e, "Scheduled purge aborted"),
        }
        runs += 1;

        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }
    runs
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::{DateTime, Utc};

    use super::*;
    use crate::{
        db::{DbResult, PurgeStoreRepo, PurgeTransaction},
        models::CandidateId,
        purge::FixedBatchSize,
    };

    struct EmptyStore;

    #[async_trait]
    impl PurgeStoreRepo for EmptyStore {
        async fn find_purge_candidates(&self, _cutoff: DateTime<Utc>) -> DbResult<Vec<CandidateId>> {
            Ok(Vec::new())
        }

        async fn begin(&self) -> DbResult<Box<dyn PurgeTransaction>> {
            Err(crate::db::DbError::Internal("no transactions".into()))
        }
    }

    fn job() -> PurgeJob {
        PurgeJob::new(Arc::new(EmptyStore), Arc::new(FixedBatchSize(10)), 61)
    }

    #[tokio::test]
    async fn test_cancelled_before_start_runs_nothing() {
        let token = CancellationToken::new();
        token.cancel();
        assert_eq!(run_worker_loop(&job(), Duration::from_secs(3600), &token).await, 0);
    }

    #[tokio::test]
    async fn test_cancel_during_sleep_stops_after_current_run() {
        let token = CancellationToken::new();
        let canceller = token.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let runs = run_worker_loop(&job(), Duration::from_secs(3600), &token).await;
        assert_eq!(runs, 1);
        handle.await.unwrap();
    }
}
