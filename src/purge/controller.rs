use std::{sync::Arc, time::Instant};

use chrono::{DateTime, Utc};

use super::{
    BatchOutcome, BatchSizeProvider, CascadeDeleteExecutor, EligibilityScanner, PurgeError,
    RunSummary, SettingsBatchSize, partition,
};
use crate::{
    config::PurgeConfig,
    db::{DbPool, PurgeStoreRepo},
    observability::metrics,
};

/// Where a run is. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Initializing,
    Scanning,
    Partitioning,
    ProcessingBatch(usize),
    Completed,
    AbortedFatal,
}

impl RunState {
    pub fn can_transition_to(&self, next: RunState) -> bool {
        use RunState::*;
        match (*self, next) {
            (Initializing, Scanning | AbortedFatal) => true,
            (Scanning, Partitioning | Completed | AbortedFatal) => true,
            (Partitioning, ProcessingBatch(0) | AbortedFatal) => true,
            (ProcessingBatch(i), ProcessingBatch(j)) => j == i + 1,
            (ProcessingBatch(_), Completed) => true,
            _ => false,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Completed | RunState::AbortedFatal)
    }
}

struct RunTracker {
    state: RunState,
}

impl RunTracker {
    fn new() -> Self {
        Self {
            state: RunState::Initializing,
        }
    }

    fn advance(&mut self, next: RunState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "invalid purge transition {:?} -> {:?}",
            self.state,
            next
        );
        tracing::trace!(from = ?self.state, to = ?next, "Purge state transition");
        self.state = next;
    }

    fn abort(&mut self, error: &PurgeError, started: Instant) {
        self.advance(RunState::AbortedFatal);
        tracing::error!(error = %error, "Purge run aborted");
        metrics::record_purge_run("aborted", started.elapsed().as_secs_f64());
    }
}

/// Drives scan, partition and batch deletion for one purge run.
///
/// Batches run strictly one after another in scan order, each attempted
/// exactly once. A failed batch is recorded and the run moves on; only
/// configuration and scan errors end a run early.
pub struct PurgeJob {
    store: Arc<dyn PurgeStoreRepo>,
    batch_size: Arc<dyn BatchSizeProvider>,
    retention_days: u32,
    dry_run: bool,
}

impl PurgeJob {
    pub fn new(
        store: Arc<dyn PurgeStoreRepo>,
        batch_size: Arc<dyn BatchSizeProvider>,
        retention_days: u32,
    ) -> Self {
        Self {
            store,
            batch_size,
            retention_days,
            dry_run: false,
        }
    }

    /// Build a job reading its batch size from the settings table.
    pub fn from_config(db: &DbPool, config: &PurgeConfig) -> Self {
        let batch_size = SettingsBatchSize::new(
            db.settings(),
            config.batch_size_setting.clone(),
            config.default_batch_size,
        );
        Self::new(db.purge_store(), Arc::new(batch_size), config.retention_days)
            .with_dry_run(config.dry_run)
    }

    /// Replace the batch size source.
    pub fn with_batch_size(mut self, batch_size: Arc<dyn BatchSizeProvider>) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub async fn run(&self) -> Result<RunSummary, PurgeError> {
        self.run_at(Utc::now()).await
    }

    /// Run with an explicit clock.
    #[tracing::instrument(
        name = "purge.run",
        skip_all,
        fields(retention_days = self.retention_days, dry_run = self.dry_run)
    )]
    pub async fn run_at(&self, now: DateTime<Utc>) -> Result<RunSummary, PurgeError> {
        let started = Instant::now();
        let mut run = RunTracker::new();

        if self.retention_days == 0 {
            let error = PurgeError::Configuration("retention window must be at least one day".into());
            run.abort(&error, started);
            return Err(error);
        }
        let cutoff = match EligibilityScanner::cutoff(now, self.retention_days) {
            Ok(cutoff) => cutoff,
            Err(error) => {
                run.abort(&error, started);
                return Err(error);
            }
        };

        run.advance(RunState::Scanning);
        let candidates = match EligibilityScanner::new(Arc::clone(&self.store))
            .scan(cutoff)
            .await
        {
            Ok(candidates) => candidates,
            Err(error) => {
                run.abort(&error, started);
                return Err(error);
            }
        };

        let mut summary = RunSummary::new(cutoff, self.dry_run);
        summary.candidates = candidates.len();

        if candidates.is_empty() {
            run.advance(RunState::Completed);
            tracing::info!(%cutoff, "No anonymous customers eligible for purge");
            return Ok(self.finish(summary, started));
        }

        run.advance(RunState::Partitioning);
        let batch_size = match self.batch_size.current_batch_size().await {
            Ok(size) => size,
            Err(error) => {
                run.abort(&error, started);
                return Err(error);
            }
        };
        let batches = match partition(&candidates, batch_size) {
            Ok(batches) => batches,
            Err(error) => {
                run.abort(&error, started);
                return Err(error);
            }
        };
        summary.batch_size = Some(batch_size);
        summary.batches_total = batches.len();

        let dry_run_msg = if self.dry_run { " (DRY RUN)" } else { "" };
        tracing::info!(
            %cutoff,
            candidates = candidates.len(),
            batch_size,
            batches = batches.len(),
            "Purging anonymous customers{}",
            dry_run_msg
        );

        let executor = CascadeDeleteExecutor::new(Arc::clone(&self.store));
        for batch in &batches {
            run.advance(RunState::ProcessingBatch(batch.index()));

            if self.dry_run {
                tracing::info!(
                    batch_index = batch.index(),
                    customers = batch.len(),
                    "Would purge batch (DRY RUN)"
                );
                summary.record_skipped();
                metrics::record_purge_batch("skipped");
                continue;
            }

            let outcome = executor.delete_batch(batch).await;
            match &outcome {
                BatchOutcome::Succeeded {
                    count,
                    rows_deleted,
                } => {
                    tracing::debug!(
                        batch_index = batch.index(),
                        purged = count,
                        rows_deleted,
                        "Batch purged"
                    );
                    metrics::record_customers_purged(*count);
                }
                BatchOutcome::Failed { error } => {
                    tracing::warn!(
                        batch_index = batch.index(),
                        first_customer = batch.first().map(|c| c.uid),
                        kind = error.kind().as_str(),
                        error = %error,
                        "Batch rolled back; its customers stay eligible for the next run"
                    );
                    metrics::record_purge_batch_failure(error.kind().as_str());
                }
            }
            metrics::record_purge_batch(outcome.as_str());
            summary.record(batch, &outcome);
        }

        run.advance(RunState::Completed);
        Ok(self.finish(summary, started))
    }

    fn finish(&self, mut summary: RunSummary, started: Instant) -> RunSummary {
        let elapsed = started.elapsed();
        summary.duration_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);

        let status = if self.dry_run { "dry_run" } else { "completed" };
        metrics::record_purge_run(status, elapsed.as_secs_f64());

        if summary.has_failures() {
            tracing::warn!(
                purged = summary.customers_purged,
                batches_failed = summary.batches_failed,
                batches_total = summary.batches_total,
                duration_ms = summary.duration_ms,
                "Purge run complete with failed batches"
            );
        } else {
            tracing::info!(
                purged = summary.customers_purged,
                rows_deleted = summary.rows_deleted,
                batches_total = summary.batches_total,
                duration_ms = summary.duration_ms,
                dry_run = summary.dry_run,
                "Purge run complete"
            );
        }
        summary
    }
}
