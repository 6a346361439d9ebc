use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{Batch, BatchError, BatchFailureKind};
use crate::db::OwnedRecordSet;

/// Result of one batch. Never partial: either every aggregate in the batch
/// was removed or none was.
#[derive(Debug)]
pub enum BatchOutcome {
    Succeeded {
        /// Customer root rows removed.
        count: u64,
        /// Rows removed across every record set, roots included.
        rows_deleted: u64,
    },
    Failed {
        error: BatchError,
    },
}

impl BatchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, BatchOutcome::Succeeded { .. })
    }

    /// Metrics label.
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchOutcome::Succeeded { .. } => "succeeded",
            BatchOutcome::Failed { .. } => "failed",
        }
    }
}

/// Rows removed per record set inside one transaction.
#[derive(Debug, Default, Clone)]
pub struct DeletedRows {
    by_set: BTreeMap<OwnedRecordSet, u64>,
}

impl DeletedRows {
    pub fn add(&mut self, set: OwnedRecordSet, count: u64) {
        *self.by_set.entry(set).or_default() += count;
    }

    pub fn get(&self, set: OwnedRecordSet) -> u64 {
        self.by_set.get(&set).copied().unwrap_or(0)
    }

    pub fn customers(&self) -> u64 {
        self.get(OwnedRecordSet::Customers)
    }

    pub fn total(&self) -> u64 {
        self.by_set.values().sum()
    }
}

/// A batch that was rolled back.
#[derive(Debug, Clone, Serialize)]
pub struct BatchFailure {
    pub batch_index: usize,
    /// Uid of the first customer in the batch.
    pub first_customer: Option<i64>,
    pub size: usize,
    pub kind: BatchFailureKind,
    pub error: String,
}

/// Everything one run did, reported to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub cutoff: DateTime<Utc>,
    pub candidates: usize,
    /// Batch size read at partitioning; `None` when there was nothing to partition.
    pub batch_size: Option<i64>,
    pub batches_total: usize,
    pub batches_succeeded: usize,
    pub batches_failed: usize,
    /// Batches left untouched by a dry run.
    pub batches_skipped: usize,
    pub customers_purged: u64,
    pub rows_deleted: u64,
    pub failures: Vec<BatchFailure>,
    pub duration_ms: u64,
    pub dry_run: bool,
}

impl RunSummary {
    pub fn new(cutoff: DateTime<Utc>, dry_run: bool) -> Self {
        Self {
            cutoff,
            candidates: 0,
            batch_size: None,
            batches_total: 0,
            batches_succeeded: 0,
            batches_failed: 0,
            batches_skipped: 0,
            customers_purged: 0,
            rows_deleted: 0,
            failures: Vec::new(),
            duration_ms: 0,
            dry_run,
        }
    }

    pub fn record(&mut self, batch: &Batch<'_>, outcome: &BatchOutcome) {
        match outcome {
            BatchOutcome::Succeeded {
                count,
                rows_deleted,
            } => {
                self.batches_succeeded += 1;
                self.customers_purged += count;
                self.rows_deleted += rows_deleted;
            }
            BatchOutcome::Failed { error } => {
                self.batches_failed += 1;
                self.failures.push(BatchFailure {
                    batch_index: batch.index(),
                    first_customer: batch.first().map(|c| c.uid),
                    size: batch.len(),
                    kind: error.kind(),
                    error: error.to_string(),
                });
            }
        }
    }

    pub fn record_skipped(&mut self) {
        self.batches_skipped += 1;
    }

    /// Batches handed to the executor. Skipped dry-run batches do not count.
    pub fn batches_attempted(&self) -> usize {
        self.batches_succeeded + self.batches_failed
    }

    pub fn has_failures(&self) -> bool {
        self.batches_failed > 0
    }
}
