use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use super::PurgeError;
use crate::{db::PurgeStoreRepo, models::CandidateId};

/// Candidates captured by one scan, in ascending uid order.
///
/// Immutable for the rest of the run; later changes to the store are not
/// reflected here.
#[derive(Debug, Clone)]
pub struct CandidateSet {
    cutoff: DateTime<Utc>,
    ids: Vec<CandidateId>,
}

impl CandidateSet {
    pub fn new(cutoff: DateTime<Utc>, ids: Vec<CandidateId>) -> Self {
        Self { cutoff, ids }
    }

    pub fn cutoff(&self) -> DateTime<Utc> {
        self.cutoff
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn as_slice(&self) -> &[CandidateId] {
        &self.ids
    }
}

/// Finds expired, orderless anonymous customers.
pub struct EligibilityScanner {
    store: Arc<dyn PurgeStoreRepo>,
}

impl EligibilityScanner {
    pub fn new(store: Arc<dyn PurgeStoreRepo>) -> Self {
        Self { store }
    }

    /// Customers last modified strictly before `now - retention_days` are expired.
    ///
    /// A window reaching past the representable date range is a configuration error.
    pub fn cutoff(now: DateTime<Utc>, retention_days: u32) -> Result<DateTime<Utc>, PurgeError> {
        Duration::try_days(i64::from(retention_days))
            .and_then(|window| now.checked_sub_signed(window))
            .ok_or_else(|| {
                PurgeError::Configuration(format!(
                    "retention window of {retention_days} days is out of range"
                ))
            })
    }

    /// Capture the candidate set. Read-only.
    pub async fn scan(&self, cutoff: DateTime<Utc>) -> Result<CandidateSet, PurgeError> {
        let mut ids = self
            .store
            .find_purge_candidates(cutoff)
            .await
            .map_err(PurgeError::Scan)?;

        // Batches are carved in uid order.
        ids.sort_unstable_by_key(|c| c.uid);
        ids.dedup_by_key(|c| c.uid);

        tracing::debug!(%cutoff, candidates = ids.len(), "Eligibility scan complete");
        Ok(CandidateSet::new(cutoff, ids))
    }
}
