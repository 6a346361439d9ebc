use thiserror::Error;

use crate::db::DbError;

/// Errors that abort a whole purge run before any batch is attempted.
#[derive(Debug, Error)]
pub enum PurgeError {
    /// Invalid retention window or batch size.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The eligibility scan could not read the store.
    #[error("Eligibility scan failed: {0}")]
    Scan(#[source] DbError),
}

/// Why one batch was rolled back. Never aborts the run.
#[derive(Debug, Error)]
pub enum BatchError {
    /// Resolving or deleting rows inside the transaction failed.
    #[error("Batch processing failed: {0}")]
    Processing(#[source] DbError),

    /// The store rejected the commit, e.g. an order now references a customer.
    #[error("Batch commit failed: {0}")]
    Commit(#[source] DbError),
}

/// Phase in which a batch failed. Only used for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchFailureKind {
    Processing,
    Commit,
}

impl BatchFailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchFailureKind::Processing => "processing",
            BatchFailureKind::Commit => "commit",
        }
    }
}

impl BatchError {
    pub fn kind(&self) -> BatchFailureKind {
        match self {
            BatchError::Processing(_) => BatchFailureKind::Processing,
            BatchError::Commit(_) => BatchFailureKind::Commit,
        }
    }

    /// The underlying store error.
    pub fn db_error(&self) -> &DbError {
        match self {
            BatchError::Processing(e) | BatchError::Commit(e) => e,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_error_kind() {
        let processing = BatchError::Processing(DbError::Internal("boom".into()));
        let commit = BatchError::Commit(DbError::Conflict("fk".into()));
        assert_eq!(processing.kind(), BatchFailureKind::Processing);
        assert_eq!(commit.kind().as_str(), "commit");
        assert!(commit.db_error().is_constraint_violation());
        assert!(!processing.db_error().is_constraint_violation());
    }
}
