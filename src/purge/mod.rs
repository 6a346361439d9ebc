//! Batch purge of expired anonymous customers.
//!
//! A run scans for eligible customers once, splits them into fixed-size
//! batches and deletes each batch's aggregates in its own transaction. See
//! [`PurgeJob`] for the entry point.

mod batch_size;
mod controller;
mod error;
mod executor;
mod line_items;
mod outcome;
mod scanner;
mod splitter;
pub mod worker;

pub use batch_size::{BatchSizeProvider, FixedBatchSize, SettingsBatchSize};
pub use controller::{PurgeJob, RunState};
pub use error::{BatchError, BatchFailureKind, PurgeError};
pub use executor::CascadeDeleteExecutor;
pub use line_items::LineItemArena;
pub use outcome::{BatchFailure, BatchOutcome, DeletedRows, RunSummary};
pub use scanner::{CandidateSet, EligibilityScanner};
pub use splitter::{Batch, partition};
