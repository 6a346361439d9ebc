//! Batch purge engine for expired anonymous customers.
//!
//! [`purge::PurgeJob`] is the entry point: it scans for anonymous customers
//! past the retention window with no orders, and deletes each one together
//! with every record it owns, one transaction per batch.

pub mod config;
pub mod db;
pub mod models;
pub mod observability;
pub mod purge;
