//! Shared database test infrastructure
//!
//! Test bodies are async functions taking a [`fixtures::TestDb`] and are
//! instantiated per backend by `sqlite_test!` / `postgres_test!` macros:
//!
//! - **SQLite**: in-memory, runs with every `cargo test`
//! - **PostgreSQL**: testcontainers, run with `cargo test -- --ignored`
//!
//! # Running tests
//!
//! ```bash
//! cargo test                       # Run fast SQLite tests only
//! cargo test -- --ignored          # Run PostgreSQL integration tests (requires Docker)
//! cargo test -- --include-ignored  # Run all tests
//! ```

mod purge_store;
