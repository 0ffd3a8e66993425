//! Shelfwatch Integration Tests
//!
//! End-to-end tests for `shelfwatch-rdbc` against a real PostgreSQL
//! server. It is NOT published to crates.io.
//!
//! # Running Tests
//!
//! ```bash
//! # Run all integration tests (Docker must be running)
//! cargo test -p shelfwatch-integration-tests -- --ignored
//!
//! # Run with logging
//! RUST_LOG=debug cargo test -p shelfwatch-integration-tests -- --ignored --nocapture
//! ```

pub mod fixtures;
pub mod helpers;

pub use fixtures::*;
pub use helpers::*;
