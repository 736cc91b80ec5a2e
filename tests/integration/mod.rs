//! Integration test suite for seamless-update
//!
//! End-to-end tests that drive complete update attempts against a temporary
//! live tree and an in-memory update server, plus CLI tests against the
//! compiled binary.
//!
//! # Running Integration Tests
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! # Test Organization
//!
//! - **update_flow**: Successful updates, no-ops and clean aborts
//! - **rollback**: Failures after backup and the rollback outcomes
//! - **retention**: Backup retention across repeated updates
//! - **progress**: Progress records, stall detection and the checker
//! - **cli**: Commands that run without network access

mod cli;
mod progress;
mod retention;
mod rollback;
mod update_flow;
