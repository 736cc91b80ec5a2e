//! Test utilities for seamless-update
//!
//! This module provides the doubles and fixtures shared by unit tests and the
//! integration suite (through the `test-utils` feature):
//!
//! - [`FakeHttp`] serves manifests and packages from memory
//! - [`FaultyFs`] wraps the local disk and fails chosen operations
//! - [`PackageBuilder`] builds zip packages in memory
//! - [`TargetFixture`] sets up a live tree, a work root, and a published update
//!
//! # Example
//!
//! ```rust,no_run
//! use seamless_update::test_utils::TargetFixture;
//!
//! # async fn example() {
//! let fixture = TargetFixture::new("2.3.0", "5");
//! fixture.publish("2.3.0", "6", &[("a.txt", "NEW")]);
//!
//! let outcome = fixture.engine().perform_update().await;
//! assert!(outcome.is_success());
//! assert_eq!(fixture.read_live("a.txt"), "NEW");
//! # }
//! ```

pub mod environment;
pub mod fixtures;
pub mod fs;
pub mod http;

pub use environment::{MANIFEST_URL, PACKAGE_URL, TargetFixture, snapshot};
pub use fixtures::{PackageBuilder, RecordingProgressStore, StaticVersions, sha256_hex};
pub use fs::{FaultyFs, FsOp};
pub use http::FakeHttp;

use std::sync::Once;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Global flag to ensure logging is only initialized once in tests
static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests.
///
/// Uses `level` when given, otherwise `RUST_LOG`; with neither, logging stays
/// off. Safe to call from every test.
///
/// ```bash
/// RUST_LOG=seamless_update=debug cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .try_init();
    });
}
