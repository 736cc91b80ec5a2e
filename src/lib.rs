//! seamless-update - staged, rollback-safe updates for a managed directory tree
//!
//! A target (a theme or plugin directory, for example) is kept in step with a
//! remote JSON manifest. An update attempt downloads the package the manifest
//! names, verifies its SHA-256 digest, builds a staged copy of the live tree
//! with the new files applied, and swaps it in. Live content is backed up
//! before anything is modified, and any failure after that point restores the
//! backup.
//!
//! # Architecture Overview
//!
//! - The remote manifest carries a display version, an internal version, the
//!   package URL and digest, and the list of files the package replaces.
//! - The local version oracle reports what is installed.
//! - The comparator turns the two into a [`update::Decision`].
//! - The [`update::UpdateEngine`] drives one attempt through its stages and
//!   writes a [`update::ProgressRecord`] that other processes can poll.
//!
//! # Core Modules
//!
//! - [`cli`] - Command-line interface
//! - [`config`] - TOML configuration of the managed target
//! - [`constants`] - Shared names, limits and defaults
//! - [`core`] - Error types and user-facing error context
//! - [`http`] - HTTP client seam and URL allow-listing
//! - [`manifest`] - Remote manifest model and relative path validation
//! - [`update`] - Checking, retrieval, staging, switching, rollback, progress
//! - [`utils`] - Filesystem seam, atomic writes, path checks, progress bars
//! - [`version`] - Version parsing and comparison
//!
//! # Example
//!
//! ```rust,no_run
//! use seamless_update::config::UpdaterConfig;
//! use seamless_update::http::ReqwestClient;
//! use seamless_update::update::UpdateEngine;
//! use seamless_update::utils::LocalFs;
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = UpdaterConfig::load(None).await?;
//! let engine = UpdateEngine::new(config, Arc::new(LocalFs), ReqwestClient::new()?);
//! let outcome = engine.perform_update().await;
//! println!("{outcome}");
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod constants;
pub mod core;
pub mod http;
pub mod manifest;
pub mod update;
pub mod utils;
pub mod version;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
