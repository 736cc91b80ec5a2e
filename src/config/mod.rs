//! Configuration management for seamless-update
//!
//! A single TOML file configures one managed target: its slug and live root,
//! the remote manifest URL, the work root holding temp, staging, backup and
//! status directories, and the engine's tuning knobs.
//!
//! # Location
//!
//! 1. `--config <path>`
//! 2. `SEAMLESS_UPDATE_CONFIG`
//! 3. `~/.seamless-update/config.toml`
//!
//! # Example
//!
//! ```toml
//! update_url = "https://updates.example.com/my-theme/manifest.json"
//! backups_to_keep = 3
//! staging_mode = "overlay"
//! allowed_hosts = ["updates.example.com"]
//!
//! [target]
//! slug = "my-theme"
//! root = "/var/www/site/wp-content/themes/my-theme"
//!
//! [version_source]
//! kind = "sidecar"
//! file = ".seamless-version"
//! ```

mod global;

pub use global::{
    CONFIG_ENV_VAR, ConfigError, StagingMode, TargetConfig, UpdaterConfig, VersionSource,
};
