//! Updater configuration file (`~/.seamless-update/config.toml`).
//!
//! One file configures exactly one managed target together with the remote
//! manifest URL and the tuning knobs of the update engine. Every knob has a
//! default supplied through a `#[serde(default = "...")]` function, so a
//! minimal file only names the target and the URL:
//!
//! ```toml
//! update_url = "https://updates.example.com/my-theme/manifest.json"
//!
//! [target]
//! slug = "my-theme"
//! root = "/var/www/site/themes/my-theme"
//! ```

use crate::constants::{
    DEFAULT_BACKUPS_TO_KEEP, DEFAULT_SIDECAR_FILE, MANIFEST_TIMEOUT, MAX_BACKUPS_TO_KEEP,
    MIN_PACKAGE_TIMEOUT, ORPHAN_MAX_AGE, PACKAGE_TIMEOUT, SCHEDULE_DELAY, STALL_THRESHOLD,
};
use crate::core::UpdateError;
use crate::utils::validate_slug;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::fs;

/// Environment variable naming the configuration file.
pub const CONFIG_ENV_VAR: &str = "SEAMLESS_UPDATE_CONFIG";

/// Problems found while locating or validating the configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// No configuration file at the resolved location.
    #[error("Configuration file not found: {}", path.display())]
    NotFound {
        /// Resolved location
        path: PathBuf,
    },

    /// A field is missing or has an unusable value.
    #[error("Invalid configuration value for '{field}': {reason}")]
    Invalid {
        /// Dotted key of the offending field
        field: &'static str,
        /// What is wrong with it
        reason: String,
    },
}

impl From<ConfigError> for UpdateError {
    fn from(error: ConfigError) -> Self {
        Self::configuration(error.to_string())
    }
}

/// The managed tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Stable identifier used to name working directories and status records.
    #[serde(default)]
    pub slug: String,

    /// Live root of the managed tree.
    #[serde(default)]
    pub root: PathBuf,
}

/// How the staging tree treats files the manifest does not list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StagingMode {
    /// Replace listed files and keep everything else.
    #[default]
    Overlay,
    /// Replace listed files and delete every file that is not listed.
    Mirror,
}

/// Where the active version oracle reads the deployed versions from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VersionSource {
    /// JSON sidecar written by the deployed artifact.
    Sidecar {
        /// Sidecar path relative to the live root
        #[serde(default = "default_sidecar_file")]
        file: PathBuf,
    },
    /// Stylesheet `Version:` header plus a `define()` in the functions file.
    ThemeHeader {
        /// Stylesheet relative to the live root
        #[serde(default = "default_stylesheet")]
        stylesheet: PathBuf,
        /// File declaring the internal version constant, relative to the live root
        #[serde(default = "default_functions_file")]
        functions_file: PathBuf,
        /// Name of the internal version constant
        #[serde(default = "default_version_constant")]
        constant: String,
    },
}

impl Default for VersionSource {
    fn default() -> Self {
        Self::Sidecar {
            file: default_sidecar_file(),
        }
    }
}

fn default_sidecar_file() -> PathBuf {
    PathBuf::from(DEFAULT_SIDECAR_FILE)
}

fn default_stylesheet() -> PathBuf {
    PathBuf::from("style.css")
}

fn default_functions_file() -> PathBuf {
    PathBuf::from("functions.php")
}

fn default_version_constant() -> String {
    "INT_VERSION".to_string()
}

fn default_work_root() -> PathBuf {
    dirs::home_dir()
        .map_or_else(|| PathBuf::from(".seamless-update"), |home| home.join(".seamless-update"))
        .join("work")
}

const fn default_backups_to_keep() -> usize {
    DEFAULT_BACKUPS_TO_KEEP
}

const fn default_manifest_timeout_secs() -> u64 {
    MANIFEST_TIMEOUT.as_secs()
}

const fn default_package_timeout_secs() -> u64 {
    PACKAGE_TIMEOUT.as_secs()
}

const fn default_stall_threshold_secs() -> u64 {
    STALL_THRESHOLD.as_secs()
}

const fn default_orphan_max_age_secs() -> u64 {
    ORPHAN_MAX_AGE.as_secs()
}

const fn default_schedule_delay_secs() -> u64 {
    SCHEDULE_DELAY.as_secs()
}

/// Complete updater configuration.
///
/// Load it with [`UpdaterConfig::load`] and check it with
/// [`UpdaterConfig::validate`] before handing it to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdaterConfig {
    /// Remote manifest URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_url: Option<String>,

    /// Parent of `tmp/`, `backups/`, `staging-*` and `status/`.
    #[serde(default = "default_work_root")]
    pub work_root: PathBuf,

    /// Backups retained after a successful update. `0` disables backups.
    #[serde(default = "default_backups_to_keep")]
    pub backups_to_keep: usize,

    /// Hosts the manifest and package may be fetched from. Empty allows any.
    ///
    /// An entry starting with `.` also matches every subdomain.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_hosts: Vec<String>,

    /// Overlay or mirror staging.
    #[serde(default)]
    pub staging_mode: StagingMode,

    /// Tolerate manifest files that are missing from the package.
    #[serde(default)]
    pub allow_partial: bool,

    /// Manifest request timeout in seconds.
    #[serde(default = "default_manifest_timeout_secs")]
    pub manifest_timeout_secs: u64,

    /// Package download timeout in seconds, never below 60.
    #[serde(default = "default_package_timeout_secs")]
    pub package_timeout_secs: u64,

    /// Seconds without a progress write before a reader reports a stall.
    #[serde(default = "default_stall_threshold_secs")]
    pub stall_threshold_secs: u64,

    /// Age in seconds after which leftover working directories are collected.
    #[serde(default = "default_orphan_max_age_secs")]
    pub orphan_max_age_secs: u64,

    /// Delay in seconds the checker applies when scheduling an update.
    #[serde(default = "default_schedule_delay_secs")]
    pub schedule_delay_secs: u64,

    /// Active version oracle selection.
    #[serde(default)]
    pub version_source: VersionSource,

    /// The managed tree.
    #[serde(default)]
    pub target: TargetConfig,
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            update_url: None,
            work_root: default_work_root(),
            backups_to_keep: default_backups_to_keep(),
            allowed_hosts: Vec::new(),
            staging_mode: StagingMode::default(),
            allow_partial: false,
            manifest_timeout_secs: default_manifest_timeout_secs(),
            package_timeout_secs: default_package_timeout_secs(),
            stall_threshold_secs: default_stall_threshold_secs(),
            orphan_max_age_secs: default_orphan_max_age_secs(),
            schedule_delay_secs: default_schedule_delay_secs(),
            version_source: VersionSource::default(),
            target: TargetConfig::default(),
        }
    }
}

impl UpdaterConfig {
    /// Create a configuration for one target with every other value defaulted.
    pub fn new(slug: impl Into<String>, root: impl Into<PathBuf>, update_url: impl Into<String>) -> Self {
        Self {
            update_url: Some(update_url.into()),
            target: TargetConfig {
                slug: slug.into(),
                root: root.into(),
            },
            ..Self::default()
        }
    }

    /// Resolve which configuration file to use.
    ///
    /// Precedence: `explicit` (the `--config` flag), then the
    /// `SEAMLESS_UPDATE_CONFIG` environment variable, then
    /// `~/.seamless-update/config.toml`.
    pub fn resolve_path(explicit: Option<PathBuf>) -> Result<PathBuf> {
        if let Some(path) = explicit {
            return Ok(path);
        }
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR)
            && !path.trim().is_empty()
        {
            return Ok(PathBuf::from(path));
        }
        Self::default_path()
    }

    /// Default configuration location (`~/.seamless-update/config.toml`).
    pub fn default_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| anyhow::anyhow!("Unable to determine home directory"))?;
        Ok(home.join(".seamless-update").join("config.toml"))
    }

    /// Locate and load the configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotFound`] when the resolved file does not exist,
    /// and a context-wrapped error when it cannot be read or parsed.
    pub async fn load(explicit: Option<PathBuf>) -> Result<Self> {
        let path = Self::resolve_path(explicit)?;
        if !path.exists() {
            return Err(UpdateError::from(ConfigError::NotFound {
                path,
            })
            .into());
        }
        Self::load_from(&path).await
    }

    /// Load the configuration from a specific file.
    ///
    /// Relative `target.root` and `work_root` values are resolved against the
    /// directory containing the file.
    pub async fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        let mut config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))?;

        if let Some(base) = path.parent() {
            config.resolve_relative_to(base);
        }
        Ok(config)
    }

    fn resolve_relative_to(&mut self, base: &Path) {
        if !self.target.root.as_os_str().is_empty() && self.target.root.is_relative() {
            self.target.root = base.join(&self.target.root);
        }
        if self.work_root.is_relative() {
            self.work_root = base.join(&self.work_root);
        }
    }

    /// Write the configuration to a file, creating parent directories.
    pub async fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).await.with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(path, content)
            .await
            .with_context(|| format!("Failed to write config to {}", path.display()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;

            let mut perms = fs::metadata(path)
                .await
                .with_context(|| format!("Failed to read permissions for {}", path.display()))?
                .permissions();
            perms.set_mode(0o600);
            fs::set_permissions(path, perms).await.with_context(|| {
                format!("Failed to set permissions on {}", path.display())
            })?;
        }

        Ok(())
    }

    /// Check that the configuration names a usable target and manifest URL.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_slug(&self.target.slug).map_err(|e| ConfigError::Invalid {
            field: "target.slug",
            reason: e.to_string(),
        })?;

        if self.target.root.as_os_str().is_empty() {
            return Err(ConfigError::Invalid {
                field: "target.root",
                reason: "no live root configured".to_string(),
            });
        }

        let url = self.update_url.as_deref().map(str::trim).unwrap_or_default();
        if url.is_empty() {
            return Err(ConfigError::Invalid {
                field: "update_url",
                reason: "no manifest URL configured".to_string(),
            });
        }
        let lower = url.to_ascii_lowercase();
        if !lower.starts_with("http://") && !lower.starts_with("https://") {
            return Err(ConfigError::Invalid {
                field: "update_url",
                reason: format!("'{url}' is not an http or https URL"),
            });
        }

        if let VersionSource::ThemeHeader {
            constant,
            ..
        } = &self.version_source
            && constant.trim().is_empty()
        {
            return Err(ConfigError::Invalid {
                field: "version_source.constant",
                reason: "constant name is empty".to_string(),
            });
        }

        Ok(())
    }

    /// Retention count after applying the upper bound.
    #[must_use]
    pub fn effective_backups_to_keep(&self) -> usize {
        self.backups_to_keep.min(MAX_BACKUPS_TO_KEEP)
    }

    /// Manifest request timeout.
    #[must_use]
    pub const fn manifest_timeout(&self) -> Duration {
        Duration::from_secs(self.manifest_timeout_secs)
    }

    /// Package download timeout, raised to the minimum when configured lower.
    #[must_use]
    pub fn package_timeout(&self) -> Duration {
        Duration::from_secs(self.package_timeout_secs).max(MIN_PACKAGE_TIMEOUT)
    }

    /// Progress stall threshold.
    #[must_use]
    pub const fn stall_threshold(&self) -> Duration {
        Duration::from_secs(self.stall_threshold_secs)
    }

    /// Orphaned working directory age limit.
    #[must_use]
    pub const fn orphan_max_age(&self) -> Duration {
        Duration::from_secs(self.orphan_max_age_secs)
    }

    /// Delay applied by the checker when scheduling.
    #[must_use]
    pub const fn schedule_delay(&self) -> Duration {
        Duration::from_secs(self.schedule_delay_secs)
    }

    /// Example written by `seamless-update init`.
    #[must_use]
    pub fn init_example() -> Self {
        let mut config = Self::new(
            "my-theme",
            "/var/www/site/wp-content/themes/my-theme",
            "https://updates.example.com/my-theme/manifest.json",
        );
        config.allowed_hosts = vec!["updates.example.com".to_string()];
        config
    }
}
