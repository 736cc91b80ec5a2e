//! Global constants used throughout the seamless-update codebase.
//!
//! This module contains timeout durations, directory names, and other
//! numeric constants that are shared between the update stages and the
//! CLI. Defining them centrally keeps the on-disk layout in one place.

use std::time::Duration;

/// Directory under the work root holding per-attempt scratch directories.
pub const TEMP_DIR_NAME: &str = "tmp";

/// Directory under the work root holding timestamped backups.
pub const BACKUP_DIR_NAME: &str = "backups";

/// Prefix of per-attempt staging directories placed directly in the work root.
pub const STAGING_DIR_PREFIX: &str = "staging-";

/// Directory under the work root holding progress and status records.
pub const STATUS_DIR_NAME: &str = "status";

/// File name of the downloaded package inside an attempt's temp directory.
pub const PACKAGE_FILE_NAME: &str = "package.zip";

/// Directory name of the unpacked payload inside an attempt's temp directory.
pub const EXTRACT_DIR_NAME: &str = "extracted";

/// Default sidecar file holding the deployed versions, relative to the live root.
pub const DEFAULT_SIDECAR_FILE: &str = ".seamless-version";

/// Default number of backups retained after a successful update.
pub const DEFAULT_BACKUPS_TO_KEEP: usize = 3;

/// Upper bound on retained backups to prevent storage abuse.
pub const MAX_BACKUPS_TO_KEEP: usize = 10;

/// Timeout for manifest fetches (30 seconds).
pub const MANIFEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default timeout for package downloads (120 seconds).
///
/// Packages can be large, so this is deliberately generous.
pub const PACKAGE_TIMEOUT: Duration = Duration::from_secs(120);

/// Lower bound applied to configured package timeouts (60 seconds).
pub const MIN_PACKAGE_TIMEOUT: Duration = Duration::from_secs(60);

/// Age after which a progress record that is still in flight is reported as stalled.
pub const STALL_THRESHOLD: Duration = Duration::from_secs(120);

/// Age after which leftover temp and staging directories are garbage collected.
pub const ORPHAN_MAX_AGE: Duration = Duration::from_secs(3600);

/// Delay the checker applies when scheduling an update job.
pub const SCHEDULE_DELAY: Duration = Duration::from_secs(60);

/// Name of the scheduled job that performs an update for one target.
pub const PERFORM_UPDATE_JOB: &str = "perform_update";

/// User agent sent with manifest and package requests.
pub const USER_AGENT: &str = concat!("seamless-update/", env!("CARGO_PKG_VERSION"));
