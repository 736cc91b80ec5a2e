//! Atomic switch of staging into the live path.
//!
//! The live tree is deleted and the staging directory moved into its place.
//! Between the two steps the live path does not exist; the caller must hold a
//! backup before calling [`switch_live`].

use crate::utils::Filesystem;
use anyhow::{Context, Result};
use std::path::Path;
use tracing::{info, warn};

/// Replace `live_root` with `staging_dir`.
///
/// A failed delete is logged and the move is attempted anyway: if the old
/// tree is still complete the move simply fails and the caller rolls back to
/// an identical backup.
pub fn switch_live(fs: &dyn Filesystem, slug: &str, live_root: &Path, staging_dir: &Path) -> Result<()> {
    info!("[{slug}] Switching {} into {}", staging_dir.display(), live_root.display());

    if let Err(e) = fs.remove_dir_all(live_root) {
        if fs.exists(live_root) {
            warn!("[{slug}] Failed to delete live tree, attempting direct move: {e:#}");
        } else {
            warn!("[{slug}] Delete of live tree reported an error but the path is gone: {e:#}");
        }
    }

    fs.rename(staging_dir, live_root).with_context(|| {
        format!("Failed to move staging {} into {}", staging_dir.display(), live_root.display())
    })?;

    info!("[{slug}] Switch complete");
    Ok(())
}
