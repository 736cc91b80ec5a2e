//! Directory operations for creating, copying, moving, and removing trees.
//!
//! These are the blocking primitives behind [`super::LocalFs`]. Every
//! function attaches the offending path to its error so a failed stage can be
//! reconstructed from the log alone.

use anyhow::{Context, Result, anyhow};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Ensures a directory exists, creating it and all parent directories if necessary.
///
/// # Returns
///
/// - `Ok(())` if the directory exists or was successfully created
/// - `Err` if the path exists but is not a directory, or creation fails
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)
            .with_context(|| format!("Failed to create directory: {}", path.display()))?;
    } else if !path.is_dir() {
        return Err(anyhow!("Path exists but is not a directory: {}", path.display()));
    }
    Ok(())
}

/// Ensures that the parent directory of a file path exists.
pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        ensure_dir(parent)?;
    }
    Ok(())
}

/// Recursively copies a directory and all its contents to a new location.
///
/// # Behavior
///
/// - Creates destination directory if it doesn't exist
/// - Recursively copies all subdirectories
/// - Copies regular files (permissions travel with `fs::copy`)
/// - Recreates symlinks on Unix instead of following them
/// - Overwrites existing files in the destination
pub fn copy_dir(src: &Path, dst: &Path) -> Result<()> {
    if !src.is_dir() {
        return Err(anyhow!("Source is not a directory: {}", src.display()));
    }
    ensure_dir(dst)?;

    for entry in
        fs::read_dir(src).with_context(|| format!("Failed to read directory: {}", src.display()))?
    {
        let entry =
            entry.with_context(|| format!("Failed to read entry in: {}", src.display()))?;
        let file_type = entry.file_type()?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        if file_type.is_dir() {
            copy_dir(&src_path, &dst_path)?;
        } else if file_type.is_file() {
            fs::copy(&src_path, &dst_path).with_context(|| {
                format!("Failed to copy file from {} to {}", src_path.display(), dst_path.display())
            })?;
        } else if file_type.is_symlink() {
            copy_symlink(&src_path, &dst_path)?;
        }
    }

    Ok(())
}

#[cfg(unix)]
fn copy_symlink(src: &Path, dst: &Path) -> Result<()> {
    let target = fs::read_link(src)
        .with_context(|| format!("Failed to read symlink: {}", src.display()))?;
    if dst.symlink_metadata().is_ok() {
        fs::remove_file(dst)
            .with_context(|| format!("Failed to replace existing entry: {}", dst.display()))?;
    }
    std::os::unix::fs::symlink(&target, dst)
        .with_context(|| format!("Failed to recreate symlink: {}", dst.display()))
}

#[cfg(not(unix))]
fn copy_symlink(src: &Path, _dst: &Path) -> Result<()> {
    tracing::warn!("Skipping symlink {}", src.display());
    Ok(())
}

/// Recursively removes a directory and all its contents.
///
/// Missing paths are not an error. A symlink is removed as a link; its target
/// is left alone.
pub fn remove_dir_all(path: &Path) -> Result<()> {
    match path.symlink_metadata() {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => {
            Err(e).with_context(|| format!("Failed to inspect path: {}", path.display()))
        }
        Ok(meta) if meta.file_type().is_symlink() || meta.is_file() => fs::remove_file(path)
            .with_context(|| format!("Failed to remove file: {}", path.display())),
        Ok(_) => fs::remove_dir_all(path)
            .with_context(|| format!("Failed to remove directory: {}", path.display())),
    }
}

/// Moves a file or directory, replacing a file already at the destination.
///
/// Uses a rename when source and destination share a volume. When the rename
/// fails with a cross-device error the entry is copied and the source removed,
/// which is no longer atomic.
pub fn move_path(src: &Path, dst: &Path) -> Result<()> {
    ensure_parent_dir(dst)?;

    if dst.is_file() {
        fs::remove_file(dst)
            .with_context(|| format!("Failed to replace existing file: {}", dst.display()))?;
    }

    match fs::rename(src, dst) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            tracing::debug!(
                "Rename across devices, copying {} to {}",
                src.display(),
                dst.display()
            );
            if src.is_dir() {
                copy_dir(src, dst)?;
            } else {
                fs::copy(src, dst).with_context(|| {
                    format!("Failed to copy {} to {}", src.display(), dst.display())
                })?;
            }
            remove_dir_all(src)
        }
        Err(e) => Err(e).with_context(|| {
            format!("Failed to move {} to {}", src.display(), dst.display())
        }),
    }
}

/// Lists every regular file below `root`, as paths relative to `root`.
///
/// Results are sorted so callers iterate deterministically.
pub fn list_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(false) {
        let entry =
            entry.with_context(|| format!("Failed to walk directory: {}", root.display()))?;
        if entry.file_type().is_file() || entry.file_type().is_symlink() {
            let relative = entry
                .path()
                .strip_prefix(root)
                .with_context(|| format!("Entry outside of {}", root.display()))?;
            files.push(relative.to_path_buf());
        }
    }
    files.sort();
    Ok(files)
}

/// Removes directories below `root` that no longer contain any files.
///
/// `root` itself is kept. Returns the number of directories removed.
pub fn remove_empty_dirs(root: &Path) -> Result<usize> {
    let mut removed = 0;
    // contents_first visits children before their parent
    for entry in WalkDir::new(root).min_depth(1).contents_first(true) {
        let entry =
            entry.with_context(|| format!("Failed to walk directory: {}", root.display()))?;
        if entry.file_type().is_dir() {
            let is_empty = fs::read_dir(entry.path())
                .with_context(|| format!("Failed to read directory: {}", entry.path().display()))?
                .next()
                .is_none();
            if is_empty {
                fs::remove_dir(entry.path()).with_context(|| {
                    format!("Failed to remove empty directory: {}", entry.path().display())
                })?;
                removed += 1;
            }
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_ensure_dir() {
        let temp = tempdir().unwrap();
        let test_dir = temp.path().join("a").join("b");

        assert!(!test_dir.exists());
        ensure_dir(&test_dir).unwrap();
        assert!(test_dir.is_dir());
    }

    #[test]
    fn test_ensure_dir_on_file() {
        let temp = tempdir().unwrap();
        let file_path = temp.path().join("file.txt");
        fs::write(&file_path, "content").unwrap();

        assert!(ensure_dir(&file_path).is_err());
    }

    #[test]
    fn test_copy_dir() {
        let temp = tempdir().unwrap();
        let src = temp.path().join("src");
        let dst = temp.path().join("dst");

        ensure_dir(&src.join("subdir")).unwrap();
        fs::write(src.join("file1.txt"), "content1").unwrap();
        fs::write(src.join("subdir/file2.txt"), "content2").unwrap();

        copy_dir(&src, &dst).unwrap();

        assert_eq!(fs::read_to_string(dst.join("file1.txt")).unwrap(), "content1");
        assert_eq!(fs::read_to_string(dst.join("subdir/file2.txt")).unwrap(), "content2");
    }

    #[test]
    fn test_copy_dir_missing_source() {
        let temp = tempdir().unwrap();
        let result = copy_dir(&temp.path().join("missing"), &temp.path().join("dst"));
        assert!(result.is_err());
    }

    #[test]
    #[cfg(unix)]
    fn test_copy_dir_preserves_symlinks() {
        let temp = tempdir().unwrap();
        let src = temp.path().join("src");
        ensure_dir(&src).unwrap();
        fs::write(src.join("real.txt"), "data").unwrap();
        std::os::unix::fs::symlink("real.txt", src.join("link.txt")).unwrap();

        let dst = temp.path().join("dst");
        copy_dir(&src, &dst).unwrap();

        let link_meta = dst.join("link.txt").symlink_metadata().unwrap();
        assert!(link_meta.file_type().is_symlink());
        assert_eq!(fs::read_link(dst.join("link.txt")).unwrap(), PathBuf::from("real.txt"));
    }

    #[test]
    fn test_remove_dir_all_nonexistent() {
        let temp = tempdir().unwrap();
        remove_dir_all(&temp.path().join("nonexistent")).unwrap();
    }

    #[test]
    #[cfg(unix)]
    fn test_remove_dir_all_symlink() {
        let temp = tempdir().unwrap();
        let target = temp.path().join("target");
        let link = temp.path().join("link");

        ensure_dir(&target).unwrap();
        fs::write(target.join("important.txt"), "data").unwrap();
        std::os::unix::fs::symlink(&target, &link).unwrap();

        remove_dir_all(&link).unwrap();

        assert!(!link.exists());
        assert!(target.join("important.txt").exists());
    }

    #[test]
    fn test_move_path_replaces_file() {
        let temp = tempdir().unwrap();
        let src = temp.path().join("new.txt");
        let dst = temp.path().join("nested/old.txt");
        fs::write(&src, "NEW").unwrap();
        ensure_parent_dir(&dst).unwrap();
        fs::write(&dst, "OLD").unwrap();

        move_path(&src, &dst).unwrap();

        assert!(!src.exists());
        assert_eq!(fs::read_to_string(&dst).unwrap(), "NEW");
    }

    #[test]
    fn test_move_path_directory() {
        let temp = tempdir().unwrap();
        let src = temp.path().join("staging");
        ensure_dir(&src.join("inner")).unwrap();
        fs::write(src.join("inner/f.txt"), "x").unwrap();

        let dst = temp.path().join("live");
        move_path(&src, &dst).unwrap();

        assert!(!src.exists());
        assert_eq!(fs::read_to_string(dst.join("inner/f.txt")).unwrap(), "x");
    }

    #[test]
    fn test_list_files_relative_and_sorted() {
        let temp = tempdir().unwrap();
        ensure_dir(&temp.path().join("b")).unwrap();
        fs::write(temp.path().join("b/z.txt"), "").unwrap();
        fs::write(temp.path().join("a.txt"), "").unwrap();

        let files = list_files(temp.path()).unwrap();
        assert_eq!(files, vec![PathBuf::from("a.txt"), PathBuf::from("b/z.txt")]);
    }

    #[test]
    fn test_remove_empty_dirs() {
        let temp = tempdir().unwrap();
        ensure_dir(&temp.path().join("empty/deeper")).unwrap();
        ensure_dir(&temp.path().join("full")).unwrap();
        fs::write(temp.path().join("full/f.txt"), "").unwrap();

        let removed = remove_empty_dirs(temp.path()).unwrap();

        assert_eq!(removed, 2);
        assert!(!temp.path().join("empty").exists());
        assert!(temp.path().join("full/f.txt").exists());
        assert!(temp.path().exists());
    }
}
