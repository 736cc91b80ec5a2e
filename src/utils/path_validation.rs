//! Path validation and security utilities.
//!
//! Manifest paths and archive entry names come from the network, so they are
//! checked here before anything is joined onto a local directory.

use anyhow::{Result, anyhow};
use std::path::{Component, Path};

/// Validates that a path doesn't contain parent directory references (`..`).
pub fn validate_no_traversal(path: &Path) -> Result<()> {
    if path.components().any(|c| matches!(c, Component::ParentDir)) {
        return Err(anyhow!(
            "Path contains parent directory reference (..): {}",
            path.display()
        ));
    }
    Ok(())
}

/// Validates that a path is relative and stays below whatever it is joined onto.
///
/// Rejects absolute paths, Windows drive or UNC prefixes, `..` segments and
/// paths with no normal component at all.
pub fn validate_contained(path: &Path) -> Result<()> {
    validate_no_traversal(path)?;

    let mut has_normal = false;
    for component in path.components() {
        match component {
            Component::RootDir | Component::Prefix(_) => {
                return Err(anyhow!("Path must be relative: {}", path.display()));
            }
            Component::Normal(_) => has_normal = true,
            Component::CurDir | Component::ParentDir => {}
        }
    }

    // A drive letter is only a Prefix component on Windows
    if let Some(first) = path.to_str().and_then(|s| s.split('/').next())
        && first.len() == 2
        && first.ends_with(':')
        && first.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
    {
        return Err(anyhow!("Path must not carry a drive prefix: {}", path.display()));
    }

    if !has_normal {
        return Err(anyhow!("Path is empty"));
    }
    Ok(())
}

/// Validates a target slug used to name working directories.
///
/// Slugs are joined into directory names, so separators and `..` are refused.
pub fn validate_slug(slug: &str) -> Result<()> {
    if slug.trim().is_empty() {
        return Err(anyhow!("Target slug is empty"));
    }
    if slug.contains('/') || slug.contains('\\') || slug.contains("..") {
        return Err(anyhow!("Target slug '{slug}' must not contain path separators or '..'"));
    }
    Ok(())
}
