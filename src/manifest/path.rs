//! Normalised relative paths named by a manifest.

use crate::utils::validate_contained;
use serde::{Serialize, Serializer};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// A manifest path that cannot be applied safely.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unsafe manifest path '{raw}': {reason}")]
pub struct PathError {
    /// Path as it appeared in the manifest
    pub raw: String,
    /// Why it was rejected
    pub reason: String,
}

/// A `/`-separated path that is guaranteed to stay below the directory it is
/// joined onto.
///
/// Backslashes become forward slashes, leading `/` characters and `.`
/// segments are dropped, and repeated separators collapse. Empty paths, `..`
/// segments and drive prefixes are rejected.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RelativePath(String);

impl RelativePath {
    /// Normalise and validate a raw manifest path.
    pub fn parse(raw: &str) -> Result<Self, PathError> {
        let reject = |reason: &str| PathError {
            raw: raw.to_string(),
            reason: reason.to_string(),
        };

        let unified = raw.trim().replace('\\', "/");
        let segments: Vec<&str> =
            unified.split('/').filter(|s| !s.is_empty() && *s != ".").collect();

        if segments.is_empty() {
            return Err(reject("path is empty"));
        }
        if segments.contains(&"..") {
            return Err(reject("path contains '..'"));
        }

        let normalised = segments.join("/");
        validate_contained(Path::new(&normalised)).map_err(|e| reject(&e.to_string()))?;

        Ok(Self(normalised))
    }

    /// The normalised path.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The path as native components.
    #[must_use]
    pub fn to_path_buf(&self) -> PathBuf {
        self.0.split('/').collect()
    }

    /// Join onto a base directory.
    #[must_use]
    pub fn join_onto(&self, base: &Path) -> PathBuf {
        base.join(self.to_path_buf())
    }

    /// Build from a path relative to some root, as returned by a directory walk.
    pub fn from_relative(path: &Path) -> Result<Self, PathError> {
        let raw: Vec<String> =
            path.components().map(|c| c.as_os_str().to_string_lossy().into_owned()).collect();
        Self::parse(&raw.join("/"))
    }
}

impl fmt::Display for RelativePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for RelativePath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}
