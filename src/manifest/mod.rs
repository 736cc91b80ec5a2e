//! Remote update manifest.
//!
//! The update server publishes one JSON document per target:
//!
//! ```json
//! {
//!   "display_version": "2.3.0",
//!   "internal_version": "17",
//!   "package_url": "https://host/pkg.zip",
//!   "package_hash": "<hex sha256>",
//!   "files": ["assets/app.js", {"path": "templates/header.php", "hash": "...", "url": "..."}]
//! }
//! ```
//!
//! Only the two version fields are required to decide whether an update is
//! due. The package fields are checked separately by
//! [`UpdateManifest::package_spec`] once a package is actually going to be
//! applied. Entries of `files` may be plain strings or objects; both are
//! normalised to [`RelativePath`] while parsing.

mod path;

pub use path::{PathError, RelativePath};

use crate::core::{FetchError, UpdateError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One entry of the manifest `files` list as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ManifestFileEntry {
    /// Bare relative path.
    Path(String),
    /// Path with per-file metadata. The metadata is informational; the
    /// package digest covers the payload.
    WithMeta {
        /// Relative path
        path: String,
        /// Per-file digest
        #[serde(default, skip_serializing_if = "Option::is_none")]
        hash: Option<String>,
        /// Per-file download URL
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
    },
}

impl ManifestFileEntry {
    /// The raw relative path of this entry.
    #[must_use]
    pub fn raw_path(&self) -> &str {
        match self {
            Self::Path(path)
            | Self::WithMeta {
                path,
                ..
            } => path,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawManifest {
    display_version: Option<Value>,
    internal_version: Option<Value>,
    package_url: Option<String>,
    package_hash: Option<String>,
    #[serde(default)]
    files: Option<Vec<ManifestFileEntry>>,
}

/// Parsed and normalised update manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateManifest {
    /// Public version string.
    pub display_version: String,
    /// Fine-grained version counter.
    pub internal_version: String,
    /// Package download URL.
    pub package_url: Option<String>,
    /// Package SHA-256 digest.
    pub package_hash: Option<String>,
    /// Normalised file list.
    pub files: Vec<RelativePath>,
    /// Entries of `files` that failed normalisation.
    #[serde(skip)]
    pub rejected_files: Vec<PathError>,
}

/// The package-related part of a manifest, present only when a package can
/// be applied.
#[derive(Debug, Clone, Copy)]
pub struct PackageSpec<'a> {
    /// Package download URL
    pub url: &'a str,
    /// Expected SHA-256 digest
    pub hash: &'a str,
    /// Files the package replaces
    pub files: &'a [RelativePath],
}

fn version_field(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(|s| s.trim()).filter(|s| !s.is_empty())
}

impl UpdateManifest {
    /// Parse a manifest body fetched from `url`.
    ///
    /// # Errors
    ///
    /// [`FetchError::EmptyBody`], [`FetchError::MalformedJson`], or
    /// [`FetchError::MissingField`] for either version field. Missing package
    /// fields are tolerated here.
    pub fn parse(url: &str, body: &[u8]) -> Result<Self, FetchError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Err(FetchError::EmptyBody {
                url: url.to_string(),
            });
        }

        let raw: RawManifest =
            serde_json::from_slice(body).map_err(|e| FetchError::MalformedJson {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        let display_version =
            version_field(raw.display_version.as_ref()).ok_or_else(|| FetchError::MissingField {
                url: url.to_string(),
                field: "display_version",
            })?;
        let internal_version = version_field(raw.internal_version.as_ref()).ok_or_else(|| {
            FetchError::MissingField {
                url: url.to_string(),
                field: "internal_version",
            }
        })?;

        let mut files = Vec::new();
        let mut rejected_files = Vec::new();
        for entry in raw.files.unwrap_or_default() {
            match RelativePath::parse(entry.raw_path()) {
                Ok(path) => {
                    if !files.contains(&path) {
                        files.push(path);
                    }
                }
                Err(e) => rejected_files.push(e),
            }
        }

        Ok(Self {
            display_version,
            internal_version,
            package_url: non_empty(raw.package_url.as_ref()).map(str::to_string),
            package_hash: non_empty(raw.package_hash.as_ref()).map(str::to_string),
            files,
            rejected_files,
        })
    }

    /// The package URL, digest, and file list.
    ///
    /// # Errors
    ///
    /// [`UpdateError::ManifestNotApplicable`] when a package field is missing,
    /// the file list is empty, or any listed path was rejected as unsafe.
    pub fn package_spec(&self) -> Result<PackageSpec<'_>, UpdateError> {
        let not_applicable = |reason: String| UpdateError::ManifestNotApplicable {
            reason,
        };

        if let Some(rejected) = self.rejected_files.first() {
            return Err(not_applicable(rejected.to_string()));
        }
        let url = self
            .package_url
            .as_deref()
            .ok_or_else(|| not_applicable("package_url is missing".to_string()))?;
        let hash = self
            .package_hash
            .as_deref()
            .ok_or_else(|| not_applicable("package_hash is missing".to_string()))?;
        if self.files.is_empty() {
            return Err(not_applicable("files list is empty".to_string()));
        }

        Ok(PackageSpec {
            url,
            hash,
            files: &self.files,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "https://example.com/manifest.json";

    #[test]
    fn test_parse_full_manifest() {
        let body = br#"{
            "display_version": "2.3.0",
            "internal_version": "17",
            "package_url": "https://example.com/pkg.zip",
            "package_hash": "abc",
            "files": ["assets/app.js", {"path": "/templates/header.php", "hash": "x", "url": "y"}]
        }"#;

        let manifest = UpdateManifest::parse(URL, body).unwrap();
        assert_eq!(manifest.display_version, "2.3.0");
        assert_eq!(manifest.internal_version, "17");
        let files: Vec<&str> = manifest.files.iter().map(RelativePath::as_str).collect();
        assert_eq!(files, vec!["assets/app.js", "templates/header.php"]);

        let spec = manifest.package_spec().unwrap();
        assert_eq!(spec.url, "https://example.com/pkg.zip");
        assert_eq!(spec.files.len(), 2);
    }

    #[test]
    fn test_numeric_versions_accepted() {
        let manifest =
            UpdateManifest::parse(URL, br#"{"display_version": "1.0", "internal_version": 6}"#)
                .unwrap();
        assert_eq!(manifest.internal_version, "6");
        assert!(manifest.package_spec().is_err());
    }

    #[test]
    fn test_fetch_level_failures() {
        assert!(matches!(
            UpdateManifest::parse(URL, b"  \n"),
            Err(FetchError::EmptyBody { .. })
        ));
        assert!(matches!(
            UpdateManifest::parse(URL, b"<html>"),
            Err(FetchError::MalformedJson { .. })
        ));
        assert_eq!(
            UpdateManifest::parse(URL, br#"{"display_version": "1.0"}"#),
            Err(FetchError::MissingField {
                url: URL.to_string(),
                field: "internal_version",
            })
        );
    }

    #[test]
    fn test_package_fields_checked_late() {
        let manifest = UpdateManifest::parse(
            URL,
            br#"{"display_version": "1", "internal_version": "2", "package_url": "https://e/p.zip", "files": ["a"]}"#,
        )
        .unwrap();
        let err = manifest.package_spec().unwrap_err();
        assert!(err.to_string().contains("package_hash"));
    }

    #[test]
    fn test_unsafe_path_makes_manifest_not_applicable() {
        let manifest = UpdateManifest::parse(
            URL,
            br#"{"display_version": "1", "internal_version": "2",
                "package_url": "https://e/p.zip", "package_hash": "h",
                "files": ["ok.txt", "../../etc/passwd"]}"#,
        )
        .unwrap();
        assert_eq!(manifest.files.len(), 1);
        assert!(matches!(
            manifest.package_spec(),
            Err(UpdateError::ManifestNotApplicable { .. })
        ));
    }

    #[test]
    fn test_duplicate_entries_collapse() {
        let manifest = UpdateManifest::parse(
            URL,
            br#"{"display_version": "1", "internal_version": "2", "files": ["a.txt", "./a.txt"]}"#,
        )
        .unwrap();
        assert_eq!(manifest.files.len(), 1);
    }
}
