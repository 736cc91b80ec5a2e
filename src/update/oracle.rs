//! Active version oracle.
//!
//! Reports which display and internal version is currently deployed in the
//! live tree. The oracle is fallible: the tree may be missing, inactive, or
//! not declare its versions, and callers treat that as "no decision possible"
//! rather than as a failure of the attempt.

use crate::config::{UpdaterConfig, VersionSource};
use crate::core::OracleError;
use crate::utils::Filesystem;
use regex::Regex;
use serde_json::Value;
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Versions currently deployed in the live tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalVersions {
    /// Public version
    pub display: String,
    /// Internal version counter
    pub internal: String,
}

/// Capability for reading the deployed versions.
pub trait CurrentVersionProvider: Send + Sync + Debug {
    /// Whether the managed tree is present and active.
    fn is_target_active(&self) -> bool;

    /// The deployed display version.
    fn read_display_version(&self) -> Result<String, OracleError>;

    /// The deployed internal version.
    fn read_internal_version(&self) -> Result<String, OracleError>;

    /// Both versions, failing with [`OracleError::TargetInactive`] first when
    /// the target is not active.
    fn read_versions(&self) -> Result<LocalVersions, OracleError> {
        if !self.is_target_active() {
            return Err(OracleError::TargetInactive {
                reason: "the live root or its version source is missing".to_string(),
            });
        }
        Ok(LocalVersions {
            display: self.read_display_version()?,
            internal: self.read_internal_version()?,
        })
    }
}

/// Build the provider selected by `version_source`.
pub fn provider_from_config(
    config: &UpdaterConfig,
    fs: Arc<dyn Filesystem>,
) -> Box<dyn CurrentVersionProvider> {
    let root = config.target.root.clone();
    match &config.version_source {
        VersionSource::Sidecar {
            file,
        } => Box::new(SidecarVersionProvider::new(fs, root, file.clone())),
        VersionSource::ThemeHeader {
            stylesheet,
            functions_file,
            constant,
        } => Box::new(ThemeHeaderVersionProvider::new(
            fs,
            root,
            stylesheet.clone(),
            functions_file.clone(),
            constant,
        )),
    }
}

fn read_text(fs: &dyn Filesystem, path: &Path) -> Result<String, OracleError> {
    let bytes = fs.read(path).map_err(|e| OracleError::Unreadable {
        path: path.to_path_buf(),
        reason: format!("{e:#}"),
    })?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Reads a JSON sidecar written by the deployed artifact:
/// `{"display_version": "2.3.0", "internal_version": "17"}`.
#[derive(Debug)]
pub struct SidecarVersionProvider {
    fs: Arc<dyn Filesystem>,
    root: PathBuf,
    file: PathBuf,
}

impl SidecarVersionProvider {
    /// Sidecar at `root/file`.
    pub fn new(fs: Arc<dyn Filesystem>, root: PathBuf, file: PathBuf) -> Self {
        Self {
            fs,
            root,
            file,
        }
    }

    fn path(&self) -> PathBuf {
        self.root.join(&self.file)
    }

    fn field(&self, name: &'static str) -> Result<String, OracleError> {
        let path = self.path();
        let text = read_text(self.fs.as_ref(), &path)?;
        let doc: Value = serde_json::from_str(&text).map_err(|e| OracleError::Unreadable {
            path: path.clone(),
            reason: e.to_string(),
        })?;

        match doc.get(name) {
            Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.trim().to_string()),
            Some(Value::Number(n)) => Ok(n.to_string()),
            _ => Err(OracleError::NotDeclared {
                what: name,
                path,
            }),
        }
    }
}

impl CurrentVersionProvider for SidecarVersionProvider {
    fn is_target_active(&self) -> bool {
        self.fs.is_dir(&self.root) && self.fs.exists(&self.path())
    }

    fn read_display_version(&self) -> Result<String, OracleError> {
        self.field("display_version")
    }

    fn read_internal_version(&self) -> Result<String, OracleError> {
        self.field("internal_version")
    }
}

/// Matches a `Version:` line of a stylesheet comment header.
const HEADER_PATTERN: &str = r"(?miR)^[ \t/*#@]*Version:[ \t]*([^\r\n*]+?)[ \t]*(?:\*/)?[ \t]*$";

/// Reads a theme's stylesheet `Version:` header and a
/// `define('INT_VERSION', '...')` statement from its functions file.
#[derive(Debug)]
pub struct ThemeHeaderVersionProvider {
    fs: Arc<dyn Filesystem>,
    root: PathBuf,
    stylesheet: PathBuf,
    functions_file: PathBuf,
    constant: String,
}

impl ThemeHeaderVersionProvider {
    /// Provider for the theme at `root`, looking for `constant`.
    pub fn new(
        fs: Arc<dyn Filesystem>,
        root: PathBuf,
        stylesheet: PathBuf,
        functions_file: PathBuf,
        constant: &str,
    ) -> Self {
        Self {
            fs,
            root,
            stylesheet,
            functions_file,
            constant: constant.to_string(),
        }
    }

    fn capture(&self, pattern: &str, file: &Path, what: &'static str) -> Result<String, OracleError> {
        let path = self.root.join(file);
        let text = read_text(self.fs.as_ref(), &path)?;
        let regex = Regex::new(pattern).map_err(|e| OracleError::Unreadable {
            path: path.clone(),
            reason: e.to_string(),
        })?;

        regex
            .captures(&text)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
            .filter(|v| !v.is_empty())
            .ok_or(OracleError::NotDeclared {
                what,
                path,
            })
    }
}

impl CurrentVersionProvider for ThemeHeaderVersionProvider {
    fn is_target_active(&self) -> bool {
        self.fs.is_dir(&self.root) && self.fs.exists(&self.root.join(&self.stylesheet))
    }

    fn read_display_version(&self) -> Result<String, OracleError> {
        self.capture(HEADER_PATTERN, &self.stylesheet, "display version")
    }

    fn read_internal_version(&self) -> Result<String, OracleError> {
        let pattern = format!(
            r#"(?i)define\s*\(\s*['"]{}['"]\s*,\s*['"]([^'"]+)['"]\s*\)"#,
            regex::escape(&self.constant)
        );
        self.capture(&pattern, &self.functions_file, "internal version")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::LocalFs;
    use tempfile::TempDir;

    fn local_fs() -> Arc<dyn Filesystem> {
        Arc::new(LocalFs)
    }

    #[test]
    fn test_sidecar_reads_both_versions() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join(".seamless-version"),
            r#"{"display_version": "2.3.0", "internal_version": 5}"#,
        )
        .unwrap();

        let provider = SidecarVersionProvider::new(
            local_fs(),
            temp.path().to_path_buf(),
            PathBuf::from(".seamless-version"),
        );
        assert_eq!(
            provider.read_versions().unwrap(),
            LocalVersions {
                display: "2.3.0".to_string(),
                internal: "5".to_string(),
            }
        );
    }

    #[test]
    fn test_sidecar_missing_is_inactive() {
        let temp = TempDir::new().unwrap();
        let provider = SidecarVersionProvider::new(
            local_fs(),
            temp.path().join("absent"),
            PathBuf::from(".seamless-version"),
        );
        assert!(!provider.is_target_active());
        assert!(matches!(provider.read_versions(), Err(OracleError::TargetInactive { .. })));
    }

    #[test]
    fn test_sidecar_without_internal_version() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("v.json"), r#"{"display_version": "1.0"}"#).unwrap();
        let provider =
            SidecarVersionProvider::new(local_fs(), temp.path().to_path_buf(), PathBuf::from("v.json"));
        assert!(matches!(
            provider.read_internal_version(),
            Err(OracleError::NotDeclared {
                what: "internal_version",
                ..
            })
        ));
    }

    #[test]
    fn test_theme_header_provider() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join("style.css"),
            "/*\nTheme Name: Example\n * Version: 2.3.0\nAuthor: Someone\n*/\nbody {}\n",
        )
        .unwrap();
        std::fs::write(
            temp.path().join("functions.php"),
            "<?php\ndefine( \"INT_VERSION\" , '17' );\n",
        )
        .unwrap();

        let provider = ThemeHeaderVersionProvider::new(
            local_fs(),
            temp.path().to_path_buf(),
            PathBuf::from("style.css"),
            PathBuf::from("functions.php"),
            "INT_VERSION",
        );
        assert!(provider.is_target_active());
        assert_eq!(provider.read_display_version().unwrap(), "2.3.0");
        assert_eq!(provider.read_internal_version().unwrap(), "17");
    }

    #[test]
    fn test_theme_header_missing_define() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("style.css"), "Version: 1.0\n").unwrap();
        std::fs::write(temp.path().join("functions.php"), "<?php\n").unwrap();

        let provider = ThemeHeaderVersionProvider::new(
            local_fs(),
            temp.path().to_path_buf(),
            PathBuf::from("style.css"),
            PathBuf::from("functions.php"),
            "INT_VERSION",
        );
        assert!(matches!(
            provider.read_internal_version(),
            Err(OracleError::NotDeclared { .. })
        ));
    }
}
