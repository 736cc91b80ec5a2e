//! Version comparison for display and internal version strings.
//!
//! Display versions are usually semver (`2.3.0`) while internal versions are
//! plain counters (`17`) or short dotted numbers (`1.4`). Both go through
//! [`compare_versions`]: when both sides parse as semver, semver precedence
//! decides (prereleases included); otherwise both sides are compared as dotted
//! numbers with missing trailing segments treated as zero, so `1.2 == 1.2.0`
//! and `1.2.0 < 1.10.0`.

use semver::Version;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A version string that is neither semver nor dotted-numeric.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid version '{version}': expected dotted numbers such as 1.2.0 or 17")]
pub struct VersionParseError {
    /// The rejected input
    pub version: String,
}

/// A purely numeric dotted version such as `17` or `1.10.2`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DottedVersion {
    segments: Vec<u64>,
}

impl DottedVersion {
    /// Numeric segments in order, without zero padding.
    #[must_use]
    pub fn segments(&self) -> &[u64] {
        &self.segments
    }
}

impl FromStr for DottedVersion {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = strip_prefix(s);
        if trimmed.is_empty() {
            return Err(VersionParseError {
                version: s.to_string(),
            });
        }

        let segments = trimmed
            .split('.')
            .map(str::parse::<u64>)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| VersionParseError {
                version: s.to_string(),
            })?;

        Ok(Self {
            segments,
        })
    }
}

impl Ord for DottedVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.segments.len().max(other.segments.len());
        for i in 0..len {
            let left = self.segments.get(i).copied().unwrap_or(0);
            let right = other.segments.get(i).copied().unwrap_or(0);
            match left.cmp(&right) {
                Ordering::Equal => {}
                unequal => return unequal,
            }
        }
        Ordering::Equal
    }
}

impl PartialOrd for DottedVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for DottedVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.segments.iter().map(u64::to_string).collect();
        f.write_str(&parts.join("."))
    }
}

fn strip_prefix(version: &str) -> &str {
    let trimmed = version.trim();
    trimmed.strip_prefix('v').or_else(|| trimmed.strip_prefix('V')).unwrap_or(trimmed)
}

/// Compare two version strings.
///
/// # Errors
///
/// Returns [`VersionParseError`] naming the first side that is neither semver
/// nor dotted-numeric.
pub fn compare_versions(left: &str, right: &str) -> Result<Ordering, VersionParseError> {
    if let (Ok(l), Ok(r)) =
        (Version::parse(strip_prefix(left)), Version::parse(strip_prefix(right)))
    {
        return Ok(l.cmp_precedence(&r));
    }

    let l: DottedVersion = left.parse()?;
    let r: DottedVersion = right.parse()?;
    Ok(l.cmp(&r))
}

/// Whether `candidate` is strictly newer than `current`.
pub fn is_newer(candidate: &str, current: &str) -> Result<bool, VersionParseError> {
    Ok(compare_versions(candidate, current)? == Ordering::Greater)
}
