//! Package checksum verification.
//!
//! Digests are SHA-256, written as 64 hex characters with an optional
//! `sha256:` prefix. Comparison is case-insensitive. A package is never
//! extracted before its digest has been checked.

use crate::core::{Stage, UpdateError};
use anyhow::Context;
use sha2::{Digest, Sha256};
use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tracing::{debug, info, warn};

const SHA256_HEX_LEN: usize = 64;

/// Computes and checks SHA-256 digests of downloaded packages.
pub struct ChecksumVerifier;

impl ChecksumVerifier {
    /// Compute the SHA-256 digest of a file as lowercase hex (no prefix).
    pub async fn compute_sha256(file_path: &Path) -> anyhow::Result<String> {
        debug!("Computing SHA256 checksum for: {}", file_path.display());

        let mut file = File::open(file_path)
            .await
            .with_context(|| format!("Failed to open file: {}", file_path.display()))?;

        let mut hasher = Sha256::new();
        let mut buf = vec![0u8; 64 * 1024];
        loop {
            let read = file
                .read(&mut buf)
                .await
                .with_context(|| format!("Failed to read file: {}", file_path.display()))?;
            if read == 0 {
                break;
            }
            hasher.update(&buf[..read]);
        }

        Ok(hex::encode(hasher.finalize()))
    }

    /// Strip an optional `sha256:` prefix and lowercase the digest.
    #[must_use]
    pub fn normalize(expected: &str) -> String {
        let trimmed = expected.trim();
        let hex = trimmed
            .get(..7)
            .filter(|prefix| prefix.eq_ignore_ascii_case("sha256:"))
            .map_or(trimmed, |_| &trimmed[7..]);
        hex.to_ascii_lowercase()
    }

    /// Verify `file_path` against the manifest digest.
    ///
    /// # Errors
    ///
    /// [`UpdateError::Integrity`] on mismatch or when `expected` is not a
    /// SHA-256 hex digest; [`UpdateError::Filesystem`] when the file cannot
    /// be read.
    pub async fn verify_checksum(file_path: &Path, expected: &str) -> Result<(), UpdateError> {
        info!("Verifying checksum for: {}", file_path.display());

        let actual = Self::compute_sha256(file_path)
            .await
            .map_err(|e| UpdateError::filesystem(Stage::Verifying, &e))?;
        let expected_hex = Self::normalize(expected);

        let well_formed = expected_hex.len() == SHA256_HEX_LEN
            && expected_hex.chars().all(|c| c.is_ascii_hexdigit());
        if !well_formed {
            warn!("Manifest digest '{expected}' is not a SHA-256 hex digest");
        }

        if !well_formed || expected_hex != actual {
            return Err(UpdateError::Integrity {
                expected: expected.trim().to_string(),
                actual: format!("sha256:{actual}"),
            });
        }

        info!("Checksum verification successful");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const HELLO_SHA256: &str = "dffd6021bb2bd5b0af676290809ec3a53191dd81c7f70a4b28688a362182986f";

    fn file_with(content: &[u8]) -> NamedTempFile {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(content).unwrap();
        temp_file
    }

    #[tokio::test]
    async fn test_compute_sha256() {
        let temp_file = file_with(b"Hello, World!");
        let checksum = ChecksumVerifier::compute_sha256(temp_file.path()).await.unwrap();
        assert_eq!(checksum, HELLO_SHA256);
    }

    #[tokio::test]
    async fn test_verify_checksum_prefix_and_case() {
        let temp_file = file_with(b"Hello, World!");

        ChecksumVerifier::verify_checksum(temp_file.path(), HELLO_SHA256).await.unwrap();
        ChecksumVerifier::verify_checksum(temp_file.path(), &format!("sha256:{HELLO_SHA256}"))
            .await
            .unwrap();
        ChecksumVerifier::verify_checksum(
            temp_file.path(),
            &format!("SHA256:{}", HELLO_SHA256.to_uppercase()),
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_verify_checksum_mismatch() {
        let temp_file = file_with(b"Test content");
        let wrong = "0".repeat(64);

        let err = ChecksumVerifier::verify_checksum(temp_file.path(), &wrong).await.unwrap_err();
        match err {
            UpdateError::Integrity {
                expected,
                actual,
            } => {
                assert_eq!(expected, wrong);
                assert!(actual.starts_with("sha256:"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_verify_checksum_wrong_length() {
        let temp_file = file_with(b"Hello, World!");
        let md5_like = "65a8e27d8879283831b664bd8b7f0ad4";

        let err = ChecksumVerifier::verify_checksum(temp_file.path(), md5_like).await.unwrap_err();
        assert!(matches!(err, UpdateError::Integrity { .. }));
    }

    #[tokio::test]
    async fn test_verify_missing_file() {
        let err = ChecksumVerifier::verify_checksum(Path::new("/nonexistent/package.zip"), HELLO_SHA256)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            UpdateError::Filesystem {
                stage: Stage::Verifying,
                ..
            }
        ));
    }
}
