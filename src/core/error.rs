//! Error handling for seamless-update
//!
//! This module provides the typed error taxonomy of the update engine and the
//! user-friendly reporting used by the CLI. The error system follows two rules:
//! 1. **Strongly-typed errors** so each stage can decide whether a failure
//!    happened before or after the live tree was touched
//! 2. **User-friendly messages** with actionable suggestions for operators
//!
//! # Error Categories
//!
//! - **Configuration**: [`UpdateError::Configuration`]
//! - **Network and manifest**: [`UpdateError::Fetch`] wrapping a [`FetchError`]
//! - **Version oracle**: [`UpdateError::VersionOracleUnavailable`] wrapping an [`OracleError`]
//! - **Package**: [`UpdateError::Integrity`], [`UpdateError::Extraction`],
//!   [`UpdateError::MissingPackageFile`], [`UpdateError::ManifestNotApplicable`]
//! - **Filesystem**: [`UpdateError::Filesystem`], tagged with the [`Stage`] it occurred in
//!
//! Whether a filesystem failure triggers a rollback depends on its stage; see
//! [`Stage::mutates_live_state`].
//!
//! # Examples
//!
//! ```rust,no_run
//! use seamless_update::core::{UpdateError, user_friendly_error};
//!
//! let err = UpdateError::Integrity {
//!     expected: "sha256:aaaa".to_string(),
//!     actual: "sha256:bbbb".to_string(),
//! };
//! let ctx = user_friendly_error(anyhow::Error::from(err));
//! ctx.display();
//! ```

use colored::Colorize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Stages of one update attempt, in execution order.
///
/// The ordering is meaningful: every stage from [`Stage::BackingUp`] onward may
/// leave the live tree or the working set in a state that requires rollback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    /// Fetching and validating the remote manifest.
    CheckingManifest,
    /// Downloading the package archive.
    Downloading,
    /// Verifying the package checksum.
    Verifying,
    /// Unpacking the package archive.
    Extracting,
    /// Copying the live tree into a timestamped backup.
    BackingUp,
    /// Cloning the live tree into the staging directory.
    Staging,
    /// Overlaying package files onto staging.
    Applying,
    /// Replacing the live tree with staging.
    Switching,
    /// Pruning backups and removing the working set.
    Finalizing,
}

impl Stage {
    /// Whether a failure in this stage must go through the rollback controller.
    #[must_use]
    pub const fn mutates_live_state(self) -> bool {
        matches!(
            self,
            Self::BackingUp | Self::Staging | Self::Applying | Self::Switching | Self::Finalizing
        )
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::CheckingManifest => "checking manifest",
            Self::Downloading => "downloading package",
            Self::Verifying => "verifying package",
            Self::Extracting => "extracting package",
            Self::BackingUp => "backing up",
            Self::Staging => "staging",
            Self::Applying => "applying files",
            Self::Switching => "switching",
            Self::Finalizing => "finalizing",
        };
        f.write_str(name)
    }
}

/// Failures while retrieving the remote manifest or package over HTTP.
///
/// All variants are non-fatal to the caller of the checker: a failed fetch
/// simply means no update can be determined this cycle.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// URL is malformed or uses a scheme other than http/https.
    #[error("Invalid update URL '{url}': {reason}")]
    InvalidUrl {
        /// The rejected URL
        url: String,
        /// Why it was rejected
        reason: String,
    },

    /// URL host is not in the configured allow-list.
    #[error("Update host '{host}' is not in the allowed host list")]
    HostNotAllowed {
        /// The rejected host
        host: String,
    },

    /// Connection, TLS, timeout, or body read failure.
    #[error("Request to {url} failed: {reason}")]
    Transport {
        /// Requested URL
        url: String,
        /// Underlying transport message
        reason: String,
    },

    /// Server answered with a status other than 200.
    #[error("Request to {url} returned HTTP {status}")]
    Status {
        /// Requested URL
        url: String,
        /// HTTP status code
        status: u16,
    },

    /// Server answered 200 with an empty body.
    #[error("Empty response received from {url}")]
    EmptyBody {
        /// Requested URL
        url: String,
    },

    /// Body is not valid manifest JSON.
    #[error("Malformed manifest JSON from {url}: {reason}")]
    MalformedJson {
        /// Requested URL
        url: String,
        /// Parser message
        reason: String,
    },

    /// A field required at fetch time is absent.
    #[error("Manifest from {url} is missing required field '{field}'")]
    MissingField {
        /// Requested URL
        url: String,
        /// Name of the missing field
        field: &'static str,
    },
}

/// Failures of the active version oracle.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OracleError {
    /// The managed tree is not present or not active.
    #[error("Target is not active: {reason}")]
    TargetInactive {
        /// Why the target is considered inactive
        reason: String,
    },

    /// A version source file could not be read or parsed.
    #[error("Could not read version from {}: {reason}", path.display())]
    Unreadable {
        /// File that was read
        path: PathBuf,
        /// Underlying message
        reason: String,
    },

    /// The version source exists but does not declare the requested version.
    #[error("No {what} declared in {}", path.display())]
    NotDeclared {
        /// Which version was looked for
        what: &'static str,
        /// File that was searched
        path: PathBuf,
    },
}

/// The main error type for update attempts.
///
/// Each variant maps to one entry of the failure taxonomy. Variants carry
/// owned strings only, so errors can be cloned into progress records and
/// outcome values without losing detail.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UpdateError {
    /// Target or manifest URL missing or invalid.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration problem
        message: String,
    },

    /// Manifest or package could not be retrieved.
    #[error("Fetch failed: {0}")]
    Fetch(#[from] FetchError),

    /// The local internal version cannot be determined.
    #[error("Active version unavailable: {0}")]
    VersionOracleUnavailable(#[from] OracleError),

    /// The manifest lacks what is needed to apply a package.
    #[error("Manifest cannot be applied: {reason}")]
    ManifestNotApplicable {
        /// Which requirement is unmet
        reason: String,
    },

    /// Downloaded package does not match the manifest digest.
    #[error("Package integrity check failed: expected {expected}, got {actual}")]
    Integrity {
        /// Digest announced by the manifest
        expected: String,
        /// Digest of the downloaded bytes
        actual: String,
    },

    /// The package archive could not be unpacked.
    #[error("Package extraction failed: {reason}")]
    Extraction {
        /// Underlying archive message
        reason: String,
    },

    /// A manifest-listed file is absent from the extracted package.
    #[error("Package does not contain manifest file '{path}'")]
    MissingPackageFile {
        /// Relative path named by the manifest
        path: String,
    },

    /// mkdir/copy/move/delete failure.
    #[error("Filesystem error while {stage}: {message}")]
    Filesystem {
        /// Stage in which the operation failed
        stage: Stage,
        /// Full error chain of the failed operation
        message: String,
    },

    /// Catch-all for errors that do not fit any other variant.
    #[error("{message}")]
    Other {
        /// Error message
        message: String,
    },
}

impl UpdateError {
    /// Wrap a low-level filesystem failure, keeping its whole context chain.
    pub fn filesystem(stage: Stage, error: &anyhow::Error) -> Self {
        Self::Filesystem {
            stage,
            message: format!("{error:#}"),
        }
    }

    /// Build a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}

/// Error context wrapper that provides user-friendly error information
///
/// `ErrorContext` wraps an [`UpdateError`] and adds an optional suggestion and
/// details. This is how the CLI presents failures to operators.
///
/// # Display Format
///
/// 1. **Error**: The main error message in red
/// 2. **Details**: Additional context in yellow (optional)
/// 3. **Suggestion**: Actionable steps in green (optional)
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying error
    pub error: UpdateError,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a new error context without suggestion or details.
    #[must_use]
    pub const fn new(error: UpdateError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    /// Attach a suggestion for resolving the error.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Attach additional details about the error.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Print the error to stderr with terminal colors.
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Attach a suggestion and details appropriate for a known [`UpdateError`].
#[must_use]
pub fn create_error_context(error: UpdateError) -> ErrorContext {
    match &error {
        UpdateError::Configuration { .. } => ErrorContext::new(error)
            .with_suggestion("Run 'seamless-update init' to create an example configuration, then set target.slug, target.root and update_url")
            .with_details("No files were modified"),
        UpdateError::Fetch(FetchError::HostNotAllowed { .. }) => ErrorContext::new(error)
            .with_suggestion("Add the host to allowed_hosts or point update_url at an allowed host"),
        UpdateError::Fetch(_) => ErrorContext::new(error)
            .with_suggestion("Check network connectivity and that update_url serves the manifest JSON")
            .with_details("No files were modified; the next check will retry"),
        UpdateError::VersionOracleUnavailable(_) => ErrorContext::new(error)
            .with_suggestion("Make sure the target is deployed and its version file is readable")
            .with_details("Without the local internal version no update can be decided"),
        UpdateError::Integrity { .. } => ErrorContext::new(error)
            .with_suggestion("Verify that package_hash in the manifest matches the published package")
            .with_details("The downloaded package was discarded and the live tree is unchanged"),
        UpdateError::Extraction { .. } | UpdateError::MissingPackageFile { .. } => {
            ErrorContext::new(error)
                .with_suggestion("Rebuild the package so that every manifest file is present in the zip archive")
                .with_details("The live tree is unchanged")
        }
        UpdateError::ManifestNotApplicable { .. } => ErrorContext::new(error)
            .with_suggestion("Publish package_url, package_hash and a non-empty files list in the manifest"),
        UpdateError::Filesystem { stage, .. } if stage.mutates_live_state() => {
            ErrorContext::new(error)
                .with_suggestion("Check permissions on the target root and the work root")
                .with_details("The attempt was rolled back; see 'seamless-update status'")
        }
        UpdateError::Filesystem { .. } => ErrorContext::new(error)
            .with_suggestion("Check permissions on the work root"),
        UpdateError::Other { .. } => ErrorContext::new(error),
    }
}

/// Convert any error into a user-friendly [`ErrorContext`].
///
/// Known [`UpdateError`]s and [`ErrorContext`]s are preserved; I/O and TOML
/// errors get tailored suggestions; everything else is wrapped as
/// [`UpdateError::Other`] with the full context chain.
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    if let Some(update_error) = error.downcast_ref::<UpdateError>() {
        return create_error_context(update_error.clone());
    }

    if let Some(ctx) = error.downcast_ref::<ErrorContext>() {
        return ErrorContext {
            error: ctx.error.clone(),
            suggestion: ctx.suggestion.clone(),
            details: ctx.details.clone(),
        };
    }

    if let Some(io_error) = error.downcast_ref::<std::io::Error>()
        && io_error.kind() == std::io::ErrorKind::PermissionDenied
    {
        return ErrorContext::new(UpdateError::Other {
            message: format!("{error:#}"),
        })
        .with_suggestion("Check ownership and permissions of the target root and work root");
    }

    if let Some(toml_error) = error.downcast_ref::<toml::de::Error>() {
        return ErrorContext::new(UpdateError::configuration(toml_error.to_string()))
            .with_suggestion("Check the TOML syntax of the configuration file");
    }

    ErrorContext::new(UpdateError::Other {
        message: format!("{error:#}"),
    })
}
