//! Version comparator.
//!
//! Decides, from the deployed versions and a fetched manifest, whether this
//! system should apply a package. Rules in order:
//!
//! 1. remote display > local display: [`Decision::StandardUpdateAvailable`]
//!    (left to the host's regular update channel)
//! 2. displays equal and remote internal > local internal:
//!    [`Decision::InternalUpdateNeeded`]
//! 3. displays equal otherwise: [`Decision::UpToDate`]
//! 4. remote display < local display: [`Decision::RemoteOlder`]
//!
//! Anything that prevents a decision yields [`Decision::NoAction`] with a
//! reason.

use crate::core::OracleError;
use crate::manifest::UpdateManifest;
use crate::update::oracle::LocalVersions;
use crate::version::compare_versions;
use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;

/// Result of comparing local and remote versions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Decision {
    /// No decision possible.
    NoAction {
        /// Why the comparison could not be made
        reason: String,
    },
    /// A new display version exists; the regular update channel handles it.
    StandardUpdateAvailable {
        /// Deployed display version
        local_display: String,
        /// Published display version
        remote_display: String,
    },
    /// Same display version, newer internal version.
    InternalUpdateNeeded {
        /// Deployed internal version
        local_internal: String,
        /// Published internal version
        remote_internal: String,
    },
    /// Nothing to do.
    UpToDate {
        /// Deployed display version
        display: String,
        /// Deployed internal version
        internal: String,
    },
    /// The server publishes an older display version than the deployed one.
    RemoteOlder {
        /// Deployed display version
        local_display: String,
        /// Published display version
        remote_display: String,
    },
}

impl Decision {
    /// Whether a package should be applied.
    #[must_use]
    pub const fn is_update_needed(&self) -> bool {
        matches!(self, Self::InternalUpdateNeeded { .. })
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoAction {
                reason,
            } => write!(f, "No update determinable: {reason}"),
            Self::StandardUpdateAvailable {
                local_display,
                remote_display,
            } => write!(
                f,
                "Standard update available (display version {remote_display} > {local_display}); left to the regular update channel"
            ),
            Self::InternalUpdateNeeded {
                local_internal,
                remote_internal,
            } => write!(
                f,
                "Internal update needed (remote internal {remote_internal} > local {local_internal})"
            ),
            Self::UpToDate {
                display,
                internal,
            } => write!(f, "Up to date (display {display}, internal {internal})"),
            Self::RemoteOlder {
                local_display,
                remote_display,
            } => write!(
                f,
                "Remote display version {remote_display} is older than local {local_display}; no action taken"
            ),
        }
    }
}

/// Compare deployed versions against a manifest.
///
/// `local` is the oracle's answer; an oracle failure becomes
/// [`Decision::NoAction`].
pub fn decide(local: Result<&LocalVersions, &OracleError>, remote: &UpdateManifest) -> Decision {
    let local = match local {
        Ok(local) => local,
        Err(e) => {
            return Decision::NoAction {
                reason: e.to_string(),
            };
        }
    };

    let display_order = match compare_versions(&remote.display_version, &local.display) {
        Ok(order) => order,
        Err(e) => {
            return Decision::NoAction {
                reason: format!("cannot compare display versions: {e}"),
            };
        }
    };

    match display_order {
        Ordering::Greater => Decision::StandardUpdateAvailable {
            local_display: local.display.clone(),
            remote_display: remote.display_version.clone(),
        },
        Ordering::Less => Decision::RemoteOlder {
            local_display: local.display.clone(),
            remote_display: remote.display_version.clone(),
        },
        Ordering::Equal => match compare_versions(&remote.internal_version, &local.internal) {
            Ok(Ordering::Greater) => Decision::InternalUpdateNeeded {
                local_internal: local.internal.clone(),
                remote_internal: remote.internal_version.clone(),
            },
            Ok(_) => Decision::UpToDate {
                display: local.display.clone(),
                internal: local.internal.clone(),
            },
            Err(e) => Decision::NoAction {
                reason: format!("cannot compare internal versions: {e}"),
            },
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local(display: &str, internal: &str) -> LocalVersions {
        LocalVersions {
            display: display.to_string(),
            internal: internal.to_string(),
        }
    }

    fn remote(display: &str, internal: &str) -> UpdateManifest {
        UpdateManifest::parse(
            "https://e/m.json",
            format!(r#"{{"display_version": "{display}", "internal_version": "{internal}"}}"#)
                .as_bytes(),
        )
        .unwrap()
    }

    #[test]
    fn test_internal_update_needed() {
        let decision = decide(Ok(&local("2.3.0", "5")), &remote("2.3.0", "6"));
        assert!(decision.is_update_needed());
        assert!(decision.to_string().contains("6 > local 5"));
    }

    #[test]
    fn test_up_to_date_when_equal_or_local_newer() {
        assert!(matches!(
            decide(Ok(&local("2.3.0", "6")), &remote("2.3.0", "6")),
            Decision::UpToDate { .. }
        ));
        assert!(matches!(
            decide(Ok(&local("2.3.0", "7")), &remote("2.3.0", "6")),
            Decision::UpToDate { .. }
        ));
    }

    #[test]
    fn test_display_version_wins() {
        assert!(matches!(
            decide(Ok(&local("2.3.0", "9")), &remote("2.10.0", "1")),
            Decision::StandardUpdateAvailable { .. }
        ));
        assert!(matches!(
            decide(Ok(&local("2.3.0", "1")), &remote("2.2.9", "9")),
            Decision::RemoteOlder { .. }
        ));
    }

    #[test]
    fn test_numeric_internal_ordering() {
        assert!(decide(Ok(&local("1.0", "9")), &remote("1.0.0", "10")).is_update_needed());
    }

    #[test]
    fn test_oracle_failure_is_no_action() {
        let err = OracleError::TargetInactive {
            reason: "root missing".to_string(),
        };
        let decision = decide(Err(&err), &remote("2.3.0", "6"));
        assert!(matches!(decision, Decision::NoAction { ref reason } if reason.contains("root missing")));
    }

    #[test]
    fn test_unparseable_internal_is_no_action() {
        let decision = decide(Ok(&local("2.3.0", "build-a")), &remote("2.3.0", "6"));
        assert!(matches!(decision, Decision::NoAction { .. }));
    }
}
