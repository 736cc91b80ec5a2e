//! Version parsing and ordering.
//!
//! See [`comparison`] for the rules applied to display and internal versions.

pub mod comparison;

pub use comparison::{DottedVersion, VersionParseError, compare_versions, is_newer};
