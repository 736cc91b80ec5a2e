//! Filesystem and path utilities shared by the update stages.
//!
//! - [`fs`] - The [`fs::Filesystem`] trait, its local implementation and the
//!   blocking primitives behind it
//! - [`path_validation`] - Checks applied to untrusted relative paths and slugs
//! - [`progress`] - Terminal progress bar used by the CLI

pub mod fs;
pub mod path_validation;
pub mod progress;

pub use fs::{Filesystem, LocalFs, atomic_write, copy_dir, ensure_dir};
pub use path_validation::{validate_contained, validate_no_traversal, validate_slug};
