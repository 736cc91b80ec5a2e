//! Core types shared by every update stage.
//!
//! This module holds the error taxonomy and its user-facing rendering. The
//! stage implementations live in [`crate::update`]; they all report failures
//! through [`UpdateError`] so the engine can decide, per [`Stage`], whether a
//! failure aborts cleanly or has to go through rollback.

pub mod error;

pub use error::{
    ErrorContext, FetchError, OracleError, Stage, UpdateError, create_error_context,
    user_friendly_error,
};
