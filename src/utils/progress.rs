//! Terminal progress bar for `seamless-update progress --watch`.
//!
//! Wraps `indicatif` with the styling used by the CLI. The bar is hidden
//! when the `SEAMLESS_UPDATE_NO_PROGRESS` environment variable is set, so
//! scripts and CI logs get plain output.
//!
//! # Examples
//!
//! ```rust,no_run
//! use seamless_update::utils::progress::ProgressBar;
//!
//! let bar = ProgressBar::new(100);
//! bar.set_message("Downloading package");
//! bar.set_position(15);
//! bar.finish_with_message("Update successful");
//! ```

use indicatif::{ProgressBar as IndicatifBar, ProgressStyle as IndicatifStyle};

/// Environment variable that hides progress bars.
pub const NO_PROGRESS_ENV: &str = "SEAMLESS_UPDATE_NO_PROGRESS";

fn is_progress_disabled() -> bool {
    std::env::var_os(NO_PROGRESS_ENV).is_some()
}

/// A progress bar with consistent styling.
pub struct ProgressBar {
    inner: IndicatifBar,
}

impl ProgressBar {
    /// Bar tracking `0..=len`. Hidden when progress output is disabled.
    pub fn new(len: u64) -> Self {
        let bar = if is_progress_disabled() {
            IndicatifBar::hidden()
        } else {
            let bar = IndicatifBar::new(len);
            bar.set_style(default_style());
            bar
        };
        Self {
            inner: bar,
        }
    }

    /// Whether the bar renders nothing.
    pub fn is_hidden(&self) -> bool {
        self.inner.is_hidden()
    }

    /// Replace the message shown beside the bar.
    pub fn set_message(&self, msg: impl Into<String>) {
        self.inner.set_message(msg.into());
    }

    /// Move the bar to `pos`.
    pub fn set_position(&self, pos: u64) {
        self.inner.set_position(pos);
    }

    /// Complete the bar and leave `msg` on screen.
    pub fn finish_with_message(&self, msg: impl Into<String>) {
        self.inner.finish_with_message(msg.into());
    }

    /// Stop the bar where it is and leave `msg` on screen.
    pub fn abandon_with_message(&self, msg: impl Into<String>) {
        self.inner.abandon_with_message(msg.into());
    }
}

fn default_style() -> IndicatifStyle {
    IndicatifStyle::default_bar()
        .template("[{bar:40.cyan/blue}] {pos:>3}% {msg}")
        .unwrap_or_else(|_| IndicatifStyle::default_bar())
        .progress_chars("━╸━")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_disabled_bar_is_hidden() {
        unsafe { std::env::set_var(NO_PROGRESS_ENV, "1") };
        let bar = ProgressBar::new(100);
        assert!(bar.is_hidden());
        bar.set_position(50);
        bar.finish_with_message("done");
        unsafe { std::env::remove_var(NO_PROGRESS_ENV) };
    }
}
