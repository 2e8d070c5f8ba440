//! Progress indicators for long-running commands.
//!
//! Resolving a repository can take as long as a full clone, so commands show a spinner on
//! stderr while they wait. The spinner is hidden when `--no-progress` is given or the
//! `IDXVIZ_NO_PROGRESS` environment variable is set, and indicatif hides it by itself
//! when stderr is not a terminal.
//!
//! ```rust
//! use idxviz_cli::utils::progress::Spinner;
//!
//! let spinner = Spinner::new("Resolving repository...", false);
//! // resolve().await?;
//! spinner.finish_and_clear();
//! ```

use indicatif::{ProgressBar as IndicatifBar, ProgressStyle as IndicatifStyle};
use std::time::Duration;

/// Environment variable disabling all progress indicators.
pub const NO_PROGRESS_ENV: &str = "IDXVIZ_NO_PROGRESS";

/// Whether progress output is turned off through the environment.
#[must_use]
pub fn is_progress_disabled() -> bool {
    std::env::var_os(NO_PROGRESS_ENV).is_some()
}

/// A spinner for work of unknown length.
#[derive(Clone)]
pub struct Spinner {
    inner: IndicatifBar,
}

impl Spinner {
    /// Start a spinner showing `msg`, or a hidden one when `disabled` is set or progress is
    /// turned off through the environment.
    pub fn new(msg: impl Into<String>, disabled: bool) -> Self {
        let bar = if disabled || is_progress_disabled() {
            IndicatifBar::hidden()
        } else {
            let bar = IndicatifBar::new_spinner();
            bar.set_style(spinner_style());
            bar.enable_steady_tick(Duration::from_millis(100));
            bar
        };
        bar.set_message(msg.into());
        Self { inner: bar }
    }

    pub fn set_message(&self, msg: impl Into<String>) {
        self.inner.set_message(msg.into());
    }

    pub fn is_hidden(&self) -> bool {
        self.inner.is_hidden()
    }

    pub fn finish_with_message(&self, msg: impl Into<String>) {
        self.inner.finish_with_message(msg.into());
    }

    /// Remove the spinner from the terminal, leaving no trace.
    pub fn finish_and_clear(&self) {
        self.inner.finish_and_clear();
    }
}

fn spinner_style() -> IndicatifStyle {
    IndicatifStyle::default_spinner()
        .template("{spinner:.cyan} {msg}")
        .unwrap_or_else(|_| IndicatifStyle::default_spinner())
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
}
