//! Terminal output: status messages, the stage progress bar and the build
//! summary table.
//!
//! Everything here writes to stderr. Colors follow `--no-color`, `NO_COLOR`,
//! `FORCE_COLOR` and terminal detection; the progress bar is hidden in CI and
//! when stderr is not a terminal.

mod format;
mod messages;
mod progress;

pub use format::{format_duration, format_size, print_build_summary, summary_lines};
pub use messages::{error, info, success, warning};
pub use progress::BuildProgress;

/// Check if running in a CI environment.
pub fn is_ci() -> bool {
    ["CI", "GITHUB_ACTIONS", "GITLAB_CI", "CIRCLECI", "TRAVIS", "BUILDKITE"]
        .iter()
        .any(|var| std::env::var_os(var).is_some())
}

/// Whether interactive widgets (the progress bar) should be drawn.
pub fn is_interactive() -> bool {
    !is_ci() && console::user_attended_stderr()
}

/// Apply the color decision once for every writer in the process.
pub fn init_colors(no_color: bool) {
    let enabled = !no_color && crate::logger::should_use_colors();
    owo_colors::set_override(enabled);
    console::set_colors_enabled_stderr(enabled);
}

/// Status printer that honors `--quiet`.
///
/// Errors are always printed; everything else is dropped when quiet.
#[derive(Debug, Clone, Copy, Default)]
pub struct Output {
    quiet: bool,
}

impl Output {
    pub fn new(quiet: bool) -> Self {
        Self { quiet }
    }

    pub fn is_quiet(&self) -> bool {
        self.quiet
    }

    pub fn info(&self, message: &str) {
        if !self.quiet {
            info(message);
        }
    }

    pub fn success(&self, message: &str) {
        if !self.quiet {
            success(message);
        }
    }

    pub fn warning(&self, message: &str) {
        if !self.quiet {
            warning(message);
        }
    }

    pub fn error(&self, message: &str) {
        error(message);
    }
}
