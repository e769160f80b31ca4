//! Tracing subscriber setup for the `kiln` binary.
//!
//! The level is chosen in this order:
//! 1. `--verbose`: debug for every kiln crate
//! 2. `--quiet`: errors only
//! 3. `RUST_LOG`, when set
//! 4. otherwise warnings from the libraries and info from the CLI
//!
//! Logs go to stderr so `kiln build --json` keeps stdout clean.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const VERBOSE_FILTER: &str = "kiln_bundler=debug,kiln_config=debug,kiln_cli=debug";
const QUIET_FILTER: &str = "kiln_bundler=error,kiln_config=error,kiln_cli=error";
const DEFAULT_FILTER: &str = "kiln_bundler=warn,kiln_config=warn,kiln_cli=info";

/// Filter for the given flags, falling back to `RUST_LOG` and then the default.
pub fn env_filter(verbose: bool, quiet: bool) -> EnvFilter {
    if verbose {
        EnvFilter::new(VERBOSE_FILTER)
    } else if quiet {
        EnvFilter::new(QUIET_FILTER)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
    }
}

/// Install the global subscriber. Call once, before anything logs.
pub fn init_logger(verbose: bool, quiet: bool, no_color: bool) {
    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .with_ansi(!no_color && should_use_colors())
        .compact();

    tracing_subscriber::registry()
        .with(env_filter(verbose, quiet))
        .with(fmt_layer)
        .init();
}

/// Whether stderr should get ANSI colors.
///
/// `NO_COLOR` disables and `FORCE_COLOR` enables regardless of the terminal.
pub fn should_use_colors() -> bool {
    if std::env::var_os("NO_COLOR").is_some() {
        return false;
    }
    if std::env::var_os("FORCE_COLOR").is_some() {
        return true;
    }
    console::Term::stderr().features().colors_supported()
}
