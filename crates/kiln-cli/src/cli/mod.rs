//! Command-line interface definition, built with clap's derive macros.
//!
//! - `kiln build` runs the full pipeline and publishes into the output directory
//! - `kiln check` validates configuration and resolves every entry without writing

mod commands;
mod validation;

use clap::Parser;

pub use commands::{BuildArgs, CheckArgs, Command, ProjectArgs};
pub use validation::parse_public_path;

/// Kiln - fingerprinted, offline-ready builds for browser applications
#[derive(Parser, Debug)]
#[command(
    name = "kiln",
    version,
    about = "Build browser applications into fingerprinted, offline-ready bundles",
    long_about = "Kiln turns an application's source tree into fingerprinted scripts and\n\
                  stylesheets, an injected HTML page, an asset manifest and a precaching\n\
                  service worker. Configuration comes from kiln.toml or the \"kiln\" field\n\
                  of package.json."
)]
pub struct Cli {
    /// Enable verbose logging (debug level)
    ///
    /// Shows every stage boundary, module and artifact as it is produced.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn parses_build_with_overrides() {
        let cli = Cli::try_parse_from([
            "kiln",
            "build",
            "--root",
            "app",
            "--out-dir",
            "dist",
            "--public-path",
            "https://cdn.example.com/app/",
        ])
        .unwrap();
        let Command::Build(args) = cli.command else {
            panic!("expected build");
        };
        assert_eq!(args.project.root, PathBuf::from("app"));
        assert_eq!(args.out_dir, Some(PathBuf::from("dist")));
        assert_eq!(args.public_path.as_deref(), Some("https://cdn.example.com/app/"));
        assert!(!args.json);
    }

    #[test]
    fn root_defaults_to_current_dir() {
        let cli = Cli::try_parse_from(["kiln", "check"]).unwrap();
        let Command::Check(args) = cli.command else {
            panic!("expected check");
        };
        assert_eq!(args.project.root, PathBuf::from("."));
        assert!(args.project.config.is_none());
    }

    #[test]
    fn global_flags_follow_the_subcommand() {
        let cli = Cli::try_parse_from(["kiln", "build", "--quiet", "--no-color"]).unwrap();
        assert!(cli.quiet);
        assert!(cli.no_color);
        assert!(!cli.verbose);
    }

    #[test]
    fn verbose_conflicts_with_quiet() {
        assert!(Cli::try_parse_from(["kiln", "-v", "-q", "build"]).is_err());
    }

    #[test]
    fn rejects_relative_public_path() {
        assert!(Cli::try_parse_from(["kiln", "build", "--public-path", "static"]).is_err());
    }
}
