use std::path::PathBuf;

use clap::{Args, Subcommand};

use crate::cli::validation::parse_public_path;

/// Available kiln subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build the application into the output directory
    ///
    /// Runs every stage, then replaces the output directory in one step.
    /// A failed build leaves the previous output untouched.
    Build(BuildArgs),

    /// Validate configuration and resolve every entry without writing
    Check(CheckArgs),
}

/// Where the project lives and which config file to read.
#[derive(Args, Debug, Clone)]
pub struct ProjectArgs {
    /// Project root directory
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub root: PathBuf,

    /// Config file, relative to the root
    ///
    /// Without it, kiln.toml in the root is used, else the "kiln" field of
    /// package.json, else the builtin defaults.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

/// Arguments for the build command
#[derive(Args, Debug)]
pub struct BuildArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    /// Output directory, overriding `output_dir` from the config
    #[arg(short, long, value_name = "DIR")]
    pub out_dir: Option<PathBuf>,

    /// Public path or CDN URL the app is served from
    ///
    /// Must start with `/` or be an absolute http(s) URL.
    #[arg(long, value_name = "URL", value_parser = parse_public_path)]
    pub public_path: Option<String>,

    /// Print the build report as JSON on stdout instead of the summary table
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the check command
#[derive(Args, Debug)]
pub struct CheckArgs {
    #[command(flatten)]
    pub project: ProjectArgs,
}
