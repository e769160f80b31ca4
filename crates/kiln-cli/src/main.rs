//! `kiln` binary entry point: parse arguments, set up logging, dispatch.

use clap::Parser;
use kiln_cli::{cli, commands, error, logger, ui};
use miette::Result;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();

    logger::init_logger(args.verbose, args.quiet, args.no_color);
    ui::init_colors(args.no_color);

    let output = ui::Output::new(args.quiet);
    let result = match args.command {
        cli::Command::Build(build_args) => commands::build::execute(build_args, &output).await,
        cli::Command::Check(check_args) => commands::check::execute(check_args, &output).await,
    };

    result.map_err(error::cli_error_to_miette)
}
