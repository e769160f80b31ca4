//! `kiln check`: validate configuration and resolve every entry.
//!
//! Runs the load stage only, so syntax, lint and resolution errors surface
//! without producing or writing any artifact.

use kiln_bundler::Bundler;
use kiln_config::ConfigOverrides;

use crate::cli::CheckArgs;
use crate::commands::load_config;
use crate::error::Result;
use crate::ui::Output;

pub async fn execute(args: CheckArgs, output: &Output) -> Result<()> {
    let config = load_config(&args.project, &ConfigOverrides::default())?;
    output.success("Configuration is valid");

    let bundler = Bundler::new(config)?;
    let report = tokio::task::spawn_blocking(move || bundler.check()).await??;

    for warning in &report.warnings {
        output.warning(&warning.headline());
    }
    output.success(&format!(
        "Resolved {} modules across {} entry groups",
        report.module_count, report.entry_groups
    ));
    Ok(())
}
