//! `kiln build`: run the pipeline and publish into the output directory.

use kiln_bundler::{Bundler, Pipeline};
use kiln_config::ConfigOverrides;
use tracing::info;

use crate::cli::BuildArgs;
use crate::commands::load_config;
use crate::error::Result;
use crate::ui::{self, BuildProgress, Output};

pub async fn execute(args: BuildArgs, output: &Output) -> Result<()> {
    let overrides = ConfigOverrides {
        output_dir: args.out_dir.clone(),
        public_path: args.public_path.clone(),
    };
    let config = load_config(&args.project, &overrides)?;
    let output_dir = config.output_path();
    output.info(&format!("Building {}", config.root.display()));

    let visible = !output.is_quiet() && !args.json && ui::is_interactive();
    let progress = BuildProgress::new(Pipeline::standard().stage_names().len(), visible);
    let bundler = Bundler::new(config)?.with_progress(progress.callback());

    let result = bundler.build().await;
    progress.finish();
    let report = result?;
    info!(
        artifacts = report.artifacts.len(),
        out_dir = %output_dir.display(),
        "build complete"
    );

    for warning in &report.warnings {
        output.warning(&warning.headline());
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if !output.is_quiet() {
        ui::print_build_summary(&report, &output_dir);
    }
    output.success(&format!(
        "Built {} files in {}",
        report.artifacts.len(),
        ui::format_duration(report.elapsed)
    ));
    Ok(())
}
