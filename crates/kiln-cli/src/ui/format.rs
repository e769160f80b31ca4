//! Sizes, durations and the build summary table.

use std::path::Path;
use std::time::Duration;

use kiln_bundler::BuildReport;
use owo_colors::{OwoColorize, Stream};

/// Human-readable size (`0 B`, `512 B`, `1.50 KB`, `2.00 MB`).
pub fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB"];

    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{size:.2} {}", UNITS[unit])
    }
}

/// Human-readable duration (`45ms`, `1.50s`, `2m 5s`).
pub fn format_duration(duration: Duration) -> String {
    let ms = duration.as_millis();
    if ms < 1000 {
        format!("{ms}ms")
    } else if ms < 60_000 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        let secs = duration.as_secs();
        format!("{}m {}s", secs / 60, secs % 60)
    }
}

/// Uncolored summary rows: one per artifact, then the stage timings and the
/// totals.
pub fn summary_lines(report: &BuildReport) -> Vec<String> {
    let name_width = report.artifacts.iter().map(|a| a.path.len()).max().unwrap_or(0);
    let kind_width = report
        .artifacts
        .iter()
        .map(|a| a.kind.label().len())
        .max()
        .unwrap_or(0);

    let mut lines: Vec<String> = report
        .artifacts
        .iter()
        .map(|artifact| {
            format!(
                "{:<name_width$}  {:<kind_width$}  {:>10}",
                artifact.path,
                artifact.kind.label(),
                format_size(artifact.size)
            )
        })
        .collect();

    let timings: Vec<String> = report
        .timings
        .iter()
        .map(|t| format!("{} {}", t.stage, format_duration(t.elapsed)))
        .collect();
    lines.push(format!("Stages: {}", timings.join(", ")));
    lines.push(format!(
        "Total: {} files, {} from {} modules in {}",
        report.artifacts.len(),
        format_size(report.total_size()),
        report.module_count,
        format_duration(report.elapsed)
    ));
    lines
}

/// Print the summary table for a published build to stderr.
pub fn print_build_summary(report: &BuildReport, output_dir: &Path) {
    let width = (console::Term::stderr().size().1 as usize).clamp(20, 80);
    let rule = "─".repeat(width);
    let lines = summary_lines(report);
    let (rows, footer) = lines.split_at(lines.len().saturating_sub(2));

    eprintln!(
        "\n{} {}",
        "Build Summary".if_supports_color(Stream::Stderr, |t| t.bold()),
        output_dir.display().if_supports_color(Stream::Stderr, |t| t.dimmed())
    );
    eprintln!("{rule}");
    for row in rows {
        eprintln!("  {} {}", "▸".if_supports_color(Stream::Stderr, |t| t.blue()), row);
    }
    eprintln!("{rule}");
    for line in footer {
        eprintln!("  {}", line.if_supports_color(Stream::Stderr, |t| t.green()));
    }
}
