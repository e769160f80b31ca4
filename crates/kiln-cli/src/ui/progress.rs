//! Progress bar with one step per pipeline stage.

use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use kiln_bundler::{ProgressCallback, StageEvent};

pub struct BuildProgress {
    bar: ProgressBar,
}

impl BuildProgress {
    /// A bar over `stages` steps, or a hidden one when `visible` is false.
    pub fn new(stages: usize, visible: bool) -> Self {
        if !visible {
            return Self {
                bar: ProgressBar::hidden(),
            };
        }

        let style = ProgressStyle::with_template("{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓▒░");
        let bar = ProgressBar::new(stages as u64).with_style(style);
        bar.enable_steady_tick(Duration::from_millis(100));
        Self { bar }
    }

    /// Callback for `Bundler::with_progress` that drives this bar.
    pub fn callback(&self) -> ProgressCallback {
        let bar = self.bar.clone();
        Arc::new(move |event: StageEvent<'_>| match event {
            StageEvent::Started { name, index, total } => {
                bar.set_length(total as u64);
                bar.set_position(index as u64);
                bar.set_message(name.to_string());
            }
            StageEvent::Finished { .. } => bar.inc(1),
        })
    }

    pub fn position(&self) -> u64 {
        self.bar.position()
    }

    /// Remove the bar from the terminal.
    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}
