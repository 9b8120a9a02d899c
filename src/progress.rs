//! Terminal progress for export stages
//!
//! Each stage gets one indicatif spinner that ends as done or failed.
//! With `--no-progress` every operation is a no-op.

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use tracing::debug;

const SPINNER_TEMPLATE: &str = "{spinner:.green} [{elapsed_precise}] {msg}";

#[derive(Debug, Clone, Copy)]
pub struct ProgressTracker {
    enabled: bool,
}

impl ProgressTracker {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Start tracking `task`, e.g. "gerbers"
    pub fn start(&self, task: &str) -> StageProgress {
        let bar = self.enabled.then(|| {
            let style = ProgressStyle::with_template(SPINNER_TEMPLATE)
                .unwrap_or_else(|_| ProgressStyle::default_spinner());
            let bar = ProgressBar::new_spinner().with_style(style);
            bar.set_message(format!("Exporting {}...", task));
            bar.enable_steady_tick(Duration::from_millis(100));
            bar
        });
        debug!("Stage {} started", task);

        StageProgress {
            task: task.to_string(),
            bar,
        }
    }
}

/// Spinner of one running stage
#[derive(Debug)]
pub struct StageProgress {
    task: String,
    bar: Option<ProgressBar>,
}

impl StageProgress {
    /// Underlying spinner, for sub-steps such as zipping
    pub fn bar(&self) -> Option<&ProgressBar> {
        self.bar.as_ref()
    }

    pub fn succeed(self) {
        if let Some(bar) = self.bar {
            bar.finish_with_message(format!("{} done", self.task));
        }
    }

    pub fn fail(self, error: &anyhow::Error) {
        debug!("Stage {} failed", self.task);
        if let Some(bar) = self.bar {
            bar.abandon_with_message(format!("{} failed: {:#}", self.task, error));
        }
    }
}
