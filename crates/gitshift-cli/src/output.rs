//! Console output: repository rows and the transfer progress bar.

use std::sync::Arc;

use console::style;
use gitshift_migrate::{MigrationProgress, ProgressUpdate, TaskPhase};
use gitshift_types::{Repository, TransferStatus};
use indicatif::{ProgressBar, ProgressStyle};

/// Width at which descriptions are cut.
pub(crate) const DESCRIPTION_WIDTH: usize = 45;

/// Prints one repository line for `gitshift list`.
pub fn print_repository(repo: &Repository) {
    let visibility = if repo.is_private {
        style("private").yellow()
    } else {
        style("public ").green()
    };
    let ownership = if repo.is_mine { "mine  " } else { "shared" };
    let description = repo
        .short_description(DESCRIPTION_WIDTH)
        .unwrap_or_default();
    println!(
        "{:<45} {visibility} {ownership} {}",
        repo.full_name(),
        style(description).dim()
    );
}

/// Console progress reporter using indicatif.
pub struct ConsoleProgressReporter {
    progress_bar: ProgressBar,
    progress: Arc<MigrationProgress>,
}

impl ConsoleProgressReporter {
    /// Create a reporter for `total` tasks.
    pub fn new(total: u64) -> Self {
        let progress_bar = ProgressBar::new(total);
        progress_bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );

        let pb = progress_bar.clone();
        let progress = Arc::new(MigrationProgress::with_callback(Arc::new(
            move |update: ProgressUpdate| {
                pb.set_position(update.completed);
                match update.phase {
                    TaskPhase::Finished(status) => {
                        let marker = match status {
                            TransferStatus::Succeeded => style("✓").green(),
                            TransferStatus::SkippedExists => style("↷").yellow(),
                            TransferStatus::Failed => style("✗").red(),
                        };
                        pb.println(format!("{marker} {} {status}", update.label));
                    }
                    phase => pb.set_message(format!("{}: {phase}", update.label)),
                }
            },
        )));

        Self {
            progress_bar,
            progress,
        }
    }

    /// Tracker to hand to the engine.
    pub fn progress(&self) -> Arc<MigrationProgress> {
        self.progress.clone()
    }

    /// Finish the progress bar.
    pub fn finish(&self, message: &str) {
        self.progress_bar.finish_with_message(message.to_string());
    }
}
