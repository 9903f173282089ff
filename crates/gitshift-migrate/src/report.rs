//! Aggregate outcome of a migration run.

use chrono::{DateTime, Utc};
use gitshift_types::{TransferResult, TransferStatus};
use serde::{Deserialize, Serialize};

/// Process exit codes of the `gitshift` binary.
pub mod exit_code {
    /// Every task succeeded or was skipped, or nothing ran.
    pub const SUCCESS: i32 = 0;
    /// At least one task failed.
    pub const FAILURE: i32 = 1;
    /// The run never started: configuration, provider or validation error.
    pub const FATAL: i32 = 2;
    /// Interrupted by the operator with no failed task.
    pub const CANCELLED: i32 = 130;
}

/// Report of a completed migration run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationReport {
    /// One result per dispatched task, in input order.
    pub results: Vec<TransferResult>,

    /// Start time of the run.
    pub started_at: DateTime<Utc>,

    /// End time of the run.
    pub completed_at: Option<DateTime<Utc>>,

    /// Whether the run stopped dispatching because it was cancelled.
    pub cancelled: bool,
}

impl Default for MigrationReport {
    fn default() -> Self {
        Self::new()
    }
}

impl MigrationReport {
    /// Create a new empty report.
    pub fn new() -> Self {
        Self {
            results: Vec::new(),
            started_at: Utc::now(),
            completed_at: None,
            cancelled: false,
        }
    }

    /// Mark the run as complete.
    pub fn complete(&mut self) {
        self.completed_at = Some(Utc::now());
    }

    fn count(&self, status: TransferStatus) -> usize {
        self.results.iter().filter(|r| r.status == status).count()
    }

    /// Number of tasks created and mirrored.
    pub fn succeeded(&self) -> usize {
        self.count(TransferStatus::Succeeded)
    }

    /// Number of tasks whose target already existed.
    pub fn skipped(&self) -> usize {
        self.count(TransferStatus::SkippedExists)
    }

    /// Number of failed tasks.
    pub fn failed(&self) -> usize {
        self.count(TransferStatus::Failed)
    }

    /// Whether no task failed.
    pub fn is_successful(&self) -> bool {
        self.failed() == 0
    }

    /// Get the duration of the run.
    pub fn duration(&self) -> Option<chrono::Duration> {
        self.completed_at.map(|end| end - self.started_at)
    }

    /// Exit code for this outcome.
    pub fn exit_code(&self) -> i32 {
        if !self.is_successful() {
            exit_code::FAILURE
        } else if self.cancelled {
            exit_code::CANCELLED
        } else {
            exit_code::SUCCESS
        }
    }

    /// One-line totals, also written to the migration log.
    pub fn totals_line(&self) -> String {
        let mut line = format!(
            "{} succeeded, {} skipped (already exist), {} failed",
            self.succeeded(),
            self.skipped(),
            self.failed()
        );
        if self.cancelled {
            line.push_str(", run cancelled");
        }
        line
    }

    /// Human-readable summary, one entry per line.
    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines = vec![self.totals_line()];
        for result in &self.results {
            let marker = match result.status {
                TransferStatus::Succeeded => "✓",
                TransferStatus::SkippedExists => "↷",
                TransferStatus::Failed => "✗",
            };
            let mut line = format!(
                "  {marker} {} ({:.1}s)",
                result.task.label(),
                result.duration.as_secs_f64()
            );
            if let Some(error) = &result.error {
                line.push_str(": ");
                line.push_str(error);
            }
            lines.push(line);
        }
        lines
    }

    /// Print a summary of the run.
    pub fn print_summary(&self) {
        println!("\n=== Migration Summary ===\n");
        for line in self.summary_lines() {
            println!("{line}");
        }
        if let Some(duration) = self.duration() {
            println!("\nCompleted in {} seconds", duration.num_seconds());
        }
        let status = if self.is_successful() {
            "SUCCESS"
        } else {
            "FAILED"
        };
        println!("\nOverall Status: {status}");
    }
}
