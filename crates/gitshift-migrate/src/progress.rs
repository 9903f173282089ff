//! Progress tracking for migration runs.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use gitshift_types::TransferStatus;

/// Callback type for progress updates.
pub type ProgressCallback = Arc<dyn Fn(ProgressUpdate) + Send + Sync>;

/// Progress update information.
#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    /// Position of the task in the run.
    pub index: usize,

    /// Task label, e.g. `alice/app -> app-v2`.
    pub label: String,

    /// Phase the task just entered.
    pub phase: TaskPhase,

    /// Tasks finished so far.
    pub completed: u64,

    /// Tasks in the run.
    pub total: u64,
}

/// Phases of a single transfer task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskPhase {
    /// Checking whether the target exists.
    Checking,
    /// Creating the target repository.
    Creating,
    /// Mirror-cloning the source.
    Cloning,
    /// Pushing to the destination.
    Pushing,
    /// Comparing destination refs with the mirror.
    Verifying,
    /// Task is done.
    Finished(TransferStatus),
}

impl std::fmt::Display for TaskPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Checking => write!(f, "Checking destination"),
            Self::Creating => write!(f, "Creating repository"),
            Self::Cloning => write!(f, "Cloning source"),
            Self::Pushing => write!(f, "Pushing to destination"),
            Self::Verifying => write!(f, "Verifying"),
            Self::Finished(status) => write!(f, "Finished ({status})"),
        }
    }
}

/// Progress tracker shared by every task of a run.
#[derive(Default)]
pub struct MigrationProgress {
    completed: AtomicU64,
    total: AtomicU64,
    callback: Option<ProgressCallback>,
}

impl MigrationProgress {
    /// Create a tracker without a callback.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a tracker with a callback.
    pub fn with_callback(callback: ProgressCallback) -> Self {
        Self {
            callback: Some(callback),
            ..Self::default()
        }
    }

    /// Reset counters for a new run of `total` tasks.
    pub fn start(&self, total: u64) {
        self.completed.store(0, Ordering::SeqCst);
        self.total.store(total, Ordering::SeqCst);
    }

    /// Report that task `index` entered `phase`.
    pub fn phase(&self, index: usize, label: &str, phase: TaskPhase) {
        if matches!(phase, TaskPhase::Finished(_)) {
            self.completed.fetch_add(1, Ordering::SeqCst);
        }
        if let Some(callback) = &self.callback {
            callback(ProgressUpdate {
                index,
                label: label.to_string(),
                phase,
                completed: self.completed.load(Ordering::SeqCst),
                total: self.total.load(Ordering::SeqCst),
            });
        }
    }

    /// Tasks finished so far.
    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::SeqCst)
    }

    /// Get current progress percentage.
    #[allow(clippy::cast_precision_loss)]
    pub fn percentage(&self) -> f64 {
        let total = self.total.load(Ordering::SeqCst);
        if total == 0 {
            return 0.0;
        }
        (self.completed() as f64 / total as f64) * 100.0
    }
}

impl std::fmt::Debug for MigrationProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationProgress")
            .field("completed", &self.completed)
            .field("total", &self.total)
            .field("callback", &self.callback.is_some())
            .finish()
    }
}
