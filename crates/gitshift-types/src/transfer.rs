//! Transfer tasks and their outcomes.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::Repository;

/// One committed (source repository, target name) pair awaiting transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferTask {
    /// Repository to read from.
    pub source: Repository,
    /// Repository name to create on the destination.
    pub target_name: String,
}

impl TransferTask {
    /// Creates a task that keeps the source repository's name.
    pub fn new(source: Repository) -> Self {
        let target_name = source.name.clone();
        Self {
            source,
            target_name,
        }
    }

    /// Creates a task with an explicit target name.
    pub fn renamed(source: Repository, target_name: impl Into<String>) -> Self {
        Self {
            source,
            target_name: target_name.into(),
        }
    }

    /// Returns whether the target name differs from the source name.
    pub fn is_renamed(&self) -> bool {
        self.target_name != self.source.name
    }

    /// Returns a label such as `alice/app` or `alice/app -> app-v2`.
    pub fn label(&self) -> String {
        if self.is_renamed() {
            format!("{} -> {}", self.source.full_name(), self.target_name)
        } else {
            self.source.full_name()
        }
    }
}

/// Final state of a transfer task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    /// Repository created and mirrored.
    Succeeded,
    /// Destination already had a repository with the target name.
    SkippedExists,
    /// Creation or transfer failed.
    Failed,
}

impl std::fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Succeeded => write!(f, "succeeded"),
            Self::SkippedExists => write!(f, "skipped (exists)"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Outcome of one transfer task. Finalized once and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferResult {
    /// The task this result belongs to.
    pub task: TransferTask,
    /// Final status.
    pub status: TransferStatus,
    /// Sanitized error message when the task failed.
    pub error: Option<String>,
    /// Wall-clock time spent on the task.
    pub duration: Duration,
}

impl TransferResult {
    /// Builds a successful result.
    pub fn succeeded(task: TransferTask, duration: Duration) -> Self {
        Self {
            task,
            status: TransferStatus::Succeeded,
            error: None,
            duration,
        }
    }

    /// Builds a result for a task whose target already existed.
    pub fn skipped(task: TransferTask, duration: Duration) -> Self {
        Self {
            task,
            status: TransferStatus::SkippedExists,
            error: None,
            duration,
        }
    }

    /// Builds a failed result carrying an already-sanitized message.
    pub fn failed(task: TransferTask, error: impl Into<String>, duration: Duration) -> Self {
        Self {
            task,
            status: TransferStatus::Failed,
            error: Some(error.into()),
            duration,
        }
    }

    /// Returns whether this result counts against the run.
    pub fn is_failure(&self) -> bool {
        self.status == TransferStatus::Failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_defaults_to_source_name() {
        let task = TransferTask::new(Repository::new("alice", "app"));
        assert_eq!(task.target_name, "app");
        assert!(!task.is_renamed());
        assert_eq!(task.label(), "alice/app");
    }

    #[test]
    fn test_renamed_task_label() {
        let task = TransferTask::renamed(Repository::new("alice", "app"), "app-v2");
        assert!(task.is_renamed());
        assert_eq!(task.label(), "alice/app -> app-v2");
    }

    #[test]
    fn test_result_constructors() {
        let task = TransferTask::new(Repository::new("alice", "app"));
        let ok = TransferResult::succeeded(task.clone(), Duration::from_millis(5));
        let skipped = TransferResult::skipped(task.clone(), Duration::ZERO);
        let failed = TransferResult::failed(task, "push rejected", Duration::ZERO);

        assert!(!ok.is_failure());
        assert!(!skipped.is_failure());
        assert!(failed.is_failure());
        assert_eq!(failed.error.as_deref(), Some("push rejected"));
        assert_eq!(skipped.status.to_string(), "skipped (exists)");
    }
}
