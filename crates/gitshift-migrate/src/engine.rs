//! Runs transfer tasks against a source and a destination.
//!
//! Each task checks for the target, creates it when absent, then mirrors
//! all branches and tags through a private temporary directory. Tasks run
//! concurrently up to the worker count while results keep input order.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use futures::stream::{self, StreamExt};
use gitshift_types::{TransferResult, TransferStatus, TransferTask};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::DEFAULT_WORKERS;
use crate::error::{Result, TransferError, ValidationError};
use crate::git::{GitTransport, Transport, MIRROR_DIR};
use crate::progress::{MigrationProgress, TaskPhase};
use crate::providers::{DestinationProvider, SourceProvider};
use crate::redact::{sanitize, Redactor};
use crate::report::MigrationReport;
use crate::validate::validate_name;

/// Prefix of per-task working directories.
const WORKDIR_PREFIX: &str = "gitshift-";

/// Migration engine.
pub struct MigrationEngine {
    source: Arc<dyn SourceProvider>,
    destination: Arc<dyn DestinationProvider>,
    transport: Arc<dyn Transport>,
    workers: usize,
    verify: bool,
    progress: Arc<MigrationProgress>,
    cancel: CancellationToken,
}

impl MigrationEngine {
    /// Create an engine that transfers with the system `git`.
    pub fn new(source: Arc<dyn SourceProvider>, destination: Arc<dyn DestinationProvider>) -> Self {
        Self {
            source,
            destination,
            transport: Arc::new(GitTransport::new()),
            workers: DEFAULT_WORKERS,
            verify: false,
            progress: Arc::new(MigrationProgress::new()),
            cancel: CancellationToken::new(),
        }
    }

    /// Replace the transport.
    #[must_use]
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = transport;
        self
    }

    /// Set the number of concurrent tasks; values below one mean one.
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Compare destination refs with the mirror after each push.
    #[must_use]
    pub fn with_verify(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    /// Report progress to `progress`.
    #[must_use]
    pub fn with_progress(mut self, progress: Arc<MigrationProgress>) -> Self {
        self.progress = progress;
        self
    }

    /// Handle that stops dispatching new tasks when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Checks target names before anything touches the network.
    pub fn validate(&self, tasks: &[TransferTask]) -> std::result::Result<(), ValidationError> {
        let rules = self.destination.name_rules();
        let mut seen = HashSet::new();
        for task in tasks {
            if !seen.insert(task.target_name.to_lowercase()) {
                return Err(ValidationError::DuplicateTarget(task.target_name.clone()));
            }
            validate_name(&task.target_name, &rules)?;
        }
        Ok(())
    }

    /// Runs `tasks` and returns one result per dispatched task, in order.
    ///
    /// Fails only when validation rejects the task list. Per-task failures
    /// are recorded in the report.
    pub async fn run(&self, tasks: Vec<TransferTask>) -> Result<MigrationReport> {
        self.validate(&tasks)?;

        let mut report = MigrationReport::new();
        if tasks.is_empty() {
            report.complete();
            return Ok(report);
        }

        info!(
            source = self.source.name(),
            destination = self.destination.name(),
            tasks = tasks.len(),
            workers = self.workers,
            "Starting migration"
        );
        self.progress.start(tasks.len() as u64);

        let cancel = self.cancel.clone();
        report.results = stream::iter(tasks.into_iter().enumerate())
            .take_while(move |_| futures::future::ready(!cancel.is_cancelled()))
            .map(|(index, task)| self.run_task(index, task))
            .buffered(self.workers)
            .collect()
            .await;

        report.cancelled = self.cancel.is_cancelled();
        report.complete();
        if report.cancelled {
            warn!(
                dispatched = report.results.len(),
                "Migration cancelled, remaining tasks were not started"
            );
        }
        info!("Migration finished: {}", report.totals_line());
        Ok(report)
    }

    async fn run_task(&self, index: usize, task: TransferTask) -> TransferResult {
        let label = task.label();
        let started = Instant::now();
        info!(task = %label, "Task started");

        let outcome = self.transfer(index, &task, &label).await;
        let duration = started.elapsed();
        let result = match outcome {
            Ok(TransferStatus::SkippedExists) => {
                info!(task = %label, "Task skipped, target already exists");
                TransferResult::skipped(task, duration)
            }
            Ok(_) => {
                info!(task = %label, elapsed_ms = duration.as_millis(), "Task succeeded");
                TransferResult::succeeded(task, duration)
            }
            Err(message) => {
                warn!(task = %label, "Task failed: {message}");
                TransferResult::failed(task, message, duration)
            }
        };
        self.progress
            .phase(index, &label, TaskPhase::Finished(result.status));
        result
    }

    /// Errors are returned as sanitized messages.
    async fn transfer(
        &self,
        index: usize,
        task: &TransferTask,
        label: &str,
    ) -> std::result::Result<TransferStatus, String> {
        let scrub = |e: &dyn std::fmt::Display| sanitize(&e.to_string());

        self.progress.phase(index, label, TaskPhase::Checking);
        let full_name = format!("{}/{}", self.destination.owner(), task.target_name);
        if self
            .destination
            .repository_exists(&full_name)
            .await
            .map_err(|e| scrub(&e))?
        {
            return Ok(TransferStatus::SkippedExists);
        }

        self.progress.phase(index, label, TaskPhase::Creating);
        let created = self
            .destination
            .create_repository(
                &task.target_name,
                task.source.is_private,
                task.source.description.as_deref(),
            )
            .await
            .map_err(|e| scrub(&e))?;

        let workdir = tempfile::Builder::new()
            .prefix(WORKDIR_PREFIX)
            .tempdir()
            .map_err(|e| scrub(&TransferError::Workspace(e)))?;
        let mirror = workdir.path().join(MIRROR_DIR);

        let clone_url = self
            .source
            .get_authenticated_clone_url(&task.source)
            .map_err(|e| scrub(&e))?;
        let push_url = self
            .destination
            .get_authenticated_push_url(&created)
            .map_err(|e| scrub(&e))?;
        let redactor = Redactor::new()
            .with_secret(&clone_url)
            .with_secret(&push_url);
        let redact = |e: TransferError| redactor.apply(&e.to_string());

        self.progress.phase(index, label, TaskPhase::Cloning);
        self.transport
            .clone_mirror(&clone_url, &mirror)
            .await
            .map_err(redact)?;

        self.progress.phase(index, label, TaskPhase::Pushing);
        self.transport
            .push_mirror(&mirror, &push_url)
            .await
            .map_err(redact)?;

        if self.verify {
            self.progress.phase(index, label, TaskPhase::Verifying);
            self.transport
                .verify(&mirror, &push_url)
                .await
                .map_err(redact)?;
        }

        debug!(task = %label, "Releasing working directory");
        Ok(TransferStatus::Succeeded)
    }
}

impl std::fmt::Debug for MigrationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationEngine")
            .field("source", &self.source.name())
            .field("destination", &self.destination.name())
            .field("workers", &self.workers)
            .field("verify", &self.verify)
            .finish_non_exhaustive()
    }
}
