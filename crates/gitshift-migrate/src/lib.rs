//! # gitshift migration core
//!
//! Moves git repositories between Gitea, GitLab and GitHub accounts.
//!
//! ## Features
//!
//! - **Providers**: source and destination traits with Gitea, GitLab and
//!   GitHub implementations, created by name through a registry
//! - **Selection**: a pure state machine for picking and renaming
//!   repositories, independent of any terminal
//! - **Engine**: existence check, creation and full mirror transfer with
//!   bounded parallelism, ordered results and cancellation
//! - **Redaction**: credentials never reach errors, logs or reports
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use gitshift_migrate::{MigrationConfig, MigrationEngine, ProviderRegistry};
//! use gitshift_types::TransferTask;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = MigrationConfig::load(None)?;
//!     let registry = ProviderRegistry::with_defaults();
//!     let source = registry.create_source(&config.source)?;
//!     let destination = registry.create_destination(&config.destination)?;
//!
//!     let tasks = source
//!         .get_user_repositories()
//!         .await?
//!         .into_iter()
//!         .map(TransferTask::new)
//!         .collect();
//!
//!     let engine = MigrationEngine::new(source, destination).with_workers(config.workers);
//!     let report = engine.run(tasks).await?;
//!     report.print_summary();
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod git;
pub mod log;
pub mod progress;
pub mod providers;
pub mod redact;
pub mod registry;
pub mod report;
pub mod selector;
pub mod validate;

// Re-export main types
pub use client::ClientOptions;
pub use config::{MigrationConfig, ProviderSettings};
pub use engine::MigrationEngine;
pub use error::{MigrationError, ProviderError, Result, TransferError, ValidationError};
pub use git::{GitTransport, Transport};
pub use log::MigrationLog;
pub use progress::{MigrationProgress, ProgressCallback, ProgressUpdate, TaskPhase};
pub use providers::{DestinationProvider, SourceProvider};
pub use registry::{Provider, ProviderRegistry, Role};
pub use report::MigrationReport;
pub use selector::{ExistsCheck, Input, InputSource, Phase, Selection, Selector, SelectorItem};
pub use validate::{validate_name, NameRules, Validator};

/// Version of the migration core.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
