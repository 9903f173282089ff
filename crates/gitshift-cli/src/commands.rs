//! CLI command implementations.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use gitshift_migrate::config::{self, write_env_template};
use gitshift_migrate::report::exit_code;
use gitshift_migrate::{
    DestinationProvider, GitTransport, MigrationConfig, MigrationEngine, MigrationError, ProviderRegistry,
    ProviderSettings, Role, Selection, Selector, SourceProvider, TransferError,
};
use gitshift_types::{Repository, TransferTask};
use thiserror::Error;
use tracing::{info, warn};

use crate::interactive::TerminalInput;
use crate::output::{print_repository, ConsoleProgressReporter};
use crate::MigrateArgs;

/// CLI errors. All of them end the process with the fatal exit code.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Migration(#[from] MigrationError),

    #[error("git is required: {0}")]
    Git(#[from] TransferError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Interactive session failed: {0}")]
    Session(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, CliError>;

/// Log path from the flag, then the configured one.
pub fn log_path(flag: Option<PathBuf>, config: &MigrationConfig) -> PathBuf {
    flag.unwrap_or_else(|| config.log_file.clone())
}

/// Builds the configuration from the process environment, after `.env`
/// has been loaded.
pub fn load_config() -> Result<MigrationConfig> {
    Ok(MigrationConfig::from_lookup(|key| std::env::var(key).ok())?)
}

/// Migrate repositories from the source to the destination.
pub async fn migrate(args: MigrateArgs, config: MigrationConfig) -> Result<i32> {
    let registry = ProviderRegistry::with_defaults();
    let source = registry.create_source(&config.source)?;
    let destination = registry.create_destination(&config.destination)?;

    let git_version = GitTransport::new().version().await?;
    info!(git = %git_version, "Found git");

    let tasks = if !args.repos.is_empty() {
        resolve_repos(source.as_ref(), &args.repos).await?
    } else if args.no_interactive {
        source
            .get_user_repositories()
            .await?
            .into_iter()
            .map(TransferTask::new)
            .collect()
    } else {
        let repos = source.get_accessible_repositories().await?;
        if repos.is_empty() {
            println!("No repositories found on {}.", source.name());
            return Ok(exit_code::SUCCESS);
        }
        let selector = Selector::new(repos, destination.name_rules())
            .with_exists_check(destination_lookup(destination.clone()));
        let selection = tokio::task::spawn_blocking(move || {
            let mut input = TerminalInput::new();
            selector.run(&mut input)
        })
        .await??;
        match selection {
            Selection::Committed(tasks) => tasks,
            Selection::Aborted => {
                println!("Aborted, nothing was migrated.");
                info!("Selection aborted");
                return Ok(exit_code::SUCCESS);
            }
        }
    };

    if tasks.is_empty() {
        println!("Nothing selected.");
        return Ok(exit_code::SUCCESS);
    }

    let reporter = ConsoleProgressReporter::new(tasks.len() as u64);
    let engine = MigrationEngine::new(source, destination)
        .with_workers(args.workers.unwrap_or(config.workers))
        .with_verify(args.verify)
        .with_progress(reporter.progress());

    let cancel = engine.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, finishing running transfers");
            cancel.cancel();
        }
    });

    let report = engine.run(tasks).await?;
    reporter.finish(&report.totals_line());

    for line in report.summary_lines() {
        info!("{}", line.trim());
    }
    report.print_summary();
    Ok(report.exit_code())
}

/// Blocking existence check for the selector, which runs off the runtime.
fn destination_lookup(
    destination: Arc<dyn DestinationProvider>,
) -> impl Fn(&str) -> bool + Send + Sync + 'static {
    let handle = tokio::runtime::Handle::current();
    move |name: &str| {
        let full_name = format!("{}/{name}", destination.owner());
        match handle.block_on(destination.repository_exists(&full_name)) {
            Ok(exists) => exists,
            Err(e) => {
                warn!(repo = %full_name, "Could not check destination: {e}");
                false
            }
        }
    }
}

/// Looks up `name` or `owner/name` specs; unknown ones are skipped.
async fn resolve_repos(source: &dyn SourceProvider, specs: &[String]) -> Result<Vec<TransferTask>> {
    let mut tasks = Vec::new();
    for spec in specs {
        let (owner, name) = match spec.trim().rsplit_once('/') {
            Some((owner, name)) => (owner.to_string(), name.to_string()),
            None => (source.username().to_string(), spec.trim().to_string()),
        };
        match source.get_repository_info(&owner, &name).await? {
            Some(repo) => tasks.push(TransferTask::new(repo)),
            None => {
                warn!(repo = %spec, "Repository not found on source, skipping");
                eprintln!("Repository {owner}/{name} not found, skipping");
            }
        }
    }
    Ok(tasks)
}

/// List every repository the source can read.
pub async fn list() -> Result<i32> {
    let config = load_config()?;
    let source = ProviderRegistry::with_defaults().create_source(&config.source)?;

    let mut repos: Vec<Repository> = source.get_accessible_repositories().await?;
    repos.sort_by(|a, b| {
        b.is_mine
            .cmp(&a.is_mine)
            .then_with(|| a.full_name().cmp(&b.full_name()))
    });

    for repo in &repos {
        print_repository(repo);
    }
    println!("\nTotal: {} repositories on {}", repos.len(), source.name());
    Ok(exit_code::SUCCESS)
}

/// Show registered providers and whether their settings are present.
pub fn providers() -> Result<i32> {
    let registry = ProviderRegistry::with_defaults();
    let lookup = |key: &str| std::env::var(key).ok();

    for role in [Role::Source, Role::Destination] {
        println!("{role} providers:");
        for name in registry.names(role) {
            let settings = ProviderSettings::from_lookup(role, name, &lookup);
            let status = if settings.is_configured() {
                console::style("configured").green()
            } else {
                console::style("not configured").dim()
            };
            let keys = config::env_keys(role, name)
                .map(|k| format!(" ({}, {}, {})", k.url, k.token, k.username))
                .unwrap_or_default();
            println!("  {name:<8} {status}{keys}");
        }
    }
    Ok(exit_code::SUCCESS)
}

/// Write the `.env` template.
pub fn setup(path: &Path) -> Result<i32> {
    if write_env_template(path)? {
        println!("Wrote {}. Fill in your tokens, then run `gitshift`.", path.display());
    } else {
        println!("{} already exists, leaving it untouched.", path.display());
    }
    Ok(exit_code::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(log_file: Option<&str>) -> MigrationConfig {
        let mut vars = vec![
            ("GITEA_URL", "https://git.example.com"),
            ("GITEA_TOKEN", "gitea-token"),
            ("GITEA_USERNAME", "alice"),
            ("GITHUB_TOKEN", "github-token"),
            ("GITHUB_USERNAME", "alice"),
        ];
        if let Some(path) = log_file {
            vars.push(("MIGRATION_LOG_FILE", path));
        }
        MigrationConfig::from_lookup(|key| {
            vars.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| (*v).to_string())
        })
        .unwrap()
    }

    #[test]
    fn test_log_path_prefers_flag() {
        let config = config(Some("/var/log/gitshift.log"));
        let path = log_path(Some(PathBuf::from("/tmp/custom.log")), &config);
        assert_eq!(path, PathBuf::from("/tmp/custom.log"));
    }

    #[test]
    fn test_log_path_falls_back_to_configured_file() {
        let configured = config(Some("/var/log/gitshift.log"));
        assert_eq!(log_path(None, &configured), PathBuf::from("/var/log/gitshift.log"));

        let default = config(None);
        assert_eq!(
            log_path(None, &default),
            PathBuf::from(gitshift_migrate::config::DEFAULT_LOG_FILE)
        );
    }

    #[test]
    fn test_setup_never_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(&path, "GITEA_TOKEN=keep\n").unwrap();

        assert_eq!(setup(&path).unwrap(), exit_code::SUCCESS);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "GITEA_TOKEN=keep\n");
    }
}
