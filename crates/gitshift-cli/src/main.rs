//! gitshift - move repositories between Gitea, GitLab and GitHub.

use std::future::Future;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use gitshift_migrate::report::exit_code;
use gitshift_migrate::{MigrationConfig, MigrationLog};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

mod commands;
mod interactive;
mod output;

/// gitshift - Git hosting migrator
#[derive(Parser, Debug)]
#[command(name = "gitshift")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Read settings from this file instead of `.env`
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,

    /// Append the migration log here (default: $MIGRATION_LOG_FILE or migration.log)
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Migrate repositories (default)
    Migrate(MigrateArgs),

    /// List every repository the source token can read
    List,

    /// Show registered providers and whether they are configured
    Providers,

    /// Write a `.env` template
    Setup {
        /// Where to write the template
        #[arg(short, long, default_value = ".env")]
        path: PathBuf,
    },
}

/// Options of the `migrate` command.
#[derive(Args, Debug, Default)]
pub struct MigrateArgs {
    /// Repositories to migrate, as `name` or `owner/name`
    #[arg(long, num_args = 1..)]
    pub repos: Vec<String>,

    /// Migrate all of your own repositories without prompting
    #[arg(long)]
    pub no_interactive: bool,

    /// Concurrent transfers (default: $MIGRATION_WORKERS or 4)
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Compare destination branches and tags with the source after pushing
    #[arg(long)]
    pub verify: bool,
}

fn init_tracing(verbose: u8, log: Option<MigrationLog>) {
    let log_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let stderr = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("gitshift={log_level}").into()),
        );

    let file = log.map(|log| {
        tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(log)
            .with_filter(EnvFilter::new("gitshift=info"))
    });

    tracing_subscriber::registry().with(stderr).with(file).init();
}

fn main() {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Commands::Migrate(MigrateArgs::default()));

    if let Err(e) = gitshift_migrate::config::load_env_file(cli.env_file.as_deref()) {
        init_tracing(cli.verbose, None);
        fail(&e);
    }

    let result = match command {
        Commands::Migrate(args) => {
            let config = start_migration_log(cli.verbose, cli.log_file);
            block_on(commands::migrate(args, config))
        }
        Commands::List => {
            init_tracing(cli.verbose, None);
            block_on(commands::list())
        }
        Commands::Providers => {
            init_tracing(cli.verbose, None);
            commands::providers()
        }
        Commands::Setup { path } => {
            init_tracing(cli.verbose, None);
            commands::setup(&path)
        }
    };

    match result {
        Ok(code) => std::process::exit(code),
        Err(e) => fail(&e),
    }
}

/// Loads the configuration and sends tracing to its migration log as well.
fn start_migration_log(verbose: u8, flag: Option<PathBuf>) -> MigrationConfig {
    let config = match commands::load_config() {
        Ok(config) => config,
        Err(e) => {
            init_tracing(verbose, None);
            fail(&e);
        }
    };
    let path = commands::log_path(flag, &config);
    match MigrationLog::open(&path) {
        Ok(log) => init_tracing(verbose, Some(log)),
        Err(e) => {
            init_tracing(verbose, None);
            fail(&format!("cannot open log file {}: {e}", path.display()));
        }
    }
    config
}

fn block_on<F: Future>(future: F) -> F::Output {
    match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime.block_on(future),
        Err(e) => fail(&e),
    }
}

fn fail(e: &dyn std::fmt::Display) -> ! {
    tracing::error!("{e}");
    eprintln!("Error: {e}");
    std::process::exit(exit_code::FATAL);
}
