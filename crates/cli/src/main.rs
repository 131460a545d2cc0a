//! I Saw That CLI - isawthat command

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::debug;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod cmd;
mod settings;
mod util;

use cmd::WatcherArgs;
use settings::LogSettings;

/// I Saw That - debounced snapshots of a directory tree
#[derive(Parser)]
#[command(name = "isawthat")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Settings file (default: <config dir>/isawthat/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch a directory and snapshot it after each burst of changes
    Watch(WatcherArgs),
    /// Validate a watcher configuration without starting it (creates missing directories)
    Check(WatcherArgs),
    /// List recorded backups
    History {
        /// Destination directory of the watcher
        destination: PathBuf,
        /// Number of backups to show (newest first)
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Compare a source directory with its latest backup
    Verify {
        /// Directory being watched
        source: PathBuf,
        /// Destination directory of the watcher
        destination: PathBuf,
    },
    /// Show settings
    Config {
        /// Print only the settings file location
        #[arg(long, conflicts_with = "example")]
        path: bool,
        /// Print an example settings file
        #[arg(long)]
        example: bool,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let settings = settings::load(cli.config.as_deref())?;
    let _log_guard = init_logging(&settings.log, cli.verbose)?;
    debug!("Effective settings: {:?}", settings);

    let ok = match &cli.command {
        Commands::Watch(args) => cmd::watch::run(args, &settings).await.map(|()| true)?,
        Commands::Check(args) => cmd::check::run(args, &settings)?,
        Commands::History { destination, limit } => {
            cmd::history::run(destination, *limit).map(|()| true)?
        }
        Commands::Verify { source, destination } => cmd::verify::run(source, destination).await?,
        Commands::Config { path, example } => {
            cmd::config::run(&settings, cli.config.as_deref(), *path, *example).map(|()| true)?
        }
    };

    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

/// Install the tracing subscriber
///
/// Filter precedence: `RUST_LOG`, then `--verbose`, then the settings level.
/// The returned guard flushes the log file on drop.
fn init_logging(log: &LogSettings, verbose: bool) -> Result<Option<WorkerGuard>> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => {
            let level = if verbose { "debug" } else { log.level.as_str() };
            EnvFilter::try_new(level).with_context(|| format!("Invalid log level '{}'", level))?
        }
    };

    let mut guard = None;
    let file_layer = match &log.file {
        Some(path) => {
            let (dir, file_name) = split_log_path(path)?;
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
            let appender = tracing_appender::rolling::never(dir, file_name);
            let (writer, worker_guard) = tracing_appender::non_blocking(appender);
            guard = Some(worker_guard);
            Some(fmt::layer().with_writer(writer).with_ansi(false))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    Ok(guard)
}

fn split_log_path(path: &Path) -> Result<(PathBuf, PathBuf)> {
    let file_name = path
        .file_name()
        .with_context(|| format!("Log file path has no file name: {}", path.display()))?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    Ok((dir, PathBuf::from(file_name)))
}
