//! Tilestream CLI - inspect and maintain the response cache
//!
//! Reads `~/.tilestream/config.ini` (or `--config`) and runs one command.

mod commands;
mod error;

use std::io;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tilestream::config::{config_file_path, ConfigFile};
use tilestream::logging::init_logging;

use commands::cache::CacheAction;
use commands::config::ConfigAction;
use error::CliError;

#[derive(Parser)]
#[command(name = "tilestream")]
#[command(version, about = "Inspect and maintain the tilestream response cache", long_about = None)]
struct Cli {
    /// Configuration file (default: ~/.tilestream/config.ini)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Response cache maintenance
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
    /// Configuration inspection
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        e.exit();
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let config_path = cli.config.unwrap_or_else(config_file_path);
    let config = ConfigFile::load_from(&config_path)?;

    let _logging_guard = init_logging(&config.logging.directory, &config.logging.file)
        .map_err(CliError::LoggingInit)?;
    tracing::debug!(config = %config_path.display(), "Configuration loaded");

    let stdout = io::stdout();
    let mut out = stdout.lock();

    match cli.command {
        Commands::Cache { action } => {
            commands::cache::run(action, &config.disk_cache_config(), &mut out)
        }
        Commands::Config { action } => commands::config::run(action, &config_path, &config, &mut out),
    }
}
