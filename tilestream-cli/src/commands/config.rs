//! Configuration CLI commands.

use std::io::Write;
use std::path::Path;

use clap::Subcommand;
use tilestream::config::ConfigFile;

use crate::error::CliError;

/// Config action subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Print the path of the configuration file
    Path,
    /// List every setting and its effective value
    List,
}

/// Run a config subcommand.
pub fn run(
    action: ConfigAction,
    config_path: &Path,
    config: &ConfigFile,
    out: &mut dyn Write,
) -> Result<(), CliError> {
    match action {
        ConfigAction::Path => {
            writeln!(out, "{}", config_path.display())?;
        }
        ConfigAction::List => {
            if !config_path.exists() {
                writeln!(out, "; {} not found, showing defaults", config_path.display())?;
            }
            for (key, value) in config.entries() {
                writeln!(out, "{} = {}", key, value)?;
            }
        }
    }
    Ok(())
}
