//! CLI error handling with user-friendly messages.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::process;

use tilestream::cache::DiskCacheError;
use tilestream::config::ConfigFileError;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(io::Error),
    /// Configuration file could not be read or written
    Config(ConfigFileError),
    /// Cache database directory could not be created
    CacheDirectory(PathBuf, io::Error),
    /// Cache database operation failed
    Cache(DiskCacheError),
    /// No cached entry for the requested key
    NotFound(String),
    /// Failed to write command output
    Output(io::Error),
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        if let CliError::Cache(DiskCacheError::Open { .. }) = self {
            eprintln!();
            eprintln!("Check the [cache] database setting with: tilestream config list");
        }

        let code = match self {
            CliError::NotFound(_) => 2,
            _ => 1,
        };
        process::exit(code)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(e) => write!(f, "Failed to initialize logging: {}", e),
            CliError::Config(e) => write!(f, "Configuration error: {}", e),
            CliError::CacheDirectory(path, e) => {
                write!(f, "Failed to create cache directory {}: {}", path.display(), e)
            }
            CliError::Cache(e) => write!(f, "Cache error: {}", e),
            CliError::NotFound(key) => write!(f, "No cached entry for '{}'", key),
            CliError::Output(e) => write!(f, "Failed to write output: {}", e),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::LoggingInit(e) => Some(e),
            CliError::Config(e) => Some(e),
            CliError::CacheDirectory(_, e) => Some(e),
            CliError::Cache(e) => Some(e),
            CliError::Output(e) => Some(e),
            CliError::NotFound(_) => None,
        }
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::Config(e)
    }
}

impl From<DiskCacheError> for CliError {
    fn from(e: DiskCacheError) -> Self {
        CliError::Cache(e)
    }
}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        CliError::Output(e)
    }
}
