//! Configuration file handling for ~/.tilestream/config.ini.
//!
//! Parsing lives in [`super::parser`], serialization in [`super::writer`].

use std::path::{Path, PathBuf};

use ini::Ini;
use thiserror::Error;

use crate::cache::{DiskCacheConfig, DEFAULT_MAX_ITEMS, DEFAULT_PRUNE_INTERVAL};
use crate::logging::{DEFAULT_LOG_DIR, DEFAULT_LOG_FILE};

pub const CONFIG_FILE_NAME: &str = "config.ini";

/// Cache database file name inside the config directory.
pub const DEFAULT_CACHE_DATABASE: &str = "cache.sqlite";

/// Errors loading or saving `config.ini`.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    #[error("Cannot parse config.ini: {0}")]
    Parse(#[from] ini::Error),

    #[error("Cannot write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A setting is present but unusable.
    #[error("Invalid [{section}] {key} = '{value}': {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },
}

/// `[cache]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSettings {
    pub database: PathBuf,
    pub max_items: u64,
    pub prune_interval: u32,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            database: config_directory().join(DEFAULT_CACHE_DATABASE),
            max_items: DEFAULT_MAX_ITEMS,
            prune_interval: DEFAULT_PRUNE_INTERVAL,
        }
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    pub directory: PathBuf,
    pub file: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            directory: config_directory().join(DEFAULT_LOG_DIR),
            file: DEFAULT_LOG_FILE.to_string(),
        }
    }
}

/// Parsed configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigFile {
    pub cache: CacheSettings,
    pub logging: LoggingSettings,
}

impl ConfigFile {
    /// Load configuration from the default path (~/.tilestream/config.ini).
    pub fn load() -> Result<Self, ConfigFileError> {
        Self::load_from(&config_file_path())
    }

    /// A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigFileError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let ini = Ini::load_from_file(path)?;
        super::parser::parse_ini(&ini)
    }

    /// Save configuration to the default path (~/.tilestream/config.ini).
    pub fn save(&self) -> Result<(), ConfigFileError> {
        self.save_to(&config_file_path())
    }

    /// Creates the parent directory when needed.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigFileError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigFileError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let content = super::writer::to_config_string(self);
        std::fs::write(path, content).map_err(|source| ConfigFileError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Disk cache settings for [`DiskCache::from_config`](crate::cache::DiskCache::from_config).
    pub fn disk_cache_config(&self) -> DiskCacheConfig {
        DiskCacheConfig::new(&self.cache.database)
            .with_max_items(self.cache.max_items)
            .with_prune_interval(self.cache.prune_interval)
    }

    /// Every setting as `section.key` / value pairs, in file order.
    pub fn entries(&self) -> Vec<(String, String)> {
        vec![
            ("cache.database".to_string(), self.cache.database.display().to_string()),
            ("cache.max_items".to_string(), self.cache.max_items.to_string()),
            ("cache.prune_interval".to_string(), self.cache.prune_interval.to_string()),
            ("logging.directory".to_string(), self.logging.directory.display().to_string()),
            ("logging.file".to_string(), self.logging.file.clone()),
        ]
    }
}

/// `~/.tilestream`, or `./.tilestream` without a home directory.
pub fn config_directory() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".tilestream")
}

/// `config.ini` inside [`config_directory`].
pub fn config_file_path() -> PathBuf {
    config_directory().join(CONFIG_FILE_NAME)
}
