//! User configuration stored in `~/.tilestream/config.ini`.

mod file;
mod parser;
mod writer;

pub use file::{
    config_directory, config_file_path, CacheSettings, ConfigFile, ConfigFileError,
    LoggingSettings, CONFIG_FILE_NAME, DEFAULT_CACHE_DATABASE,
};
