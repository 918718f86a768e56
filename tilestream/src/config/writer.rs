//! INI serialization logic for converting `ConfigFile` → INI string.

use super::file::ConfigFile;

/// Convert a `ConfigFile` to a commented INI string for saving.
pub(super) fn to_config_string(config: &ConfigFile) -> String {
    format!(
        r#"[cache]
; SQLite database holding cached responses
database = {}
; Rows kept after a prune; expired rows go first, then least recently used
max_items = {}
; Responses stored between automatic prunes (0 disables)
prune_interval = {}

[logging]
directory = {}
file = {}
"#,
        config.cache.database.display(),
        config.cache.max_items,
        config.cache.prune_interval,
        config.logging.directory.display(),
        config.logging.file,
    )
}
