//! Cache management CLI commands.

use std::io::Write;

use chrono::{SecondsFormat, Utc};
use clap::Subcommand;
use tilestream::cache::{DiskCache, DiskCacheConfig};
use tracing::info;

use crate::error::CliError;

/// Cache action subcommands.
#[derive(Debug, Subcommand)]
pub enum CacheAction {
    /// Show cache database statistics
    Stats,
    /// Evict expired and least recently used entries down to max_items
    Prune,
    /// Delete every cached entry
    Clear,
    /// Show the first cached entry stored under a key
    Lookup {
        /// Cache key, usually the request URL
        key: String,
    },
}

/// Run a cache subcommand.
pub fn run(action: CacheAction, config: &DiskCacheConfig, out: &mut dyn Write) -> Result<(), CliError> {
    if let Some(parent) = config.path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| CliError::CacheDirectory(parent.to_path_buf(), e))?;
    }
    let cache = DiskCache::from_config(config)?;

    match action {
        CacheAction::Stats => {
            writeln!(out, "Disk cache: {}", config.path.display())?;
            writeln!(out, "  Entries:   {}", cache.entry_count()?)?;
            writeln!(out, "  Max items: {}", cache.max_items())?;
        }
        CacheAction::Prune => {
            let result = cache.prune()?;
            info!(removed = result.total_removed(), "Cache pruned from CLI");
            writeln!(
                out,
                "Removed {} expired and {} least recently used entries ({} remain)",
                result.expired_removed,
                result.lru_removed,
                cache.entry_count()?
            )?;
        }
        CacheAction::Clear => {
            writeln!(out, "Clearing disk cache at: {}", config.path.display())?;
            let removed = cache.clear_all()?;
            writeln!(out, "Deleted {} entries", removed)?;
        }
        CacheAction::Lookup { key } => {
            let item = cache
                .get_entry(&key, |_| true)?
                .ok_or_else(|| CliError::NotFound(key.clone()))?;
            let now = Utc::now();

            writeln!(out, "Key:           {}", key)?;
            writeln!(out, "Request:       {} {}", item.request.method, item.request.url)?;
            writeln!(out, "Status:        {}", item.response.status_code)?;
            writeln!(out, "Content-Type:  {}", item.response.content_type)?;
            writeln!(out, "Size:          {} bytes", item.response.data.len())?;
            writeln!(
                out,
                "Expires:       {}{}",
                item.expiry_time.to_rfc3339_opts(SecondsFormat::Secs, true),
                if item.is_fresh_at(now) { "" } else { " (expired)" }
            )?;
            writeln!(
                out,
                "Last accessed: {}",
                item.last_accessed_time.to_rfc3339_opts(SecondsFormat::Secs, true)
            )?;
            if let Some(cache_control) = &item.response.cache_control {
                writeln!(out, "Cache-Control: {}", cache_control.to_persisted_string())?;
            }
            for (name, value) in &item.response.headers {
                writeln!(out, "  {}: {}", name, value)?;
            }
        }
    }
    Ok(())
}
