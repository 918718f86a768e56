//! CLI command implementations.
//!
//! - [`cache`] - Cache maintenance (stats, prune, clear, lookup)
//! - [`config`] - Configuration inspection (path, list)

pub mod cache;
pub mod config;
