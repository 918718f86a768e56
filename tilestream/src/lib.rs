//! Tilestream - raster overlays and response caching for streamed 3D tiles
//!
//! This library drapes raster overlays over a concurrently loading tile set
//! and keeps fetched responses in a persistent SQLite cache, with all network
//! and disk work kept off the coordinating thread.
//!
//! - [`overlay`]: overlays, tile providers, and the overlay collection
//! - [`tile`]: tile storage, the loaded-tile list, and overlay mappings
//! - [`cache`]: the disk cache and `Cache-Control` codec
//! - [`async_system`]: worker/coordinator task dispatch

pub mod async_system;
pub mod cache;
pub mod config;
pub mod externals;
pub mod geometry;
pub mod http;
pub mod log;
pub mod logging;
pub mod overlay;
pub mod tile;
