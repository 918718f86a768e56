//! Logger sink handed to collaborators.
//!
//! Overlay factories, tile providers and the caching accessor receive an
//! `Arc<dyn Logger>` through [`TilesetExternals`](crate::externals::TilesetExternals)
//! instead of reaching for a global subscriber. Production code wires in
//! [`TracingLogger`]; tests use [`NoOpLogger`] or a recording double.
//!
//! ```
//! use std::sync::Arc;
//! use tilestream::log::{Logger, NoOpLogger};
//! use tilestream::log_warn;
//!
//! let logger: Arc<dyn Logger> = Arc::new(NoOpLogger);
//! log_warn!(logger, "provider for {} is still a placeholder", "imagery");
//! ```

mod noop;
mod sink;
mod tracing_adapter;

pub use noop::NoOpLogger;
pub use sink::{LogLevel, Logger};
pub use tracing_adapter::TracingLogger;
