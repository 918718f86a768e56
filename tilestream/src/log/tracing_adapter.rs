use std::fmt::Arguments;

use tracing::{debug, error, info, warn};

use super::{LogLevel, Logger};

/// Forwards collaborator messages to `tracing`, tagged with the component
/// that owns the logger.
#[derive(Debug, Clone, Copy)]
pub struct TracingLogger {
    component: &'static str,
}

impl TracingLogger {
    pub fn new(component: &'static str) -> Self {
        Self { component }
    }

    pub fn component(&self) -> &'static str {
        self.component
    }
}

impl Default for TracingLogger {
    fn default() -> Self {
        Self::new("tilestream")
    }
}

impl Logger for TracingLogger {
    fn log(&self, level: LogLevel, args: Arguments<'_>) {
        let component = self.component;
        match level {
            LogLevel::Debug => debug!(component, "{}", args),
            LogLevel::Info => info!(component, "{}", args),
            LogLevel::Warn => warn!(component, "{}", args),
            LogLevel::Error => error!(component, "{}", args),
        }
    }
}
