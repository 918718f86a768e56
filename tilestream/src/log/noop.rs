use std::fmt::Arguments;

use super::{LogLevel, Logger};

/// Drops every message. Used by tests and headless tools.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpLogger;

impl Logger for NoOpLogger {
    fn log(&self, _: LogLevel, _: Arguments<'_>) {}
}
