//! No-op logger implementation

use super::traits::Logger;

/// A logger that discards all messages
///
/// Useful for tests and for embedding contexts that supply their own
/// logging elsewhere.
#[derive(Debug, Clone, Default)]
pub struct NoOpLogger;

impl NoOpLogger {
    /// Create a new no-op logger
    pub fn new() -> Self {
        Self
    }
}

impl Logger for NoOpLogger {
    fn debug(&self, _message: &str) {}
    fn info(&self, _message: &str) {}
    fn warn(&self, _message: &str) {}
    fn error(&self, _message: &str) {}
}
