//! Logging collaborator handed to the client at construction.

/// Sink for the client's diagnostic messages.
pub trait Logger: Send + Sync {
    fn debug(&self, message: &str);
    fn warning(&self, message: &str);
    fn error(&self, message: &str);
}

/// Forwards to the `log` facade under the `kasa` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogLogger;

impl Logger for LogLogger {
    fn debug(&self, message: &str) {
        log::debug!(target: "kasa", "{}", message);
    }

    fn warning(&self, message: &str) {
        log::warn!(target: "kasa", "{}", message);
    }

    fn error(&self, message: &str) {
        log::error!(target: "kasa", "{}", message);
    }
}
