use overflow::OverflowError;
use tracing::error;

/// Receives I/O failures that runtime operations cannot return.
///
/// Appends and lookups are called from acquisition and render loops that
/// have nowhere to send an error, so they report here and carry on with a
/// degraded answer.
pub trait FaultReporter: Send + Sync {
    fn critical_fault(&self, message: &str, error: &OverflowError);
}

/// Default reporter: logs the fault at error level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl FaultReporter for LogReporter {
    fn critical_fault(&self, message: &str, err: &OverflowError) {
        error!(error = %err, "{message}");
    }
}
