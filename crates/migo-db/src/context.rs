use std::time::{Duration, Instant};

use tokio::sync::watch;

/// Cancellation for a migration run.
///
/// Checked only between migrations: a transaction that has begun always runs
/// to commit or rollback before the run stops.
#[derive(Debug, Clone, Default)]
pub struct RunContext {
    deadline: Option<Instant>,
    shutdown: Option<watch::Receiver<bool>>,
}

impl RunContext {
    /// A context that never cancels.
    pub fn background() -> Self {
        Self::default()
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// A timeout too large to represent as an `Instant` sets no deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Instant::now().checked_add(timeout);
        self
    }

    /// Cancel once `true` is sent on the channel (or its sender is dropped
    /// after sending it).
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Why the run should stop, if it should.
    pub fn cancellation(&self) -> Option<&'static str> {
        if let Some(rx) = &self.shutdown
            && *rx.borrow()
        {
            return Some("shutdown requested");
        }
        if let Some(deadline) = self.deadline
            && Instant::now() >= deadline
        {
            return Some("deadline exceeded");
        }
        None
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation().is_some()
    }
}
