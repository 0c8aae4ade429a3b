use std::time::Duration;

/// Errors surfaced by a [Sluice](crate::Sluice) or a [Handle](crate::Handle)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SluiceError {
    /// Registration was attempted after the stop signal tripped. Callers
    /// should refuse to start new work.
    #[error("sluice: shutdown in progress")]
    ShuttingDown,

    /// Units were still live when the drain deadline expired. They keep
    /// running; only the wait was abandoned.
    #[error("sluice: shutdown timed out after {timeout:?} with {live} unit(s) still live")]
    TimedOut {
        /// How long the drain was allowed to take
        timeout: Duration,
        /// Units still registered when the deadline expired
        live: usize,
    },

    /// A [Handle](crate::Handle) was looked up from a scope it was never
    /// attached to. This is a wiring defect.
    #[error("sluice: no handle attached to the current scope")]
    Unattached,
}

impl SluiceError {
    /// True if this is [SluiceError::ShuttingDown]
    pub fn is_shutting_down(&self) -> bool {
        matches!(self, SluiceError::ShuttingDown)
    }

    /// True if this is [SluiceError::TimedOut]
    pub fn is_timed_out(&self) -> bool {
        matches!(self, SluiceError::TimedOut { .. })
    }
}
