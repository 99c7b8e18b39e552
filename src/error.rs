//! Error types for the cooperative scheduler.

/// Top-level error type for scheduler registration, host loop and config.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    /// The task table already holds the configured number of application tasks.
    #[error("task table full ({capacity} application tasks)")]
    TableFull {
        /// Configured application task capacity.
        capacity: usize,
    },

    /// Every non-zero task id is currently held by a resident task.
    #[error("task id space exhausted")]
    IdsExhausted,

    /// The scheduler was torn down or never initialized.
    #[error("scheduler not initialized")]
    NotInitialized,

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, SchedulerError>;
