//! coopsched: cooperative single-threaded task scheduler.
//!
//! Built for hosts with one thread of control, such as a microcontroller main
//! loop. The application registers a main task, then calls
//! [`CooperativeScheduler::execute_next`] repeatedly:
//!
//! - **Tasks** are one-shot or cyclic boxed closures with an overrun timeout
//! - **Callbacks** receive a [`TaskContext`] and may add or abort tasks,
//!   themselves included
//! - **Reclamation** is deferred: disabled tasks are queued in a ledger and
//!   freed by a built-in garbage collection task
//! - **Bulk control** suspends and resumes the whole task set
//!
//! Nothing here is thread-safe or preemptive; callbacks are expected to
//! return promptly.

pub mod clock;
pub mod config;
pub mod error;
pub mod scheduler;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{
    DEFAULT_GC_INTERVAL, DEFAULT_IDLE_SLEEP, DEFAULT_MAX_TASKS, DEFAULT_TIMEOUT, SchedulerConfig,
};
pub use error::{Result, SchedulerError};
pub use scheduler::{
    CooperativeScheduler, ExecutionResult, TaskContext, TaskId, TaskKind, TaskRegistry,
    TaskState,
};
