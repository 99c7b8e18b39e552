//! Cooperative task scheduler.
//!
//! Runs application callbacks from a single host loop. Tasks are one-shot or
//! cyclic; disabling a task only flips its state and records it in a ledger,
//! and a built-in garbage collection task frees the entries later so no task
//! is ever freed from inside its own callback.

pub mod context;
pub mod ledger;
pub mod runner;
pub(crate) mod table;
pub mod tasks;

pub use context::{TaskContext, TaskRegistry};
pub use runner::{
    CooperativeScheduler, ExecutionResult, GC_TASK_ID, MAIN_TASK_ID, SchedulerSnapshot,
    SchedulerStats,
};
pub use tasks::{DisableReason, TaskCallback, TaskId, TaskInfo, TaskKind, TaskState};
