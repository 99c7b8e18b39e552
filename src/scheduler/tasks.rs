//! Task definitions.
//!
//! Defines the [`Task`] entry stored in the task table, its [`TaskId`]
//! handle, the [`TaskKind`] cadence and the [`TaskState`] lifecycle.

use crate::scheduler::context::TaskContext;
use serde::Serialize;
use std::time::Duration;

/// Handle identifying a task while it is resident in the task table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct TaskId(u16);

impl TaskId {
    /// Sentinel returned when a task could not be registered.
    pub const INVALID: TaskId = TaskId(0);

    /// Wrap a raw id value.
    #[must_use]
    pub const fn new(raw: u16) -> Self {
        Self(raw)
    }

    /// Raw id value.
    #[must_use]
    pub const fn get(self) -> u16 {
        self.0
    }

    /// Returns `true` unless this is [`TaskId::INVALID`].
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::INVALID
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// How often a task fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// Fires once after its delay, then disables itself.
    OneShot,
    /// Fires every period until aborted.
    Cyclic,
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OneShot => write!(f, "one-shot"),
            Self::Cyclic => write!(f, "cyclic"),
        }
    }
}

/// Why a task left the schedulable set for good.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DisableReason {
    /// A one-shot task returned from its only invocation.
    Completed,
    /// The task was aborted by id.
    Aborted,
    /// An invocation ran longer than the task's timeout.
    TimedOut,
}

/// Scheduling state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum TaskState {
    /// Eligible to run when due.
    Enabled,
    /// Paused by a bulk abort; a bulk restart enables it again.
    Suspended,
    /// Done for good, waiting for the garbage collector.
    Disabled(DisableReason),
}

/// Callback invoked when a task is due.
///
/// The closure owns whatever state it captured; it lives exactly as long as
/// the task entry and is dropped when the garbage collector reclaims it.
pub type TaskCallback = Box<dyn FnMut(&mut TaskContext<'_>)>;

/// A schedulable unit of work, as stored in the task table.
pub struct Task {
    pub(crate) id: TaskId,
    pub(crate) kind: TaskKind,
    pub(crate) period: Duration,
    pub(crate) timeout: Duration,
    /// `None` while the callback is executing.
    pub(crate) callback: Option<TaskCallback>,
    pub(crate) state: TaskState,
    pub(crate) due: Duration,
    pub(crate) seq: u64,
    pub(crate) runs: u64,
}

impl Task {
    /// Build an enabled task whose first due time is `now + period`.
    pub(crate) fn new(
        id: TaskId,
        kind: TaskKind,
        period: Duration,
        timeout: Duration,
        callback: TaskCallback,
        now: Duration,
        seq: u64,
    ) -> Self {
        Self {
            id,
            kind,
            period,
            timeout,
            callback: Some(callback),
            state: TaskState::Enabled,
            due: now.saturating_add(period),
            seq,
            runs: 0,
        }
    }

    /// Task id.
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// One-shot or cyclic.
    pub fn kind(&self) -> TaskKind {
        self.kind
    }

    /// Current scheduling state.
    pub fn state(&self) -> TaskState {
        self.state
    }

    /// Returns `true` while the task is eligible to run.
    pub fn is_enabled(&self) -> bool {
        self.state == TaskState::Enabled
    }

    /// Returns `true` if the task is enabled and its due time has passed.
    pub fn is_due(&self, now: Duration) -> bool {
        self.is_enabled() && self.due <= now
    }

    /// Prepare an invocation: re-arm cyclic tasks and hand out the callback.
    ///
    /// Returns `None` when the callback is already out (re-entrant dispatch).
    pub(crate) fn begin_run(&mut self) -> Option<TaskCallback> {
        let callback = self.callback.take()?;
        if self.kind == TaskKind::Cyclic {
            self.due = self.due.saturating_add(self.period);
        }
        Some(callback)
    }

    /// Put the callback back after an invocation.
    pub(crate) fn end_run(&mut self, callback: TaskCallback) {
        self.callback = Some(callback);
        self.runs = self.runs.saturating_add(1);
    }

    /// Returns `true` if an invocation taking `elapsed` overran the timeout.
    pub(crate) fn overran(&self, elapsed: Duration) -> bool {
        !self.timeout.is_zero() && elapsed > self.timeout
    }

    /// Transition into `Disabled`. Returns `true` on the first transition only.
    pub(crate) fn disable(&mut self, reason: DisableReason) -> bool {
        if matches!(self.state, TaskState::Disabled(_)) {
            return false;
        }
        self.state = TaskState::Disabled(reason);
        true
    }

    /// Pause an enabled task. Returns `true` if the state changed.
    pub(crate) fn suspend(&mut self) -> bool {
        if self.state != TaskState::Enabled {
            return false;
        }
        self.state = TaskState::Suspended;
        true
    }

    /// Re-enable a suspended task with its phase reset to `now + period`.
    pub(crate) fn resume(&mut self, now: Duration) -> bool {
        if self.state != TaskState::Suspended {
            return false;
        }
        self.state = TaskState::Enabled;
        self.due = now.saturating_add(self.period);
        true
    }

    /// Diagnostic view of this task.
    pub fn info(&self) -> TaskInfo {
        TaskInfo {
            id: self.id,
            kind: self.kind,
            period_ms: crate::config::duration_to_millis(self.period),
            timeout_ms: crate::config::duration_to_millis(self.timeout),
            due_ms: crate::config::duration_to_millis(self.due),
            state: self.state,
            runs: self.runs,
        }
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("period", &self.period)
            .field("timeout", &self.timeout)
            .field("state", &self.state)
            .field("due", &self.due)
            .field("seq", &self.seq)
            .field("runs", &self.runs)
            .field("running", &self.callback.is_none())
            .finish()
    }
}

/// Serializable snapshot of one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskInfo {
    /// Task id.
    pub id: TaskId,
    /// One-shot or cyclic.
    pub kind: TaskKind,
    /// Period (cyclic) or initial delay (one-shot) in milliseconds.
    pub period_ms: u64,
    /// Overrun timeout in milliseconds, `0` for none.
    pub timeout_ms: u64,
    /// Next due time in milliseconds on the scheduler clock.
    pub due_ms: u64,
    /// Scheduling state.
    #[serde(flatten)]
    pub state: TaskState,
    /// Completed invocations.
    pub runs: u64,
}
