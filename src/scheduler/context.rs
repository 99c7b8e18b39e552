//! Registration surface shared by the scheduler and running callbacks.
//!
//! Callbacks receive a [`TaskContext`] instead of the scheduler itself. The
//! context borrows the scheduler core for the duration of one invocation, so
//! a callback can add tasks, abort others, or abort itself while the
//! dispatcher keeps ownership of the callback it is executing.

use crate::error::Result;
use crate::scheduler::runner::SchedulerCore;
use crate::scheduler::tasks::{TaskCallback, TaskId, TaskKind};
use std::time::Duration;
use tracing::warn;

/// Task registration and cancellation operations.
///
/// Implemented by [`CooperativeScheduler`](crate::CooperativeScheduler) for
/// the host and by [`TaskContext`] for code running inside a callback, so
/// collaborators can be written once against either.
pub trait TaskRegistry {
    /// Register a task, reporting why registration failed.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::TableFull`](crate::SchedulerError::TableFull)
    /// or [`SchedulerError::IdsExhausted`](crate::SchedulerError::IdsExhausted)
    /// when no slot is free, and
    /// [`SchedulerError::NotInitialized`](crate::SchedulerError::NotInitialized)
    /// after teardown.
    fn try_add_task(
        &mut self,
        kind: TaskKind,
        period: Duration,
        timeout: Duration,
        callback: TaskCallback,
    ) -> Result<TaskId>;

    /// Timeout applied by the registration helpers without an explicit one.
    fn default_timeout(&self) -> Duration;

    /// Abort a task. Returns `false` if it is unknown, already disabled, or built in.
    fn abort_task(&mut self, id: TaskId) -> bool;

    /// Suspend every enabled task, built-ins included, without reclaiming any.
    fn abort_all_tasks(&mut self);

    /// Re-enable only the main task and the garbage collector.
    fn restart_main_task(&mut self);

    /// Re-enable every task suspended by [`abort_all_tasks`](Self::abort_all_tasks).
    fn restart_all_tasks(&mut self);

    /// Returns `true` if `id` is resident and not disabled.
    fn is_active(&self, id: TaskId) -> bool;

    /// Register a task, returning [`TaskId::INVALID`] on failure.
    fn add_task(
        &mut self,
        kind: TaskKind,
        period: Duration,
        timeout: Duration,
        callback: TaskCallback,
    ) -> TaskId {
        match self.try_add_task(kind, period, timeout, callback) {
            Ok(id) => id,
            Err(e) => {
                warn!("cannot register {kind} task: {e}");
                TaskId::INVALID
            }
        }
    }

    /// Run `callback` once after `delay`, with the default timeout.
    fn add_one_shot_task<F>(&mut self, delay: Duration, callback: F) -> TaskId
    where
        F: FnMut(&mut TaskContext<'_>) + 'static,
        Self: Sized,
    {
        let timeout = self.default_timeout();
        self.add_task(TaskKind::OneShot, delay, timeout, Box::new(callback))
    }

    /// Run `callback` once after `delay`, disabling it if it overruns `timeout`.
    fn add_one_shot_task_with_timeout<F>(
        &mut self,
        delay: Duration,
        timeout: Duration,
        callback: F,
    ) -> TaskId
    where
        F: FnMut(&mut TaskContext<'_>) + 'static,
        Self: Sized,
    {
        self.add_task(TaskKind::OneShot, delay, timeout, Box::new(callback))
    }

    /// Run `callback` every `period`, with the default timeout.
    fn add_cyclic_task<F>(&mut self, period: Duration, callback: F) -> TaskId
    where
        F: FnMut(&mut TaskContext<'_>) + 'static,
        Self: Sized,
    {
        let timeout = self.default_timeout();
        self.add_task(TaskKind::Cyclic, period, timeout, Box::new(callback))
    }

    /// Run `callback` every `period`, disabling it if an invocation overruns `timeout`.
    fn add_cyclic_task_with_timeout<F>(
        &mut self,
        period: Duration,
        timeout: Duration,
        callback: F,
    ) -> TaskId
    where
        F: FnMut(&mut TaskContext<'_>) + 'static,
        Self: Sized,
    {
        self.add_task(TaskKind::Cyclic, period, timeout, Box::new(callback))
    }
}

/// Handle given to a callback while it runs.
pub struct TaskContext<'a> {
    pub(crate) core: &'a mut SchedulerCore,
    pub(crate) current: TaskId,
}

impl<'a> TaskContext<'a> {
    pub(crate) fn new(core: &'a mut SchedulerCore, current: TaskId) -> Self {
        Self { core, current }
    }

    /// Id of the task whose callback is running.
    pub fn current_task_id(&self) -> TaskId {
        self.current
    }

    /// Scheduler time at the start of the current pass.
    pub fn now(&self) -> Duration {
        self.core.now
    }

    /// Abort the running task. Its callback is still allowed to return normally.
    pub fn abort_current(&mut self) -> bool {
        let id = self.current;
        self.core.abort_task(id)
    }
}

impl TaskRegistry for TaskContext<'_> {
    fn try_add_task(
        &mut self,
        kind: TaskKind,
        period: Duration,
        timeout: Duration,
        callback: TaskCallback,
    ) -> Result<TaskId> {
        self.core.register(kind, period, timeout, callback)
    }

    fn default_timeout(&self) -> Duration {
        self.core.config.default_timeout()
    }

    fn abort_task(&mut self, id: TaskId) -> bool {
        self.core.abort_task(id)
    }

    fn abort_all_tasks(&mut self) {
        self.core.abort_all();
    }

    fn restart_main_task(&mut self) {
        self.core.restart_main();
    }

    fn restart_all_tasks(&mut self) {
        self.core.restart_all();
    }

    fn is_active(&self, id: TaskId) -> bool {
        self.core.is_active(id)
    }
}
