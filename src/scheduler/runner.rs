//! Cooperative execution loop.
//!
//! [`CooperativeScheduler`] owns the task table, the disabled-task ledger and
//! the clock. Each call to [`CooperativeScheduler::execute_next`] samples the
//! clock once and runs every task that is due, oldest due time first.
//! Nothing is removed from the table while a callback runs; disabled tasks
//! are reclaimed by the built-in garbage collection task on its next sweep.

use crate::clock::{Clock, SystemClock};
use crate::config::{SchedulerConfig, duration_to_millis};
use crate::error::{Result, SchedulerError};
use crate::scheduler::context::{TaskContext, TaskRegistry};
use crate::scheduler::ledger::DisabledLedger;
use crate::scheduler::table::TaskTable;
use crate::scheduler::tasks::{
    DisableReason, TaskCallback, TaskId, TaskInfo, TaskKind, TaskState,
};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Fixed id of the main application task.
pub const MAIN_TASK_ID: TaskId = TaskId::new(1);

/// Fixed id of the garbage collection task.
pub const GC_TASK_ID: TaskId = TaskId::new(2);

/// Result of a single scheduler execution cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionResult {
    /// At least one task was executed.
    Ok,
    /// No task was due.
    Idle,
    /// The scheduler has been torn down; nothing can run any more.
    ErrInit,
}

/// Running counters kept by the scheduler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SchedulerStats {
    /// Calls to `execute_next` that reached dispatch.
    pub passes: u64,
    /// Passes in which no task was due.
    pub idle_passes: u64,
    /// Callback invocations.
    pub task_runs: u64,
    /// Invocations that ran longer than their task's timeout.
    pub overruns: u64,
    /// Garbage collection sweeps, forced ones included.
    pub sweeps: u64,
    /// Tasks removed from the table by sweeps.
    pub reclaimed: u64,
    /// Registrations that returned an error.
    pub failed_registrations: u64,
}

/// Serializable view of the whole scheduler.
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerSnapshot {
    /// Scheduler clock in milliseconds.
    pub now_ms: u64,
    /// Resident tasks in registration order.
    pub tasks: Vec<TaskInfo>,
    /// Disabled tasks waiting for the next sweep.
    pub pending_reclaim: Vec<TaskId>,
    /// Running counters.
    pub stats: SchedulerStats,
}

/// State reachable from callbacks through [`TaskContext`].
pub(crate) struct SchedulerCore {
    pub(crate) table: TaskTable,
    pub(crate) ledger: DisabledLedger,
    pub(crate) config: SchedulerConfig,
    /// Clock value for the pass in progress, or of the last host call.
    pub(crate) now: Duration,
    pub(crate) stats: SchedulerStats,
    pub(crate) initialized: bool,
}

impl SchedulerCore {
    pub(crate) fn register(
        &mut self,
        kind: TaskKind,
        period: Duration,
        timeout: Duration,
        callback: TaskCallback,
    ) -> Result<TaskId> {
        let result = if self.initialized {
            self.table.insert(kind, period, timeout, callback, self.now)
        } else {
            Err(SchedulerError::NotInitialized)
        };
        match &result {
            Ok(id) => {
                debug!("registered {kind} task {id} (period {period:?}, timeout {timeout:?})");
            }
            Err(_) => self.stats.failed_registrations += 1,
        }
        result
    }

    pub(crate) fn is_builtin(id: TaskId) -> bool {
        id == MAIN_TASK_ID || id == GC_TASK_ID
    }

    pub(crate) fn is_active(&self, id: TaskId) -> bool {
        self.table
            .get(id)
            .is_some_and(|task| !matches!(task.state(), TaskState::Disabled(_)))
    }

    /// Disable a task and queue it for reclamation on its first transition.
    fn disable(&mut self, id: TaskId, reason: DisableReason) -> bool {
        let Some(task) = self.table.get_mut(id) else {
            return false;
        };
        if !task.disable(reason) {
            return false;
        }
        debug!("task {id} disabled ({reason:?})");
        self.ledger.record(id);
        true
    }

    pub(crate) fn abort_task(&mut self, id: TaskId) -> bool {
        if Self::is_builtin(id) {
            return false;
        }
        self.disable(id, DisableReason::Aborted)
    }

    pub(crate) fn abort_all(&mut self) {
        let mut suspended = 0;
        for task in self.table.iter_mut() {
            if task.suspend() {
                suspended += 1;
            }
        }
        info!("suspended {suspended} tasks");
    }

    pub(crate) fn restart_main(&mut self) {
        let now = self.now;
        for id in [MAIN_TASK_ID, GC_TASK_ID] {
            if let Some(task) = self.table.get_mut(id) {
                task.resume(now);
            }
        }
        info!("main task and garbage collection restarted");
    }

    pub(crate) fn restart_all(&mut self) {
        let now = self.now;
        let mut resumed = 0;
        for task in self.table.iter_mut() {
            if task.resume(now) {
                resumed += 1;
            }
        }
        info!("resumed {resumed} tasks");
    }

    /// Remove every task recorded in the ledger since the previous sweep.
    pub(crate) fn sweep(&mut self) -> usize {
        let pending = self.ledger.drain();
        let mut reclaimed = 0;
        for id in pending {
            if Self::is_builtin(id) {
                continue;
            }
            if self.table.remove(id).is_some() {
                reclaimed += 1;
            }
        }
        self.stats.sweeps += 1;
        self.stats.reclaimed += reclaimed as u64;
        if reclaimed > 0 {
            debug!("garbage collection reclaimed {reclaimed} tasks");
        }
        reclaimed
    }

    /// Put a callback back and apply completion and overrun rules.
    fn finish_run(&mut self, id: TaskId, callback: TaskCallback, elapsed: Duration) {
        let Some(task) = self.table.get_mut(id) else {
            return;
        };
        task.end_run(callback);
        let kind = task.kind();
        let timeout = task.timeout;
        if task.overran(elapsed) {
            self.stats.overruns += 1;
            warn!("task {id} overran its timeout ({elapsed:?} > {timeout:?}), disabling it");
            self.disable(id, DisableReason::TimedOut);
        }
        if kind == TaskKind::OneShot {
            self.disable(id, DisableReason::Completed);
        }
    }
}

/// Single-threaded cooperative task scheduler.
///
/// Construction registers the main task and the garbage collection task.
/// Both stay resident for the scheduler's lifetime and are only ever
/// suspended and resumed. Dropping the scheduler suspends everything and
/// reclaims every task.
pub struct CooperativeScheduler {
    core: SchedulerCore,
    clock: Box<dyn Clock>,
}

impl CooperativeScheduler {
    /// Create a scheduler on the system clock with the default configuration.
    pub fn new<F>(main: F, main_period: Duration) -> Self
    where
        F: FnMut(&mut TaskContext<'_>) + 'static,
    {
        Self::build(
            SchedulerConfig::default(),
            Box::new(SystemClock::new()),
            Box::new(main),
            main_period,
        )
    }

    /// Create a scheduler with an explicit configuration and clock.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::Config`] if the configuration is invalid.
    pub fn with_config<C, F>(
        config: SchedulerConfig,
        clock: C,
        main: F,
        main_period: Duration,
    ) -> Result<Self>
    where
        C: Clock + 'static,
        F: FnMut(&mut TaskContext<'_>) + 'static,
    {
        config.validate()?;
        Ok(Self::build(config, Box::new(clock), Box::new(main), main_period))
    }

    fn build(
        config: SchedulerConfig,
        clock: Box<dyn Clock>,
        main: TaskCallback,
        main_period: Duration,
    ) -> Self {
        let now = clock.now();
        let gc_interval = config.gc_interval();
        let mut table = TaskTable::new(config.max_tasks);
        table.insert_builtin(MAIN_TASK_ID, main_period, main, now);
        table.insert_builtin(
            GC_TASK_ID,
            gc_interval,
            Box::new(|ctx: &mut TaskContext<'_>| {
                ctx.core.sweep();
            }),
            now,
        );
        info!(
            "scheduler started: main every {main_period:?}, gc every {gc_interval:?}, capacity {}",
            config.max_tasks
        );
        Self {
            core: SchedulerCore {
                table,
                ledger: DisabledLedger::new(),
                config,
                now,
                stats: SchedulerStats::default(),
                initialized: true,
            },
            clock,
        }
    }

    /// Run every task that is due at the current clock time.
    pub fn execute_next(&mut self) -> ExecutionResult {
        if !self.core.initialized {
            return ExecutionResult::ErrInit;
        }
        let now = self.clock.now();
        self.core.now = now;
        self.core.stats.passes += 1;

        // Tasks registered from here on wait for the next pass, even when a
        // reclaimed id is handed out again.
        let pass_seq = self.core.table.next_seq();
        let mut ran = 0_u64;
        for id in self.core.table.due_tasks(now) {
            // An earlier callback in this pass may have aborted or suspended it.
            let Some(task) = self.core.table.get_mut(id) else {
                continue;
            };
            if task.seq >= pass_seq || !task.is_due(now) {
                continue;
            }
            let kind = task.kind();
            let Some(mut callback) = task.begin_run() else {
                continue;
            };

            debug!("running {kind} task {id}");
            let started = self.clock.now();
            callback(&mut TaskContext::new(&mut self.core, id));
            let elapsed = self.clock.now().saturating_sub(started);

            ran += 1;
            self.core.finish_run(id, callback, elapsed);
        }

        self.core.stats.task_runs += ran;
        if ran == 0 {
            self.core.stats.idle_passes += 1;
            ExecutionResult::Idle
        } else {
            ExecutionResult::Ok
        }
    }

    /// Drive [`execute_next`](Self::execute_next) until `done` returns `true`.
    ///
    /// After a pass in which nothing was due the host sleeps for the
    /// configured idle sleep. Returns the number of passes executed.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::NotInitialized`] once the scheduler has
    /// been shut down.
    pub fn run_until<P>(&mut self, mut done: P) -> Result<u64>
    where
        P: FnMut(&Self) -> bool,
    {
        let idle_sleep = self.core.config.idle_sleep();
        let mut passes = 0_u64;
        while !done(&*self) {
            match self.execute_next() {
                ExecutionResult::Ok => {}
                ExecutionResult::Idle => self.clock.sleep(idle_sleep),
                ExecutionResult::ErrInit => return Err(SchedulerError::NotInitialized),
            }
            passes += 1;
        }
        Ok(passes)
    }

    /// Sweep the ledger now instead of waiting for the garbage collection task.
    ///
    /// Returns the number of reclaimed tasks.
    pub fn collect_garbage(&mut self) -> usize {
        if !self.core.initialized {
            return 0;
        }
        self.core.sweep()
    }

    /// Suspend everything, reclaim every task and stop the scheduler.
    ///
    /// Subsequent [`execute_next`](Self::execute_next) calls return
    /// [`ExecutionResult::ErrInit`]. Calling this twice is a no-op.
    pub fn shutdown(&mut self) {
        if !self.core.initialized {
            return;
        }
        self.core.now = self.clock.now();
        self.core.abort_all();
        let swept = self.core.sweep();
        let remaining = self.core.table.len();
        self.core.table.clear();
        self.core.initialized = false;
        info!("scheduler shut down: {swept} disabled and {remaining} remaining tasks released");
    }

    /// Current scheduler clock time.
    pub fn now(&self) -> Duration {
        self.clock.now()
    }

    /// Returns `false` once the scheduler has been shut down.
    pub fn is_initialized(&self) -> bool {
        self.core.initialized
    }

    /// Id of the main application task.
    pub fn main_task_id(&self) -> TaskId {
        MAIN_TASK_ID
    }

    /// Id of the garbage collection task.
    pub fn gc_task_id(&self) -> TaskId {
        GC_TASK_ID
    }

    /// Scheduling state of a resident task.
    pub fn task_state(&self, id: TaskId) -> Option<TaskState> {
        self.core.table.get(id).map(|task| task.state())
    }

    /// Number of resident tasks, built-ins and disabled ones included.
    pub fn task_count(&self) -> usize {
        self.core.table.len()
    }

    /// Number of disabled tasks waiting for the next sweep.
    pub fn pending_reclaim(&self) -> usize {
        self.core.ledger.len()
    }

    /// Configuration the scheduler runs with.
    pub fn config(&self) -> &SchedulerConfig {
        &self.core.config
    }

    /// Running counters.
    pub fn stats(&self) -> SchedulerStats {
        self.core.stats
    }

    /// Serializable view of every resident task.
    pub fn snapshot(&self) -> SchedulerSnapshot {
        let mut pending_reclaim = Vec::new();
        let tasks = self
            .core
            .table
            .ordered()
            .into_iter()
            .map(|task| {
                if self.core.ledger.contains(task.id()) {
                    pending_reclaim.push(task.id());
                }
                task.info()
            })
            .collect();
        SchedulerSnapshot {
            now_ms: duration_to_millis(self.clock.now()),
            tasks,
            pending_reclaim,
            stats: self.core.stats,
        }
    }

    fn sync_now(&mut self) {
        self.core.now = self.clock.now();
    }
}

impl TaskRegistry for CooperativeScheduler {
    fn try_add_task(
        &mut self,
        kind: TaskKind,
        period: Duration,
        timeout: Duration,
        callback: TaskCallback,
    ) -> Result<TaskId> {
        self.sync_now();
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
        self.sync_now();
        self.core.restart_main();
    }

    fn restart_all_tasks(&mut self) {
        self.sync_now();
        self.core.restart_all();
    }

    fn is_active(&self, id: TaskId) -> bool {
        self.core.is_active(id)
    }
}

impl Drop for CooperativeScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for CooperativeScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CooperativeScheduler")
            .field("now", &self.core.now)
            .field("tasks", &self.core.table.len())
            .field("pending_reclaim", &self.core.ledger.len())
            .field("initialized", &self.core.initialized)
            .finish()
    }
}
