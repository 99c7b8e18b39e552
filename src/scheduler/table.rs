//! Task table: owns every resident task and hands out ids.

use crate::error::{Result, SchedulerError};
use crate::scheduler::tasks::{Task, TaskCallback, TaskId, TaskKind};
use std::collections::HashMap;
use std::time::Duration;

/// Arena of resident tasks keyed by id.
#[derive(Debug)]
pub struct TaskTable {
    tasks: HashMap<TaskId, Task>,
    /// Application task capacity; built-ins are reserved on top.
    max_tasks: usize,
    /// Number of resident built-in tasks.
    reserved: usize,
    /// Last id handed out; allocation continues after it.
    cursor: u16,
    next_seq: u64,
}

impl TaskTable {
    /// Create an empty table holding up to `max_tasks` application tasks.
    pub fn new(max_tasks: usize) -> Self {
        Self {
            tasks: HashMap::new(),
            max_tasks,
            reserved: 0,
            cursor: 0,
            next_seq: 0,
        }
    }

    /// Insert an application task armed at `now + period`.
    pub fn insert(
        &mut self,
        kind: TaskKind,
        period: Duration,
        timeout: Duration,
        callback: TaskCallback,
        now: Duration,
    ) -> Result<TaskId> {
        if self.application_len() >= self.max_tasks {
            return Err(SchedulerError::TableFull {
                capacity: self.max_tasks,
            });
        }
        self.insert_unchecked(kind, period, timeout, callback, now)
    }

    /// Insert a built-in cyclic task under a fixed id.
    ///
    /// Built-ins do not count against the capacity and carry no timeout.
    pub(crate) fn insert_builtin(
        &mut self,
        id: TaskId,
        period: Duration,
        callback: TaskCallback,
        now: Duration,
    ) {
        let seq = self.next_seq;
        self.next_seq += 1;
        let task = Task::new(id, TaskKind::Cyclic, period, Duration::ZERO, callback, now, seq);
        if self.tasks.insert(id, task).is_none() {
            self.reserved += 1;
        }
        self.cursor = self.cursor.max(id.get());
    }

    fn insert_unchecked(
        &mut self,
        kind: TaskKind,
        period: Duration,
        timeout: Duration,
        callback: TaskCallback,
        now: Duration,
    ) -> Result<TaskId> {
        let id = self.allocate_id().ok_or(SchedulerError::IdsExhausted)?;
        let seq = self.next_seq;
        self.next_seq += 1;
        self.tasks
            .insert(id, Task::new(id, kind, period, timeout, callback, now, seq));
        Ok(id)
    }

    /// Next free non-zero id after the cursor, wrapping around once.
    fn allocate_id(&mut self) -> Option<TaskId> {
        let mut candidate = self.cursor;
        for _ in 0..u16::MAX {
            candidate = candidate.wrapping_add(1);
            if candidate == 0 {
                candidate = 1;
            }
            let id = TaskId::new(candidate);
            if !self.tasks.contains_key(&id) {
                self.cursor = candidate;
                return Some(id);
            }
        }
        None
    }

    /// Look up a task.
    pub fn get(&self, id: TaskId) -> Option<&Task> {
        self.tasks.get(&id)
    }

    /// Look up a task for mutation.
    pub fn get_mut(&mut self, id: TaskId) -> Option<&mut Task> {
        self.tasks.get_mut(&id)
    }

    /// Delete a task, dropping its callback. Returns the removed entry.
    pub fn remove(&mut self, id: TaskId) -> Option<Task> {
        self.tasks.remove(&id)
    }

    /// Ids of due tasks ordered by due time, then registration order.
    pub fn due_tasks(&self, now: Duration) -> Vec<TaskId> {
        let mut due: Vec<&Task> = self.tasks.values().filter(|t| t.is_due(now)).collect();
        due.sort_by_key(|t| (t.due, t.seq));
        due.into_iter().map(|t| t.id).collect()
    }

    /// Iterate over every resident task, in no particular order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Task> {
        self.tasks.values_mut()
    }

    /// Every resident task ordered by registration.
    pub fn ordered(&self) -> Vec<&Task> {
        let mut tasks: Vec<&Task> = self.tasks.values().collect();
        tasks.sort_by_key(|t| t.seq);
        tasks
    }

    /// Number of resident tasks, built-ins included.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Number of resident application tasks.
    pub fn application_len(&self) -> usize {
        self.tasks.len().saturating_sub(self.reserved)
    }

    /// Sequence number the next inserted task will receive.
    pub fn next_seq(&self) -> u64 {
        self.next_seq
    }

    /// Drop every entry, built-ins included.
    pub(crate) fn clear(&mut self) {
        self.tasks.clear();
        self.reserved = 0;
    }
}
