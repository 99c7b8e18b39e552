//! Ledger of tasks disabled since the last garbage collection sweep.

use crate::scheduler::tasks::TaskId;

/// Pending-reclaim queue filled on disable and drained by each sweep.
#[derive(Debug, Default)]
pub struct DisabledLedger {
    ids: Vec<TaskId>,
}

impl DisabledLedger {
    /// Create an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a newly disabled task.
    ///
    /// Callers only record on the task's first transition into the
    /// disabled state, so an id appears at most once per lifetime.
    pub fn record(&mut self, id: TaskId) {
        debug_assert!(!self.ids.contains(&id), "task {id} recorded twice");
        self.ids.push(id);
    }

    /// Swap out every recorded id, leaving the ledger empty.
    ///
    /// Ids recorded after this call belong to the next sweep.
    pub fn drain(&mut self) -> Vec<TaskId> {
        std::mem::take(&mut self.ids)
    }

    /// Number of ids waiting for the next sweep.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Returns `true` when nothing waits for reclamation.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Returns `true` if `id` waits for the next sweep.
    pub fn contains(&self, id: TaskId) -> bool {
        self.ids.contains(&id)
    }
}
