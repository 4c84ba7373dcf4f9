//! Work item status derivation.
//!
//! This is the only place item status is computed. Everything else (the
//! loader, the patch engine's cascade, the manifest sync) calls
//! [`derive_status`].
//!
//! Rules, in priority order:
//!
//! 1. no tasks → `open`
//! 2. every task `done` → `done`
//! 3. any task `in-progress`, `review` or `ready-to-test` → `in-progress`
//! 4. every task `open`, `plan` or `unknown` → `open`
//! 5. otherwise (some done, rest pending) → `in-progress`
//!
//! `plan` and `unknown` count as open.

use serde::Serialize;

use crate::model::item::{ItemStatus, TaskStatus};

/// Tally of task statuses for one work item.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TaskProgress {
    pub total: usize,
    pub done: usize,
    pub active: usize,
    /// `open`, `plan` and `unknown` tasks.
    pub pending: usize,
}

impl TaskProgress {
    #[must_use]
    pub fn from_statuses(statuses: impl IntoIterator<Item = TaskStatus>) -> Self {
        let mut progress = Self::default();
        for status in statuses {
            progress.total += 1;
            if status.is_done() {
                progress.done += 1;
            } else if status.is_active() {
                progress.active += 1;
            } else {
                progress.pending += 1;
            }
        }
        progress
    }

    #[must_use]
    pub const fn status(self) -> ItemStatus {
        if self.total == 0 {
            ItemStatus::Open
        } else if self.done == self.total {
            ItemStatus::Done
        } else if self.active > 0 {
            ItemStatus::InProgress
        } else if self.pending == self.total {
            ItemStatus::Open
        } else {
            ItemStatus::InProgress
        }
    }
}

/// Compute a work item's status from its tasks' statuses.
///
/// Total and order-independent.
#[must_use]
pub fn derive_status(statuses: impl IntoIterator<Item = TaskStatus>) -> ItemStatus {
    TaskProgress::from_statuses(statuses).status()
}
