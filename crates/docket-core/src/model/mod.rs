//! Parsed backlog entities and the DTOs handed to external callers.

pub mod dto;
pub mod item;
pub mod manifest;
pub mod status;
pub mod task;

use serde::Serialize;

use crate::model::item::WorkItem;
use crate::model::manifest::Manifest;
use crate::model::task::Task;

/// Everything parsed from one backlog root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BacklogModel {
    /// Work items ordered by slug.
    pub items: Vec<WorkItem>,
    pub manifest: Option<Manifest>,
}

impl BacklogModel {
    #[must_use]
    pub fn item(&self, slug: &str) -> Option<&WorkItem> {
        self.items.iter().find(|item| item.slug == slug)
    }

    #[must_use]
    pub fn task(&self, slug: &str, task_id: &str) -> Option<&Task> {
        self.item(slug).and_then(|item| item.task(task_id))
    }
}
