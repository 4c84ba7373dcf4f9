use serde::Serialize;

/// The optional denormalized status summary at the backlog root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Manifest {
    /// Relative path of the manifest file.
    pub source: String,
    pub entries: Vec<ManifestEntry>,
}

impl Manifest {
    /// Entry describing the work item itself.
    #[must_use]
    pub fn item_entry(&self, slug: &str) -> Option<&ManifestEntry> {
        self.entries
            .iter()
            .find(|entry| entry.slug == slug && entry.task_id.is_none())
    }

    #[must_use]
    pub fn task_entry(&self, slug: &str, task_id: &str) -> Option<&ManifestEntry> {
        self.entries
            .iter()
            .find(|entry| entry.slug == slug && entry.task_id.as_deref() == Some(task_id))
    }
}

/// `- <slug>: <status>` or `- <slug>/<task-id>: <status>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManifestEntry {
    pub slug: String,
    pub task_id: Option<String>,
    /// Status text as written; not validated against the enums.
    pub status: String,
    #[serde(skip)]
    pub raw: String,
}

impl ManifestEntry {
    /// `slug` or `slug/task-id`.
    #[must_use]
    pub fn key(&self) -> String {
        match &self.task_id {
            Some(task_id) => format!("{}/{task_id}", self.slug),
            None => self.slug.clone(),
        }
    }
}
