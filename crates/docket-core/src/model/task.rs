use serde::{Deserialize, Serialize};

use crate::model::item::{Priority, TaskStatus};

/// One checklist line of a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptanceCriterion {
    pub text: String,
    pub checked: bool,
}

/// A parsed task file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub description: String,
    pub acceptance_criteria: Vec<AcceptanceCriterion>,
    pub status: TaskStatus,
    pub assignee: Option<String>,
    pub priority: Option<Priority>,
    /// Slug of the work item directory the file lives in. Lookup only.
    pub item_slug: String,
    /// Relative path of the task file.
    pub source: String,
    #[serde(skip)]
    pub anchors: TaskAnchors,
}

/// Raw source text each parsed value came from.
///
/// The patch engine builds its exact-match originals from these, so a
/// patch always targets text that was actually read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskAnchors {
    /// Whole front matter block, delimiters and trailing line break included.
    pub front_matter: Option<String>,
    /// `(key, raw line)` for every metadata line, in file order.
    pub fields: Vec<(String, String)>,
    /// Every `## ` section of the body, in file order.
    pub sections: Vec<Section>,
    /// Raw checkbox lines backing `acceptance_criteria`, index-aligned.
    pub criteria: Vec<String>,
}

impl TaskAnchors {
    /// Raw line of the first metadata field named `key`.
    #[must_use]
    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, raw)| raw.as_str())
    }

    #[must_use]
    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|section| section.name == name)
    }
}

/// A `## Heading` section: the heading line through the line before the
/// next heading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    /// Heading text, lowercased and trimmed.
    pub name: String,
    /// Raw heading line without its line break.
    pub heading: String,
    /// Raw section text, heading included.
    pub text: String,
}

/// One task reference line of an item index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskRef {
    pub id: String,
    pub title: Option<String>,
    /// Checkbox state in the index.
    pub done: bool,
    #[serde(skip)]
    pub raw: String,
}
