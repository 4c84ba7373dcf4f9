use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::EngineError;
use crate::model::item::{Priority, TaskStatus};

/// Addresses one task: `<slug>/<id>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskKey {
    pub slug: String,
    pub id: String,
}

impl TaskKey {
    #[must_use]
    pub fn new(slug: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for TaskKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.slug, self.id)
    }
}

/// A requested change to one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "kebab-case")]
pub enum Intent {
    SetStatus { task: TaskKey, status: TaskStatus },
    SetTitle { task: TaskKey, title: String },
    SetAssignee { task: TaskKey, assignee: Option<String> },
    SetPriority { task: TaskKey, priority: Option<Priority> },
    SetDescription { task: TaskKey, description: String },
    /// Check or uncheck the criterion at zero-based `index`.
    SetCriterion { task: TaskKey, index: usize, checked: bool },
    AddCriterion { task: TaskKey, text: String },
}

impl Intent {
    #[must_use]
    pub const fn task(&self) -> &TaskKey {
        match self {
            Self::SetStatus { task, .. }
            | Self::SetTitle { task, .. }
            | Self::SetAssignee { task, .. }
            | Self::SetPriority { task, .. }
            | Self::SetDescription { task, .. }
            | Self::SetCriterion { task, .. }
            | Self::AddCriterion { task, .. } => task,
        }
    }

    /// Short name for logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::SetStatus { .. } => "set-status",
            Self::SetTitle { .. } => "set-title",
            Self::SetAssignee { .. } => "set-assignee",
            Self::SetPriority { .. } => "set-priority",
            Self::SetDescription { .. } => "set-description",
            Self::SetCriterion { .. } => "set-criterion",
            Self::AddCriterion { .. } => "add-criterion",
        }
    }

    /// Reject values that cannot be written back as they are.
    ///
    /// Range checks that need the model (criterion index) happen in the
    /// engine.
    ///
    /// # Errors
    ///
    /// [`EngineError::Validation`] describing the first problem found.
    pub fn validate(&self) -> Result<(), EngineError> {
        match self {
            Self::SetStatus { status, .. } => {
                if *status == TaskStatus::Unknown {
                    return Err(EngineError::validation("status 'unknown' cannot be written"));
                }
            }
            Self::SetTitle { title, .. } => single_line("title", title)?,
            Self::SetAssignee {
                assignee: Some(assignee),
                ..
            } => single_line("assignee", assignee)?,
            Self::SetAssignee { assignee: None, .. }
            | Self::SetPriority { .. }
            | Self::SetCriterion { .. } => {}
            Self::SetDescription { description, .. } => {
                if description.lines().any(|line| line.starts_with("## ")) {
                    return Err(EngineError::validation(
                        "description must not contain `## ` headings",
                    ));
                }
                let fences = description
                    .lines()
                    .filter(|line| line.trim_start().starts_with("```"))
                    .count();
                if fences % 2 != 0 {
                    return Err(EngineError::validation(
                        "description has an unclosed code fence",
                    ));
                }
            }
            Self::AddCriterion { text, .. } => single_line("criterion", text)?,
        }
        Ok(())
    }
}

fn single_line(field: &str, value: &str) -> Result<(), EngineError> {
    if value.trim().is_empty() {
        return Err(EngineError::validation(format!("{field} must not be empty")));
    }
    if value.contains(['\n', '\r']) {
        return Err(EngineError::validation(format!(
            "{field} must be a single line"
        )));
    }
    Ok(())
}
