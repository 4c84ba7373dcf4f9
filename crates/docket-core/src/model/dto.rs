//! Serializable views handed to transports (HTTP, SSE, CLI output).

use serde::Serialize;

use crate::model::BacklogModel;
use crate::model::item::{ItemStatus, ItemType, Priority, TaskStatus, WorkItem};
use crate::model::status::TaskProgress;
use crate::model::task::{AcceptanceCriterion, Task};
use crate::parse::ValidationIssue;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDto {
    pub id: String,
    pub title: String,
    pub description: String,
    pub acceptance_criteria: Vec<AcceptanceCriterion>,
    pub status: TaskStatus,
    pub assignee: Option<String>,
    pub priority: Option<Priority>,
}

impl From<&Task> for TaskDto {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id.clone(),
            title: task.title.clone(),
            description: task.description.clone(),
            acceptance_criteria: task.acceptance_criteria.clone(),
            status: task.status,
            assignee: task.assignee.clone(),
            priority: task.priority,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkItemDto {
    pub slug: String,
    #[serde(rename = "type")]
    pub item_type: Option<ItemType>,
    pub title: String,
    pub status: ItemStatus,
    pub valid: bool,
    pub progress: TaskProgress,
    pub tasks: Vec<TaskDto>,
}

impl From<&WorkItem> for WorkItemDto {
    fn from(item: &WorkItem) -> Self {
        Self {
            slug: item.slug.clone(),
            item_type: item.item_type,
            title: item.title.clone(),
            status: item.status,
            valid: item.valid,
            progress: TaskProgress::from_statuses(item.tasks.iter().map(|task| task.status)),
            tasks: item.tasks.iter().map(TaskDto::from).collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationSummary {
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationSummary {
    #[must_use]
    pub fn from_issues<'a>(issues: impl IntoIterator<Item = &'a ValidationIssue>) -> Self {
        let (errors, warnings): (Vec<_>, Vec<_>) = issues
            .into_iter()
            .cloned()
            .partition(ValidationIssue::is_error);
        Self { errors, warnings }
    }
}

/// Top-level read response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BacklogOutput {
    pub work: Vec<WorkItemDto>,
    pub validation: ValidationSummary,
}

impl BacklogOutput {
    #[must_use]
    pub fn new(model: &BacklogModel, issues: &[ValidationIssue]) -> Self {
        Self {
            work: model.items.iter().map(WorkItemDto::from).collect(),
            validation: ValidationSummary::from_issues(issues),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{BacklogOutput, ValidationSummary};
    use crate::model::BacklogModel;
    use crate::parse::{IssueCode, ValidationIssue};

    #[test]
    fn summary_splits_by_severity() {
        let issues = vec![
            ValidationIssue::new(IssueCode::MissingStatus, "no status", Some("a/1.md")),
            ValidationIssue::new(IssueCode::InvalidSlug, "bad slug", Some("a/index.md")),
        ];
        let summary = ValidationSummary::from_issues(&issues);
        assert_eq!(summary.errors.len(), 1);
        assert_eq!(summary.warnings.len(), 1);
        assert_eq!(summary.errors[0].code, IssueCode::MissingStatus);
    }

    #[test]
    fn empty_backlog_serializes() {
        let output = BacklogOutput::new(&BacklogModel::default(), &[]);
        let json = serde_json::to_value(&output).unwrap();
        assert_eq!(json["work"], serde_json::json!([]));
        assert_eq!(json["validation"]["errors"], serde_json::json!([]));
    }
}
