use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::model::task::{Task, TaskRef};

/// The closed vocabulary of work item types, encoded in the slug.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    Feat,
    Fix,
    Refactor,
    Chore,
}

impl ItemType {
    pub const ALL: [Self; 4] = [Self::Feat, Self::Fix, Self::Refactor, Self::Chore];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Feat => "feat",
            Self::Fix => "fix",
            Self::Refactor => "refactor",
            Self::Chore => "chore",
        }
    }
}

/// Lifecycle status of a single task, as written in its file.
///
/// `Unknown` is the sentinel for a missing or unrecognised value; it is
/// treated as incomplete everywhere downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    Plan,
    Open,
    InProgress,
    Review,
    ReadyToTest,
    Done,
    Unknown,
}

impl TaskStatus {
    pub const ALL: [Self; 7] = [
        Self::Plan,
        Self::Open,
        Self::InProgress,
        Self::Review,
        Self::ReadyToTest,
        Self::Done,
        Self::Unknown,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Plan => "plan",
            Self::Open => "open",
            Self::InProgress => "in-progress",
            Self::Review => "review",
            Self::ReadyToTest => "ready-to-test",
            Self::Done => "done",
            Self::Unknown => "unknown",
        }
    }

    /// Whether someone is actively working the task.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::InProgress | Self::Review | Self::ReadyToTest)
    }

    #[must_use]
    pub const fn is_done(self) -> bool {
        matches!(self, Self::Done)
    }
}

/// Computed status of a work item. Never stored in the item's own files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ItemStatus {
    Open,
    InProgress,
    Done,
}

impl ItemStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::InProgress => "in-progress",
            Self::Done => "done",
        }
    }
}

/// Optional task priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl Priority {
    pub const ALL: [Self; 4] = [Self::Low, Self::Medium, Self::High, Self::Critical];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

/// A parsed work item: one directory under the backlog root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkItem {
    pub slug: String,
    pub item_type: Option<ItemType>,
    pub title: String,
    pub status: ItemStatus,
    /// False when an error-severity issue was recorded for this item.
    pub valid: bool,
    /// Relative path of the index file.
    pub source: String,
    /// Task references in index order.
    pub refs: Vec<TaskRef>,
    /// Tasks whose files could be read, in index order.
    pub tasks: Vec<Task>,
    /// Raw `## Tasks` section of the index, heading included.
    #[serde(skip)]
    pub tasks_section: Option<String>,
}

impl WorkItem {
    #[must_use]
    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == id)
    }

    #[must_use]
    pub fn task_ref(&self, id: &str) -> Option<&TaskRef> {
        self.refs.iter().find(|task_ref| task_ref.id == id)
    }
}

/// Error returned when parsing an enum value from text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEnumError {
    pub expected: &'static str,
    pub got: String,
}

impl fmt::Display for ParseEnumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {}: '{}'", self.expected, self.got)
    }
}

impl std::error::Error for ParseEnumError {}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lowercase and fold `_` and spaces to `-` so `In Progress` and
/// `in_progress` read the same as `in-progress`.
fn normalize(input: &str) -> String {
    input
        .trim()
        .to_ascii_lowercase()
        .chars()
        .map(|c| if c == '_' || c == ' ' { '-' } else { c })
        .collect()
}

impl FromStr for ItemType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = normalize(s);
        Self::ALL
            .into_iter()
            .find(|value| value.as_str() == normalized)
            .ok_or_else(|| ParseEnumError {
                expected: "item type",
                got: s.to_string(),
            })
    }
}

impl FromStr for TaskStatus {
    type Err = ParseEnumError;

    /// `unknown` is deliberately not accepted: it only ever comes from a
    /// failed parse.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = normalize(s);
        match normalized.as_str() {
            "plan" => Ok(Self::Plan),
            "open" | "todo" => Ok(Self::Open),
            "in-progress" => Ok(Self::InProgress),
            "review" => Ok(Self::Review),
            "ready-to-test" => Ok(Self::ReadyToTest),
            "done" => Ok(Self::Done),
            _ => Err(ParseEnumError {
                expected: "status",
                got: s.to_string(),
            }),
        }
    }
}

impl FromStr for ItemStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = normalize(s);
        match normalized.as_str() {
            "open" => Ok(Self::Open),
            "in-progress" => Ok(Self::InProgress),
            "done" => Ok(Self::Done),
            _ => Err(ParseEnumError {
                expected: "item status",
                got: s.to_string(),
            }),
        }
    }
}

impl FromStr for Priority {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = normalize(s);
        Self::ALL
            .into_iter()
            .find(|value| value.as_str() == normalized)
            .ok_or_else(|| ParseEnumError {
                expected: "priority",
                got: s.to_string(),
            })
    }
}
