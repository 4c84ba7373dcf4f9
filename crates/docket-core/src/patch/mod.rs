//! Exact-match text patches and the changesets that group them.
//!
//! A [`FilePatch`] names a substring that must appear exactly once in the
//! current content of a file. Everything that mutates backlog files goes
//! through one: the engine in [`engine`] plans them, [`apply`] writes them.
//! A patch whose original is missing or ambiguous is a conflict, never a
//! guess.

pub mod apply;
pub mod engine;
pub mod intent;

pub use apply::apply_changeset;
pub use engine::build_changeset;
pub use intent::{Intent, TaskKey};

use serde::Serialize;

use crate::error::EngineError;
use crate::model::item::WorkItem;
use crate::model::manifest::Manifest;

/// One exact-match substitution inside one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilePatch {
    /// Path relative to the backlog root.
    pub file_path: String,
    pub original: String,
    pub replacement: String,
    pub description: String,
}

/// The slice of the model a mutation can affect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelSnapshot {
    pub item: WorkItem,
    pub manifest: Option<Manifest>,
}

/// Every file edit one logical mutation needs, in apply order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Changeset {
    pub patches: Vec<FilePatch>,
    pub model_before: ModelSnapshot,
    pub model_after: ModelSnapshot,
}

impl Changeset {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }

    /// Distinct files touched, in first-touch order.
    #[must_use]
    pub fn touched_paths(&self) -> Vec<&str> {
        let mut paths: Vec<&str> = Vec::new();
        for patch in &self.patches {
            if !paths.contains(&patch.file_path.as_str()) {
                paths.push(&patch.file_path);
            }
        }
        paths
    }
}

/// Apply one patch to `content`.
///
/// # Errors
///
/// [`EngineError::Conflict`] when `patch.original` is empty, absent from
/// `content`, or present more than once.
pub fn apply_patch(content: &str, patch: &FilePatch) -> Result<String, EngineError> {
    let conflict = |reason: &str| EngineError::Conflict {
        path: patch.file_path.clone(),
        reason: reason.to_string(),
        original: patch.original.clone(),
    };

    if patch.original.is_empty() {
        return Err(conflict("patch has an empty original"));
    }
    match occurrences(content, &patch.original) {
        0 => Err(conflict("original text not found")),
        1 => Ok(content.replacen(&patch.original, &patch.replacement, 1)),
        _ => Err(conflict("original text is not unique")),
    }
}

/// Number of (possibly overlapping) occurrences of `needle`, counting at
/// most two.
pub(crate) fn occurrences(haystack: &str, needle: &str) -> usize {
    let Some(first) = haystack.find(needle) else {
        return 0;
    };
    let step = haystack[first..].chars().next().map_or(1, char::len_utf8);
    if haystack[first + step..].contains(needle) {
        2
    } else {
        1
    }
}
