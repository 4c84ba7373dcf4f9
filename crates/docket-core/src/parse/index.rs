//! Work item index parser.
//!
//! ```text
//! # Login page
//!
//! ## Tasks
//!
//! - [ ] 01-schema: Create the schema
//! - [x] 02-api
//! ```
//!
//! The checkbox of a task reference mirrors whether the task is done; the
//! task file stays authoritative.

use std::collections::HashSet;

use crate::model::item::ItemType;
use crate::model::task::TaskRef;
use crate::parse::{
    IssueCode, ValidationIssue, lines, parse_checkbox, section_body, sections, strip_bom,
};

pub const TASKS_SECTION: &str = "tasks";

/// The item-level part of an index file. Status is derived later, once the
/// task files are parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemIndex {
    pub slug: String,
    pub item_type: Option<ItemType>,
    pub title: String,
    pub source: String,
    /// Raw `## Tasks` section, heading included.
    pub tasks_section: Option<String>,
}

/// Extract the item type from a slug shaped `<digits>-<type>-<text>`.
#[must_use]
pub fn parse_slug(slug: &str) -> Option<ItemType> {
    let (number, rest) = slug.split_once('-')?;
    if number.is_empty() || !number.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let (kind, text) = rest.split_once('-')?;
    if text.is_empty() {
        return None;
    }
    ItemType::ALL
        .into_iter()
        .find(|item_type| item_type.as_str() == kind)
}

/// Parse an item index file. Never fails; defects are reported as issues.
#[must_use]
pub fn parse_item_index(
    content: &str,
    slug: &str,
    source: &str,
) -> (ItemIndex, Vec<TaskRef>, Vec<ValidationIssue>) {
    let mut issues = Vec::new();
    let content = strip_bom(content);
    let issue = |code, message: String| ValidationIssue::new(code, message, Some(source));

    let item_type = parse_slug(slug);
    if item_type.is_none() {
        issues.push(issue(
            IssueCode::InvalidSlug,
            format!("slug '{slug}' does not match <number>-<feat|fix|refactor|chore>-<name>"),
        ));
    }

    let title = lines(content)
        .find_map(|line| line.text.strip_prefix("# "))
        .map(str::trim)
        .filter(|title| !title.is_empty())
        .unwrap_or(slug)
        .to_string();

    let mut refs = Vec::new();
    let section = sections(content)
        .into_iter()
        .find(|section| section.name == TASKS_SECTION);

    match &section {
        None => issues.push(issue(
            IssueCode::MissingTaskSection,
            "index has no `## Tasks` section".into(),
        )),
        Some(section) => {
            let mut seen = HashSet::new();
            for line in section_body(section) {
                let trimmed = line.text.trim_start();
                if !(trimmed.starts_with('-') || trimmed.starts_with('*')) {
                    continue;
                }
                let Some(task_ref) = parse_task_ref(line.text) else {
                    issues.push(issue(
                        IssueCode::MalformedTaskRef,
                        format!("cannot read task reference '{}'", line.text.trim()),
                    ));
                    continue;
                };
                if !seen.insert(task_ref.id.clone()) {
                    issues.push(issue(
                        IssueCode::DuplicateTaskRef,
                        format!("task '{}' is listed more than once", task_ref.id),
                    ));
                    continue;
                }
                refs.push(task_ref);
            }
        }
    }

    let index = ItemIndex {
        slug: slug.to_string(),
        item_type,
        title,
        source: source.to_string(),
        tasks_section: section.map(|section| section.text),
    };
    (index, refs, issues)
}

/// Parse `- [ ] <id>` or `- [x] <id>: <title>`.
fn parse_task_ref(line: &str) -> Option<TaskRef> {
    let (done, rest) = parse_checkbox(line)?;
    let (id, title) = match rest.split_once(':') {
        Some((id, title)) => (id.trim(), Some(title.trim())),
        None => (rest.trim(), None),
    };
    if !is_task_id(id) {
        return None;
    }
    Some(TaskRef {
        id: id.to_string(),
        title: title.filter(|title| !title.is_empty()).map(str::to_string),
        done,
        raw: line.to_string(),
    })
}

fn is_task_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

/// Render a task reference line in canonical form.
#[must_use]
pub fn render_task_ref(id: &str, title: Option<&str>, done: bool) -> String {
    let mark = if done { 'x' } else { ' ' };
    match title {
        Some(title) => format!("- [{mark}] {id}: {title}"),
        None => format!("- [{mark}] {id}"),
    }
}
