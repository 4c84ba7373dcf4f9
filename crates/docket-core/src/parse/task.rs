//! Task file parser and canonical renderer.
//!
//! # Format
//!
//! ```text
//! ---
//! id: 01-schema
//! title: Create the schema
//! status: open
//! assignee: alice
//! priority: high
//! ---
//!
//! ## Description
//!
//! Free text.
//!
//! ## Acceptance Criteria
//!
//! - [ ] Tables exist
//! - [x] Migrations run
//! ```
//!
//! Only `status` is required for a task to be valid. `id` falls back to the
//! file stem and `title` to the id, each with a warning.

use std::str::FromStr;

use crate::model::item::{Priority, TaskStatus};
use crate::model::task::{AcceptanceCriterion, Task, TaskAnchors};
use crate::parse::front_matter::{Field, render_value, split_front_matter};
use crate::parse::{
    IssueCode, ValidationIssue, lines, parse_checkbox, section_body, sections, strip_bom,
};

pub const DESCRIPTION_SECTION: &str = "description";
pub const CRITERIA_SECTION: &str = "acceptance criteria";

/// Parse a task file. Never fails; defects are reported as issues.
///
/// `source` is the file's path relative to the backlog root
/// (`<item-slug>/<task-id>.md`); the item slug is taken from its parent
/// directory.
#[must_use]
pub fn parse_task_file(content: &str, source: &str) -> (Task, Vec<ValidationIssue>) {
    let mut issues = Vec::new();
    let content = strip_bom(content);
    let issue = |code, message: String| ValidationIssue::new(code, message, Some(source));

    let mut anchors = TaskAnchors::default();
    let mut id = None;
    let mut title = None;
    let mut status = TaskStatus::Unknown;
    let mut assignee = None;
    let mut priority = None;

    let body = match split_front_matter(content) {
        Some(front_matter) => {
            if !front_matter.terminated {
                issues.push(issue(
                    IssueCode::UnterminatedFrontmatter,
                    "front matter has no closing `---`".into(),
                ));
            }
            if let Some(err) = &front_matter.yaml_error {
                issues.push(issue(
                    IssueCode::InvalidFrontmatter,
                    format!("front matter is not valid YAML ({err}); reading lines as-is"),
                ));
            }
            anchors.front_matter = Some(front_matter.block.to_string());
            anchors.fields = front_matter
                .fields
                .iter()
                .map(|field| (field.key.clone(), field.raw.to_string()))
                .collect();

            id = non_empty(front_matter.get("id").and_then(Field::text));
            if id.is_none() {
                issues.push(issue(
                    IssueCode::MissingId,
                    "no `id` field; using the file name".into(),
                ));
            }

            title = non_empty(front_matter.get("title").and_then(Field::text));
            if title.is_none() {
                issues.push(issue(
                    IssueCode::MissingTitle,
                    "no `title` field; using the task id".into(),
                ));
            }

            match front_matter.get("status").map(|f| f.text().map(str::trim)) {
                None | Some(Some("")) => issues.push(issue(
                    IssueCode::MissingStatus,
                    "no `status` field".into(),
                )),
                Some(None) => issues.push(issue(
                    IssueCode::InvalidStatus,
                    "`status` must be a single value".into(),
                )),
                Some(Some(raw)) => match TaskStatus::from_str(raw) {
                    Ok(parsed) => status = parsed,
                    Err(err) => issues.push(issue(IssueCode::InvalidStatus, err.to_string())),
                },
            }

            assignee = non_empty(front_matter.get("assignee").and_then(Field::text));

            if let Some(raw) = non_empty(front_matter.get("priority").and_then(Field::text)) {
                match Priority::from_str(&raw) {
                    Ok(parsed) => priority = Some(parsed),
                    Err(err) => issues.push(issue(IssueCode::InvalidPriority, err.to_string())),
                }
            }

            front_matter.body
        }
        None => {
            issues.push(issue(
                IssueCode::MissingFrontmatter,
                "task file does not start with a `---` metadata block".into(),
            ));
            content
        }
    };

    anchors.sections = sections(body);

    let description = anchors.section(DESCRIPTION_SECTION).map_or_else(
        || preamble(body),
        |section| {
            let lines: Vec<&str> = section_body(section).map(|line| line.text).collect();
            lines.join("\n").trim().to_string()
        },
    );

    let mut acceptance_criteria = Vec::new();
    let mut criteria_lines = Vec::new();
    if let Some(section) = anchors.section(CRITERIA_SECTION) {
        for line in section_body(section) {
            if let Some((checked, text)) = parse_checkbox(line.text) {
                acceptance_criteria.push(AcceptanceCriterion {
                    text: text.to_string(),
                    checked,
                });
                criteria_lines.push(line.text.to_string());
            }
        }
    }
    anchors.criteria = criteria_lines;

    let id = id.unwrap_or_else(|| file_stem(source).to_string());
    let title = title.unwrap_or_else(|| id.clone());

    let task = Task {
        id,
        title,
        description,
        acceptance_criteria,
        status,
        assignee,
        priority,
        item_slug: parent_dir(source).to_string(),
        source: source.to_string(),
        anchors,
    };
    (task, issues)
}

/// Render a task in the canonical file format.
///
/// Parsing the output yields the same id, title, status, assignee,
/// priority, trimmed description and criteria.
#[must_use]
pub fn render_task_file(task: &Task) -> String {
    let mut out = String::new();
    out.push_str("---\n");
    out.push_str(&format!("id: {}\n", render_value(&task.id)));
    out.push_str(&format!("title: {}\n", render_value(&task.title)));
    out.push_str(&format!("status: {}\n", task.status));
    if let Some(assignee) = &task.assignee {
        out.push_str(&format!("assignee: {}\n", render_value(assignee)));
    }
    if let Some(priority) = task.priority {
        out.push_str(&format!("priority: {priority}\n"));
    }
    out.push_str("---\n\n## Description\n\n");
    let description = task.description.trim();
    if !description.is_empty() {
        out.push_str(description);
        out.push_str("\n\n");
    }
    out.push_str("## Acceptance Criteria\n");
    if !task.acceptance_criteria.is_empty() {
        out.push('\n');
        for criterion in &task.acceptance_criteria {
            let mark = if criterion.checked { 'x' } else { ' ' };
            out.push_str(&format!("- [{mark}] {}\n", criterion.text));
        }
    }
    out
}

/// Body text before the first section, used when there is no
/// `## Description` heading.
fn preamble(body: &str) -> String {
    let lines: Vec<&str> = lines(body)
        .map(|line| line.text)
        .take_while(|line| !line.starts_with("## "))
        .collect();
    lines.join("\n").trim().to_string()
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn file_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

fn file_stem(path: &str) -> &str {
    let name = file_name(path);
    name.rsplit_once('.').map_or(name, |(stem, _)| stem)
}

fn parent_dir(path: &str) -> &str {
    let name_len = file_name(path).len();
    path[..path.len() - name_len].trim_end_matches(['/', '\\'])
}

#[cfg(test)]
mod tests {
    use super::{parse_task_file, render_task_file};
    use crate::model::item::{Priority, TaskStatus};
    use crate::model::task::AcceptanceCriterion;
    use crate::parse::IssueCode;

    const TASK: &str = "---
id: 01-schema
title: Create the schema
status: in-progress
assignee: alice
priority: high
---

## Description

Create tables for users.

Keep it small.

## Acceptance Criteria

- [ ] Tables exist
- [x] Migrations run
- not a checkbox
";

    #[test]
    fn parses_complete_task() {
        let (task, issues) = parse_task_file(TASK, "001-feat-login/01-schema.md");
        assert!(issues.is_empty(), "{issues:?}");
        assert_eq!(task.id, "01-schema");
        assert_eq!(task.title, "Create the schema");
        assert_eq!(task.status, TaskStatus::InProgress);
        assert_eq!(task.assignee.as_deref(), Some("alice"));
        assert_eq!(task.priority, Some(Priority::High));
        assert_eq!(task.item_slug, "001-feat-login");
        assert_eq!(task.description, "Create tables for users.\n\nKeep it small.");
        assert_eq!(
            task.acceptance_criteria,
            vec![
                AcceptanceCriterion {
                    text: "Tables exist".into(),
                    checked: false,
                },
                AcceptanceCriterion {
                    text: "Migrations run".into(),
                    checked: true,
                },
            ]
        );
        assert_eq!(task.anchors.field("status"), Some("status: in-progress"));
        assert_eq!(
            task.anchors.criteria,
            vec!["- [ ] Tables exist", "- [x] Migrations run"]
        );
    }

    #[test]
    fn missing_status_is_one_issue_not_a_failure() {
        let content = "---\nid: 02-api\ntitle: API\n---\n\n## Description\n\nx\n";
        let (task, issues) = parse_task_file(content, "001-feat-login/02-api.md");
        assert_eq!(task.status, TaskStatus::Unknown);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].code, IssueCode::MissingStatus);
        assert!(issues[0].is_error());
        assert_eq!(issues[0].source.as_deref(), Some("001-feat-login/02-api.md"));
    }

    #[test]
    fn invalid_values_fall_back() {
        let content = "---\nid: 03\ntitle: T\nstatus: blocked\npriority: urgent\n---\n";
        let (task, issues) = parse_task_file(content, "x/03.md");
        assert_eq!(task.status, TaskStatus::Unknown);
        assert_eq!(task.priority, None);
        let codes: Vec<_> = issues.iter().map(|issue| issue.code).collect();
        assert_eq!(codes, vec![IssueCode::InvalidStatus, IssueCode::InvalidPriority]);
    }

    #[test]
    fn no_front_matter_uses_file_stem() {
        let (task, issues) = parse_task_file("Just some notes.\n", "x/04-notes.md");
        assert_eq!(task.id, "04-notes");
        assert_eq!(task.title, "04-notes");
        assert_eq!(task.description, "Just some notes.");
        assert_eq!(task.status, TaskStatus::Unknown);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].code, IssueCode::MissingFrontmatter);
    }

    #[test]
    fn empty_assignee_is_none() {
        let content = "---\nid: a\ntitle: A\nstatus: open\nassignee:\n---\n";
        let (task, issues) = parse_task_file(content, "x/a.md");
        assert!(issues.is_empty());
        assert_eq!(task.assignee, None);
    }

    #[test]
    fn criteria_order_is_preserved_with_duplicates() {
        let content = "---\nid: a\ntitle: A\nstatus: open\n---\n## Acceptance Criteria\n- [x] b\n- [ ] a\n- [x] b\n";
        let (task, _) = parse_task_file(content, "x/a.md");
        let texts: Vec<_> = task
            .acceptance_criteria
            .iter()
            .map(|c| (c.text.as_str(), c.checked))
            .collect();
        assert_eq!(texts, vec![("b", true), ("a", false), ("b", true)]);
    }

    #[test]
    fn render_then_parse_keeps_fields() {
        let (task, _) = parse_task_file(TASK, "001-feat-login/01-schema.md");
        let rendered = render_task_file(&task);
        let (reparsed, issues) = parse_task_file(&rendered, "001-feat-login/01-schema.md");
        assert!(issues.is_empty(), "{issues:?}");
        assert_eq!(reparsed.id, task.id);
        assert_eq!(reparsed.title, task.title);
        assert_eq!(reparsed.status, task.status);
        assert_eq!(reparsed.assignee, task.assignee);
        assert_eq!(reparsed.priority, task.priority);
        assert_eq!(reparsed.description, task.description);
        assert_eq!(reparsed.acceptance_criteria, task.acceptance_criteria);
    }

    #[test]
    fn nested_status_does_not_hide_the_real_one() {
        let content = "---\nid: 01\ntitle: T\nmeta:\n  status: draft\ntags:\n  - a\n  - b\nstatus: open\n---\n";
        let (task, issues) = parse_task_file(content, "x/01.md");
        assert!(issues.is_empty(), "{issues:?}");
        assert_eq!(task.id, "01");
        assert_eq!(task.status, TaskStatus::Open);
        assert_eq!(task.anchors.field("status"), Some("status: open"));
        assert_eq!(task.anchors.field("meta"), Some("meta:\n  status: draft"));
    }

    #[test]
    fn invalid_yaml_is_reported_but_still_read() {
        let content = "---\nid: a\ntitle: Fix: login\nstatus: open\n---\n";
        let (task, issues) = parse_task_file(content, "x/a.md");
        assert_eq!(task.title, "Fix: login");
        assert_eq!(task.status, TaskStatus::Open);
        let codes: Vec<_> = issues.iter().map(|issue| issue.code).collect();
        assert_eq!(codes, vec![IssueCode::InvalidFrontmatter]);
        assert!(!issues[0].is_error());
    }

    #[test]
    fn list_status_is_invalid() {
        let content = "---\nid: a\ntitle: A\nstatus:\n  - open\n---\n";
        let (task, issues) = parse_task_file(content, "x/a.md");
        assert_eq!(task.status, TaskStatus::Unknown);
        assert_eq!(issues[0].code, IssueCode::InvalidStatus);
    }

    #[test]
    fn rendered_quotes_and_colons_survive() {
        let (mut task, _) = parse_task_file(TASK, "001-feat-login/01-schema.md");
        task.title = "Fix: \"login\" page".into();
        task.assignee = Some("'ops'".into());
        let (reparsed, issues) =
            parse_task_file(&render_task_file(&task), "001-feat-login/01-schema.md");
        assert!(issues.is_empty(), "{issues:?}");
        assert_eq!(reparsed.title, task.title);
        assert_eq!(reparsed.assignee, task.assignee);
    }

    #[test]
    fn crlf_files_parse_like_lf() {
        let crlf = TASK.replace('\n', "\r\n");
        let (task, issues) = parse_task_file(&crlf, "001-feat-login/01-schema.md");
        assert!(issues.is_empty(), "{issues:?}");
        assert_eq!(task.description, "Create tables for users.\n\nKeep it small.");
        assert_eq!(task.anchors.field("title"), Some("title: Create the schema"));
        assert_eq!(task.acceptance_criteria.len(), 2);
    }
}
