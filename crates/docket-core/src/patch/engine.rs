//! Turn an [`Intent`] into a [`Changeset`].
//!
//! Planning never writes. Every edit is located against the current content
//! of its file (as seen through a [`ContentSource`]), applied to an
//! in-memory overlay, and the affected item is then re-loaded from that
//! overlay to produce the after-snapshot. Later edits to the same file see
//! earlier ones, so patches must be applied in the order they are emitted.
//!
//! Edits start from the smallest original that identifies the old value,
//! usually one line. A line that appears more than once in the file is
//! widened to its enclosing block (front matter or `## ` section) and the
//! right occurrence is rewritten inside it. If the widest candidate is still
//! missing or ambiguous the whole changeset fails with a conflict.

use std::collections::HashMap;
use std::sync::Arc;

use crate::cache::{ContentSource, normalize_key};
use crate::config::BacklogConfig;
use crate::error::{EngineError, Missing};
use crate::load::{load_item, load_manifest};
use crate::model::BacklogModel;
use crate::model::item::{Priority, TaskStatus, WorkItem};
use crate::model::task::Task;
use crate::parse::front_matter::render_value;
use crate::parse::task::{CRITERIA_SECTION, DESCRIPTION_SECTION};
use crate::parse::{Line, line_ending, lines, with_checkbox};
use crate::patch::{Changeset, FilePatch, Intent, ModelSnapshot, apply_patch, occurrences};

/// Plan the file edits for `intent` against `model`.
///
/// `source` must serve the content `model` was parsed from; any drift shows
/// up as [`EngineError::Conflict`].
///
/// # Errors
///
/// - [`EngineError::Validation`] for unwritable values or a task file with
///   no front matter.
/// - [`EngineError::NotFound`] for an unknown item, task or criterion.
/// - [`EngineError::Conflict`] when an original cannot be located exactly
///   once.
/// - Read errors from `source`.
pub fn build_changeset(
    intent: &Intent,
    model: &BacklogModel,
    source: &dyn ContentSource,
    config: &BacklogConfig,
) -> Result<Changeset, EngineError> {
    intent.validate()?;

    let key = intent.task();
    let item = model
        .item(&key.slug)
        .ok_or_else(|| EngineError::not_found(Missing::Item, &key.slug))?;
    let task = item
        .task(&key.id)
        .ok_or_else(|| EngineError::not_found(Missing::Task, key.to_string()))?;
    let front_matter = task.anchors.front_matter.clone().ok_or_else(|| {
        EngineError::validation(format!("{} has no front matter to edit", task.source))
    })?;

    let before = ModelSnapshot {
        item: item.clone(),
        manifest: model.manifest.clone(),
    };
    if is_noop(intent, task)? {
        tracing::debug!(op = intent.name(), task = %key, "intent is a no-op");
        return Ok(Changeset {
            patches: Vec::new(),
            model_after: before.clone(),
            model_before: before,
        });
    }

    let mut planner = Planner::new(source);
    let eol = line_ending(&planner.content(&task.source)?);
    let task_file = TaskFile {
        task,
        front_matter: &front_matter,
        eol,
    };

    match intent {
        Intent::SetStatus { status, .. } => {
            planner.push(
                &task.source,
                task_file.field_edit("status", Some(status.as_str())),
                format!("task status: {} → {status}", task.status),
            )?;
            index_checkbox(&mut planner, item, task, *status)?;
        }
        Intent::SetTitle { title, .. } => {
            let title = title.trim();
            planner.push(
                &task.source,
                task_file.field_edit("title", Some(title)),
                format!("task title: {} → {title}", task.title),
            )?;
            index_title(&mut planner, item, task, title)?;
        }
        Intent::SetAssignee { assignee, .. } => {
            let assignee = assignee.as_deref().map(str::trim);
            planner.push(
                &task.source,
                task_file.field_edit("assignee", assignee),
                format!(
                    "task assignee: {} → {}",
                    task.assignee.as_deref().unwrap_or("none"),
                    assignee.unwrap_or("none")
                ),
            )?;
        }
        Intent::SetPriority { priority, .. } => {
            planner.push(
                &task.source,
                task_file.field_edit("priority", priority.map(Priority::as_str)),
                format!(
                    "task priority: {} → {}",
                    task.priority.map_or("none", Priority::as_str),
                    priority.map_or("none", Priority::as_str)
                ),
            )?;
        }
        Intent::SetDescription { description, .. } => {
            let content = planner.content(&task.source)?;
            planner.push(
                &task.source,
                task_file.description_edit(description, &content),
                "task description updated".to_string(),
            )?;
        }
        Intent::SetCriterion { index, checked, .. } => {
            planner.push(
                &task.source,
                task_file.criterion_edit(*index, *checked)?,
                format!(
                    "acceptance criterion {index}: {} → {}",
                    checkbox(!*checked),
                    checkbox(*checked)
                ),
            )?;
        }
        Intent::AddCriterion { text, .. } => {
            let content = planner.content(&task.source)?;
            planner.push(
                &task.source,
                task_file.add_criterion_edit(text.trim(), &content),
                format!("acceptance criterion added: {}", text.trim()),
            )?;
        }
    }

    let (after_item, _) = load_item(&planner, &config.layout, &item.slug);

    match intent {
        Intent::SetStatus { status, .. } if config.manifest.sync => {
            manifest_lines(&mut planner, model, task, *status, &after_item)?;
        }
        _ => {}
    }

    let (after_manifest, _) = load_manifest(&planner, &config.layout);
    tracing::debug!(
        op = intent.name(),
        task = %key,
        patches = planner.patches.len(),
        "changeset planned"
    );

    Ok(Changeset {
        patches: planner.patches,
        model_before: before,
        model_after: ModelSnapshot {
            item: after_item,
            manifest: after_manifest,
        },
    })
}

fn is_noop(intent: &Intent, task: &Task) -> Result<bool, EngineError> {
    Ok(match intent {
        Intent::SetStatus { status, .. } => task.status == *status,
        Intent::SetTitle { title, .. } => task.title == title.trim(),
        Intent::SetAssignee { assignee, .. } => {
            task.assignee.as_deref() == assignee.as_deref().map(str::trim)
        }
        Intent::SetPriority { priority, .. } => task.priority == *priority,
        Intent::SetDescription { description, .. } => task.description == description.trim(),
        Intent::SetCriterion { index, checked, .. } => {
            let criterion = task.acceptance_criteria.get(*index).ok_or_else(|| {
                EngineError::not_found(
                    Missing::Criterion,
                    format!("{}/{}#{index}", task.item_slug, task.id),
                )
            })?;
            criterion.checked == *checked
        }
        Intent::AddCriterion { .. } => false,
    })
}

// ---------------------------------------------------------------------------
// Edits
// ---------------------------------------------------------------------------

/// A change to one file, before it is located.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Edit {
    /// Rewrite the raw line `raw`. When it is not unique in the file, rewrite
    /// the `nth` line equal to `raw` inside `scope` instead.
    Line {
        raw: String,
        new: String,
        scope: Option<String>,
        nth: usize,
    },
    /// Replace a whole block.
    Block { original: String, replacement: String },
}

/// Accumulates patches and the patched content they produce.
struct Planner<'a> {
    source: &'a dyn ContentSource,
    files: HashMap<String, String>,
    patches: Vec<FilePatch>,
}

impl<'a> Planner<'a> {
    fn new(source: &'a dyn ContentSource) -> Self {
        Self {
            source,
            files: HashMap::new(),
            patches: Vec::new(),
        }
    }

    fn content(&self, path: &str) -> Result<String, EngineError> {
        match self.files.get(&normalize_key(path)) {
            Some(content) => Ok(content.clone()),
            None => Ok(self.source.read(path)?.to_string()),
        }
    }

    fn push(&mut self, path: &str, edit: Edit, description: String) -> Result<(), EngineError> {
        let content = self.content(path)?;
        let (original, replacement) = locate(path, &content, edit).inspect_err(|err| {
            tracing::warn!(path, error = %err, "cannot locate patch original");
        })?;
        if original == replacement {
            return Ok(());
        }

        let patch = FilePatch {
            file_path: path.to_string(),
            original,
            replacement,
            description,
        };
        let updated = apply_patch(&content, &patch)?;
        tracing::debug!(path, description = %patch.description, "patch planned");
        self.files.insert(normalize_key(path), updated);
        self.patches.push(patch);
        Ok(())
    }
}

impl ContentSource for Planner<'_> {
    fn read(&self, path: &str) -> Result<Arc<str>, EngineError> {
        match self.files.get(&normalize_key(path)) {
            Some(content) => Ok(Arc::from(content.as_str())),
            None => self.source.read(path),
        }
    }
}

/// Resolve an edit to an `(original, replacement)` pair that matches
/// `content` exactly once.
fn locate(path: &str, content: &str, edit: Edit) -> Result<(String, String), EngineError> {
    let conflict = |reason: &str, original: &str| EngineError::Conflict {
        path: path.to_string(),
        reason: reason.to_string(),
        original: original.to_string(),
    };

    match edit {
        Edit::Block {
            original,
            replacement,
        } => match occurrences(content, &original) {
            1 => Ok((original, replacement)),
            0 => Err(conflict("original text not found", &original)),
            _ => Err(conflict("original text is not unique", &original)),
        },
        Edit::Line {
            raw,
            new,
            scope,
            nth,
        } => {
            match occurrences(content, &raw) {
                0 => return Err(conflict("original text not found", &raw)),
                1 if is_whole_line(content, &raw) => return Ok((raw, new)),
                _ => {}
            }
            let Some(scope) = scope else {
                return Err(conflict("original text is not unique", &raw));
            };
            let replacement = replace_nth_line(&scope, &raw, nth, &new)
                .ok_or_else(|| conflict("original text not found", &raw))?;
            locate(
                path,
                content,
                Edit::Block {
                    original: scope,
                    replacement,
                },
            )
        }
    }
}

/// Whether the single occurrence of `raw` in `content` spans a whole line.
fn is_whole_line(content: &str, raw: &str) -> bool {
    let Some(start) = content.find(raw) else {
        return false;
    };
    let end = start + raw.len();
    let starts_line = start == 0 || content[..start].ends_with('\n');
    let ends_line = end == content.len() || content[end..].starts_with(['\n', '\r']);
    starts_line && ends_line
}

/// `(start, end)` of every place `raw` covers whole lines of `block`.
/// `raw` may span several lines.
fn line_spans<'b>(block: &'b str, raw: &'b str) -> impl Iterator<Item = (usize, usize)> + 'b {
    lines(block).filter_map(move |line| {
        let end = line.start + raw.len();
        let hit = block[line.start..].starts_with(raw)
            && (end == block.len() || block[end..].starts_with(['\n', '\r']));
        hit.then_some((line.start, end))
    })
}

fn replace_nth_line(block: &str, raw: &str, nth: usize, new: &str) -> Option<String> {
    let (start, end) = line_spans(block, raw).nth(nth)?;
    Some(format!("{}{new}{}", &block[..start], &block[end..]))
}

/// Drop the first whole-line `raw` from `block`, line break included.
fn remove_line(block: &str, raw: &str) -> String {
    line_spans(block, raw).next().map_or_else(
        || block.to_string(),
        |(start, end)| {
            let rest = &block[end..];
            let rest = rest
                .strip_prefix("\r\n")
                .or_else(|| rest.strip_prefix('\n'))
                .unwrap_or(rest);
            format!("{}{rest}", &block[..start])
        },
    )
}

/// How many times `list[index]` already appeared before `index`.
fn nth_of(list: &[String], index: usize) -> usize {
    list[..index]
        .iter()
        .filter(|line| **line == list[index])
        .count()
}

const fn checkbox(checked: bool) -> &'static str {
    if checked { "[x]" } else { "[ ]" }
}

// ---------------------------------------------------------------------------
// Task file
// ---------------------------------------------------------------------------

struct TaskFile<'a> {
    task: &'a Task,
    front_matter: &'a str,
    eol: &'static str,
}

impl TaskFile<'_> {
    /// Set, insert or (with `None`) remove a metadata line.
    fn field_edit(&self, key: &str, value: Option<&str>) -> Edit {
        let anchors = &self.task.anchors;
        let eol = self.eol;
        let scope = Some(self.front_matter.to_string());

        match (anchors.field(key), value) {
            (Some(raw), Some(value)) => {
                let prefix = raw.split_once(':').map_or(key, |(prefix, _)| prefix);
                Edit::Line {
                    raw: raw.to_string(),
                    new: format!("{prefix}: {}", render_value(value)),
                    scope,
                    nth: 0,
                }
            }
            (Some(raw), None) => Edit::Block {
                original: self.front_matter.to_string(),
                replacement: remove_line(self.front_matter, raw),
            },
            (None, Some(value)) => {
                let line = format!("{key}: {}", render_value(value));
                if let Some(closing) = closing_delimiter(self.front_matter) {
                    let (head, tail) = self.front_matter.split_at(closing.start);
                    return Edit::Block {
                        original: self.front_matter.to_string(),
                        replacement: format!("{head}{line}{eol}{tail}"),
                    };
                }
                let raws: Vec<String> = anchors.fields.iter().map(|(_, raw)| raw.clone()).collect();
                let (raw, nth) = raws.last().map_or_else(
                    || (opening_delimiter(self.front_matter), 0),
                    |last| (last.clone(), nth_of(&raws, raws.len() - 1)),
                );
                Edit::Line {
                    new: format!("{raw}{eol}{line}"),
                    raw,
                    scope,
                    nth,
                }
            }
            (None, None) => Edit::Block {
                original: self.front_matter.to_string(),
                replacement: self.front_matter.to_string(),
            },
        }
    }

    fn description_edit(&self, description: &str, content: &str) -> Edit {
        let sections = &self.task.anchors.sections;
        let body = description.trim().lines().collect::<Vec<_>>().join(self.eol);

        if let Some(i) = sections.iter().position(|s| s.name == DESCRIPTION_SECTION) {
            let section = &sections[i];
            let is_last = i + 1 == sections.len();
            return Edit::Block {
                original: section.text.clone(),
                replacement: self.section_text(&section.heading, &body, is_last),
            };
        }

        let new_section = self.section_text("## Description", &body, false);
        match self.task.anchors.section(CRITERIA_SECTION) {
            Some(criteria) => Edit::Line {
                raw: criteria.heading.clone(),
                new: format!("{new_section}{}", criteria.heading),
                scope: Some(criteria.text.clone()),
                nth: 0,
            },
            None => self.append(content, new_section.trim_end_matches(['\r', '\n'])),
        }
    }

    fn criterion_edit(&self, index: usize, checked: bool) -> Result<Edit, EngineError> {
        let anchors = &self.task.anchors;
        let raw = anchors.criteria.get(index).ok_or_else(|| {
            EngineError::not_found(
                Missing::Criterion,
                format!("{}/{}#{index}", self.task.item_slug, self.task.id),
            )
        })?;
        Ok(Edit::Line {
            raw: raw.clone(),
            new: with_checkbox(raw, checked),
            scope: anchors.section(CRITERIA_SECTION).map(|s| s.text.clone()),
            nth: nth_of(&anchors.criteria, index),
        })
    }

    fn add_criterion_edit(&self, text: &str, content: &str) -> Edit {
        let anchors = &self.task.anchors;
        let eol = self.eol;
        let line = format!("- [ ] {text}");

        if let Some(last) = anchors.criteria.last() {
            return Edit::Line {
                raw: last.clone(),
                new: format!("{last}{eol}{line}"),
                scope: anchors.section(CRITERIA_SECTION).map(|s| s.text.clone()),
                nth: nth_of(&anchors.criteria, anchors.criteria.len() - 1),
            };
        }

        let sections = &anchors.sections;
        match sections.iter().position(|s| s.name == CRITERIA_SECTION) {
            Some(i) => {
                let section = &sections[i];
                let tail = if i + 1 == sections.len() { "" } else { eol };
                Edit::Block {
                    original: section.text.clone(),
                    replacement: format!(
                        "{}{eol}{eol}{line}{eol}{tail}",
                        trim_line_breaks(&section.text)
                    ),
                }
            }
            None => self.append(content, &format!("## Acceptance Criteria{eol}{eol}{line}")),
        }
    }

    /// `heading`, a blank line, the body, and a separating blank line unless
    /// the section ends the file.
    fn section_text(&self, heading: &str, body: &str, is_last: bool) -> String {
        let eol = self.eol;
        if body.is_empty() {
            return format!("{heading}{eol}{eol}");
        }
        let tail = if is_last { "" } else { eol };
        format!("{heading}{eol}{eol}{body}{eol}{tail}")
    }

    /// Add `text` as a new trailing block of the file.
    fn append(&self, content: &str, text: &str) -> Edit {
        let eol = self.eol;
        let (original, head) = match self.task.anchors.sections.last() {
            Some(last) => (last.text.clone(), trim_line_breaks(&last.text).to_string()),
            None => (content.to_string(), trim_line_breaks(content).to_string()),
        };
        Edit::Block {
            original,
            replacement: format!("{head}{eol}{eol}{text}{eol}"),
        }
    }
}

fn trim_line_breaks(text: &str) -> &str {
    text.trim_end_matches(['\r', '\n'])
}

/// The closing `---` (or `...`) line, if the block has one.
fn closing_delimiter(front_matter: &str) -> Option<Line<'_>> {
    let all: Vec<Line<'_>> = lines(front_matter).collect();
    match all.as_slice() {
        [_, .., last] if matches!(last.text.trim_end(), "---" | "...") => Some(*last),
        _ => None,
    }
}

fn opening_delimiter(front_matter: &str) -> String {
    lines(front_matter)
        .next()
        .map_or_else(|| "---".to_string(), |line| line.text.to_string())
}

// ---------------------------------------------------------------------------
// Cascades
// ---------------------------------------------------------------------------

fn task_ref_scope(item: &WorkItem) -> Option<String> {
    item.tasks_section.clone()
}

fn index_checkbox(
    planner: &mut Planner<'_>,
    item: &WorkItem,
    task: &Task,
    status: TaskStatus,
) -> Result<(), EngineError> {
    let Some(task_ref) = item.task_ref(&task.id) else {
        return Ok(());
    };
    let done = status.is_done();
    if task_ref.done == done {
        return Ok(());
    }
    planner.push(
        &item.source,
        Edit::Line {
            raw: task_ref.raw.clone(),
            new: with_checkbox(&task_ref.raw, done),
            scope: task_ref_scope(item),
            nth: 0,
        },
        format!(
            "index checkbox {}: {} → {}",
            task.id,
            checkbox(task_ref.done),
            checkbox(done)
        ),
    )
}

/// Only references that already carry a title are rewritten.
fn index_title(
    planner: &mut Planner<'_>,
    item: &WorkItem,
    task: &Task,
    title: &str,
) -> Result<(), EngineError> {
    let Some(task_ref) = item.task_ref(&task.id) else {
        return Ok(());
    };
    let Some(old_title) = task_ref.title.as_deref() else {
        return Ok(());
    };
    if old_title == title {
        return Ok(());
    }
    let Some(new) = retitle(&task_ref.raw, &task_ref.id, title) else {
        return Ok(());
    };
    planner.push(
        &item.source,
        Edit::Line {
            raw: task_ref.raw.clone(),
            new,
            scope: task_ref_scope(item),
            nth: 0,
        },
        format!("index title {}: {old_title} → {title}", task.id),
    )
}

/// `- [ ] 01-a: Old` → `- [ ] 01-a: New`.
fn retitle(raw: &str, id: &str, title: &str) -> Option<String> {
    let after_box = raw.find(']')? + 1;
    let id_end = after_box + raw[after_box..].find(id)? + id.len();
    Some(format!("{}: {title}", &raw[..id_end]))
}

fn manifest_lines(
    planner: &mut Planner<'_>,
    model: &BacklogModel,
    task: &Task,
    status: TaskStatus,
    after_item: &WorkItem,
) -> Result<(), EngineError> {
    let Some(manifest) = &model.manifest else {
        return Ok(());
    };

    let wanted = [
        (manifest.task_entry(&task.item_slug, &task.id), status.as_str()),
        (manifest.item_entry(&task.item_slug), after_item.status.as_str()),
    ];
    for (entry, new_status) in wanted {
        let Some(entry) = entry else {
            continue;
        };
        if entry.status == new_status {
            continue;
        }
        let prefix = entry
            .raw
            .rsplit_once(':')
            .map_or(entry.raw.as_str(), |(prefix, _)| prefix);
        planner.push(
            &manifest.source,
            Edit::Line {
                raw: entry.raw.clone(),
                new: format!("{prefix}: {new_status}"),
                scope: None,
                nth: 0,
            },
            format!("manifest {}: {} → {new_status}", entry.key(), entry.status),
        )?;
    }
    Ok(())
}
