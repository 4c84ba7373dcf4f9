//! Assemble the backlog model from files.
//!
//! The loader is the only code that knows how index, task and manifest files
//! relate. It reads through a [`ContentSource`] so the patch engine can run
//! it over hypothetically-patched content as well as the live cache.

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::cache::{ContentSource, FileCache};
use crate::config::{BacklogConfig, LayoutConfig};
use crate::error::{EngineError, Missing};
use crate::model::BacklogModel;
use crate::model::dto::BacklogOutput;
use crate::model::item::{ItemStatus, TaskStatus, WorkItem};
use crate::model::manifest::Manifest;
use crate::model::status::derive_status;
use crate::parse::{
    IssueCode, ItemIndex, ValidationIssue, parse_item_index, parse_manifest, parse_slug,
    parse_task_file,
};

/// A parsed backlog plus everything that went wrong parsing it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadedBacklog {
    pub model: BacklogModel,
    pub issues: Vec<ValidationIssue>,
}

impl LoadedBacklog {
    #[must_use]
    pub fn output(&self) -> BacklogOutput {
        BacklogOutput::new(&self.model, &self.issues)
    }
}

/// Load every work item under the cache root, plus the manifest.
///
/// # Errors
///
/// Only fails when the root directory itself cannot be listed. Problems
/// with individual files become issues.
pub fn load_backlog(cache: &FileCache, config: &BacklogConfig) -> Result<LoadedBacklog, EngineError> {
    let mut loaded = LoadedBacklog::default();

    for slug in list_items(cache.root())? {
        let (item, mut issues) = load_item(cache, &config.layout, &slug);
        if config.validation.warn_unlisted_tasks {
            issues.extend(unlisted_task_files(cache.root(), &item, &config.layout));
        }
        loaded.issues.append(&mut issues);
        loaded.model.items.push(item);
    }

    let (manifest, mut issues) = load_manifest(cache, &config.layout);
    loaded.issues.append(&mut issues);
    if let Some(manifest) = &manifest {
        loaded.issues.extend(manifest_drift(manifest, &loaded.model));
    }
    loaded.model.manifest = manifest;

    tracing::debug!(
        items = loaded.model.items.len(),
        issues = loaded.issues.len(),
        "loaded backlog"
    );
    Ok(loaded)
}

/// Load a model holding only `slug` and the manifest: what a mutation of
/// that item needs.
///
/// # Errors
///
/// [`EngineError::NotFound`] when no directory named `slug` exists.
pub fn load_scope(
    cache: &FileCache,
    config: &BacklogConfig,
    slug: &str,
) -> Result<BacklogModel, EngineError> {
    if !is_plain_name(slug) || !cache.root().join(slug).is_dir() {
        return Err(EngineError::not_found(Missing::Item, slug));
    }
    let (item, _) = load_item(cache, &config.layout, slug);
    let (manifest, _) = load_manifest(cache, &config.layout);
    Ok(BacklogModel {
        items: vec![item],
        manifest,
    })
}

/// Load one work item: its index and every task file it references.
#[must_use]
pub fn load_item(
    source: &dyn ContentSource,
    layout: &LayoutConfig,
    slug: &str,
) -> (WorkItem, Vec<ValidationIssue>) {
    let index_path = layout.index_path(slug);
    let mut issues = Vec::new();

    let (index, refs) = match source.read(&index_path) {
        Ok(content) => {
            let (index, refs, mut found) = parse_item_index(&content, slug, &index_path);
            issues.append(&mut found);
            (index, refs)
        }
        Err(err) => {
            issues.push(read_issue(&err, &index_path, IssueCode::MissingIndex));
            let index = ItemIndex {
                slug: slug.to_string(),
                item_type: parse_slug(slug),
                title: slug.to_string(),
                source: index_path.clone(),
                tasks_section: None,
            };
            (index, Vec::new())
        }
    };

    let mut tasks = Vec::with_capacity(refs.len());
    for task_ref in &refs {
        let task_path = layout.task_path(slug, &task_ref.id);
        let content = match source.read(&task_path) {
            Ok(content) => content,
            Err(err) => {
                issues.push(read_issue(&err, &task_path, IssueCode::MissingTaskFile));
                continue;
            }
        };
        let (task, mut found) = parse_task_file(&content, &task_path);
        issues.append(&mut found);

        if task.id != task_ref.id {
            issues.push(ValidationIssue::new(
                IssueCode::IdMismatch,
                format!("index lists '{}' but the file says '{}'", task_ref.id, task.id),
                Some(&task_path),
            ));
        }
        if task_ref.done != task.status.is_done() {
            issues.push(ValidationIssue::new(
                IssueCode::IndexStatusDrift,
                format!(
                    "index checkbox says {} but task status is {}",
                    if task_ref.done { "done" } else { "not done" },
                    task.status
                ),
                Some(&index_path),
            ));
        }
        tasks.push(task);
    }

    let item = WorkItem {
        status: derive_status(tasks.iter().map(|task| task.status)),
        valid: !issues.iter().any(ValidationIssue::is_error),
        slug: index.slug,
        item_type: index.item_type,
        title: index.title,
        source: index.source,
        refs,
        tasks,
        tasks_section: index.tasks_section,
    };
    (item, issues)
}

/// Read and parse the manifest. A missing manifest is not an issue.
#[must_use]
pub fn load_manifest(
    source: &dyn ContentSource,
    layout: &LayoutConfig,
) -> (Option<Manifest>, Vec<ValidationIssue>) {
    match source.read(&layout.manifest_file) {
        Ok(content) => {
            let (manifest, issues) = parse_manifest(&content, &layout.manifest_file);
            (Some(manifest), issues)
        }
        Err(EngineError::NotFound { .. }) => (None, Vec::new()),
        Err(err) => (
            None,
            vec![read_issue(&err, &layout.manifest_file, IssueCode::UnreadableFile)],
        ),
    }
}

/// Work item directories under `root`, sorted. Hidden directories are
/// skipped.
///
/// # Errors
///
/// [`EngineError::Io`] when `root` cannot be listed.
pub fn list_items(root: &Path) -> Result<Vec<String>, EngineError> {
    let entries = fs::read_dir(root).map_err(|source| EngineError::Io {
        path: root.to_path_buf(),
        source,
    })?;

    let mut slugs: Vec<String> = entries
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_ok_and(|kind| kind.is_dir()))
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| !name.starts_with('.'))
        .collect();
    slugs.sort();
    Ok(slugs)
}

fn unlisted_task_files(root: &Path, item: &WorkItem, layout: &LayoutConfig) -> Vec<ValidationIssue> {
    let Ok(entries) = fs::read_dir(root.join(&item.slug)) else {
        return Vec::new();
    };
    let listed: HashSet<&str> = item.refs.iter().map(|task_ref| task_ref.id.as_str()).collect();

    let mut unlisted: Vec<String> = entries
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_ok_and(|kind| kind.is_file()))
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| *name != layout.index_file)
        .filter(|name| {
            name.rsplit_once('.').is_some_and(|(stem, ext)| {
                ext == layout.task_extension && !listed.contains(stem)
            })
        })
        .collect();
    unlisted.sort();

    unlisted
        .into_iter()
        .map(|name| {
            let path = format!("{}/{name}", item.slug);
            ValidationIssue::new(
                IssueCode::UnlistedTaskFile,
                format!("'{name}' is not listed in {}", item.source),
                Some(&path),
            )
        })
        .collect()
}

fn manifest_drift(manifest: &Manifest, model: &BacklogModel) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    let mut drift = |message: String| {
        issues.push(ValidationIssue::new(
            IssueCode::ManifestStatusDrift,
            message,
            Some(&manifest.source),
        ));
    };

    for entry in &manifest.entries {
        match &entry.task_id {
            Some(task_id) => match model.task(&entry.slug, task_id) {
                None => drift(format!("'{}' has no matching task", entry.key())),
                Some(task) if TaskStatus::from_str(&entry.status).ok() != Some(task.status) => {
                    drift(format!(
                        "'{}' says {} but the task is {}",
                        entry.key(),
                        entry.status,
                        task.status
                    ));
                }
                Some(_) => {}
            },
            None => match model.item(&entry.slug) {
                None => drift(format!("'{}' has no matching work item", entry.slug)),
                Some(item) if ItemStatus::from_str(&entry.status).ok() != Some(item.status) => {
                    drift(format!(
                        "'{}' says {} but the item is {}",
                        entry.slug, entry.status, item.status
                    ));
                }
                Some(_) => {}
            },
        }
    }
    issues
}

fn read_issue(err: &EngineError, path: &str, not_found: IssueCode) -> ValidationIssue {
    match err {
        EngineError::NotFound { .. } => {
            ValidationIssue::new(not_found, format!("{path} does not exist"), Some(path))
        }
        other => ValidationIssue::new(IssueCode::UnreadableFile, other.to_string(), Some(path)),
    }
}

fn is_plain_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\'])
}
