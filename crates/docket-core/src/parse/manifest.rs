//! Manifest parser.
//!
//! The manifest is a flat list of `- <key>: <status>` lines where the key is
//! either an item slug or `<slug>/<task-id>`. Everything else (headings,
//! prose, blank lines) is ignored.

use std::collections::HashSet;

use crate::model::manifest::{Manifest, ManifestEntry};
use crate::parse::{IssueCode, ValidationIssue, lines, strip_bom};

/// Parse manifest content. Never fails; bad lines become issues.
#[must_use]
pub fn parse_manifest(content: &str, source: &str) -> (Manifest, Vec<ValidationIssue>) {
    let mut issues = Vec::new();
    let mut entries = Vec::new();
    let mut seen = HashSet::new();

    for line in lines(strip_bom(content)) {
        let Some(rest) = line.text.strip_prefix("- ") else {
            continue;
        };
        let Some(entry) = parse_entry(rest, line.text) else {
            issues.push(ValidationIssue::new(
                IssueCode::MalformedManifestEntry,
                format!("cannot read manifest entry '{}'", line.text),
                Some(source),
            ));
            continue;
        };
        if !seen.insert(entry.key()) {
            issues.push(ValidationIssue::new(
                IssueCode::DuplicateManifestEntry,
                format!("'{}' appears more than once", entry.key()),
                Some(source),
            ));
            continue;
        }
        entries.push(entry);
    }

    let manifest = Manifest {
        source: source.to_string(),
        entries,
    };
    (manifest, issues)
}

fn parse_entry(rest: &str, raw: &str) -> Option<ManifestEntry> {
    let (key, status) = rest.rsplit_once(':')?;
    let (key, status) = (key.trim(), status.trim());
    if key.is_empty() || status.is_empty() || key.contains(char::is_whitespace) {
        return None;
    }
    let (slug, task_id) = match key.split_once('/') {
        Some((slug, task_id)) if !slug.is_empty() && !task_id.is_empty() => {
            (slug, Some(task_id.to_string()))
        }
        Some(_) => return None,
        None => (key, None),
    };
    Some(ManifestEntry {
        slug: slug.to_string(),
        task_id,
        status: status.to_string(),
        raw: raw.to_string(),
    })
}

/// Render one manifest line.
#[must_use]
pub fn render_entry(slug: &str, task_id: Option<&str>, status: &str) -> String {
    match task_id {
        Some(task_id) => format!("- {slug}/{task_id}: {status}"),
        None => format!("- {slug}: {status}"),
    }
}
