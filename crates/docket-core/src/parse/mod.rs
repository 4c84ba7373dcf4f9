//! Text parsers for backlog files.
//!
//! Every parser takes content that the caller already read (usually from the
//! [`FileCache`](crate::cache::FileCache)) and returns a best-effort entity
//! plus the [`ValidationIssue`]s it hit along the way. None of them fail: a
//! missing or malformed field becomes an issue and a default value.
//!
//! Parsed entities keep the raw lines they came from (see
//! [`TaskAnchors`](crate::model::task::TaskAnchors)) so the patch engine can
//! target exactly the text that was read.

pub mod front_matter;
pub mod index;
pub mod issue;
pub mod manifest;
pub mod task;

pub use index::{ItemIndex, parse_item_index, parse_slug};
pub use issue::{IssueCode, Severity, ValidationIssue};
pub use manifest::parse_manifest;
pub use task::{parse_task_file, render_task_file};

use crate::model::task::Section;

/// A line of text with its byte offset and terminator split off.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Line<'a> {
    pub start: usize,
    /// Line content without `\n` / `\r\n`.
    pub text: &'a str,
    /// Line content including its terminator, if any.
    pub full: &'a str,
}

pub(crate) fn lines(content: &str) -> impl Iterator<Item = Line<'_>> {
    let mut start = 0;
    content.split_inclusive('\n').map(move |full| {
        let line = Line {
            start,
            text: trim_line_ending(full),
            full,
        };
        start += full.len();
        line
    })
}

fn trim_line_ending(line: &str) -> &str {
    let line = line.strip_suffix('\n').unwrap_or(line);
    line.strip_suffix('\r').unwrap_or(line)
}

/// The line terminator a file uses; `\n` unless it contains `\r\n`.
#[must_use]
pub fn line_ending(content: &str) -> &'static str {
    if content.contains("\r\n") { "\r\n" } else { "\n" }
}

pub(crate) fn strip_bom(content: &str) -> &str {
    content.strip_prefix('\u{feff}').unwrap_or(content)
}

fn heading_name(line: &str) -> Option<&str> {
    line.strip_prefix("## ").map(str::trim)
}

/// Split `text` into `## ` sections.
///
/// Text before the first heading is not part of any section. Headings inside
/// fenced code blocks are ignored.
pub(crate) fn sections(text: &str) -> Vec<Section> {
    let mut starts: Vec<(usize, &str, &str)> = Vec::new();
    let mut in_fence = false;

    for line in lines(text) {
        if line.text.trim_start().starts_with("```") {
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            continue;
        }
        if let Some(name) = heading_name(line.text) {
            starts.push((line.start, name, line.text));
        }
    }

    starts
        .iter()
        .enumerate()
        .map(|(i, &(start, name, heading))| {
            let end = starts.get(i + 1).map_or(text.len(), |next| next.0);
            Section {
                name: name.to_ascii_lowercase(),
                heading: heading.to_string(),
                text: text[start..end].to_string(),
            }
        })
        .collect()
}

/// Lines of a section after its heading.
pub(crate) fn section_body(section: &Section) -> impl Iterator<Item = Line<'_>> {
    lines(&section.text).skip(1)
}

/// Parse `- [ ] text` / `* [x] text`. Returns `(checked, text)`.
pub(crate) fn parse_checkbox(line: &str) -> Option<(bool, &str)> {
    let rest = line.trim_start();
    let rest = rest
        .strip_prefix("- ")
        .or_else(|| rest.strip_prefix("* "))?
        .trim_start();
    let (checked, rest) = if let Some(rest) = rest.strip_prefix("[ ]") {
        (false, rest)
    } else if let Some(rest) = rest.strip_prefix("[x]").or_else(|| rest.strip_prefix("[X]")) {
        (true, rest)
    } else {
        return None;
    };
    if !(rest.is_empty() || rest.starts_with(' ')) {
        return None;
    }
    Some((checked, rest.trim()))
}

/// Rewrite the checkbox of a raw checkbox line, keeping everything else.
#[must_use]
pub fn with_checkbox(raw: &str, checked: bool) -> String {
    let mark = if checked { "[x]" } else { "[ ]" };
    let first_box = ["[ ]", "[x]", "[X]"]
        .into_iter()
        .filter_map(|box_text| raw.find(box_text))
        .min();
    match first_box {
        Some(pos) => format!("{}{mark}{}", &raw[..pos], &raw[pos + 3..]),
        None => raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::{line_ending, lines, parse_checkbox, sections, with_checkbox};

    #[test]
    fn lines_track_offsets_and_terminators() {
        let content = "a\r\nbc\nd";
        let collected: Vec<_> = lines(content).map(|l| (l.start, l.text, l.full)).collect();
        assert_eq!(
            collected,
            vec![(0, "a", "a\r\n"), (3, "bc", "bc\n"), (6, "d", "d")]
        );
        assert_eq!(line_ending(content), "\r\n");
        assert_eq!(line_ending("x\ny\n"), "\n");
    }

    #[test]
    fn checkbox_forms() {
        assert_eq!(parse_checkbox("- [ ] Write tests"), Some((false, "Write tests")));
        assert_eq!(parse_checkbox("  * [X] Ship it "), Some((true, "Ship it")));
        assert_eq!(parse_checkbox("- [x]"), Some((true, "")));
        assert_eq!(parse_checkbox("- [x]nope"), None);
        assert_eq!(parse_checkbox("- plain bullet"), None);
        assert_eq!(parse_checkbox("[ ] no bullet"), None);
    }

    #[test]
    fn checkbox_rewrite_keeps_text() {
        assert_eq!(with_checkbox("- [ ] a [x] b", true), "- [x] a [x] b");
        assert_eq!(with_checkbox("- [x] a [ ] b", false), "- [ ] a [ ] b");
        assert_eq!(with_checkbox("  * [X] done", false), "  * [ ] done");
    }

    #[test]
    fn sections_split_on_level_two_headings() {
        let text = "intro\n## Description\n\nBody\n### Sub\n## Acceptance Criteria\n- [ ] a\n";
        let found = sections(text);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].name, "description");
        assert_eq!(found[0].text, "## Description\n\nBody\n### Sub\n");
        assert_eq!(found[1].heading, "## Acceptance Criteria");
        assert_eq!(found[1].text, "## Acceptance Criteria\n- [ ] a\n");
    }

    #[test]
    fn sections_ignore_fenced_headings() {
        let text = "## Description\n```\n## not a heading\n```\n";
        let found = sections(text);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].text, text);
    }
}
