use serde::Serialize;
use std::fmt;

/// How bad a [`ValidationIssue`] is.
///
/// Errors mark the owning work item invalid; warnings do not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// Stable identifiers for recoverable parse defects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum IssueCode {
    MissingFrontmatter,
    UnterminatedFrontmatter,
    InvalidFrontmatter,
    MissingId,
    MissingTitle,
    MissingStatus,
    InvalidStatus,
    InvalidPriority,
    IdMismatch,
    InvalidSlug,
    MissingIndex,
    MissingTaskSection,
    MalformedTaskRef,
    DuplicateTaskRef,
    MissingTaskFile,
    UnlistedTaskFile,
    IndexStatusDrift,
    MalformedManifestEntry,
    DuplicateManifestEntry,
    ManifestStatusDrift,
    UnreadableFile,
}

impl IssueCode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MissingFrontmatter => "missing-frontmatter",
            Self::UnterminatedFrontmatter => "unterminated-frontmatter",
            Self::InvalidFrontmatter => "invalid-frontmatter",
            Self::MissingId => "missing-id",
            Self::MissingTitle => "missing-title",
            Self::MissingStatus => "missing-status",
            Self::InvalidStatus => "invalid-status",
            Self::InvalidPriority => "invalid-priority",
            Self::IdMismatch => "id-mismatch",
            Self::InvalidSlug => "invalid-slug",
            Self::MissingIndex => "missing-index",
            Self::MissingTaskSection => "missing-task-section",
            Self::MalformedTaskRef => "malformed-task-ref",
            Self::DuplicateTaskRef => "duplicate-task-ref",
            Self::MissingTaskFile => "missing-task-file",
            Self::UnlistedTaskFile => "unlisted-task-file",
            Self::IndexStatusDrift => "index-status-drift",
            Self::MalformedManifestEntry => "malformed-manifest-entry",
            Self::DuplicateManifestEntry => "duplicate-manifest-entry",
            Self::ManifestStatusDrift => "manifest-status-drift",
            Self::UnreadableFile => "unreadable-file",
        }
    }

    #[must_use]
    pub const fn severity(self) -> Severity {
        match self {
            Self::MissingFrontmatter
            | Self::UnterminatedFrontmatter
            | Self::MissingStatus
            | Self::InvalidStatus
            | Self::MissingIndex
            | Self::MissingTaskFile
            | Self::UnreadableFile => Severity::Error,
            Self::InvalidFrontmatter
            | Self::MissingId
            | Self::MissingTitle
            | Self::InvalidPriority
            | Self::IdMismatch
            | Self::InvalidSlug
            | Self::MissingTaskSection
            | Self::MalformedTaskRef
            | Self::DuplicateTaskRef
            | Self::UnlistedTaskFile
            | Self::IndexStatusDrift
            | Self::MalformedManifestEntry
            | Self::DuplicateManifestEntry
            | Self::ManifestStatusDrift => Severity::Warning,
        }
    }
}

impl fmt::Display for IssueCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A recoverable defect found while parsing. Collected, never thrown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    pub code: IssueCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub severity: Severity,
}

impl ValidationIssue {
    pub fn new(code: IssueCode, message: impl Into<String>, source: Option<&str>) -> Self {
        Self {
            code,
            message: message.into(),
            source: source.map(str::to_string),
            severity: code.severity(),
        }
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Some(source) => write!(f, "[{}] {source}: {}", self.code, self.message),
            None => write!(f, "[{}] {}", self.code, self.message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{IssueCode, Severity, ValidationIssue};

    #[test]
    fn serialized_code_matches_as_str() {
        let issue = ValidationIssue::new(IssueCode::MissingStatus, "no status", Some("a/b.md"));
        let json = serde_json::to_value(&issue).unwrap();
        assert_eq!(json["code"], "missing-status");
        assert_eq!(json["severity"], "error");
        assert_eq!(json["source"], "a/b.md");
        assert_eq!(IssueCode::ManifestStatusDrift.as_str(), "manifest-status-drift");
    }

    #[test]
    fn source_is_omitted_when_absent() {
        let issue = ValidationIssue::new(IssueCode::MalformedManifestEntry, "bad line", None);
        let json = serde_json::to_value(&issue).unwrap();
        assert!(json.get("source").is_none());
        assert_eq!(issue.severity, Severity::Warning);
        assert!(!issue.is_error());
    }
}
