use std::fmt;
use std::io;
use std::path::PathBuf;

/// Machine-readable error codes for agent-friendly decision making.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigParseError,
    ItemNotFound,
    TaskNotFound,
    FileNotFound,
    CriterionNotFound,
    InvalidIntent,
    PatchConflict,
    FileWriteFailed,
    QueueClosed,
    OperationAborted,
    NoRuntime,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::ConfigParseError => "E1002",
            Self::ItemNotFound => "E2001",
            Self::TaskNotFound => "E2002",
            Self::FileNotFound => "E2003",
            Self::CriterionNotFound => "E2004",
            Self::InvalidIntent => "E2005",
            Self::PatchConflict => "E3001",
            Self::FileWriteFailed => "E5001",
            Self::QueueClosed => "E9001",
            Self::OperationAborted => "E9002",
            Self::NoRuntime => "E9003",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::ConfigParseError => "Config file parse error",
            Self::ItemNotFound => "Work item not found",
            Self::TaskNotFound => "Task not found",
            Self::FileNotFound => "Backlog file not found",
            Self::CriterionNotFound => "Acceptance criterion not found",
            Self::InvalidIntent => "Invalid mutation",
            Self::PatchConflict => "Patch conflict",
            Self::FileWriteFailed => "Backlog file write failed",
            Self::QueueClosed => "Operation queue closed",
            Self::OperationAborted => "Operation aborted",
            Self::NoRuntime => "No async runtime",
        }
    }

    /// Optional remediation hint that can be surfaced to operators and agents.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::ConfigParseError => Some("Fix syntax in .docket.toml and retry."),
            Self::ItemNotFound | Self::TaskNotFound | Self::FileNotFound => None,
            Self::CriterionNotFound => Some("Criterion indexes are zero-based."),
            Self::InvalidIntent => Some("Correct the requested change and resubmit it."),
            Self::PatchConflict => {
                Some("The file changed since it was read. Reload the backlog and retry.")
            }
            Self::FileWriteFailed => Some("Check disk space and write permissions."),
            Self::QueueClosed => Some("The backlog was shut down; open it again."),
            Self::OperationAborted => {
                Some("The operation panicked. Reload the backlog before retrying.")
            }
            Self::NoRuntime => Some("Open the backlog from inside a tokio runtime."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Coarse discriminant for [`EngineError`], meant for transport mapping
/// (e.g. `NotFound` → 404, `Conflict` → 409, `Validation` → 400).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    Validation,
    Io,
    Unavailable,
}

/// What a [`EngineError::NotFound`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Missing {
    Item,
    Task,
    File,
    Criterion,
}

impl fmt::Display for Missing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Item => "work item",
            Self::Task => "task",
            Self::File => "file",
            Self::Criterion => "acceptance criterion",
        })
    }
}

/// Errors produced by the document engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A referenced work item, task, criterion or file does not exist.
    #[error("{what} not found: {id}")]
    NotFound { what: Missing, id: String },

    /// The expected original text is absent from, or duplicated in, the
    /// current content of `path`.
    #[error("conflict in {path}: {reason}")]
    Conflict {
        path: String,
        reason: String,
        original: String,
    },

    /// The mutation intent is structurally invalid.
    #[error("invalid mutation: {0}")]
    Validation(String),

    /// Reading or writing a backlog file failed.
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The operation queue worker is gone.
    #[error("operation queue is closed")]
    QueueClosed,

    /// A queued operation panicked before producing a result.
    #[error("queued operation aborted")]
    Aborted,
}

impl EngineError {
    pub(crate) fn not_found(what: Missing, id: impl Into<String>) -> Self {
        Self::NotFound {
            what,
            id: id.into(),
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Transport-level discriminant for this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::Validation(_) => ErrorKind::Validation,
            Self::Io { .. } => ErrorKind::Io,
            Self::QueueClosed | Self::Aborted => ErrorKind::Unavailable,
        }
    }

    /// Machine-readable code associated with this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::NotFound { what, .. } => match what {
                Missing::Item => ErrorCode::ItemNotFound,
                Missing::Task => ErrorCode::TaskNotFound,
                Missing::File => ErrorCode::FileNotFound,
                Missing::Criterion => ErrorCode::CriterionNotFound,
            },
            Self::Conflict { .. } => ErrorCode::PatchConflict,
            Self::Validation(_) => ErrorCode::InvalidIntent,
            Self::Io { .. } => ErrorCode::FileWriteFailed,
            Self::QueueClosed => ErrorCode::QueueClosed,
            Self::Aborted => ErrorCode::OperationAborted,
        }
    }

    /// Optional remediation hint for operators and agents.
    #[must_use]
    pub const fn hint(&self) -> Option<&'static str> {
        self.code().hint()
    }
}
