//! docket-core: the document engine behind a file-based task backlog.
//!
//! A backlog is a directory of work items, one sub-directory each, holding an
//! `index.md` and one file per task, plus an optional `manifest.md` at the
//! root. This crate parses those files into a [`model::BacklogModel`],
//! derives item status from task status, and edits the files through
//! exact-match patches planned as one [`patch::Changeset`] per mutation.
//!
//! # Conventions
//!
//! - **Errors**: [`error::EngineError`] (`thiserror`) for engine operations,
//!   `anyhow::Result` for config loading and [`Backlog::open`].
//! - **Logging**: `tracing` macros only; the crate never installs a
//!   subscriber.
//! - **Parse defects** are [`parse::ValidationIssue`] values, never errors.

pub mod backlog;
pub mod cache;
pub mod config;
pub mod error;
pub mod load;
pub mod model;
pub mod parse;
pub mod patch;
pub mod queue;

pub use backlog::Backlog;
pub use cache::{ContentSource, FileCache};
pub use config::BacklogConfig;
pub use error::{EngineError, ErrorCode, ErrorKind};
pub use load::LoadedBacklog;
pub use model::status::derive_status;
pub use patch::{Changeset, FilePatch, Intent, TaskKey};
pub use queue::OperationQueue;
