//! One handle per backlog root.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::cache::FileCache;
use crate::config::{BacklogConfig, load_backlog_config};
use crate::error::{EngineError, ErrorCode};
use crate::load::{LoadedBacklog, load_backlog, load_scope};
use crate::model::dto::BacklogOutput;
use crate::patch::{Changeset, Intent, apply_changeset, build_changeset};
use crate::queue::OperationQueue;

/// Owns the config, file cache and write queue for one backlog root.
///
/// Reads go straight to the cache. Writes go through [`Backlog::apply`],
/// which queues them behind every earlier write.
#[derive(Debug, Clone)]
pub struct Backlog {
    root: PathBuf,
    config: Arc<BacklogConfig>,
    cache: Arc<FileCache>,
    queue: OperationQueue,
}

impl Backlog {
    /// Open the backlog at `root`, reading `.docket.toml` if present.
    ///
    /// Must be called inside a tokio runtime; the write queue's worker is
    /// spawned on it.
    ///
    /// # Errors
    ///
    /// Fails when `root` is not a directory, the config file is invalid, or
    /// no tokio runtime is entered.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        anyhow::ensure!(
            root.is_dir(),
            "{}: backlog root {} is not a directory",
            ErrorCode::FileNotFound.code(),
            root.display()
        );
        let config = load_backlog_config(&root)
            .with_context(|| format!("Failed to open backlog at {}", root.display()))?;
        let backlog = Self::with_config(root, config)?;
        tracing::info!(root = %backlog.root.display(), "backlog opened");
        Ok(backlog)
    }

    /// Open with an explicit config, skipping `.docket.toml`.
    ///
    /// # Errors
    ///
    /// Fails when no tokio runtime is entered.
    pub fn with_config(root: impl Into<PathBuf>, config: BacklogConfig) -> Result<Self> {
        let root = root.into();
        let queue = OperationQueue::try_new().with_context(|| {
            format!(
                "{}: cannot start the write queue for {}",
                ErrorCode::NoRuntime.code(),
                root.display()
            )
        })?;
        Ok(Self {
            cache: Arc::new(FileCache::new(root.clone())),
            config: Arc::new(config),
            queue,
            root,
        })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn config(&self) -> &BacklogConfig {
        &self.config
    }

    /// The shared cache; a file watcher calls `invalidate` on it.
    #[must_use]
    pub fn cache(&self) -> &Arc<FileCache> {
        &self.cache
    }

    /// Parse the whole backlog from the cache. Not queued.
    ///
    /// # Errors
    ///
    /// Only when the root directory cannot be listed.
    pub fn load(&self) -> Result<LoadedBacklog, EngineError> {
        load_backlog(&self.cache, &self.config)
    }

    /// The read response for transports.
    ///
    /// # Errors
    ///
    /// Same as [`Backlog::load`].
    pub fn snapshot(&self) -> Result<BacklogOutput, EngineError> {
        self.load().map(|loaded| loaded.output())
    }

    /// Plan `intent` against current content without writing anything.
    ///
    /// # Errors
    ///
    /// Anything [`build_changeset`] returns.
    pub fn plan(&self, intent: &Intent) -> Result<Changeset, EngineError> {
        plan_with(&self.cache, &self.config, intent)
    }

    /// Plan and write `intent` once every earlier write has finished.
    ///
    /// Returns the applied changeset; an empty one means nothing needed to
    /// change.
    ///
    /// # Errors
    ///
    /// Planning errors, [`EngineError::Conflict`] when a file changed under
    /// the plan, I/O errors from writing, and queue failures.
    pub async fn apply(&self, intent: Intent) -> Result<Changeset, EngineError> {
        let cache = Arc::clone(&self.cache);
        let config = Arc::clone(&self.config);
        self.queue
            .enqueue(move || async move {
                let changeset = plan_with(&cache, &config, &intent)?;
                if !changeset.is_empty() {
                    apply_changeset(&cache, &changeset)?;
                }
                tracing::info!(
                    op = intent.name(),
                    task = %intent.task(),
                    patches = changeset.patches.len(),
                    "intent applied"
                );
                Ok::<_, EngineError>(changeset)
            })
            .await
    }
}

fn plan_with(
    cache: &FileCache,
    config: &BacklogConfig,
    intent: &Intent,
) -> Result<Changeset, EngineError> {
    let model = load_scope(cache, config, &intent.task().slug)?;
    build_changeset(intent, &model, cache, config)
}

#[cfg(test)]
mod tests {
    use super::Backlog;
    use crate::config::CONFIG_FILE;
    use std::fs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn open_reads_config() {
        let tmp = TempDir::new().expect("tempdir");
        fs::write(tmp.path().join(CONFIG_FILE), "[manifest]\nsync = false\n").expect("write");
        let backlog = Backlog::open(tmp.path()).expect("open");
        assert!(!backlog.config().manifest.sync);
        assert_eq!(backlog.root(), tmp.path());
        assert!(backlog.snapshot().expect("snapshot").work.is_empty());
    }

    #[tokio::test]
    async fn open_rejects_missing_root() {
        let tmp = TempDir::new().expect("tempdir");
        let err = Backlog::open(tmp.path().join("nope")).unwrap_err();
        assert!(format!("{err:#}").contains("E2003"));
    }

    #[test]
    fn open_outside_a_runtime_is_an_error() {
        let tmp = TempDir::new().expect("tempdir");
        let err = Backlog::open(tmp.path()).unwrap_err();
        assert!(format!("{err:#}").contains("E9003"), "{err:#}");
    }
}
