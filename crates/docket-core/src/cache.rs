//! Raw file content cache for one backlog root.
//!
//! [`FileCache`] is the engine's only view of "what is on disk". Entries are
//! filled lazily on first [`get`](FileCache::get), overwritten by the
//! changeset writer right after it persists a file, and dropped by an
//! external watcher through [`invalidate`](FileCache::invalidate) when the
//! file changes underneath us.
//!
//! Keys are paths relative to the backlog root using `/` separators.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use crate::error::{EngineError, Missing};

/// Anything the loader and the patch engine can read file content from.
pub trait ContentSource {
    /// Content of `path` (relative to the backlog root).
    ///
    /// # Errors
    ///
    /// [`EngineError::NotFound`] when the file does not exist,
    /// [`EngineError::Io`] when it cannot be read.
    fn read(&self, path: &str) -> Result<Arc<str>, EngineError>;
}

/// Keyed store of relative path → raw text.
///
/// Shared between readers and the single queued writer; every accessor
/// takes `&self`.
#[derive(Debug)]
pub struct FileCache {
    root: PathBuf,
    entries: RwLock<HashMap<String, Arc<str>>>,
}

impl FileCache {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// The backlog root this cache reads from.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path for a cache key.
    #[must_use]
    pub fn path_of(&self, path: &str) -> PathBuf {
        self.root.join(normalize_key(path))
    }

    /// Cached content of `path`, reading it from disk on a miss.
    ///
    /// # Errors
    ///
    /// [`EngineError::NotFound`] if the file is neither cached nor on disk;
    /// [`EngineError::Io`] if reading fails (including non-UTF-8 content).
    pub fn get(&self, path: &str) -> Result<Arc<str>, EngineError> {
        let key = normalize_key(path);
        if let Some(content) = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return Ok(Arc::clone(content));
        }

        let full_path = self.root.join(&key);
        let content: Arc<str> = match fs::read_to_string(&full_path) {
            Ok(content) => content.into(),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(EngineError::not_found(Missing::File, key));
            }
            Err(source) => {
                return Err(EngineError::Io {
                    path: full_path,
                    source,
                });
            }
        };
        tracing::debug!(path = %key, bytes = content.len(), "file cache fill");

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        Ok(Arc::clone(entries.entry(key).or_insert(content)))
    }

    /// Store `content` for `path`, replacing any previous entry.
    pub fn set(&self, path: &str, content: impl Into<Arc<str>>) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(normalize_key(path), content.into());
    }

    /// Drop the entry for `path`. Returns whether one was present.
    pub fn invalidate(&self, path: &str) -> bool {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&normalize_key(path))
            .is_some()
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    #[must_use]
    pub fn is_cached(&self, path: &str) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&normalize_key(path))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ContentSource for FileCache {
    fn read(&self, path: &str) -> Result<Arc<str>, EngineError> {
        self.get(path)
    }
}

/// `./a\b.md` → `a/b.md`.
pub(crate) fn normalize_key(path: &str) -> String {
    let path = path.replace('\\', "/");
    let mut key = path.as_str();
    while let Some(rest) = key.strip_prefix("./") {
        key = rest;
    }
    key.trim_start_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::{FileCache, normalize_key};
    use crate::error::ErrorKind;
    use std::fs;
    use tempfile::TempDir;

    fn setup() -> (TempDir, FileCache) {
        let tmp = TempDir::new().expect("tempdir");
        fs::create_dir_all(tmp.path().join("001-feat-a")).expect("mkdir");
        fs::write(tmp.path().join("001-feat-a/index.md"), "# A\n").expect("write");
        let cache = FileCache::new(tmp.path());
        (tmp, cache)
    }

    #[test]
    fn miss_reads_from_disk_then_hits() {
        let (tmp, cache) = setup();
        assert!(!cache.is_cached("001-feat-a/index.md"));
        assert_eq!(&*cache.get("001-feat-a/index.md").unwrap(), "# A\n");
        assert!(cache.is_cached("001-feat-a/index.md"));

        fs::write(tmp.path().join("001-feat-a/index.md"), "# changed\n").expect("write");
        assert_eq!(
            &*cache.get("001-feat-a/index.md").unwrap(),
            "# A\n",
            "cached entry wins until invalidated"
        );

        assert!(cache.invalidate("001-feat-a/index.md"));
        assert_eq!(&*cache.get("001-feat-a/index.md").unwrap(), "# changed\n");
    }

    #[test]
    fn missing_file_is_not_found() {
        let (_tmp, cache) = setup();
        let err = cache.get("nope/index.md").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(cache.is_empty());
    }

    #[test]
    fn set_overrides_disk() {
        let (_tmp, cache) = setup();
        cache.set("001-feat-a/index.md", "status: in-progress");
        assert_eq!(&*cache.get("001-feat-a/index.md").unwrap(), "status: in-progress");
        cache.set("only/in/cache.md", "x");
        assert_eq!(&*cache.get("only/in/cache.md").unwrap(), "x");
        assert_eq!(cache.len(), 2);
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn keys_are_normalized() {
        assert_eq!(normalize_key("./a\\b.md"), "a/b.md");
        assert_eq!(normalize_key("/a/b.md"), "a/b.md");
        let (_tmp, cache) = setup();
        cache.set("./x/y.md", "1");
        assert!(cache.is_cached("x/y.md"));
    }

    #[test]
    fn caches_are_independent_per_root() {
        let (_a, first) = setup();
        let (_b, second) = setup();
        first.set("001-feat-a/index.md", "first");
        assert_eq!(&*second.get("001-feat-a/index.md").unwrap(), "# A\n");
    }
}
