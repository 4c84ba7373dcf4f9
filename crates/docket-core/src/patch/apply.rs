//! Write a changeset to disk and to the cache.

use std::collections::HashMap;
use std::io::Write as _;
use std::path::Path;

use tempfile::NamedTempFile;

use crate::cache::FileCache;
use crate::error::EngineError;
use crate::patch::{Changeset, apply_patch};

/// Apply every patch of `changeset` against the cached content, then persist
/// each touched file and refresh its cache entry.
///
/// All new contents are computed before the first write, so a conflict in
/// any patch leaves every file untouched. A write failure part-way through
/// leaves earlier files written; there is no rollback.
///
/// Returns the paths written, in first-touch order.
///
/// # Errors
///
/// [`EngineError::Conflict`] from any patch, [`EngineError::NotFound`] when a
/// touched file is gone, [`EngineError::Io`] when writing fails.
pub fn apply_changeset(
    cache: &FileCache,
    changeset: &Changeset,
) -> Result<Vec<String>, EngineError> {
    let mut contents: HashMap<&str, String> = HashMap::new();
    for patch in &changeset.patches {
        let current = match contents.remove(patch.file_path.as_str()) {
            Some(content) => content,
            None => cache.get(&patch.file_path)?.to_string(),
        };
        let next = apply_patch(&current, patch).inspect_err(|err| {
            tracing::warn!(path = %patch.file_path, error = %err, "changeset conflict");
        })?;
        contents.insert(&patch.file_path, next);
    }

    let mut written = Vec::new();
    for path in changeset.touched_paths() {
        let Some(content) = contents.remove(path) else {
            continue;
        };
        write_atomic(&cache.path_of(path), &content)?;
        cache.set(path, content);
        written.push(path.to_string());
    }

    tracing::info!(
        patches = changeset.patches.len(),
        files = written.len(),
        "changeset applied"
    );
    Ok(written)
}

/// Write via a sibling temp file and rename, so readers never see a
/// half-written file.
fn write_atomic(path: &Path, content: &str) -> Result<(), EngineError> {
    let io_err = |source| EngineError::Io {
        path: path.to_path_buf(),
        source,
    };
    let dir = path.parent().unwrap_or_else(|| Path::new("."));

    let mut tmp = NamedTempFile::new_in(dir).map_err(io_err)?;
    tmp.write_all(content.as_bytes()).map_err(io_err)?;
    tmp.as_file().sync_all().map_err(io_err)?;
    tmp.persist(path).map_err(|err| io_err(err.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::apply_changeset;
    use crate::cache::FileCache;
    use crate::error::ErrorKind;
    use crate::model::item::{ItemStatus, WorkItem};
    use crate::patch::{Changeset, FilePatch, ModelSnapshot};
    use std::fs;
    use tempfile::TempDir;

    fn snapshot() -> ModelSnapshot {
        ModelSnapshot {
            item: WorkItem {
                slug: "001-feat-a".into(),
                item_type: None,
                title: "A".into(),
                status: ItemStatus::Open,
                valid: true,
                source: "001-feat-a/index.md".into(),
                refs: Vec::new(),
                tasks: Vec::new(),
                tasks_section: None,
            },
            manifest: None,
        }
    }

    fn changeset(patches: Vec<(&str, &str, &str)>) -> Changeset {
        Changeset {
            patches: patches
                .into_iter()
                .map(|(path, original, replacement)| FilePatch {
                    file_path: path.into(),
                    original: original.into(),
                    replacement: replacement.into(),
                    description: "test".into(),
                })
                .collect(),
            model_before: snapshot(),
            model_after: snapshot(),
        }
    }

    fn setup() -> (TempDir, FileCache) {
        let tmp = TempDir::new().expect("tempdir");
        fs::create_dir_all(tmp.path().join("001-feat-a")).expect("mkdir");
        fs::write(tmp.path().join("001-feat-a/01.md"), "status: open\n").expect("write");
        fs::write(tmp.path().join("manifest.md"), "- a: open\n- a/01: open\n").expect("write");
        let cache = FileCache::new(tmp.path());
        (tmp, cache)
    }

    #[test]
    fn writes_disk_and_cache() {
        let (tmp, cache) = setup();
        let written = apply_changeset(
            &cache,
            &changeset(vec![
                ("001-feat-a/01.md", "status: open", "status: done"),
                ("manifest.md", "- a/01: open", "- a/01: done"),
                ("manifest.md", "- a: open", "- a: done"),
            ]),
        )
        .expect("apply");

        assert_eq!(written, vec!["001-feat-a/01.md", "manifest.md"]);
        let on_disk = fs::read_to_string(tmp.path().join("manifest.md")).expect("read");
        assert_eq!(on_disk, "- a: done\n- a/01: done\n");
        assert_eq!(&*cache.get("manifest.md").unwrap(), on_disk);
        assert_eq!(&*cache.get("001-feat-a/01.md").unwrap(), "status: done\n");
    }

    #[test]
    fn conflict_writes_nothing() {
        let (tmp, cache) = setup();
        let err = apply_changeset(
            &cache,
            &changeset(vec![
                ("001-feat-a/01.md", "status: open", "status: done"),
                ("manifest.md", "- a/01: review", "- a/01: done"),
            ]),
        )
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Conflict);
        let task = fs::read_to_string(tmp.path().join("001-feat-a/01.md")).expect("read");
        assert_eq!(task, "status: open\n");
    }

    #[test]
    fn cache_is_the_baseline() {
        let (_tmp, cache) = setup();
        cache.set("001-feat-a/01.md", "status: review\n");
        let err = apply_changeset(
            &cache,
            &changeset(vec![("001-feat-a/01.md", "status: open", "status: done")]),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }
}
