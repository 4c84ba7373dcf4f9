// Shared helpers, pulled into other test files with #[path = "fixtures.rs"].
#![allow(dead_code)]

use docket_core::error::Missing;
use docket_core::patch::apply_patch;
use docket_core::{Changeset, ContentSource, EngineError};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

pub const LOGIN: &str = "001-feat-login";

pub fn write(root: &Path, path: &str, content: &str) {
    let full = root.join(path);
    fs::create_dir_all(full.parent().expect("parent")).expect("mkdir");
    fs::write(full, content).expect("write");
}

pub fn read(root: &Path, path: &str) -> String {
    fs::read_to_string(root.join(path)).expect("read")
}

pub fn task_file(id: &str, title: &str, status: &str) -> String {
    format!(
        "---\nid: {id}\ntitle: {title}\nstatus: {status}\n---\n\n## Description\n\nWork for {id}.\n\n## Acceptance Criteria\n\n- [ ] reviewed\n"
    )
}

/// `001-feat-login` with one task per state plus a manifest that agrees.
pub fn login_backlog() -> TempDir {
    let tmp = TempDir::new().expect("tempdir");
    let root = tmp.path();
    write(
        root,
        "001-feat-login/index.md",
        "# Login\n\n## Tasks\n\n- [x] 01-schema: Schema\n- [ ] 02-api: API\n- [ ] 03-ui: UI\n",
    );
    write(root, "001-feat-login/01-schema.md", &task_file("01-schema", "Schema", "done"));
    write(root, "001-feat-login/02-api.md", &task_file("02-api", "API", "in-progress"));
    write(root, "001-feat-login/03-ui.md", &task_file("03-ui", "UI", "open"));
    write(
        root,
        "manifest.md",
        "# Manifest\n\n- 001-feat-login: in-progress\n- 001-feat-login/01-schema: done\n- 001-feat-login/02-api: in-progress\n- 001-feat-login/03-ui: open\n",
    );
    tmp
}

/// In-memory file tree for planning without a disk.
#[derive(Debug, Default, Clone)]
pub struct MemoryFiles(pub HashMap<String, String>);

impl MemoryFiles {
    pub fn with(mut self, path: &str, content: &str) -> Self {
        self.0.insert(path.to_string(), content.to_string());
        self
    }

    pub fn apply(&mut self, changeset: &Changeset) -> Result<(), EngineError> {
        for patch in &changeset.patches {
            let current = self
                .0
                .get(&patch.file_path)
                .ok_or_else(|| EngineError::NotFound {
                    what: Missing::File,
                    id: patch.file_path.clone(),
                })?;
            let next = apply_patch(current, patch)?;
            self.0.insert(patch.file_path.clone(), next);
        }
        Ok(())
    }
}

impl ContentSource for MemoryFiles {
    fn read(&self, path: &str) -> Result<Arc<str>, EngineError> {
        self.0
            .get(path)
            .map(|content| Arc::from(content.as_str()))
            .ok_or_else(|| EngineError::NotFound {
                what: Missing::File,
                id: path.to_string(),
            })
    }
}
