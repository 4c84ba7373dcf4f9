use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ErrorCode;

/// File name of the optional per-backlog config, relative to the root.
pub const CONFIG_FILE: &str = ".docket.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BacklogConfig {
    #[serde(default)]
    pub layout: LayoutConfig,
    #[serde(default)]
    pub manifest: ManifestConfig,
    #[serde(default)]
    pub validation: ValidationConfig,
}

/// Where things live inside the backlog root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutConfig {
    #[serde(default = "default_index_file")]
    pub index_file: String,
    #[serde(default = "default_manifest_file")]
    pub manifest_file: String,
    #[serde(default = "default_task_extension")]
    pub task_extension: String,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            index_file: default_index_file(),
            manifest_file: default_manifest_file(),
            task_extension: default_task_extension(),
        }
    }
}

impl LayoutConfig {
    /// Relative path of an item's index file.
    #[must_use]
    pub fn index_path(&self, slug: &str) -> String {
        format!("{slug}/{}", self.index_file)
    }

    /// Relative path of a task file.
    #[must_use]
    pub fn task_path(&self, slug: &str, task_id: &str) -> String {
        format!("{slug}/{task_id}.{}", self.task_extension)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestConfig {
    /// Patch manifest lines whenever a task status change is applied.
    #[serde(default = "default_true")]
    pub sync: bool,
}

impl Default for ManifestConfig {
    fn default() -> Self {
        Self {
            sync: default_true(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Warn about task files that no index lists.
    #[serde(default = "default_true")]
    pub warn_unlisted_tasks: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            warn_unlisted_tasks: default_true(),
        }
    }
}

/// Load `<root>/.docket.toml`, or defaults when it does not exist.
///
/// # Errors
///
/// Fails when the file exists but cannot be read or parsed.
pub fn load_backlog_config(root: &Path) -> Result<BacklogConfig> {
    let path = root.join(CONFIG_FILE);
    if !path.exists() {
        return Ok(BacklogConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<BacklogConfig>(&content).with_context(|| {
        format!(
            "{}: failed to parse {}",
            ErrorCode::ConfigParseError.code(),
            path.display()
        )
    })
}

fn default_true() -> bool {
    true
}

fn default_index_file() -> String {
    "index.md".to_string()
}

fn default_manifest_file() -> String {
    "manifest.md".to_string()
}

fn default_task_extension() -> String {
    "md".to_string()
}

#[cfg(test)]
mod tests {
    use super::{BacklogConfig, CONFIG_FILE, load_backlog_config};
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn missing_file_yields_defaults() {
        let tmp = TempDir::new().expect("tempdir");
        let config = load_backlog_config(tmp.path()).expect("load");
        assert_eq!(config, BacklogConfig::default());
        assert_eq!(config.layout.index_file, "index.md");
        assert_eq!(config.layout.manifest_file, "manifest.md");
        assert!(config.manifest.sync);
        assert!(config.validation.warn_unlisted_tasks);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let tmp = TempDir::new().expect("tempdir");
        fs::write(
            tmp.path().join(CONFIG_FILE),
            "[layout]\nindex_file = \"README.md\"\n\n[manifest]\nsync = false\n",
        )
        .expect("write");

        let config = load_backlog_config(tmp.path()).expect("load");
        assert_eq!(config.layout.index_file, "README.md");
        assert_eq!(config.layout.task_extension, "md");
        assert!(!config.manifest.sync);
        assert!(config.validation.warn_unlisted_tasks);
        assert_eq!(config.layout.index_path("001-feat-a"), "001-feat-a/README.md");
        assert_eq!(config.layout.task_path("001-feat-a", "01"), "001-feat-a/01.md");
    }

    #[test]
    fn malformed_file_reports_code_and_path() {
        let tmp = TempDir::new().expect("tempdir");
        fs::write(tmp.path().join(CONFIG_FILE), "[layout\n").expect("write");

        let err = load_backlog_config(tmp.path()).unwrap_err();
        let message = format!("{err:#}");
        assert!(message.contains("E1002"), "{message}");
        assert!(message.contains(CONFIG_FILE), "{message}");
    }
}
