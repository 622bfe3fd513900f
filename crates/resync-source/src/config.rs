//! Source configuration.

use resync_core::{ResyncError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Port assumed when deriving a base URI for a local source.
pub const DEFAULT_PORT: u16 = 8888;

/// `http://localhost:<port>`.
pub fn base_uri_for_port(port: u16) -> String {
    format!("http://localhost:{}", port)
}

fn default_base_uri() -> String {
    base_uri_for_port(DEFAULT_PORT)
}

fn default_resource_list_path() -> String {
    "resourcelist.xml".to_string()
}

fn default_poll_interval_ms() -> u64 {
    250
}

/// Everything a [`crate::Source`] needs to know about its environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// The watched root.
    pub folder: PathBuf,

    /// Base of every published URI, without a trailing `/`.
    #[serde(default = "default_base_uri")]
    pub base_uri: String,

    /// Path of the resource list document under `base_uri`.
    #[serde(default = "default_resource_list_path")]
    pub resource_list_path: String,

    /// Overrides `<base_uri>/.well-known/resourcesync`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_description_uri: Option<String>,

    /// Follow symbolic links during the startup walk.
    #[serde(default)]
    pub follow_symlinks: bool,

    /// How often the watch thread wakes up when no events arrive.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl SourceConfig {
    pub fn new(folder: impl Into<PathBuf>, base_uri: impl Into<String>) -> Self {
        Self {
            folder: folder.into(),
            base_uri: base_uri.into(),
            resource_list_path: default_resource_list_path(),
            source_description_uri: None,
            follow_symlinks: false,
            poll_interval_ms: default_poll_interval_ms(),
        }
    }

    /// Reads a JSON configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|e| ResyncError::io(path, e))?;
        serde_json::from_str(&raw)
            .map_err(|e| ResyncError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Canonicalizes the folder and normalizes the base URI.
    ///
    /// Event paths are compared against the canonical root, so this must
    /// run before the source is built.
    pub fn validate(mut self) -> Result<Self> {
        let folder = fs::canonicalize(&self.folder).map_err(|e| {
            ResyncError::Config(format!("cannot open folder '{}': {}", self.folder.display(), e))
        })?;
        if !folder.is_dir() {
            return Err(ResyncError::Config(format!(
                "'{}' is not a directory",
                folder.display()
            )));
        }
        self.folder = folder;

        self.base_uri = self.base_uri.trim_end_matches('/').to_string();
        if self.base_uri.is_empty() {
            self.base_uri = default_base_uri();
        }
        self.resource_list_path = self.resource_list_path.trim_start_matches('/').to_string();

        Ok(self)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_load_applies_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "folder": "/srv/data" }"#).unwrap();

        let config = SourceConfig::load(&path).unwrap();
        assert_eq!(config.folder, PathBuf::from("/srv/data"));
        assert_eq!(config.base_uri, "http://localhost:8888");
        assert_eq!(config.resource_list_path, "resourcelist.xml");
        assert_eq!(config.poll_interval(), Duration::from_millis(250));
        assert!(!config.follow_symlinks);
    }

    #[test]
    fn test_load_rejects_bad_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ folder: ").unwrap();

        assert!(matches!(
            SourceConfig::load(&path).unwrap_err(),
            ResyncError::Config(_)
        ));
    }

    #[test]
    fn test_validate_normalizes() {
        let dir = tempdir().unwrap();
        let config = SourceConfig::new(dir.path(), "http://example.org/sync/")
            .validate()
            .unwrap();

        assert_eq!(config.base_uri, "http://example.org/sync");
        assert_eq!(config.folder, fs::canonicalize(dir.path()).unwrap());
    }

    #[test]
    fn test_validate_rejects_missing_or_file_root() {
        let dir = tempdir().unwrap();
        assert!(SourceConfig::new(dir.path().join("missing"), "http://x")
            .validate()
            .is_err());

        let file = dir.path().join("file.txt");
        fs::write(&file, "x").unwrap();
        assert!(SourceConfig::new(&file, "http://x").validate().is_err());
    }
}
