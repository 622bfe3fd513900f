//! Resource keys.
//!
//! A key is the file's path relative to the watched root, always joined
//! with `/` so the same file gets the same identity on every platform.

use std::path::{Component, Path};

/// Basename prefix that marks a file as hidden.
pub const HIDDEN_MARKER: char = '.';

/// Derives the resource key for `path` under `root`.
///
/// Returns `None` for the root itself and for anything outside it.
pub fn resource_key(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;

    let mut segments = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(segment) => segments.push(segment.to_string_lossy().into_owned()),
            Component::CurDir => {}
            _ => return None,
        }
    }

    if segments.is_empty() {
        None
    } else {
        Some(segments.join("/"))
    }
}

/// Whether the basename of `path` starts with the hidden-file marker.
pub fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .map(|name| name.to_string_lossy().starts_with(HIDDEN_MARKER))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_is_relative_and_slash_joined() {
        let root = Path::new("/data/root");
        let key = resource_key(root, &root.join("a").join("b.txt"));
        assert_eq!(key.as_deref(), Some("a/b.txt"));
    }

    #[test]
    fn test_root_and_outside_paths_have_no_key() {
        let root = Path::new("/data/root");
        assert_eq!(resource_key(root, root), None);
        assert_eq!(resource_key(root, Path::new("/data/other/x")), None);
    }

    #[test]
    fn test_hidden_basenames() {
        assert!(is_hidden(Path::new("/data/.DS_Store")));
        assert!(is_hidden(Path::new("dir/.swp")));
        assert!(!is_hidden(Path::new("/data/.git/config")));
        assert!(!is_hidden(Path::new("/data/file.txt")));
    }
}
