//! Startup indexing.
//!
//! Walks the watched root once and seeds the repository with every
//! regular, non-hidden file. Nothing is published to the change feed here:
//! consumers learn the initial state from a snapshot.

use ignore::{Walk, WalkBuilder};
use resync_core::{is_hidden, resource_key, Repository, ResourceEntry, ResyncError};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Result of indexing a directory.
#[derive(Debug, Default)]
pub struct IndexResult {
    /// Number of files put into the repository.
    pub files_indexed: usize,

    /// Number of files skipped because their basename is hidden.
    pub hidden_skipped: usize,

    /// Time taken in milliseconds.
    pub duration_ms: u64,

    /// Files that could not be read or hashed.
    pub errors: Vec<(String, String)>,
}

/// Options for directory indexing.
#[derive(Debug, Clone, Default)]
pub struct IndexOptions {
    /// Follow symbolic links when walking directories.
    pub follow_symlinks: bool,
}

/// Indexes `root` into `repository`.
///
/// Hidden directories are still descended into; only files whose own
/// basename is hidden are skipped. Ignore files are not consulted. A file
/// that cannot be read is reported in [`IndexResult::errors`] and does not
/// stop the walk.
///
/// # Example
///
/// ```no_run
/// use resync_core::Repository;
/// use resync_watcher::{index_directory, IndexOptions};
/// use std::path::Path;
///
/// let repository = Repository::new();
/// let result = index_directory(Path::new("./data"), &repository, IndexOptions::default()).unwrap();
/// println!("Indexed {} files", result.files_indexed);
/// ```
pub fn index_directory(
    root: &Path,
    repository: &Repository,
    options: IndexOptions,
) -> resync_core::Result<IndexResult> {
    let start = Instant::now();
    let mut result = IndexResult::default();

    let metadata = std::fs::metadata(root).map_err(|e| ResyncError::io(root, e))?;
    if !metadata.is_dir() {
        return Err(ResyncError::Config(format!(
            "'{}' is not a directory",
            root.display()
        )));
    }

    info!("Starting index of {}", root.display());

    for entry in walker(root, options.follow_symlinks) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Failed to walk entry under {}: {}", root.display(), e);
                result.errors.push((root.display().to_string(), e.to_string()));
                continue;
            }
        };
        let path = entry.path();

        if !path.is_file() {
            continue;
        }

        if is_hidden(path) {
            debug!("Skipping hidden file {}", path.display());
            result.hidden_skipped += 1;
            continue;
        }

        let key = match resource_key(root, path) {
            Some(key) => key,
            None => continue,
        };

        match ResourceEntry::from_file(path) {
            Ok(resource_entry) => {
                debug!("Indexed {}", key);
                repository.put(key, resource_entry);
                result.files_indexed += 1;
            }
            Err(e) => {
                warn!("Failed to index {}: {}", path.display(), e);
                result.errors.push((path.display().to_string(), e.to_string()));
            }
        }
    }

    let duration = start.elapsed();
    result.duration_ms = duration.as_millis() as u64;

    info!(
        "Indexed {} files ({} hidden skipped, {} errors) in {:?}",
        result.files_indexed,
        result.hidden_skipped,
        result.errors.len(),
        duration
    );

    Ok(result)
}

/// Every regular file below `dir`, hidden ones included.
///
/// Used to expand a directory that appeared in one piece (moved in or
/// renamed) into per-file events. Unreadable entries are logged and skipped.
pub(crate) fn files_under(dir: &Path) -> Vec<PathBuf> {
    walker(dir, false)
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry.into_path()),
            Err(e) => {
                warn!("Failed to walk entry under {}: {}", dir.display(), e);
                None
            }
        })
        .filter(|path| path.is_file())
        .collect()
}

fn walker(root: &Path, follow_symlinks: bool) -> Walk {
    WalkBuilder::new(root)
        .standard_filters(false)
        .follow_links(follow_symlinks)
        .build()
}
