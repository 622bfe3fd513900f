//! Filesystem event translation.
//!
//! Decides what a normalized [`FsEvent`] means for the repository. The
//! translator does not touch the repository itself; it returns the
//! mutations to apply, in order.

use crate::watcher::{FsEvent, FsEventKind};
use resync_core::{is_hidden, resource_key};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// A repository change to apply for one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    /// Index `path` under `key` and publish `created`.
    Create { key: String, path: PathBuf },
    /// Re-index `path` under `key` and publish `updated`.
    Update { key: String, path: PathBuf },
    /// Drop `key` and publish a `deleted` tombstone.
    Delete { key: String },
}

impl Mutation {
    pub fn key(&self) -> &str {
        match self {
            Self::Create { key, .. } | Self::Update { key, .. } | Self::Delete { key } => key,
        }
    }
}

/// Maps filesystem events under one root to repository mutations.
#[derive(Debug, Clone)]
pub struct EventTranslator {
    root: PathBuf,
}

impl EventTranslator {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Translates one event.
    ///
    /// Directory events, events on the root, and hidden basenames yield
    /// nothing. A move yields the create at the destination before the
    /// delete at the source.
    pub fn translate(&self, event: &FsEvent) -> Vec<Mutation> {
        if event.path == self.root && event.dest_path.is_none() {
            return Vec::new();
        }

        if event.is_directory {
            log_directory_event(event);
            return Vec::new();
        }

        match event.kind {
            FsEventKind::Created => self
                .key_for(&event.path)
                .map(|key| Mutation::Create {
                    key,
                    path: event.path.clone(),
                })
                .into_iter()
                .collect(),
            FsEventKind::Modified => self
                .key_for(&event.path)
                .map(|key| Mutation::Update {
                    key,
                    path: event.path.clone(),
                })
                .into_iter()
                .collect(),
            FsEventKind::Deleted => self
                .key_for(&event.path)
                .map(|key| Mutation::Delete { key })
                .into_iter()
                .collect(),
            FsEventKind::Moved => {
                let mut mutations = Vec::with_capacity(2);
                if let Some(dest) = &event.dest_path {
                    if let Some(key) = self.key_for(dest) {
                        mutations.push(Mutation::Create {
                            key,
                            path: dest.clone(),
                        });
                    }
                }
                if let Some(key) = self.key_for(&event.path) {
                    mutations.push(Mutation::Delete { key });
                }
                mutations
            }
        }
    }

    fn key_for(&self, path: &Path) -> Option<String> {
        if is_hidden(path) {
            debug!("Ignoring hidden file {}", path.display());
            return None;
        }
        resource_key(&self.root, path)
    }
}

fn log_directory_event(event: &FsEvent) {
    let name = event
        .path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    match event.kind {
        FsEventKind::Created => info!("Detected creation of directory {}", name),
        FsEventKind::Modified => debug!("Detected update of directory {}", name),
        FsEventKind::Deleted => info!("Detected deletion of directory {}", name),
        FsEventKind::Moved => info!(
            "Detected move of directory {} to {}",
            name,
            event
                .dest_path
                .as_deref()
                .map(|p| p.display().to_string())
                .unwrap_or_default()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn translator() -> EventTranslator {
        EventTranslator::new("/data/root")
    }

    #[test]
    fn test_file_events_map_to_mutations() {
        let t = translator();

        assert_eq!(
            t.translate(&FsEvent::file(FsEventKind::Created, "/data/root/a/b.txt")),
            vec![Mutation::Create {
                key: "a/b.txt".to_string(),
                path: PathBuf::from("/data/root/a/b.txt"),
            }]
        );
        assert_eq!(
            t.translate(&FsEvent::file(FsEventKind::Modified, "/data/root/a.txt")),
            vec![Mutation::Update {
                key: "a.txt".to_string(),
                path: PathBuf::from("/data/root/a.txt"),
            }]
        );
        assert_eq!(
            t.translate(&FsEvent::file(FsEventKind::Deleted, "/data/root/a.txt")),
            vec![Mutation::Delete {
                key: "a.txt".to_string()
            }]
        );
    }

    #[test]
    fn test_move_is_create_then_delete() {
        let t = translator();
        let mutations = t.translate(&FsEvent::moved("/data/root/old.txt", "/data/root/new.txt", false));

        assert_eq!(mutations.len(), 2);
        assert!(matches!(&mutations[0], Mutation::Create { key, .. } if key == "new.txt"));
        assert!(matches!(&mutations[1], Mutation::Delete { key } if key == "old.txt"));
    }

    #[test]
    fn test_move_from_hidden_temp_file_only_creates() {
        let t = translator();
        let mutations = t.translate(&FsEvent::moved("/data/root/.a.txt.swp", "/data/root/a.txt", false));
        assert_eq!(mutations.len(), 1);
        assert_eq!(mutations[0].key(), "a.txt");
    }

    #[test]
    fn test_noise_is_discarded() {
        let t = translator();
        assert!(t.translate(&FsEvent::directory(FsEventKind::Created, "/data/root/sub")).is_empty());
        assert!(t.translate(&FsEvent::file(FsEventKind::Modified, "/data/root")).is_empty());
        assert!(t.translate(&FsEvent::file(FsEventKind::Created, "/data/root/.DS_Store")).is_empty());
        assert!(t.translate(&FsEvent::file(FsEventKind::Created, "/elsewhere/a.txt")).is_empty());
        assert!(t
            .translate(&FsEvent::moved("/data/root/d1", "/data/root/d2", true))
            .is_empty());
    }
}
