//! File watcher for live updates.
//!
//! Uses the notify crate to watch the root recursively and normalizes its
//! backend-specific events into [`FsEvent`]s: created, modified, deleted,
//! or moved, each flagged file vs directory.

use crate::error::WatchError;
use crate::indexer::files_under;
use notify::event::{CreateKind, ModifyKind, RemoveKind, RenameMode};
use notify::{Event, EventKind, RecursiveMode, Watcher};
use resync_core::{resource_key, Repository};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Kind of filesystem change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsEventKind {
    Created,
    Modified,
    Deleted,
    Moved,
}

/// A normalized filesystem event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsEvent {
    pub kind: FsEventKind,
    pub is_directory: bool,
    pub path: PathBuf,
    /// Destination of a move. Only set for [`FsEventKind::Moved`].
    pub dest_path: Option<PathBuf>,
}

impl FsEvent {
    pub fn file(kind: FsEventKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            is_directory: false,
            path: path.into(),
            dest_path: None,
        }
    }

    pub fn directory(kind: FsEventKind, path: impl Into<PathBuf>) -> Self {
        Self {
            is_directory: true,
            ..Self::file(kind, path)
        }
    }

    pub fn moved(from: impl Into<PathBuf>, to: impl Into<PathBuf>, is_directory: bool) -> Self {
        Self {
            kind: FsEventKind::Moved,
            is_directory,
            path: from.into(),
            dest_path: Some(to.into()),
        }
    }
}

/// Turns raw notify events into [`FsEvent`]s.
///
/// The interesting part is renames. inotify reports a rename as a `From`
/// and a `To` sharing a tracker, followed by a `Both` that repeats them.
/// The `From` is held until its `To` shows up and the pair becomes one
/// `Moved`; the tracked `Both` is then dropped. A `From` that never gets a
/// partner was moved out of the tree and is flushed as `Deleted`.
///
/// A directory that moves reports nothing for its contents, so the
/// normalizer expands it into per-file events. Files that arrived with it
/// are found by walking the disk; files that left with it are found in the
/// repository. A plain directory create is not expanded, files written into
/// it get their own events.
#[derive(Debug)]
pub struct EventNormalizer {
    root: PathBuf,
    repository: Arc<Repository>,
    pending_from: Vec<(usize, PathBuf)>,
}

impl EventNormalizer {
    pub fn new(root: impl Into<PathBuf>, repository: Arc<Repository>) -> Self {
        Self {
            root: root.into(),
            repository,
            pending_from: Vec::new(),
        }
    }

    /// Normalizes one raw event.
    pub fn push(&mut self, event: Event) -> Vec<FsEvent> {
        let mut out = Vec::new();

        let is_rename_tail = matches!(
            event.kind,
            EventKind::Modify(ModifyKind::Name(RenameMode::To | RenameMode::Both))
        );
        if !is_rename_tail {
            out.extend(self.flush());
        }

        match event.kind {
            EventKind::Create(kind) => {
                for path in event.paths {
                    let is_dir = match kind {
                        CreateKind::Folder => true,
                        CreateKind::File => false,
                        _ => path.is_dir(),
                    };
                    out.push(event_for(FsEventKind::Created, path, is_dir));
                }
            }
            EventKind::Remove(kind) => {
                for path in event.paths {
                    self.deleted(path, matches!(kind, RemoveKind::Folder), &mut out);
                }
            }
            EventKind::Modify(ModifyKind::Name(mode)) => {
                self.push_rename(mode, event.tracker(), event.paths, &mut out)
            }
            EventKind::Modify(_) => {
                for path in event.paths {
                    let is_dir = path.is_dir();
                    out.push(event_for(FsEventKind::Modified, path, is_dir));
                }
            }
            EventKind::Access(_) | EventKind::Any | EventKind::Other => {}
        }

        out
    }

    /// Emits every held `From` as a deletion.
    pub fn flush(&mut self) -> Vec<FsEvent> {
        let mut out = Vec::new();
        for (_, path) in std::mem::take(&mut self.pending_from) {
            debug!("Rename source {} left the tree", path.display());
            self.deleted(path, false, &mut out);
        }
        out
    }

    fn push_rename(
        &mut self,
        mode: RenameMode,
        tracker: Option<usize>,
        paths: Vec<PathBuf>,
        out: &mut Vec<FsEvent>,
    ) {
        match (mode, tracker) {
            (RenameMode::From, Some(tracker)) => {
                for path in paths {
                    self.pending_from.push((tracker, path));
                }
            }
            (RenameMode::From, None) => {
                for path in paths {
                    self.deleted(path, false, out);
                }
            }
            (RenameMode::To, tracker) => {
                for path in paths {
                    let from = tracker.and_then(|t| {
                        let index = self.pending_from.iter().position(|(p, _)| *p == t)?;
                        Some(self.pending_from.remove(index).1)
                    });
                    match from {
                        Some(from) => self.moved(from, path, out),
                        None => self.appeared(path, out),
                    }
                }
            }
            (RenameMode::Both, Some(_)) => {}
            (RenameMode::Both, None) => {
                if let [from, to] = paths.as_slice() {
                    self.moved(from.clone(), to.clone(), out);
                }
            }
            (RenameMode::Any | RenameMode::Other, _) => {
                for path in paths {
                    if path.exists() {
                        self.appeared(path, out);
                    } else {
                        self.deleted(path, false, out);
                    }
                }
            }
        }
    }

    /// `path` showed up from outside the tree.
    fn appeared(&self, path: PathBuf, out: &mut Vec<FsEvent>) {
        if !path.is_dir() {
            out.push(FsEvent::file(FsEventKind::Created, path));
            return;
        }

        let files = files_under(&path);
        debug!("Directory {} arrived with {} files", path.display(), files.len());
        out.push(FsEvent::directory(FsEventKind::Created, path));
        out.extend(
            files
                .into_iter()
                .map(|file| FsEvent::file(FsEventKind::Created, file)),
        );
    }

    /// `path` is gone, either deleted or moved out of the tree.
    fn deleted(&self, path: PathBuf, is_directory: bool, out: &mut Vec<FsEvent>) {
        let nested = self.indexed_under(&path);
        out.push(event_for(
            FsEventKind::Deleted,
            path,
            is_directory || !nested.is_empty(),
        ));
        out.extend(
            nested
                .into_iter()
                .map(|file| FsEvent::file(FsEventKind::Deleted, file)),
        );
    }

    /// `from` was renamed to `to` inside the tree.
    ///
    /// For a directory each file found under `to` moves from the matching
    /// path under `from`. Indexed files under `from` with no counterpart
    /// are reported deleted.
    fn moved(&self, from: PathBuf, to: PathBuf, out: &mut Vec<FsEvent>) {
        if !to.is_dir() {
            out.push(FsEvent::moved(from, to, false));
            return;
        }

        let mut stale: Vec<PathBuf> = self.indexed_under(&from);
        let files = files_under(&to);
        debug!(
            "Directory {} moved to {} with {} files",
            from.display(),
            to.display(),
            files.len()
        );
        out.push(FsEvent::moved(from.clone(), to.clone(), true));

        for file in files {
            let old = match file.strip_prefix(&to) {
                Ok(relative) => from.join(relative),
                Err(_) => continue,
            };
            stale.retain(|path| *path != old);
            out.push(FsEvent::moved(old, file, false));
        }

        out.extend(
            stale
                .into_iter()
                .map(|file| FsEvent::file(FsEventKind::Deleted, file)),
        );
    }

    /// Paths of indexed files nested under the directory `path`.
    fn indexed_under(&self, path: &Path) -> Vec<PathBuf> {
        let prefix = match resource_key(&self.root, path) {
            Some(prefix) => prefix,
            None => return Vec::new(),
        };
        if self.repository.contains(&prefix) {
            return Vec::new();
        }
        self.repository
            .keys_under(&prefix)
            .into_iter()
            .map(|key| self.root.join(key))
            .collect()
    }
}

fn event_for(kind: FsEventKind, path: PathBuf, is_directory: bool) -> FsEvent {
    FsEvent {
        kind,
        is_directory,
        path,
        dest_path: None,
    }
}

/// Watches a directory tree for changes.
pub struct FileWatcher {
    #[allow(dead_code)]
    watcher: notify::RecommendedWatcher,
    receiver: Receiver<notify::Result<Event>>,
    normalizer: EventNormalizer,
    ready: VecDeque<FsEvent>,
}

impl FileWatcher {
    /// Attaches a recursive watcher to `root`.
    ///
    /// `repository` is only read, to expand directories that leave the
    /// tree. Failing here is fatal for a source: it must not go on serving a
    /// repository that will never see updates.
    pub fn new(root: &Path, repository: Arc<Repository>) -> Result<Self, WatchError> {
        let (tx, rx) = channel();

        let setup = |source: notify::Error| WatchError::Setup {
            root: root.to_path_buf(),
            source,
        };

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            if tx.send(res).is_err() {
                debug!("Watch receiver dropped, discarding event");
            }
        })
        .map_err(setup)?;

        watcher
            .watch(root, RecursiveMode::Recursive)
            .map_err(setup)?;

        info!("Watching {} for changes", root.display());

        Ok(Self {
            watcher,
            receiver: rx,
            normalizer: EventNormalizer::new(root, repository),
            ready: VecDeque::new(),
        })
    }

    /// Returns any pending changes without blocking.
    pub fn poll(&mut self) -> Vec<FsEvent> {
        while let Ok(res) = self.receiver.try_recv() {
            self.ingest(res);
        }
        self.ready.drain(..).collect()
    }

    /// Waits up to `timeout` for the next change.
    ///
    /// `None` means nothing usable arrived; unpaired rename sources are
    /// flushed as deletions on a quiet tick.
    pub fn recv_timeout(&mut self, timeout: Duration) -> Option<FsEvent> {
        if let Some(event) = self.ready.pop_front() {
            return Some(event);
        }

        match self.receiver.recv_timeout(timeout) {
            Ok(res) => self.ingest(res),
            Err(RecvTimeoutError::Timeout) => {
                let flushed = self.normalizer.flush();
                self.ready.extend(flushed);
            }
            Err(RecvTimeoutError::Disconnected) => warn!("Watch channel disconnected"),
        }

        self.ready.pop_front()
    }

    fn ingest(&mut self, res: notify::Result<Event>) {
        match res {
            Ok(event) => {
                let normalized = self.normalizer.push(event);
                self.ready.extend(normalized);
            }
            Err(e) => warn!("Watch error: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use notify::event::{DataChange, MetadataKind};
    use resync_core::ResourceEntry;
    use std::fs;
    use std::time::Instant;
    use tempfile::tempdir;

    fn rename(mode: RenameMode, path: &Path, tracker: usize) -> Event {
        Event::new(EventKind::Modify(ModifyKind::Name(mode)))
            .add_path(path.to_path_buf())
            .set_tracker(tracker)
    }

    fn indexed(keys: &[&str]) -> Arc<Repository> {
        let repository = Arc::new(Repository::new());
        for key in keys {
            repository.put(*key, ResourceEntry::from_bytes(key.as_bytes(), Utc::now()));
        }
        repository
    }

    fn normalizer(root: impl Into<PathBuf>) -> EventNormalizer {
        EventNormalizer::new(root, Arc::new(Repository::new()))
    }

    fn raw(kind: EventKind, paths: &[&str]) -> Event {
        paths
            .iter()
            .fold(Event::new(kind), |event, p| event.add_path(PathBuf::from(p)))
    }

    #[test]
    fn test_create_modify_remove() {
        let mut n = normalizer("/r");

        let out = n.push(raw(EventKind::Create(CreateKind::File), &["/r/a"]));
        assert_eq!(out, vec![FsEvent::file(FsEventKind::Created, "/r/a")]);

        let out = n.push(raw(
            EventKind::Modify(ModifyKind::Data(DataChange::Content)),
            &["/r/a"],
        ));
        assert_eq!(out, vec![FsEvent::file(FsEventKind::Modified, "/r/a")]);

        let out = n.push(raw(
            EventKind::Modify(ModifyKind::Metadata(MetadataKind::WriteTime)),
            &["/r/a"],
        ));
        assert_eq!(out[0].kind, FsEventKind::Modified);

        let out = n.push(raw(EventKind::Remove(RemoveKind::Folder), &["/r/d"]));
        assert_eq!(out, vec![FsEvent::directory(FsEventKind::Deleted, "/r/d")]);
    }

    #[test]
    fn test_access_events_are_dropped() {
        let mut n = normalizer("/r");
        let out = n.push(raw(
            EventKind::Access(notify::event::AccessKind::Any),
            &["/r/a"],
        ));
        assert!(out.is_empty());
    }

    #[test]
    fn test_tracked_rename_becomes_single_move() {
        let mut n = normalizer("/r");
        let from = raw(EventKind::Modify(ModifyKind::Name(RenameMode::From)), &["/r/a"]).set_tracker(7);
        let to = raw(EventKind::Modify(ModifyKind::Name(RenameMode::To)), &["/r/b"]).set_tracker(7);
        let both = raw(
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
            &["/r/a", "/r/b"],
        )
        .set_tracker(7);

        assert!(n.push(from).is_empty());
        assert_eq!(n.push(to), vec![FsEvent::moved("/r/a", "/r/b", false)]);
        assert!(n.push(both).is_empty());
        assert!(n.flush().is_empty());
    }

    #[test]
    fn test_unpaired_renames() {
        let mut n = normalizer("/r");

        // moved out of the tree
        let from = raw(EventKind::Modify(ModifyKind::Name(RenameMode::From)), &["/r/a"]).set_tracker(1);
        assert!(n.push(from).is_empty());
        assert_eq!(n.flush(), vec![FsEvent::file(FsEventKind::Deleted, "/r/a")]);

        // moved into the tree
        let to = raw(EventKind::Modify(ModifyKind::Name(RenameMode::To)), &["/r/b"]).set_tracker(2);
        assert_eq!(n.push(to), vec![FsEvent::file(FsEventKind::Created, "/r/b")]);
    }

    #[test]
    fn test_pending_from_flushed_before_next_event() {
        let mut n = normalizer("/r");
        let from = raw(EventKind::Modify(ModifyKind::Name(RenameMode::From)), &["/r/a"]).set_tracker(3);
        n.push(from);

        let out = n.push(raw(EventKind::Create(CreateKind::File), &["/r/c"]));
        assert_eq!(
            out,
            vec![
                FsEvent::file(FsEventKind::Deleted, "/r/a"),
                FsEvent::file(FsEventKind::Created, "/r/c"),
            ]
        );
    }

    #[test]
    fn test_untracked_both_is_a_move() {
        let mut n = normalizer("/r");
        let out = n.push(raw(
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
            &["/r/a", "/r/b"],
        ));
        assert_eq!(out, vec![FsEvent::moved("/r/a", "/r/b", false)]);
    }

    #[test]
    fn test_directory_rename_moves_each_file() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("sub2/deep")).unwrap();
        fs::write(root.join("sub2/a.txt"), "a").unwrap();
        fs::write(root.join("sub2/deep/b.txt"), "b").unwrap();

        let repository = indexed(&["sub/a.txt", "sub/deep/b.txt", "sub/gone.txt", "subway.txt"]);
        let mut n = EventNormalizer::new(root, repository);

        assert!(n.push(rename(RenameMode::From, &root.join("sub"), 4)).is_empty());
        let out = n.push(rename(RenameMode::To, &root.join("sub2"), 4));

        assert_eq!(out[0], FsEvent::moved(root.join("sub"), root.join("sub2"), true));
        let mut files: Vec<_> = out[1..3].to_vec();
        files.sort_by(|a, b| a.path.cmp(&b.path));
        assert_eq!(
            files,
            vec![
                FsEvent::moved(root.join("sub/a.txt"), root.join("sub2/a.txt"), false),
                FsEvent::moved(root.join("sub/deep/b.txt"), root.join("sub2/deep/b.txt"), false),
            ]
        );
        assert_eq!(
            out[3..].to_vec(),
            vec![FsEvent::file(FsEventKind::Deleted, root.join("sub/gone.txt"))]
        );
    }

    #[test]
    fn test_directory_moved_in_creates_each_file() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("incoming")).unwrap();
        fs::write(root.join("incoming/a.txt"), "a").unwrap();

        let mut n = normalizer(root);
        let out = n.push(rename(RenameMode::To, &root.join("incoming"), 9));

        assert_eq!(
            out,
            vec![
                FsEvent::directory(FsEventKind::Created, root.join("incoming")),
                FsEvent::file(FsEventKind::Created, root.join("incoming/a.txt")),
            ]
        );
    }

    #[test]
    fn test_directory_moved_out_deletes_each_indexed_file() {
        let root = PathBuf::from("/r");
        let repository = indexed(&["sub/a.txt", "sub/deep/b.txt", "other.txt"]);
        let mut n = EventNormalizer::new(&root, repository);

        assert!(n.push(rename(RenameMode::From, &root.join("sub"), 5)).is_empty());
        assert_eq!(
            n.flush(),
            vec![
                FsEvent::directory(FsEventKind::Deleted, "/r/sub"),
                FsEvent::file(FsEventKind::Deleted, "/r/sub/a.txt"),
                FsEvent::file(FsEventKind::Deleted, "/r/sub/deep/b.txt"),
            ]
        );
    }

    #[test]
    fn test_removed_directory_deletes_indexed_files() {
        let repository = indexed(&["d/a.txt"]);
        let mut n = EventNormalizer::new("/r", repository);

        let out = n.push(raw(EventKind::Remove(RemoveKind::Folder), &["/r/d"]));
        assert_eq!(
            out,
            vec![
                FsEvent::directory(FsEventKind::Deleted, "/r/d"),
                FsEvent::file(FsEventKind::Deleted, "/r/d/a.txt"),
            ]
        );

        // an indexed file is never treated as a directory
        let out = n.push(raw(EventKind::Remove(RemoveKind::File), &["/r/d/a.txt"]));
        assert_eq!(out, vec![FsEvent::file(FsEventKind::Deleted, "/r/d/a.txt")]);
    }

    #[test]
    fn test_watcher_creation() {
        let dir = tempdir().unwrap();
        let watcher = FileWatcher::new(dir.path(), Arc::new(Repository::new()));
        assert!(watcher.is_ok());
    }

    #[test]
    fn test_watcher_on_missing_root_is_setup_failure() {
        let dir = tempdir().unwrap();
        let err = FileWatcher::new(&dir.path().join("missing"), Arc::new(Repository::new()))
            .err()
            .unwrap();
        assert!(matches!(err, WatchError::Setup { .. }));
    }

    #[test]
    fn test_watcher_detects_change() {
        let dir = tempdir().unwrap();
        let root = fs::canonicalize(dir.path()).unwrap();
        let mut watcher = FileWatcher::new(&root, Arc::new(Repository::new())).unwrap();

        fs::write(root.join("test.txt"), "hello").unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        let mut created = false;
        while !created && Instant::now() < deadline {
            if let Some(event) = watcher.recv_timeout(Duration::from_millis(50)) {
                created = event.kind == FsEventKind::Created && event.path.ends_with("test.txt");
            }
        }
        assert!(created, "no created event for test.txt");
    }
}
