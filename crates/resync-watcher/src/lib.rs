//! Resync Watcher - the filesystem side of a source
//!
//! This crate handles everything that touches the watched tree:
//! - Walking the root once at startup to seed the repository
//! - Watching for changes and normalizing raw notifications
//! - Translating those events into repository mutations
//!
//! Hidden files (basename starting with `.`) are never indexed.

mod error;
mod indexer;
mod translator;
mod watcher;

pub use error::WatchError;
pub use indexer::{index_directory, IndexOptions, IndexResult};
pub use translator::{EventTranslator, Mutation};
pub use watcher::{EventNormalizer, FileWatcher, FsEvent, FsEventKind};
