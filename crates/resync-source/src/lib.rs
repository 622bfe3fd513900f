//! Resync Source - a directory tree exposed as a synchronizable collection
//!
//! [`Source`] is the service object an HTTP layer talks to. Its lifecycle
//! is explicit:
//!
//! 1. [`Source::new`] validates the configuration
//! 2. [`Source::bootstrap`] walks the tree (silently, no change records)
//! 3. [`Source::watch`] starts the watch thread and returns a [`WatchHandle`]
//! 4. [`WatchHandle::shutdown`] stops watching and closes the change feed
//!
//! # Example
//!
//! ```no_run
//! use resync_source::{Source, SourceConfig};
//! use std::sync::Arc;
//!
//! let config = SourceConfig::new("./data", "http://localhost:8888");
//! let source = Arc::new(Source::new(config).unwrap());
//! source.bootstrap().unwrap();
//!
//! let handle = source.watch().unwrap();
//! println!("{} resources", source.resource_count());
//! handle.shutdown();
//! ```

mod config;
mod source;
mod watch;

pub use config::{base_uri_for_port, SourceConfig, DEFAULT_PORT};
pub use source::{Source, SourceStats};
pub use watch::WatchHandle;

pub use resync_core::{
    ChangeKind, ChangeRecord, ChangeSubscriber, ChannelSubscriber, DeliveryError, Resource,
    ResourceList, ResyncError,
};
pub use resync_watcher::{FsEvent, FsEventKind, IndexResult, WatchError};
