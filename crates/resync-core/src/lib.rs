//! Resync Core - the in-memory side of a ResourceSync source
//!
//! This crate holds everything that does not touch the watch facility:
//! - The resource repository (key → size, mtime, fingerprint)
//! - Materializing resources and their URIs out of repository entries
//! - Change records and the notifier that fans them out to subscribers
//! - Point-in-time snapshots for the resource list
//!
//! # Example
//!
//! ```no_run
//! use resync_core::{Materializer, Repository, ResourceEntry, SnapshotBuilder};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! let repository = Arc::new(Repository::new());
//! let entry = ResourceEntry::from_file(Path::new("/data/a.txt")).unwrap();
//! repository.put("a.txt", entry);
//!
//! let materializer = Materializer::new("http://localhost:8888", repository.clone());
//! let list = SnapshotBuilder::new(materializer).build();
//! for resource in &list.resources {
//!     println!("{} ({:?} bytes)", resource.uri, resource.length);
//! }
//! ```

pub mod entry;
pub mod error;
pub mod key;
pub mod materializer;
pub mod notifier;
pub mod repository;
pub mod resource;
pub mod snapshot;

pub use entry::ResourceEntry;
pub use error::{DeliveryError, Result, ResyncError};
pub use key::{is_hidden, resource_key};
pub use materializer::{synthesize_payload, Materializer, RESOURCE_PATH};
pub use notifier::{ChangeNotifier, ChangeSubscriber, ChannelSubscriber};
pub use repository::Repository;
pub use resource::{ChangeKind, ChangeRecord, Resource};
pub use snapshot::{ResourceList, SnapshotBuilder};
