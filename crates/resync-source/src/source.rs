//! The source service object.
//!
//! Owns the repository and everything derived from it. The watch thread is
//! the only writer; any number of request handlers may read concurrently.

use crate::config::SourceConfig;
use resync_core::{
    ChangeKind, ChangeNotifier, ChangeRecord, ChangeSubscriber, Materializer, Repository,
    Resource, ResourceEntry, ResourceList, ResyncError, Result, SnapshotBuilder,
};
use resync_watcher::{index_directory, EventTranslator, FsEvent, IndexOptions, IndexResult, Mutation};
use serde::Serialize;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Counters reported in the logs and by [`Source::stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SourceStats {
    pub no_resources: usize,
    pub no_events: u64,
}

/// A directory exposed as a resource collection.
pub struct Source {
    config: SourceConfig,
    pub(crate) repository: Arc<Repository>,
    materializer: Materializer,
    snapshot_builder: SnapshotBuilder,
    pub(crate) notifier: ChangeNotifier,
    translator: EventTranslator,
    events: AtomicU64,
}

impl Source {
    /// Builds a source over a validated copy of `config`.
    pub fn new(config: SourceConfig) -> Result<Self> {
        let config = config.validate()?;
        info!("Source config: {:?}", config);

        let repository = Arc::new(Repository::new());
        let materializer = Materializer::new(config.base_uri.clone(), repository.clone());

        Ok(Self {
            translator: EventTranslator::new(config.folder.clone()),
            snapshot_builder: SnapshotBuilder::new(materializer.clone()),
            notifier: ChangeNotifier::new(),
            events: AtomicU64::new(0),
            repository,
            materializer,
            config,
        })
    }

    pub fn config(&self) -> &SourceConfig {
        &self.config
    }

    pub fn root(&self) -> &Path {
        &self.config.folder
    }

    // Bootstrap

    /// Seeds the repository from a full walk of the root.
    ///
    /// Publishes nothing. Only idempotent on an empty repository: entries
    /// for files deleted since a previous bootstrap are kept.
    pub fn bootstrap(&self) -> Result<IndexResult> {
        info!("Bootstrapping source...");
        if !self.repository.is_empty() {
            warn!(
                "Bootstrapping a non-empty repository ({} resources)",
                self.repository.count()
            );
        }

        let options = IndexOptions {
            follow_symlinks: self.config.follow_symlinks,
        };
        let result = index_directory(self.root(), &self.repository, options)?;
        self.log_stats();
        Ok(result)
    }

    pub fn subscribe(&self, subscriber: Arc<dyn ChangeSubscriber>) {
        self.notifier.subscribe(subscriber);
    }

    // Accessors

    pub fn base_uri(&self) -> &str {
        self.materializer.base_uri()
    }

    pub fn resource_count(&self) -> usize {
        self.repository.count()
    }

    /// Description of the source; the base URI itself.
    pub fn describedby_uri(&self) -> &str {
        self.base_uri()
    }

    /// The configured source description URI, or the well-known location.
    pub fn source_description_uri(&self) -> String {
        match &self.config.source_description_uri {
            Some(uri) => uri.clone(),
            None => format!("{}/.well-known/resourcesync", self.base_uri()),
        }
    }

    pub fn capability_list_uri(&self) -> String {
        format!("{}/capabilitylist.xml", self.base_uri())
    }

    pub fn resource_list_uri(&self) -> String {
        format!("{}/{}", self.base_uri(), self.config.resource_list_path)
    }

    pub fn stats(&self) -> SourceStats {
        SourceStats {
            no_resources: self.resource_count(),
            no_events: self.events.load(Ordering::Relaxed),
        }
    }

    pub fn log_stats(&self) {
        let stats = self.stats();
        info!(
            "Source stats: {} resources, {} events",
            stats.no_resources, stats.no_events
        );
    }

    // Read paths

    /// Full listing of the current resources.
    pub fn snapshot(&self) -> ResourceList {
        self.snapshot_builder.build()
    }

    pub fn lookup(&self, key: &str) -> Option<Resource> {
        self.materializer.materialize(key)
    }

    /// Resolves a URI produced by this source back to its resource.
    pub fn lookup_uri(&self, uri: &str) -> Option<Resource> {
        let key = self.materializer.key_from_uri(uri)?;
        self.lookup(&key)
    }

    /// Up to `n` distinct random resources.
    pub fn random(&self, n: usize) -> Vec<Resource> {
        self.repository
            .random_sample(n)
            .into_iter()
            .map(|(key, entry)| self.materializer.resource(&key, entry))
            .collect()
    }

    pub fn random_resource(&self) -> Option<Resource> {
        self.random(1).into_iter().next()
    }

    /// Deterministic dummy content for `key`.
    pub fn payload(&self, key: &str, length: Option<u64>) -> Result<Vec<u8>> {
        self.materializer.payload(key, length)
    }

    // Mutations

    /// Indexes `path` as `key` and publishes `created`.
    pub fn create_resource(&self, key: &str, path: &Path) -> Result<ChangeRecord> {
        let entry = ResourceEntry::from_file(path)?;
        self.repository.put(key, entry.clone());
        Ok(self.publish_live(key, entry, ChangeKind::Created))
    }

    /// Re-indexes `path` as `key` and publishes `updated`.
    ///
    /// The file is read before the repository is touched, so a failed read
    /// leaves the old entry in place.
    pub fn update_resource(&self, key: &str, path: &Path) -> Result<ChangeRecord> {
        let entry = ResourceEntry::from_file(path)?;
        self.repository.replace(key, entry.clone());
        Ok(self.publish_live(key, entry, ChangeKind::Updated))
    }

    /// Drops `key` and publishes a tombstone with its last URI.
    pub fn delete_resource(&self, key: &str) -> Result<ChangeRecord> {
        self.repository
            .remove(key)
            .ok_or_else(|| ResyncError::not_found(key))?;

        let record = ChangeRecord::tombstone(self.materializer.resource_uri(key));
        self.notifier.notify(&record);
        Ok(record)
    }

    pub fn apply(&self, mutation: &Mutation) -> Result<ChangeRecord> {
        match mutation {
            Mutation::Create { key, path } => self.create_resource(key, path),
            Mutation::Update { key, path } => self.update_resource(key, path),
            Mutation::Delete { key } => self.delete_resource(key),
        }
    }

    /// Translates and applies one filesystem event.
    ///
    /// Failures are per-event: they are logged, the event is dropped, and
    /// the repository is left as it was for that key.
    pub fn handle_event(&self, event: &FsEvent) -> Vec<ChangeRecord> {
        self.events.fetch_add(1, Ordering::Relaxed);

        let mut records = Vec::new();
        for mutation in self.translator.translate(event) {
            match self.apply(&mutation) {
                Ok(record) => {
                    info!("{} {}", mutation.key(), record.change);
                    records.push(record);
                }
                Err(e) if e.is_not_found() => {
                    debug!("Nothing to delete for {}", mutation.key())
                }
                Err(e @ ResyncError::MissingSource { .. }) => {
                    warn!("Dropping event for {}: {}", mutation.key(), e)
                }
                Err(e) => warn!("Failed to apply event for {}: {}", mutation.key(), e),
            }
        }
        records
    }

    fn publish_live(&self, key: &str, entry: ResourceEntry, change: ChangeKind) -> ChangeRecord {
        let resource = self.materializer.resource(key, entry);
        let record = ChangeRecord::live(resource, change);
        self.notifier.notify(&record);
        record
    }
}

impl std::fmt::Debug for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Source")
            .field("root", &self.config.folder)
            .field("base_uri", &self.base_uri())
            .field("resources", &self.resource_count())
            .finish()
    }
}
