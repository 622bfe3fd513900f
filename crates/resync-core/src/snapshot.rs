//! Resource list snapshots.
//!
//! Enumerates every indexed resource at call time. Each resource is read
//! atomically; the walk as a whole is not linearizable, so a key removed
//! mid-walk is simply left out.

use crate::materializer::Materializer;
use crate::resource::Resource;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Instant;
use tracing::{error, info};

/// A point-in-time enumeration of resources.
#[derive(Debug, Clone, Serialize)]
pub struct ResourceList {
    pub resources: Vec<Resource>,

    /// Number of resources in `resources`.
    pub count: usize,

    pub generated_at: DateTime<Utc>,
}

impl ResourceList {
    pub fn iter(&self) -> impl Iterator<Item = &Resource> {
        self.resources.iter()
    }
}

/// Produces [`ResourceList`] snapshots.
#[derive(Debug, Clone)]
pub struct SnapshotBuilder {
    materializer: Materializer,
}

impl SnapshotBuilder {
    pub fn new(materializer: Materializer) -> Self {
        Self { materializer }
    }

    /// Builds a snapshot of the repository as it is now.
    pub fn build(&self) -> ResourceList {
        let start = Instant::now();
        let keys = self.materializer.repository().keys();

        let mut resources = Vec::with_capacity(keys.len());
        for key in keys {
            match self.materializer.materialize(&key) {
                Some(resource) => resources.push(resource),
                None => error!(
                    "Cannot create resource {} because its entry was removed concurrently",
                    key
                ),
            }
        }

        info!(
            "Generated resource list with {} resources in {:?}",
            resources.len(),
            start.elapsed()
        );

        ResourceList {
            count: resources.len(),
            resources,
            generated_at: Utc::now(),
        }
    }
}
