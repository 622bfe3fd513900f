//! Resources and change records.
//!
//! Both are owned snapshots copied out of the repository. Holding one
//! never pins or aliases repository state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What happened to a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Created,
    Updated,
    Deleted,
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Deleted => "deleted",
        };
        write!(f, "{}", s)
    }
}

/// An externally addressable resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    /// `base_uri + "/resources/" + encoded key`.
    pub uri: String,

    /// Last modification time (for tombstones, the time of deletion).
    pub timestamp: DateTime<Utc>,

    /// Content length in bytes. Absent on tombstones.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length: Option<u64>,

    /// Hex MD5 of the content. Absent on tombstones.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,

    /// Only set on values that went through the change notifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change: Option<ChangeKind>,
}

impl Resource {
    /// Copies this resource with a change attached.
    pub fn with_change(mut self, change: ChangeKind) -> Self {
        self.change = Some(change);
        self
    }
}

/// One entry of the change feed.
///
/// A `Deleted` record is a tombstone: the entry is already gone, so it only
/// carries the last known URI and the time the deletion was observed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub change: ChangeKind,
    pub uri: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
}

impl ChangeRecord {
    /// A `created` or `updated` record for a live resource.
    pub fn live(resource: Resource, change: ChangeKind) -> Self {
        Self {
            change,
            uri: resource.uri,
            timestamp: resource.timestamp,
            length: resource.length,
            fingerprint: resource.fingerprint,
        }
    }

    /// A `deleted` record stamped with the current time.
    pub fn tombstone(uri: impl Into<String>) -> Self {
        Self {
            change: ChangeKind::Deleted,
            uri: uri.into(),
            timestamp: Utc::now(),
            length: None,
            fingerprint: None,
        }
    }

    pub fn is_tombstone(&self) -> bool {
        self.change == ChangeKind::Deleted
    }

    /// The record as a resource value with `change` set.
    pub fn to_resource(&self) -> Resource {
        Resource {
            uri: self.uri.clone(),
            timestamp: self.timestamp,
            length: self.length,
            fingerprint: self.fingerprint.clone(),
            change: Some(self.change),
        }
    }
}
