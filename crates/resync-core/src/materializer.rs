//! Resource materialization.
//!
//! Turns repository entries into addressable resources on demand, and
//! fabricates deterministic dummy payloads for demo resources.

use crate::entry::ResourceEntry;
use crate::error::{ResyncError, Result};
use crate::repository::Repository;
use crate::resource::Resource;
use std::sync::Arc;

/// Path segment appended to the base URI for every resource.
pub const RESOURCE_PATH: &str = "/resources";

/// Filler byte for payload lengths that are not a multiple of the key.
const PAYLOAD_FILLER: u8 = b'x';

/// Builds [`Resource`] values out of a repository.
#[derive(Debug, Clone)]
pub struct Materializer {
    base_uri: String,
    repository: Arc<Repository>,
}

impl Materializer {
    /// Creates a materializer. A trailing `/` on `base_uri` is dropped.
    pub fn new(base_uri: impl Into<String>, repository: Arc<Repository>) -> Self {
        let base_uri = base_uri.into().trim_end_matches('/').to_string();
        Self {
            base_uri,
            repository,
        }
    }

    pub fn base_uri(&self) -> &str {
        &self.base_uri
    }

    pub fn repository(&self) -> &Arc<Repository> {
        &self.repository
    }

    /// The URI a key is published under.
    ///
    /// `/` and `:` are left unescaped so the key keeps its path shape.
    pub fn resource_uri(&self, key: &str) -> String {
        format!("{}{}/{}", self.base_uri, RESOURCE_PATH, encode_key(key))
    }

    /// Inverse of [`Materializer::resource_uri`].
    pub fn key_from_uri(&self, uri: &str) -> Option<String> {
        let prefix = format!("{}{}/", self.base_uri, RESOURCE_PATH);
        let encoded = uri.strip_prefix(&prefix)?;
        let key = urlencoding::decode(encoded).ok()?.into_owned();
        if key.is_empty() {
            None
        } else {
            Some(key)
        }
    }

    /// Builds the resource for `key` from its current entry.
    ///
    /// `None` means the key is not (or no longer) in the repository.
    pub fn materialize(&self, key: &str) -> Option<Resource> {
        let entry = self.repository.get(key)?;
        Some(self.resource(key, entry))
    }

    /// Builds the resource for `key` from an entry the caller already holds.
    pub fn resource(&self, key: &str, entry: ResourceEntry) -> Resource {
        Resource {
            uri: self.resource_uri(key),
            timestamp: entry.modified_at,
            length: Some(entry.length),
            fingerprint: Some(entry.fingerprint),
            change: None,
        }
    }

    /// Dummy payload for `key`, defaulting `length` to the indexed length.
    pub fn payload(&self, key: &str, length: Option<u64>) -> Result<Vec<u8>> {
        let length = match length {
            Some(length) => length,
            None => {
                self.repository
                    .get(key)
                    .ok_or_else(|| ResyncError::not_found(key))?
                    .length
            }
        };
        Ok(synthesize_payload(key, length as usize))
    }
}

/// Repeats `key` to fill `length` bytes, padding the rest with `x`.
///
/// `synthesize_payload("abc", 10) == b"abcabcabcx"`.
pub fn synthesize_payload(key: &str, length: usize) -> Vec<u8> {
    let unit = key.as_bytes();
    if unit.is_empty() {
        return vec![PAYLOAD_FILLER; length];
    }

    let repetitions = length / unit.len();
    let mut payload = unit.repeat(repetitions);
    payload.resize(length, PAYLOAD_FILLER);
    payload
}

fn encode_key(key: &str) -> String {
    key.split('/')
        .map(|segment| {
            segment
                .split(':')
                .map(|part| urlencoding::encode(part).into_owned())
                .collect::<Vec<_>>()
                .join(":")
        })
        .collect::<Vec<_>>()
        .join("/")
}
