//! The resource repository.
//!
//! The authoritative map from resource key to entry. One writer (the watch
//! thread) and any number of readers share it. Every operation takes the
//! lock once, so single-entry reads and writes are indivisible and
//! `keys()`/`count()` see one coherent state.

use crate::entry::ResourceEntry;
use parking_lot::RwLock;
use rand::seq::SliceRandom;
use std::collections::HashMap;

/// Concurrency-safe key → entry map.
#[derive(Debug, Default)]
pub struct Repository {
    entries: RwLock<HashMap<String, ResourceEntry>>,
}

impl Repository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the entry for `key`.
    pub fn get(&self, key: &str) -> Option<ResourceEntry> {
        self.entries.read().get(key).cloned()
    }

    /// Inserts or overwrites an entry, returning the previous one.
    pub fn put(&self, key: impl Into<String>, entry: ResourceEntry) -> Option<ResourceEntry> {
        self.entries.write().insert(key.into(), entry)
    }

    /// Removes and returns the entry for `key`.
    pub fn remove(&self, key: &str) -> Option<ResourceEntry> {
        self.entries.write().remove(key)
    }

    /// Remove-then-insert under a single write lock.
    ///
    /// Readers see either the old entry or the new one, never a gap.
    pub fn replace(&self, key: &str, entry: ResourceEntry) -> Option<ResourceEntry> {
        let mut entries = self.entries.write();
        let previous = entries.remove(key);
        entries.insert(key.to_string(), entry);
        previous
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.read().contains_key(key)
    }

    /// Sorted copy of the key set at the time of the call.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Sorted keys nested under the directory key `prefix`.
    ///
    /// `prefix` itself is not included; `"sub"` matches `"sub/a"` but not
    /// `"sub"` or `"subway"`.
    pub fn keys_under(&self, prefix: &str) -> Vec<String> {
        let dir = format!("{}/", prefix.trim_end_matches('/'));
        let mut keys: Vec<String> = self
            .entries
            .read()
            .keys()
            .filter(|key| key.starts_with(&dir))
            .cloned()
            .collect();
        keys.sort();
        keys
    }

    pub fn count(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Up to `min(n, count())` distinct entries picked at random.
    ///
    /// Meant for generating demo traffic, not for the protocol.
    pub fn random_sample(&self, n: usize) -> Vec<(String, ResourceEntry)> {
        let entries = self.entries.read();
        let keys: Vec<&String> = entries.keys().collect();

        let mut rng = rand::thread_rng();
        keys.choose_multiple(&mut rng, n.min(keys.len()))
            .filter_map(|key| entries.get(*key).map(|entry| ((*key).clone(), entry.clone())))
            .collect()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::HashSet;

    fn entry(content: &str) -> ResourceEntry {
        ResourceEntry::from_bytes(content.as_bytes(), Utc::now())
    }

    #[test]
    fn test_put_get_remove() {
        let repo = Repository::new();
        assert!(repo.put("a", entry("one")).is_none());
        assert_eq!(repo.get("a").unwrap().length, 3);
        assert_eq!(repo.count(), 1);

        let removed = repo.remove("a").unwrap();
        assert_eq!(removed.length, 3);
        assert!(repo.get("a").is_none());
        assert!(repo.remove("a").is_none());
        assert!(repo.is_empty());
    }

    #[test]
    fn test_replace_swaps_whole_entry() {
        let repo = Repository::new();
        repo.put("a", entry("one"));

        let previous = repo.replace("a", entry("three")).unwrap();
        assert_eq!(previous.length, 3);

        let current = repo.get("a").unwrap();
        assert_eq!(current.length, 5);
        assert_eq!(current.fingerprint, entry("three").fingerprint);
        assert_eq!(repo.count(), 1);
    }

    #[test]
    fn test_keys_is_sorted_snapshot() {
        let repo = Repository::new();
        repo.put("b", entry("b"));
        repo.put("a", entry("a"));

        let keys = repo.keys();
        repo.put("c", entry("c"));
        assert_eq!(keys, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_keys_under_matches_whole_segments() {
        let repo = Repository::new();
        for key in ["sub", "sub/a", "sub/deep/b", "subway/c", "top"] {
            repo.put(key, entry(key));
        }

        assert_eq!(repo.keys_under("sub"), vec!["sub/a", "sub/deep/b"]);
        assert_eq!(repo.keys_under("sub/deep/"), vec!["sub/deep/b"]);
        assert!(repo.keys_under("top").is_empty());
    }

    #[test]
    fn test_random_sample_without_replacement() {
        let repo = Repository::new();
        for i in 0..10 {
            repo.put(format!("k{}", i), entry("x"));
        }

        let sample = repo.random_sample(4);
        assert_eq!(sample.len(), 4);
        let distinct: HashSet<_> = sample.iter().map(|(k, _)| k.clone()).collect();
        assert_eq!(distinct.len(), 4);

        assert_eq!(repo.random_sample(50).len(), 10);
        assert!(Repository::new().random_sample(3).is_empty());
    }
}
