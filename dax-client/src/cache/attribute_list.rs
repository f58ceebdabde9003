//! Attribute-name list cache with LRU eviction and a content-hash index.
//!
//! The server can refer to an agreed, ordered list of attribute names by a
//! small integer id to compress repeated item shapes. Ids are assigned
//! monotonically on first insertion; the inverse index keys on a SHA-256
//! over the sorted names so an already agreed list is found without a
//! round-trip.

use std::collections::HashMap;

use sha2::{Digest, Sha256};

use super::CacheStats;

/// Computes the content hash of an attribute name list: SHA-256 over the
/// sorted names joined by `'|'`, hex encoded.
pub fn name_hash(names: &[String]) -> String {
    let mut sorted: Vec<&str> = names.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    hex::encode(Sha256::digest(sorted.join("|").as_bytes()))
}

struct Entry {
    names: Vec<String>,
    hash: String,
    last_access: u64,
}

/// Bounded id → attribute-name-list map with LRU eviction.
pub struct AttributeListCache {
    entries: HashMap<u64, Entry>,
    by_hash: HashMap<String, u64>,
    capacity: usize,
    next_id: u64,
    access_counter: u64,
    stats: CacheStats,
}

impl std::fmt::Debug for AttributeListCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttributeListCache")
            .field("len", &self.entries.len())
            .field("capacity", &self.capacity)
            .field("next_id", &self.next_id)
            .finish()
    }
}

impl AttributeListCache {
    /// Creates a cache with the given capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            by_hash: HashMap::new(),
            capacity,
            next_id: 1,
            access_counter: 0,
            stats: CacheStats::default(),
        }
    }

    /// Returns the names for `id`, bumping its recency.
    pub fn get(&mut self, id: u64) -> Option<Vec<String>> {
        self.access_counter += 1;
        let counter = self.access_counter;
        match self.entries.get_mut(&id) {
            Some(entry) => {
                entry.last_access = counter;
                self.stats.record_hit();
                Some(entry.names.clone())
            }
            None => {
                self.stats.record_miss();
                None
            }
        }
    }

    /// Stores a name list, returning its id.
    ///
    /// A list whose content hash is already known returns the existing id
    /// (and bumps its recency); an unseen list is assigned the next
    /// monotone id, evicting the least recently used entry at capacity.
    pub fn put_by_names(&mut self, names: Vec<String>) -> u64 {
        let hash = name_hash(&names);
        self.access_counter += 1;
        let counter = self.access_counter;

        if let Some(&id) = self.by_hash.get(&hash) {
            if let Some(entry) = self.entries.get_mut(&id) {
                entry.last_access = counter;
            }
            return id;
        }

        if self.entries.len() >= self.capacity {
            self.evict_least_recent();
        }

        let id = self.next_id;
        self.next_id += 1;
        self.by_hash.insert(hash.clone(), id);
        self.entries.insert(
            id,
            Entry {
                names,
                hash,
                last_access: counter,
            },
        );
        id
    }

    /// Stores a name list under an id dictated by the server.
    ///
    /// Used when a `DefineAttributeList` reply carries the cluster's id
    /// for a list the client proposed.
    pub fn put_with_id(&mut self, id: u64, names: Vec<String>) {
        let hash = name_hash(&names);
        self.access_counter += 1;

        if !self.entries.contains_key(&id) && self.entries.len() >= self.capacity {
            self.evict_least_recent();
        }
        if let Some(previous) = self.entries.insert(
            id,
            Entry {
                names,
                hash: hash.clone(),
                last_access: self.access_counter,
            },
        ) {
            self.by_hash.remove(&previous.hash);
        }
        self.by_hash.insert(hash, id);
        if id >= self.next_id {
            self.next_id = id + 1;
        }
    }

    /// Looks up an id by content hash without touching recency.
    pub fn id_by_name_hash(&self, hash: &str) -> Option<u64> {
        self.by_hash.get(hash).copied()
    }

    /// Returns the number of cached lists.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns a snapshot of the counters.
    pub fn stats(&self) -> CacheStats {
        self.stats.clone()
    }

    fn evict_least_recent(&mut self) {
        let victim = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_access)
            .map(|(&id, _)| id);
        if let Some(id) = victim {
            if let Some(entry) = self.entries.remove(&id) {
                self.by_hash.remove(&entry.hash);
            }
            self.stats.record_eviction();
        }
    }
}
