//! Table key schema cache with TTL and oldest-entry eviction.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use dax_core::{DaxError, KeySchema, Result};

use super::CacheStats;

/// Characters a cache key must not contain.
const RESERVED_KEY_CHARS: &[char] = &['{', '}', '(', ')', '/', '@', ':'];

struct Entry {
    schema: KeySchema,
    inserted_at: Instant,
}

/// Bounded table-name → key-schema map.
///
/// Entries expire a TTL after their last `put`; an expired entry is
/// removed on `get` and the lookup misses. Inserting into a full cache
/// evicts the entry with the earliest insertion timestamp.
pub struct KeySchemaCache {
    entries: HashMap<String, Entry>,
    capacity: usize,
    ttl: Duration,
    stats: CacheStats,
}

impl std::fmt::Debug for KeySchemaCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeySchemaCache")
            .field("len", &self.entries.len())
            .field("capacity", &self.capacity)
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl KeySchemaCache {
    /// Creates a cache with the given capacity and TTL.
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            capacity,
            ttl,
            stats: CacheStats::default(),
        }
    }

    /// Returns the schema for `table` if a fresh entry exists.
    pub fn get(&mut self, table: &str) -> Result<Option<KeySchema>> {
        validate_cache_key(table)?;

        if let Some(entry) = self.entries.get(table) {
            if entry.inserted_at.elapsed() >= self.ttl {
                self.entries.remove(table);
                self.stats.record_expiration();
                self.stats.record_miss();
                return Ok(None);
            }
            self.stats.record_hit();
            return Ok(Some(self.entries[table].schema.clone()));
        }

        self.stats.record_miss();
        Ok(None)
    }

    /// Stores the schema for `table`, resetting its TTL.
    pub fn put(&mut self, table: &str, schema: KeySchema) -> Result<()> {
        validate_cache_key(table)?;

        if !self.entries.contains_key(table) && self.entries.len() >= self.capacity {
            self.evict_oldest();
        }
        self.entries.insert(
            table.to_string(),
            Entry {
                schema,
                inserted_at: Instant::now(),
            },
        );
        Ok(())
    }

    /// Removes the entry for `table`.
    pub fn delete(&mut self, table: &str) -> Result<()> {
        validate_cache_key(table)?;
        self.entries.remove(table);
        Ok(())
    }

    /// Removes every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Returns the cached table names.
    pub fn names(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    /// Returns the number of cached entries.
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

    fn evict_oldest(&mut self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.inserted_at)
            .map(|(table, _)| table.clone());
        if let Some(table) = oldest {
            self.entries.remove(&table);
            self.stats.record_eviction();
        }
    }
}

fn validate_cache_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(DaxError::InvalidConfig(
            "cache key must not be empty".to_string(),
        ));
    }
    if let Some(bad) = key.chars().find(|c| RESERVED_KEY_CHARS.contains(c)) {
        return Err(DaxError::InvalidConfig(format!(
            "cache key {:?} contains reserved character {:?}",
            key, bad
        )));
    }
    Ok(())
}
