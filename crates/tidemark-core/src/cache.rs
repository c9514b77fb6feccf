//! Size-bounded parse result cache with least-recently-used eviction.
//!
//! Each key holds at most one entry. A hit requires the stored input to
//! match the lookup input exactly; a miss stores the fresh result under
//! the key, replacing whatever was there before, so re-parsing an edited
//! document recycles its own slot instead of crowding out other keys.
//! The parse closure runs under the lock: concurrent misses for the same
//! entry are serialized rather than parsed twice. Results carrying
//! errors are returned but never stored.

use std::sync::Mutex;

use log::debug;

use crate::diagnostics::ParseResult;

struct CacheEntry<K> {
    key: K,
    input: String,
    result: ParseResult,
}

/// A small keyed LRU cache for parse results.
pub struct ParseCache<K> {
    max_entries: usize,
    // Most recently used entry last.
    entries: Mutex<Vec<CacheEntry<K>>>,
}

impl<K: PartialEq> ParseCache<K> {
    /// Create a cache holding at most `max_entries` results. A capacity
    /// of zero is treated as one.
    pub fn new(max_entries: usize) -> Self {
        Self {
            max_entries: max_entries.max(1),
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Return the cached result for `key` when its stored input matches
    /// `input`, or run `parse` and store the result under `key`,
    /// replacing any prior entry for that key. Results with errors are
    /// not stored, so a later call gets a fresh attempt.
    pub fn get_or_put(&self, key: K, input: &str, parse: impl FnOnce() -> ParseResult) -> ParseResult {
        let mut entries = self.lock();

        let position = entries.iter().position(|entry| entry.key == key);
        if let Some(position) = position {
            if entries[position].input == input {
                debug!("parse cache hit");
                let entry = entries.remove(position);
                let result = entry.result.clone();
                entries.push(entry);
                return result;
            }
        }

        debug!("parse cache miss, size {}", entries.len());
        let result = parse();
        if !result.diagnostics.has_errors() {
            // One entry per key: a changed input recycles the slot.
            if let Some(position) = position {
                entries.remove(position);
            }
            if entries.len() >= self.max_entries {
                entries.remove(0);
            }
            entries.push(CacheEntry {
                key,
                input: input.to_string(),
                result: result.clone(),
            });
        }
        result
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<CacheEntry<K>>> {
        // A panic in a parse closure must not wedge the cache.
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
