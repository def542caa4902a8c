//! Bounded memo of conversion results shared by clones of one engine.
//!
//! Entries are never evicted: once `capacity` keys are stored, new results are
//! returned to the caller without being cached.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};

use crate::{ConversionResult, RomFormat};

/// Default number of cached results per engine.
pub const DEFAULT_CACHE_CAPACITY: usize = 65536;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct CacheKey {
    pub text: String,
    pub script: String,
    pub format: RomFormat,
}

#[derive(Debug)]
pub(crate) struct ResultCache {
    entries: RwLock<HashMap<CacheKey, ConversionResult>>,
    capacity: usize,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl ResultCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            capacity,
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
        }
    }

    pub fn get(&self, key: &CacheKey) -> Option<ConversionResult> {
        // Values are written whole under the lock, so a poisoned map is still consistent.
        let map = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let hit = map.get(key).cloned();
        if hit.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        hit
    }

    /// Stores `value` unless the cache is full. Returns whether the key is now cached.
    ///
    /// If another caller stored the same key first, its value is kept; results
    /// are deterministic, so both are identical.
    pub fn insert(&self, key: CacheKey, value: ConversionResult) -> bool {
        let mut map = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if map.contains_key(&key) {
            return true;
        }
        if map.len() >= self.capacity {
            return false;
        }
        map.insert(key, value);
        true
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> usize {
        self.misses.load(Ordering::Relaxed)
    }
}
