//! Build-scoped embedding cache keyed by content hash.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use sha2::{Digest, Sha256};

/// SHA-256 of a text.
pub type ContentHash = [u8; 32];

/// Hash a text for cache lookup.
pub fn content_hash(text: &str) -> ContentHash {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hasher.finalize().into()
}

/// Cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered from the cache.
    pub hits: usize,
    /// Lookups that needed the model.
    pub misses: usize,
    /// Distinct texts stored.
    pub entries: usize,
}

/// Embedding cache owned by one tree build.
///
/// Create one per build (or per document) and drop it when the build ends;
/// nothing is shared across unrelated documents.
#[derive(Debug, Default)]
pub struct EmbeddingCache {
    entries: Mutex<HashMap<ContentHash, Arc<Vec<f32>>>>,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl EmbeddingCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a vector, counting the hit or miss.
    pub fn get(&self, key: &ContentHash) -> Option<Arc<Vec<f32>>> {
        let found = self.lock().get(key).cloned();
        if found.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        found
    }

    /// Look up a vector without touching the counters.
    pub fn peek(&self, key: &ContentHash) -> Option<Arc<Vec<f32>>> {
        self.lock().get(key).cloned()
    }

    /// Store a vector.
    pub fn insert(&self, key: ContentHash, vector: Vec<f32>) {
        let _ = self.lock().insert(key, Arc::new(vector));
    }

    /// Number of distinct texts stored.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<ContentHash, Arc<Vec<f32>>>> {
        // A poisoned map still holds complete entries; keep using it.
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
