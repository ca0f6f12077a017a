// ── Engine: Response Cache ─────────────────────────────────────────────────
//
// Short-lived TTL cache for query responses. The key is derived from the
// query type, the normalized query text, and a sha256 hash of the caller's
// context value, so the same question in the same context hits within TTL.
// A hit is returned with `cached = true` and without re-scoring; expired
// entries are swept by the background cleanup.
//
// Thread-safety: NOT internally synchronized; the router wraps it in a
// Mutex.

use crate::atoms::types::{MemoryQuery, MemoryResponse};
use log::debug;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::time::{Duration, Instant};

// ═════════════════════════════════════════════════════════════════════════════
// Response Cache
// ═════════════════════════════════════════════════════════════════════════════

struct CachedEntry {
    response: MemoryResponse,
    stored_at: Instant,
}

pub struct ResponseCache {
    entries: HashMap<String, CachedEntry>,
    ttl: Duration,
    capacity: usize,
}

impl ResponseCache {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self { entries: HashMap::new(), ttl, capacity }
    }

    /// Cache key: (type, normalized query text, context hash).
    pub fn key_for(query: &MemoryQuery) -> String {
        let normalized = query.text.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();

        let mut hasher = Sha256::new();
        if let Some(ref context) = query.context {
            hasher.update(context.to_string().as_bytes());
        }
        let context_hash = hasher.finalize();

        format!("{:?}|{}|{:x}", query.query_type, normalized, context_hash)
    }

    /// Look up a fresh entry. The returned clone carries `cached = true`.
    pub fn get(&self, key: &str) -> Option<MemoryResponse> {
        let entry = self.entries.get(key)?;
        if entry.stored_at.elapsed() > self.ttl {
            return None;
        }
        let mut response = entry.response.clone();
        response.cached = true;
        Some(response)
    }

    /// Store a response, evicting the stalest entry when at capacity.
    pub fn insert(&mut self, key: String, response: MemoryResponse) {
        if self.entries.len() >= self.capacity && !self.entries.contains_key(&key) {
            if let Some(stalest) = self
                .entries
                .iter()
                .min_by_key(|(_, e)| e.stored_at)
                .map(|(k, _)| k.clone())
            {
                self.entries.remove(&stalest);
            }
        }
        self.entries.insert(key, CachedEntry { response, stored_at: Instant::now() });
    }

    /// Sweep expired entries; returns how many were evicted.
    pub fn cleanup(&mut self) -> usize {
        let before = self.entries.len();
        let ttl = self.ttl;
        self.entries.retain(|_, e| e.stored_at.elapsed() <= ttl);
        let removed = before - self.entries.len();
        if removed > 0 {
            debug!("[router] Cache cleanup evicted {removed} expired entries");
        }
        removed
    }

    /// Hot-reload the TTL (the Coordinator tunes this).
    pub fn set_ttl(&mut self, ttl: Duration) {
        self.ttl = ttl;
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

// ═════════════════════════════════════════════════════════════════════════════
// Tests
// ═════════════════════════════════════════════════════════════════════════════
