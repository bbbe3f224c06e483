//! Byte-bounded LRU cache of GET responses, revalidated with ETag / Last-Modified.
//!
//! Entries are never served without a conditional request; the cache only
//! lets a `304 Not Modified` stand in for the full body, which GitHub does not
//! count against the rate limit.

use std::collections::HashMap;

use compact_str::CompactString;
use tracing::debug;

/// A cached response body together with its validators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedResponse {
    pub etag: Option<CompactString>,
    pub last_modified: Option<CompactString>,
    /// `Link` header of the original response; 304s do not always repeat it
    pub link: Option<CompactString>,
    pub body: String,
}

impl CachedResponse {
    fn weight(&self, key: &str) -> usize {
        key.len()
            + self.body.len()
            + self.etag.as_ref().map_or(0, |v| v.len())
            + self.last_modified.as_ref().map_or(0, |v| v.len())
            + self.link.as_ref().map_or(0, |v| v.len())
    }

    pub fn has_validator(&self) -> bool {
        self.etag.is_some() || self.last_modified.is_some()
    }
}

struct CacheEntry {
    response: CachedResponse,
    weight: usize,
    last_used: u64,
}

/// LRU cache keyed by request URL whose total weight never exceeds `capacity_bytes`.
///
/// Not internally synchronized; `GithubApi` keeps it behind a mutex.
pub struct ResponseCache {
    entries: HashMap<CompactString, CacheEntry>,
    capacity_bytes: usize,
    used_bytes: usize,
    tick: u64,
    evictions: u64,
}

impl ResponseCache {
    pub fn new(capacity_bytes: usize) -> Self {
        Self {
            entries: HashMap::new(),
            capacity_bytes,
            used_bytes: 0,
            tick: 0,
            evictions: 0,
        }
    }

    /// Look up a response and mark it most recently used.
    pub fn get(&mut self, url: &str) -> Option<&CachedResponse> {
        self.tick += 1;
        let entry = self.entries.get_mut(url)?;
        entry.last_used = self.tick;
        Some(&entry.response)
    }

    /// Insert or replace a response, evicting least recently used entries to fit.
    ///
    /// Responses heavier than the whole budget are not stored, and any stale
    /// entry for the same key is dropped.
    pub fn insert(&mut self, url: &str, response: CachedResponse) {
        self.remove(url);

        let weight = response.weight(url);
        if weight > self.capacity_bytes {
            debug!(url, weight, capacity = self.capacity_bytes, "response too large to cache");
            return;
        }

        while self.used_bytes + weight > self.capacity_bytes {
            if !self.evict_lru() {
                break;
            }
        }

        self.tick += 1;
        self.used_bytes += weight;
        self.entries.insert(
            url.into(),
            CacheEntry {
                response,
                weight,
                last_used: self.tick,
            },
        );
    }

    fn remove(&mut self, url: &str) {
        if let Some(old) = self.entries.remove(url) {
            self.used_bytes -= old.weight;
        }
    }

    fn evict_lru(&mut self) -> bool {
        let Some(key) = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_used)
            .map(|(key, _)| key.clone())
        else {
            return false;
        };

        self.remove(&key);
        self.evictions += 1;
        debug!(
            url = %key,
            used_bytes = self.used_bytes,
            cache_evictions = self.evictions,
            "evicted cached response"
        );
        true
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn used_bytes(&self) -> usize {
        self.used_bytes
    }
}
