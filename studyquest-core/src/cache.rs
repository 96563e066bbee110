//! Fingerprint-keyed response memoization.
//!
//! Generated content is expensive, so identical requests within a TTL reuse
//! the previous result. Keys are SHA-256 fingerprints of the normalized
//! request; lookups lazily drop expired entries and a periodic sweep keeps
//! the map bounded between lookups. The cache can never surface an error:
//! any internal problem is just a miss.

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::debug;

/// Default capacity before LRU eviction kicks in.
const DEFAULT_MAX_ENTRIES: usize = 1000;

/// How often the lazy sweep walks the whole map.
const CLEANUP_INTERVAL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub ttl: Duration,
    pub max_entries: usize,
}

impl CacheConfig {
    /// Quiz-content cache: 1 hour.
    pub fn quiz() -> Self {
        Self {
            ttl: Duration::from_secs(3600),
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }

    /// Recommendation-narrative cache: 30 minutes.
    pub fn narrative() -> Self {
        Self {
            ttl: Duration::from_secs(1800),
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CacheStats {
    pub entries: usize,
    pub total_hits: u64,
}

struct Entry<T> {
    value: T,
    inserted_at: Instant,
    last_accessed: Instant,
}

struct Inner<T> {
    entries: HashMap<String, Entry<T>>,
    total_hits: u64,
    last_cleanup: Instant,
}

/// TTL + LRU cache keyed by request fingerprint.
pub struct ResponseCache<T> {
    config: CacheConfig,
    inner: Mutex<Inner<T>>,
}

impl<T: Clone> ResponseCache<T> {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                total_hits: 0,
                last_cleanup: Instant::now(),
            }),
        }
    }

    /// Stable fingerprint of a request: whitespace-normalized content, the
    /// model name, and the parameters sorted by key. Reordered params or
    /// reflowed whitespace produce the same key.
    pub fn fingerprint(content: &str, model: &str, params: &[(&str, String)]) -> String {
        let normalized: Vec<&str> = content.split_whitespace().collect();
        let mut sorted: Vec<&(&str, String)> = params.iter().collect();
        sorted.sort_by_key(|(k, _)| *k);

        let mut hasher = Sha256::new();
        hasher.update(normalized.join(" ").as_bytes());
        hasher.update(b"|");
        hasher.update(model.as_bytes());
        for (key, value) in sorted {
            hasher.update(b"|");
            hasher.update(key.as_bytes());
            hasher.update(b"=");
            hasher.update(value.as_bytes());
        }
        format!("{:x}", hasher.finalize())
    }

    /// Look up a fingerprint. Expired entries count as misses and are
    /// removed on the spot.
    pub fn get(&self, fingerprint: &str) -> Option<T> {
        let Ok(mut inner) = self.inner.lock() else {
            return None;
        };
        let now = Instant::now();
        self.maybe_cleanup(&mut inner, now);

        match inner.entries.get_mut(fingerprint) {
            Some(entry) if now.duration_since(entry.inserted_at) < self.config.ttl => {
                entry.last_accessed = now;
                let value = entry.value.clone();
                inner.total_hits += 1;
                debug!(fingerprint = %&fingerprint[..12.min(fingerprint.len())], "cache hit");
                Some(value)
            }
            Some(_) => {
                inner.entries.remove(fingerprint);
                None
            }
            None => None,
        }
    }

    /// Store a value, evicting the least-recently-used entry at capacity.
    pub fn put(&self, fingerprint: String, value: T) {
        let Ok(mut inner) = self.inner.lock() else {
            return;
        };
        let now = Instant::now();

        if inner.entries.len() >= self.config.max_entries
            && !inner.entries.contains_key(&fingerprint)
        {
            if let Some(oldest) = inner
                .entries
                .iter()
                .min_by_key(|(_, e)| e.last_accessed)
                .map(|(k, _)| k.clone())
            {
                inner.entries.remove(&oldest);
            }
        }

        inner.entries.insert(
            fingerprint,
            Entry {
                value,
                inserted_at: now,
                last_accessed: now,
            },
        );
    }

    pub fn invalidate(&self, fingerprint: &str) -> bool {
        match self.inner.lock() {
            Ok(mut inner) => inner.entries.remove(fingerprint).is_some(),
            Err(_) => false,
        }
    }

    pub fn clear(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.entries.clear();
        }
    }

    pub fn stats(&self) -> CacheStats {
        match self.inner.lock() {
            Ok(inner) => CacheStats {
                entries: inner.entries.len(),
                total_hits: inner.total_hits,
            },
            Err(_) => CacheStats {
                entries: 0,
                total_hits: 0,
            },
        }
    }

    fn maybe_cleanup(&self, inner: &mut Inner<T>, now: Instant) {
        if now.duration_since(inner.last_cleanup) < CLEANUP_INTERVAL {
            return;
        }
        let ttl = self.config.ttl;
        let before = inner.entries.len();
        inner
            .entries
            .retain(|_, e| now.duration_since(e.inserted_at) < ttl);
        let removed = before - inner.entries.len();
        if removed > 0 {
            debug!(removed, "cache sweep removed expired entries");
        }
        inner.last_cleanup = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_cache(ttl: Duration, max: usize) -> ResponseCache<String> {
        ResponseCache::new(CacheConfig::quiz().with_ttl(ttl).with_max_entries(max))
    }

    #[test]
    fn test_fingerprint_normalizes_whitespace() {
        let a = ResponseCache::<String>::fingerprint("hello   world\n", "m", &[]);
        let b = ResponseCache::<String>::fingerprint(" hello world ", "m", &[]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_fingerprint_param_order_insensitive() {
        let a = ResponseCache::<String>::fingerprint(
            "content",
            "m",
            &[("difficulty", "hard".into()), ("count", "5".into())],
        );
        let b = ResponseCache::<String>::fingerprint(
            "content",
            "m",
            &[("count", "5".into()), ("difficulty", "hard".into())],
        );
        assert_eq!(a, b);
    }

    #[test]
    fn test_fingerprint_distinguishes_model_and_params() {
        let base = ResponseCache::<String>::fingerprint("content", "m1", &[]);
        let other_model = ResponseCache::<String>::fingerprint("content", "m2", &[]);
        let other_params =
            ResponseCache::<String>::fingerprint("content", "m1", &[("n", "5".into())]);
        assert_ne!(base, other_model);
        assert_ne!(base, other_params);
    }

    #[test]
    fn test_hit_within_ttl() {
        let cache = small_cache(Duration::from_secs(60), 10);
        cache.put("key".to_string(), "value".to_string());
        assert_eq!(cache.get("key").as_deref(), Some("value"));
        assert_eq!(cache.stats().total_hits, 1);
    }

    #[test]
    fn test_expired_entry_is_miss_and_removed() {
        let cache = small_cache(Duration::ZERO, 10);
        cache.put("key".to_string(), "value".to_string());
        assert!(cache.get("key").is_none());
        assert_eq!(cache.stats().entries, 0);
    }

    #[test]
    fn test_lru_eviction_at_capacity() {
        let cache = small_cache(Duration::from_secs(60), 2);
        cache.put("a".to_string(), "1".to_string());
        cache.put("b".to_string(), "2".to_string());
        // Touch "a" so "b" becomes least recently used.
        let _ = cache.get("a");
        cache.put("c".to_string(), "3".to_string());

        assert!(cache.get("a").is_some());
        assert!(cache.get("b").is_none());
        assert!(cache.get("c").is_some());
    }

    #[test]
    fn test_invalidate_and_clear() {
        let cache = small_cache(Duration::from_secs(60), 10);
        cache.put("a".to_string(), "1".to_string());
        cache.put("b".to_string(), "2".to_string());
        assert!(cache.invalidate("a"));
        assert!(!cache.invalidate("a"));
        cache.clear();
        assert_eq!(cache.stats().entries, 0);
    }
}
