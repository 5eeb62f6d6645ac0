use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

/// A simple in-memory JSON cache with per-entry TTL.
pub struct TtlCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    max_entries: usize,
}

struct CacheEntry {
    value: Value,
    expires_at: Instant,
    created_at: Instant,
}

impl TtlCache {
    /// Create a new cache with default settings.
    pub fn new() -> Self {
        Self::with_max_entries(10_000)
    }

    /// Create a new cache with a maximum number of entries.
    pub fn with_max_entries(max_entries: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            max_entries: max_entries.max(1),
        }
    }

    /// Get a cached value if it exists and hasn't expired.
    pub fn get(&self, key: &str) -> Option<Value> {
        let entries = self.entries.read().ok()?;
        let entry = entries.get(key)?;

        if Instant::now() < entry.expires_at {
            Some(entry.value.clone())
        } else {
            None
        }
    }

    /// Get and deserialize a cached value. Entries that no longer deserialize
    /// are treated as misses.
    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.get(key)?;
        match serde_json::from_value(value) {
            Ok(v) => Some(v),
            Err(e) => {
                debug!("Discarding undecodable cache entry {}: {}", key, e);
                self.invalidate(key);
                None
            }
        }
    }

    /// Set a cached value with a TTL.
    pub fn set(&self, key: impl Into<String>, value: Value, ttl: Duration) {
        let now = Instant::now();
        let entry = CacheEntry {
            value,
            expires_at: now + ttl,
            created_at: now,
        };

        if let Ok(mut entries) = self.entries.write() {
            // Evict expired entries if we're at capacity
            if entries.len() >= self.max_entries {
                Self::evict_expired(&mut entries);
            }

            // If still at capacity, evict oldest entries
            if entries.len() >= self.max_entries {
                Self::evict_oldest(&mut entries, (self.max_entries / 10).max(1));
            }

            entries.insert(key.into(), entry);
        }
    }

    /// Serialize and cache a value. Serialization failures are not cached.
    pub fn set_json<T: Serialize>(&self, key: impl Into<String>, value: &T, ttl: Duration) {
        match serde_json::to_value(value) {
            Ok(value) => self.set(key, value, ttl),
            Err(e) => debug!("Not caching unserializable value: {}", e),
        }
    }

    /// Invalidate a specific cache entry.
    pub fn invalidate(&self, key: &str) {
        if let Ok(mut entries) = self.entries.write() {
            entries.remove(key);
        }
    }

    /// Clear the entire cache.
    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.write() {
            entries.clear();
        }
    }

    /// Get the number of cached entries.
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn evict_expired(entries: &mut HashMap<String, CacheEntry>) {
        let now = Instant::now();
        entries.retain(|_, v| v.expires_at > now);
    }

    fn evict_oldest(entries: &mut HashMap<String, CacheEntry>, count: usize) {
        let mut oldest: Vec<_> = entries
            .iter()
            .map(|(k, v)| (k.clone(), v.created_at))
            .collect();

        oldest.sort_by_key(|(_, t)| *t);

        for (key, _) in oldest.into_iter().take(count) {
            entries.remove(&key);
        }
    }
}

impl Default for TtlCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cache_set_get() {
        let cache = TtlCache::new();
        cache.set("user:1", json!({"id": 1}), Duration::from_secs(60));
        assert_eq!(cache.get("user:1"), Some(json!({"id": 1})));
        assert_eq!(cache.get("user:2"), None);
    }

    #[test]
    fn test_cache_expiry() {
        let cache = TtlCache::new();
        cache.set("k", json!(1), Duration::from_millis(1));
        std::thread::sleep(Duration::from_millis(10));
        assert!(cache.get("k").is_none());
    }

    #[test]
    fn test_cache_invalidate() {
        let cache = TtlCache::new();
        cache.set("k", json!(1), Duration::from_secs(60));
        cache.invalidate("k");
        assert!(cache.get("k").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_json_round_trip_and_bad_entry() {
        let cache = TtlCache::new();
        cache.set_json("n", &vec![1, 2, 3], Duration::from_secs(60));
        assert_eq!(cache.get_json::<Vec<i32>>("n"), Some(vec![1, 2, 3]));

        cache.set("s", json!("not a number"), Duration::from_secs(60));
        assert_eq!(cache.get_json::<i64>("s"), None);
        assert!(cache.get("s").is_none());
    }

    #[test]
    fn test_cache_capacity() {
        let cache = TtlCache::with_max_entries(3);
        for i in 0..5 {
            cache.set(format!("k{}", i), json!(i), Duration::from_secs(60));
        }
        assert!(cache.len() <= 3);
        assert_eq!(cache.get("k4"), Some(json!(4)));
    }
}
