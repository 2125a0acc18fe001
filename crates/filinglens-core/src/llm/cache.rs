//! LLM response caching to reduce API calls
//!
//! Grading re-runs across rewrite rounds frequently repeat (question, chunk)
//! pairs, so cached verdicts save a full round trip per duplicate.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, SystemTime};

#[derive(Clone)]
struct CacheEntry {
    value: String,
    expires_at: SystemTime,
}

/// In-memory TTL cache for LLM responses
pub struct ResponseCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    ttl: Duration,
}

impl ResponseCache {
    /// Create new cache with default TTL of 15 minutes
    pub fn new() -> Self {
        Self::with_ttl(Duration::from_secs(900))
    }

    /// Create cache with custom TTL
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Get cached value if present and not expired
    pub fn get(&self, key: &str) -> Option<String> {
        let entries = self.entries.read().ok()?;
        let entry = entries.get(key)?;

        if SystemTime::now() < entry.expires_at {
            Some(entry.value.clone())
        } else {
            None
        }
    }

    /// Insert a value under the cache TTL
    pub fn insert(&self, key: String, value: String) {
        let entry = CacheEntry {
            value,
            expires_at: SystemTime::now() + self.ttl,
        };

        if let Ok(mut entries) = self.entries.write() {
            entries.insert(key, entry);
        }
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Build a cache key from a request kind, model, and payload
pub fn cache_key(kind: &str, model: &str, payload: &str) -> String {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut hasher = DefaultHasher::new();
    model.hash(&mut hasher);
    payload.hash(&mut hasher);
    format!("{}:{}:{:x}", kind, model, hasher.finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_basic() {
        let cache = ResponseCache::new();

        cache.insert("key1".to_string(), "value1".to_string());
        assert_eq!(cache.get("key1"), Some("value1".to_string()));
        assert_eq!(cache.get("key2"), None);
    }

    #[test]
    fn test_cache_expiry() {
        let cache = ResponseCache::with_ttl(Duration::from_millis(50));

        cache.insert("key1".to_string(), "value1".to_string());
        assert_eq!(cache.get("key1"), Some("value1".to_string()));

        std::thread::sleep(Duration::from_millis(80));
        assert_eq!(cache.get("key1"), None);
    }

    #[test]
    fn test_cache_key_stability() {
        let key1 = cache_key("chat", "model1", "payload");
        let key2 = cache_key("chat", "model1", "payload");
        let key3 = cache_key("chat", "model1", "other");
        let key4 = cache_key("embed", "model1", "payload");

        assert_eq!(key1, key2);
        assert_ne!(key1, key3);
        assert_ne!(key1, key4);
    }
}
