use crate::models::ChatRequest;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Cache hit/miss counters and occupancy
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    pub size: usize,
    pub max_size: usize,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
}

impl CacheStats {
    pub fn lookups(&self) -> u64 {
        self.hits + self.misses
    }
}

struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
}

struct CacheState<V> {
    entries: HashMap<String, CacheEntry<V>>,
    access_times: HashMap<String, Instant>,
    hits: u64,
    misses: u64,
}

/// Bounded TTL cache keyed by request fingerprint.
///
/// Eviction scans the access-time map for its minimum, so a full cache pays
/// O(n) per insert.
pub struct RequestCache<V> {
    state: Mutex<CacheState<V>>,
    max_size: usize,
    ttl: Duration,
}

impl<V: Clone> RequestCache<V> {
    pub fn new(max_size: usize, ttl: Duration) -> Self {
        Self {
            state: Mutex::new(CacheState {
                entries: HashMap::new(),
                access_times: HashMap::new(),
                hits: 0,
                misses: 0,
            }),
            max_size: max_size.max(1),
            ttl,
        }
    }

    pub fn get(&self, key: &str) -> Option<V> {
        self.get_at(key, Instant::now())
    }

    fn get_at(&self, key: &str, now: Instant) -> Option<V> {
        let mut state = self.lock();

        let fresh = match state.entries.get(key) {
            Some(entry) => now.saturating_duration_since(entry.inserted_at) < self.ttl,
            None => {
                state.misses += 1;
                return None;
            }
        };

        if !fresh {
            state.entries.remove(key);
            state.access_times.remove(key);
            state.misses += 1;
            return None;
        }

        state.hits += 1;
        state.access_times.insert(key.to_string(), now);
        state.entries.get(key).map(|entry| entry.value.clone())
    }

    pub fn set(&self, key: impl Into<String>, value: V) {
        self.set_at(key.into(), value, Instant::now());
    }

    fn set_at(&self, key: String, value: V, now: Instant) {
        let mut state = self.lock();

        if !state.entries.contains_key(&key) && state.entries.len() >= self.max_size {
            let oldest = state
                .access_times
                .iter()
                .min_by_key(|(_, accessed)| **accessed)
                .map(|(k, _)| k.clone());
            if let Some(oldest) = oldest {
                state.entries.remove(&oldest);
                state.access_times.remove(&oldest);
            }
        }

        state.access_times.insert(key.clone(), now);
        state.entries.insert(
            key,
            CacheEntry {
                value,
                inserted_at: now,
            },
        );
    }

    pub fn remove(&self, key: &str) -> Option<V> {
        let mut state = self.lock();
        state.access_times.remove(key);
        state.entries.remove(key).map(|entry| entry.value)
    }

    pub fn clear(&self) {
        let mut state = self.lock();
        state.entries.clear();
        state.access_times.clear();
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.lock();
        let lookups = state.hits + state.misses;
        CacheStats {
            size: state.entries.len(),
            max_size: self.max_size,
            hits: state.hits,
            misses: state.misses,
            hit_rate: if lookups > 0 {
                state.hits as f64 / lookups as f64
            } else {
                0.0
            },
        }
    }

    // A panic while holding the lock leaves the maps consistent, so poisoning is ignored.
    fn lock(&self) -> std::sync::MutexGuard<'_, CacheState<V>> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Deterministic cache key: SHA-256 over model, messages and generation params
pub fn fingerprint(request: &ChatRequest) -> String {
    let canonical = serde_json::json!({
        "model": request.model,
        "messages": request.messages,
        "params": request.params,
    });

    let digest = Sha256::digest(canonical.to_string().as_bytes());
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChatMessage, GenerationParams};

    #[test]
    fn test_get_after_set_within_ttl() {
        let cache = RequestCache::new(4, Duration::from_secs(60));
        cache.set("k1", "v1".to_string());
        assert_eq!(cache.get("k1").as_deref(), Some("v1"));
        assert_eq!(cache.get("missing"), None);

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hit_rate, 0.5);
    }

    #[test]
    fn test_expired_entry_is_evicted_on_read() {
        let cache = RequestCache::new(4, Duration::from_secs(10));
        let start = Instant::now();
        cache.set_at("k1".to_string(), 1u32, start);

        assert_eq!(cache.get_at("k1", start + Duration::from_secs(9)), Some(1));
        assert_eq!(cache.get_at("k1", start + Duration::from_secs(10)), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_capacity_evicts_least_recently_accessed() {
        let cache = RequestCache::new(2, Duration::from_secs(60));
        let start = Instant::now();
        cache.set_at("a".to_string(), 1u32, start);
        cache.set_at("b".to_string(), 2u32, start + Duration::from_millis(1));

        // Touch "a" so "b" becomes the least recently accessed
        assert_eq!(cache.get_at("a", start + Duration::from_millis(2)), Some(1));

        cache.set_at("c".to_string(), 3u32, start + Duration::from_millis(3));
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get_at("b", start + Duration::from_millis(4)), None);
        assert_eq!(cache.get_at("a", start + Duration::from_millis(4)), Some(1));
        assert_eq!(cache.get_at("c", start + Duration::from_millis(4)), Some(3));
    }

    #[test]
    fn test_overwrite_does_not_evict() {
        let cache = RequestCache::new(2, Duration::from_secs(60));
        cache.set("a", 1u32);
        cache.set("b", 2u32);
        cache.set("a", 10u32);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("a"), Some(10));
        assert_eq!(cache.get("b"), Some(2));
    }

    #[test]
    fn test_fingerprint_is_stable_and_param_sensitive() {
        let request = ChatRequest::new("gpt-4", vec![ChatMessage::user("hello")]);
        let same = ChatRequest::new("gpt-4", vec![ChatMessage::user("hello")]);
        assert_eq!(fingerprint(&request), fingerprint(&same));
        assert_eq!(fingerprint(&request).len(), 64);

        let hotter = request.clone().with_params(GenerationParams {
            temperature: 1.2,
            ..Default::default()
        });
        assert_ne!(fingerprint(&request), fingerprint(&hotter));
    }
}
