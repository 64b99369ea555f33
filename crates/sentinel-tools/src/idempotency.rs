//! Idempotency cache (C7): dedupes tool invocations keyed by
//! `(idempotency key, tool name, canonical args)`, for the process lifetime.

use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;

/// Build the cache key: idempotency key (may be empty) ∥ tool name ∥ a JSON
/// serialization of the arguments. `serde_json::Map` sorts keys, so two
/// structurally equal argument documents serialize identically regardless
/// of the order the model emitted their keys in.
pub fn cache_key(idempotency_key: Option<&str>, tool_name: &str, args: &Value) -> String {
    let canonical_args = serde_json::to_string(args).unwrap_or_else(|_| "null".to_string());
    format!("{}\u{0}{}\u{0}{}", idempotency_key.unwrap_or(""), tool_name, canonical_args)
}

/// In-process mapping from cache key to a cached tool result. No TTL, no
/// eviction; shared across sessions for the process lifetime.
#[derive(Default)]
pub struct IdempotencyCache {
    entries: RwLock<HashMap<String, Value>>,
}

impl IdempotencyCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.entries.read().get(key).cloned()
    }

    pub fn put(&self, key: String, value: Value) {
        self.entries.write().insert(key, value);
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for IdempotencyCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdempotencyCache").field("entries", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn cache_key_is_order_independent_across_structurally_equal_args() {
        let a = cache_key(Some("k1"), "places.search", &json!({"query": "pizza", "radius": 5}));
        let b = cache_key(Some("k1"), "places.search", &json!({"radius": 5, "query": "pizza"}));
        assert_eq!(a, b);
    }

    #[test]
    fn cache_key_distinguishes_structurally_different_args() {
        let a = cache_key(Some("k1"), "places.search", &json!({"query": "pizza"}));
        let b = cache_key(Some("k1"), "places.search", &json!({"query": "sushi"}));
        assert_ne!(a, b);
    }

    #[test]
    fn cache_key_treats_missing_idempotency_key_as_empty_string() {
        let a = cache_key(None, "places.search", &json!({}));
        let b = cache_key(Some(""), "places.search", &json!({}));
        assert_eq!(a, b);
    }

    #[test]
    fn get_and_put_round_trip() {
        let cache = IdempotencyCache::new();
        let key = cache_key(Some("k1"), "t", &json!({}));
        assert!(cache.get(&key).is_none());
        cache.put(key.clone(), json!({"ok": true}));
        assert_eq!(cache.get(&key), Some(json!({"ok": true})));
    }

    #[test]
    fn concurrent_access_is_safe() {
        use std::sync::Arc;
        let cache = Arc::new(IdempotencyCache::new());
        let mut handles = Vec::new();
        for i in 0..16 {
            let cache = cache.clone();
            handles.push(std::thread::spawn(move || {
                let key = cache_key(Some("k"), "t", &json!({"i": i}));
                cache.put(key.clone(), json!({"i": i}));
                assert_eq!(cache.get(&key), Some(json!({"i": i})));
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(cache.len(), 16);
    }
}
