//! Best-effort key/value caches with optional TTL.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

pub trait Cache: Send + Sync {
    /// Insert only when `has(key)` is false; returns whether the value was stored.
    fn add(&self, key: &str, val: Value, ttl: Option<Duration>) -> bool {
        if self.has(key) {
            return false;
        }
        self.set(key, val, ttl);
        true
    }

    fn set(&self, key: &str, val: Value, ttl: Option<Duration>);

    fn get(&self, key: &str) -> Option<Value>;

    fn has(&self, key: &str) -> bool;

    fn remove(&self, key: &str);

    fn clear(&self);
}

pub type SharedCache = Arc<dyn Cache>;

/// Stores nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct DummyCache;

impl Cache for DummyCache {
    fn set(&self, _key: &str, _val: Value, _ttl: Option<Duration>) {}

    fn get(&self, _key: &str) -> Option<Value> {
        None
    }

    fn has(&self, _key: &str) -> bool {
        false
    }

    fn remove(&self, _key: &str) {}

    fn clear(&self) {}
}

#[derive(Debug, Default)]
pub struct LocMemCache {
    data: Mutex<HashMap<String, (Value, Option<Instant>)>>,
}

impl LocMemCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, (Value, Option<Instant>)>> {
        self.data.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Cache for LocMemCache {
    fn set(&self, key: &str, val: Value, ttl: Option<Duration>) {
        let expires = ttl.map(|t| Instant::now() + t);
        self.lock().insert(key.to_string(), (val, expires));
    }

    /// Expired entries are evicted and read as missing.
    fn get(&self, key: &str) -> Option<Value> {
        let mut data = self.lock();
        let expired = matches!(data.get(key), Some((_, Some(expires))) if *expires <= Instant::now());
        if expired {
            data.remove(key);
            return None;
        }
        data.get(key).map(|(val, _)| val.clone())
    }

    /// True only for an entry that carries a TTL which has already passed.
    fn has(&self, key: &str) -> bool {
        matches!(self.lock().get(key), Some((_, Some(expires))) if *expires < Instant::now())
    }

    fn remove(&self, key: &str) {
        self.lock().remove(key);
    }

    fn clear(&self) {
        self.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn dummy_cache_forgets_everything() {
        let c = DummyCache;
        assert!(c.add("k", json!(1), None));
        assert_eq!(c.get("k"), None);
    }

    #[test]
    fn get_honors_ttl() {
        let c = LocMemCache::new();
        c.set("live", json!(1), Some(Duration::from_secs(60)));
        c.set("forever", json!(2), None);
        c.set("dead", json!(3), Some(Duration::ZERO));
        assert_eq!(c.get("live"), Some(json!(1)));
        assert_eq!(c.get("forever"), Some(json!(2)));
        assert_eq!(c.get("dead"), None);
        assert_eq!(c.get("missing"), None);
    }

    #[test]
    fn has_reports_only_expired_entries() {
        let c = LocMemCache::new();
        c.set("live", json!(1), Some(Duration::from_secs(60)));
        c.set("forever", json!(1), None);
        c.set("dead", json!(1), Some(Duration::ZERO));
        std::thread::sleep(Duration::from_millis(2));
        assert!(!c.has("live"));
        assert!(!c.has("forever"));
        assert!(c.has("dead"));
        // add refuses to overwrite an expired entry, and overwrites a live one
        assert!(!c.add("dead", json!(2), None));
        assert!(c.add("live", json!(2), None));
        assert_eq!(c.get("live"), Some(json!(2)));
    }

    #[test]
    fn remove_and_clear() {
        let c = LocMemCache::new();
        c.set("a", json!(1), None);
        c.set("b", json!(1), None);
        c.remove("a");
        assert_eq!(c.get("a"), None);
        c.clear();
        assert_eq!(c.get("b"), None);
    }
}
