// ============================================================================
// RESPONSE CACHE STORE
// ============================================================================
// Thin JSON layer over the shared backend. Backend failures are logged and
// reported as "no entry" / "not written"; nothing here returns an error.

use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::backend::CacheBackend;
use crate::observability::record_cache_error;

pub const DEFAULT_TTL: Duration = Duration::from_secs(86_400); // 24 hours

/// Outcome of [`CacheStore::put`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    Created,
    /// Another writer got there first; the stored value was left untouched.
    AlreadyExists,
    Failed,
}

#[derive(Clone)]
pub struct CacheStore {
    backend: Arc<dyn CacheBackend>,
}

impl CacheStore {
    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        Self { backend }
    }

    pub async fn exists(&self, key: &str) -> bool {
        match self.backend.exists(key).await {
            Ok(exists) => exists,
            Err(e) => {
                warn!(key = %key, "Cache exists check failed: {}", e);
                record_cache_error("exists");
                false
            }
        }
    }

    /// Fetch and decode an entry. Entries that are not valid JSON are deleted.
    pub async fn get(&self, key: &str) -> Option<Value> {
        let bytes = match self.backend.get(key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(e) => {
                warn!(key = %key, "Cache read failed: {}", e);
                record_cache_error("get");
                return None;
            }
        };

        match serde_json::from_slice::<Value>(&bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key = %key, size = bytes.len(), "Dropping malformed cache entry: {}", e);
                record_cache_error("decode");
                self.delete(key).await;
                None
            }
        }
    }

    /// First-writer-wins insert with expiry.
    pub async fn put(&self, key: &str, value: &Value, ttl: Duration) -> PutOutcome {
        let serialized = match serde_json::to_vec(value) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(key = %key, "Failed to serialize cache entry: {}", e);
                record_cache_error("encode");
                return PutOutcome::Failed;
            }
        };

        match self.backend.set_if_absent(key, &serialized, ttl).await {
            Ok(true) => {
                debug!(key = %key, ttl_secs = ttl.as_secs(), "Cache entry created");
                PutOutcome::Created
            }
            Ok(false) => {
                warn!(key = %key, "Cache entry already exists, keeping the first write");
                PutOutcome::AlreadyExists
            }
            Err(e) => {
                warn!(key = %key, "Cache write failed: {}", e);
                record_cache_error("put");
                PutOutcome::Failed
            }
        }
    }

    /// Idempotent. Returns whether an entry was actually removed.
    pub async fn delete(&self, key: &str) -> bool {
        match self.backend.del(key).await {
            Ok(deleted) => {
                debug!(key = %key, deleted = deleted > 0, "Cache entry deletion");
                deleted > 0
            }
            Err(e) => {
                warn!(key = %key, "Cache delete failed: {}", e);
                record_cache_error("delete");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::memory::InMemoryBackend;
    use serde_json::json;

    fn store() -> (InMemoryBackend, CacheStore) {
        let backend = InMemoryBackend::new();
        let store = CacheStore::new(Arc::new(backend.clone()));
        (backend, store)
    }

    #[tokio::test]
    async fn put_then_get_returns_equal_value() {
        let (_, store) = store();
        let value = json!({"123": {"volumes": [{"id": "vol-1", "size": 8}]}, "total": 1.5});
        assert_eq!(store.put("k", &value, DEFAULT_TTL).await, PutOutcome::Created);
        assert!(store.exists("k").await);
        assert_eq!(store.get("k").await, Some(value));
    }

    #[tokio::test]
    async fn second_put_does_not_overwrite() {
        let (_, store) = store();
        store.put("k", &json!({"v": 1}), DEFAULT_TTL).await;
        assert_eq!(
            store.put("k", &json!({"v": 2}), DEFAULT_TTL).await,
            PutOutcome::AlreadyExists
        );
        assert_eq!(store.get("k").await, Some(json!({"v": 1})));
    }

    #[tokio::test]
    async fn entries_expire_after_ttl() {
        let (_, store) = store();
        store.put("k", &json!([1, 2]), Duration::from_millis(20)).await;
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(!store.exists("k").await);
        assert_eq!(store.get("k").await, None);
    }

    #[tokio::test]
    async fn malformed_entry_is_a_miss_and_removed() {
        let (backend, store) = store();
        backend.insert_raw("k", r#"{"a":1}{"a":2}"#);
        assert_eq!(store.get("k").await, None);
        assert!(backend.keys().is_empty());
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let (_, store) = store();
        store.put("k", &json!(null), DEFAULT_TTL).await;
        assert!(store.delete("k").await);
        assert!(!store.delete("k").await);
        assert!(!store.delete("never-written").await);
    }

    #[tokio::test]
    async fn backend_failures_degrade_quietly() {
        let (backend, store) = store();
        backend.set_unavailable(true);
        assert!(!store.exists("k").await);
        assert_eq!(store.get("k").await, None);
        assert_eq!(store.put("k", &json!(1), DEFAULT_TTL).await, PutOutcome::Failed);
        assert!(!store.delete("k").await);
    }
}
