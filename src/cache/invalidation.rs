// ============================================================================
// BULK INVALIDATION
// ============================================================================
// Deletes every cached response of a route that was computed with a given
// identity in scope. Runs after report data is refreshed.

use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::backend::CacheBackend;
use super::error::CacheResult;
use crate::cache_key::invalidation_pattern;
use crate::observability::{record_cache_error, record_invalidated_keys};

pub const DEFAULT_SCAN_BATCH: usize = 1000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct InvalidationSummary {
    pub scanned: u64,
    pub deleted: u64,
    pub failed: u64,
}

#[derive(Clone)]
pub struct CacheInvalidator {
    backend: Arc<dyn CacheBackend>,
    batch_size: usize,
}

impl CacheInvalidator {
    pub fn new(backend: Arc<dyn CacheBackend>, batch_size: usize) -> Self {
        Self {
            backend,
            batch_size: batch_size.max(1),
        }
    }

    /// Best-effort: a key that fails to delete is logged and counted, and the
    /// remaining keys are still processed. Scan failures abort with an error.
    pub async fn invalidate(
        &self,
        routes: &[String],
        identities: &[String],
    ) -> CacheResult<InvalidationSummary> {
        let mut summary = InvalidationSummary::default();

        let keyspace = match self.backend.keyspace_size().await {
            Ok(size) => size,
            Err(e) => {
                warn!("Cache invalidation skipped, keyspace size unknown: {}", e);
                record_cache_error("keyspace");
                return Ok(summary);
            }
        };
        if keyspace == 0 {
            debug!("Cache invalidation skipped, keyspace is empty");
            return Ok(summary);
        }

        let page_size = self.batch_size.min(keyspace as usize).max(1);
        let max_pages = keyspace.div_ceil(page_size as u64) + 1;

        for route in routes {
            for identity in identities {
                let pattern = invalidation_pattern(route, identity);
                self.invalidate_pattern(&pattern, page_size, max_pages, &mut summary)
                    .await?;
            }
        }

        record_invalidated_keys(summary.deleted);
        info!(
            routes = routes.len(),
            identities = identities.len(),
            scanned = summary.scanned,
            deleted = summary.deleted,
            failed = summary.failed,
            "Cache invalidation completed"
        );
        Ok(summary)
    }

    async fn invalidate_pattern(
        &self,
        pattern: &str,
        page_size: usize,
        max_pages: u64,
        summary: &mut InvalidationSummary,
    ) -> CacheResult<()> {
        let mut cursor = 0u64;
        let mut pages = 0u64;
        let mut matched = Vec::new();

        loop {
            let (next, keys) = self.backend.scan(cursor, pattern, page_size).await?;
            pages += 1;
            matched.extend(keys);

            if next == 0 {
                break;
            }
            if pages >= max_pages {
                warn!(
                    pattern = %pattern,
                    pages,
                    "Scan stopped at the keyspace estimate; run invalidation again to finish"
                );
                break;
            }
            cursor = next;
        }

        // SCAN may return a key more than once.
        matched.sort_unstable();
        matched.dedup();

        for key in matched {
            summary.scanned += 1;
            match self.backend.del(&key).await {
                Ok(removed) => summary.deleted += removed,
                Err(e) => {
                    warn!(key = %key, "Failed to delete cache entry during invalidation: {}", e);
                    record_cache_error("invalidate");
                    summary.failed += 1;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::memory::InMemoryBackend;
    use crate::cache::CacheError;
    use crate::cache_key::build_key;
    use async_trait::async_trait;
    use std::time::Duration;

    /// Delegates to memory, except `broken` fails to delete and `vanished`
    /// is already gone by the time it is deleted.
    struct FlakyDeletes {
        inner: InMemoryBackend,
        broken: String,
        vanished: String,
    }

    #[async_trait]
    impl CacheBackend for FlakyDeletes {
        async fn exists(&self, key: &str) -> CacheResult<bool> {
            self.inner.exists(key).await
        }

        async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
            self.inner.get(key).await
        }

        async fn set_if_absent(&self, key: &str, value: &[u8], ttl: Duration) -> CacheResult<bool> {
            self.inner.set_if_absent(key, value, ttl).await
        }

        async fn del(&self, key: &str) -> CacheResult<u64> {
            if key == self.broken {
                return Err(CacheError::Unavailable("connection reset".into()));
            }
            if key == self.vanished {
                self.inner.del(key).await?;
                return Ok(0);
            }
            self.inner.del(key).await
        }

        async fn keyspace_size(&self) -> CacheResult<u64> {
            self.inner.keyspace_size().await
        }

        async fn scan(&self, cursor: u64, pattern: &str, count: usize) -> CacheResult<(u64, Vec<String>)> {
            self.inner.scan(cursor, pattern, count).await
        }

        async fn ping(&self) -> CacheResult<()> {
            self.inner.ping().await
        }
    }

    fn s(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[tokio::test]
    async fn removes_only_matching_route_and_identity() {
        let backend = InMemoryBackend::new();
        let ebs_123 = build_key("/ebs", "accounts=123", &s(&["123"]));
        let ebs_shared = build_key("/ebs", "", &s(&["123", "456"]));
        let ebs_456 = build_key("/ebs", "", &s(&["456"]));
        let lambda_123 = build_key("/lambda", "", &s(&["123"]));
        for key in [&ebs_123, &ebs_shared, &ebs_456, &lambda_123] {
            backend.insert_raw(key, "{}");
        }

        let invalidator = CacheInvalidator::new(Arc::new(backend.clone()), 2);
        let summary = invalidator
            .invalidate(&s(&["/ebs"]), &s(&["123"]))
            .await
            .unwrap();

        assert_eq!(summary.deleted, 2);
        let mut remaining = backend.keys();
        remaining.sort();
        let mut expected = vec![ebs_456, lambda_123];
        expected.sort();
        assert_eq!(remaining, expected);
    }

    #[tokio::test]
    async fn unknown_route_is_a_no_op() {
        let backend = InMemoryBackend::new();
        backend.insert_raw(&build_key("/ebs", "", &s(&["123"])), "{}");
        let invalidator = CacheInvalidator::new(Arc::new(backend.clone()), DEFAULT_SCAN_BATCH);
        let summary = invalidator
            .invalidate(&s(&["/nope"]), &s(&["123"]))
            .await
            .unwrap();
        assert_eq!(summary, InvalidationSummary::default());
        assert_eq!(backend.keys().len(), 1);
    }

    #[tokio::test]
    async fn unreachable_backend_returns_early_without_error() {
        let backend = InMemoryBackend::new();
        backend.set_unavailable(true);
        let invalidator = CacheInvalidator::new(Arc::new(backend), DEFAULT_SCAN_BATCH);
        let summary = invalidator
            .invalidate(&s(&["/ebs"]), &s(&["123"]))
            .await
            .unwrap();
        assert_eq!(summary, InvalidationSummary::default());
    }

    #[tokio::test]
    async fn one_failed_delete_does_not_stop_the_rest() {
        let inner = InMemoryBackend::new();
        let keys: Vec<String> = ["a=1", "a=2", "a=3", "a=4"]
            .iter()
            .map(|args| build_key("/rds", args, &s(&["123"])))
            .collect();
        for key in &keys {
            inner.insert_raw(key, "{}");
        }
        let backend = FlakyDeletes {
            inner: inner.clone(),
            broken: keys[1].clone(),
            vanished: keys[2].clone(),
        };

        let invalidator = CacheInvalidator::new(Arc::new(backend), 1);
        let summary = invalidator
            .invalidate(&s(&["/rds"]), &s(&["123"]))
            .await
            .unwrap();

        assert_eq!(summary.scanned, 4);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.deleted, 2, "a key already gone is not counted");
        assert_eq!(inner.keys(), vec![keys[1].clone()]);
    }
}
