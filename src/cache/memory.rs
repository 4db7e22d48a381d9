// ============================================================================
// IN-MEMORY CACHE BACKEND
// ============================================================================
// Process-local stand-in for Redis: used by tests and by local runs without
// a Redis server. Honors TTLs, glob SCAN patterns and cursor pagination.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::backend::CacheBackend;
use super::error::{CacheError, CacheResult};

#[derive(Clone)]
struct StoredValue {
    bytes: Vec<u8>,
    expiry: Option<Instant>,
}

impl StoredValue {
    fn is_live(&self, now: Instant) -> bool {
        self.expiry.map_or(true, |at| at > now)
    }
}

#[derive(Clone, Default)]
pub struct InMemoryBackend {
    store: Arc<DashMap<String, StoredValue>>,
    unavailable: Arc<AtomicBool>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail as if the server were unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Store bytes without TTL or existence checks.
    pub fn insert_raw(&self, key: &str, bytes: impl Into<Vec<u8>>) {
        self.store.insert(
            key.to_string(),
            StoredValue {
                bytes: bytes.into(),
                expiry: None,
            },
        );
    }

    /// Live keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let now = Instant::now();
        let mut keys: Vec<String> = self
            .store
            .iter()
            .filter(|entry| entry.value().is_live(now))
            .map(|entry| entry.key().clone())
            .collect();
        keys.sort();
        keys
    }

    fn check_available(&self) -> CacheResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(CacheError::Unavailable("in-memory backend switched off".into()));
        }
        Ok(())
    }

    fn live_value(&self, key: &str) -> Option<Vec<u8>> {
        let now = Instant::now();
        let expired = match self.store.get(key) {
            Some(entry) if entry.is_live(now) => return Some(entry.bytes.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            self.store.remove_if(key, |_, v| !v.is_live(now));
        }
        None
    }
}

#[async_trait]
impl CacheBackend for InMemoryBackend {
    async fn exists(&self, key: &str) -> CacheResult<bool> {
        self.check_available()?;
        Ok(self.live_value(key).is_some())
    }

    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        self.check_available()?;
        Ok(self.live_value(key))
    }

    async fn set_if_absent(&self, key: &str, value: &[u8], ttl: Duration) -> CacheResult<bool> {
        self.check_available()?;
        let now = Instant::now();
        let fresh = StoredValue {
            bytes: value.to_vec(),
            expiry: Some(now + ttl),
        };

        match self.store.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_live(now) {
                    return Ok(false);
                }
                occupied.insert(fresh);
                Ok(true)
            }
            Entry::Vacant(vacant) => {
                vacant.insert(fresh);
                Ok(true)
            }
        }
    }

    async fn del(&self, key: &str) -> CacheResult<u64> {
        self.check_available()?;
        let now = Instant::now();
        Ok(match self.store.remove(key) {
            Some((_, v)) if v.is_live(now) => 1,
            _ => 0,
        })
    }

    async fn keyspace_size(&self) -> CacheResult<u64> {
        self.check_available()?;
        Ok(self.store.len() as u64)
    }

    async fn scan(&self, cursor: u64, pattern: &str, count: usize) -> CacheResult<(u64, Vec<String>)> {
        self.check_available()?;
        let keys = self.keys();
        let start = cursor as usize;
        if start >= keys.len() {
            return Ok((0, Vec::new()));
        }
        let end = (start + count.max(1)).min(keys.len());
        let matched = keys[start..end]
            .iter()
            .filter(|k| glob_match(pattern, k))
            .cloned()
            .collect();
        let next = if end >= keys.len() { 0 } else { end as u64 };
        Ok((next, matched))
    }

    async fn ping(&self) -> CacheResult<()> {
        self.check_available()
    }
}

/// Redis-style glob matching supporting `*`, `?` and `\` escapes.
pub fn glob_match(pattern: &str, candidate: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let candidate: Vec<char> = candidate.chars().collect();

    let (mut p, mut c) = (0usize, 0usize);
    let mut backtrack: Option<(usize, usize)> = None;

    while c < candidate.len() {
        match pattern.get(p) {
            Some('*') => {
                backtrack = Some((p, c));
                p += 1;
                continue;
            }
            Some('?') => {
                p += 1;
                c += 1;
                continue;
            }
            Some('\\') if p + 1 < pattern.len() && pattern[p + 1] == candidate[c] => {
                p += 2;
                c += 1;
                continue;
            }
            Some(&ch) if ch != '\\' && ch == candidate[c] => {
                p += 1;
                c += 1;
                continue;
            }
            _ => {}
        }
        match backtrack {
            Some((star_p, star_c)) => {
                p = star_p + 1;
                c = star_c + 1;
                backtrack = Some((star_p, star_c + 1));
            }
            None => return false,
        }
    }

    pattern[p..].iter().all(|&ch| ch == '*')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glob_basics() {
        assert!(glob_match("abc", "abc"));
        assert!(!glob_match("abc", "abd"));
        assert!(glob_match("a*", "a"));
        assert!(glob_match("a*c", "abbbc"));
        assert!(glob_match("a?c", "abc"));
        assert!(!glob_match("a?c", "ac"));
        assert!(glob_match("h-*-123-*", "h-args-123-"));
        assert!(glob_match("h-*-123-*", "h-args-001-123-456-"));
        assert!(!glob_match("h-*-123-*", "h-args-1234-"));
        assert!(!glob_match("h-*-123-*", "g-args-123-"));
    }

    #[test]
    fn glob_escapes() {
        assert!(glob_match("a\\*b", "a*b"));
        assert!(!glob_match("a\\*b", "axb"));
    }

    #[tokio::test]
    async fn set_if_absent_keeps_first_value() {
        let backend = InMemoryBackend::new();
        let ttl = Duration::from_secs(60);
        assert!(backend.set_if_absent("k", b"one", ttl).await.unwrap());
        assert!(!backend.set_if_absent("k", b"two", ttl).await.unwrap());
        assert_eq!(backend.get("k").await.unwrap(), Some(b"one".to_vec()));
    }

    #[tokio::test]
    async fn expired_entries_disappear() {
        let backend = InMemoryBackend::new();
        backend
            .set_if_absent("k", b"v", Duration::from_millis(20))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(!backend.exists("k").await.unwrap());
        assert_eq!(backend.get("k").await.unwrap(), None);
        assert!(backend.set_if_absent("k", b"w", Duration::from_secs(1)).await.unwrap());
    }

    #[tokio::test]
    async fn scan_pages_through_all_keys() {
        let backend = InMemoryBackend::new();
        for i in 0..25 {
            backend.insert_raw(&format!("key-{:02}", i), "x");
        }
        let mut cursor = 0;
        let mut seen = Vec::new();
        loop {
            let (next, keys) = backend.scan(cursor, "key-1*", 10).await.unwrap();
            seen.extend(keys);
            if next == 0 {
                break;
            }
            cursor = next;
        }
        assert_eq!(seen.len(), 10);
        assert!(seen.iter().all(|k| k.starts_with("key-1")));
    }

    #[tokio::test]
    async fn unavailable_switch_fails_every_call() {
        let backend = InMemoryBackend::new();
        backend.set_unavailable(true);
        assert!(backend.ping().await.is_err());
        assert!(backend.get("k").await.is_err());
        backend.set_unavailable(false);
        assert!(backend.ping().await.is_ok());
    }
}
