// ============================================================================
// CACHE BACKEND - Shared key-value store protocol
// ============================================================================

use async_trait::async_trait;
use deadpool_redis::{Connection, Pool};
use std::time::Duration;
use tracing::{debug, error};

use super::error::{CacheError, CacheResult};

/// Single-key operations against the shared store. Every call is an
/// independent round-trip; implementations must be safe to share across tasks.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn exists(&self, key: &str) -> CacheResult<bool>;

    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>>;

    /// Atomically store `value` with `ttl` unless `key` already exists.
    /// Returns `true` when this call created the entry.
    async fn set_if_absent(&self, key: &str, value: &[u8], ttl: Duration) -> CacheResult<bool>;

    /// Returns the number of keys removed (0 or 1).
    async fn del(&self, key: &str) -> CacheResult<u64>;

    /// Upper bound on the number of keys held by the store.
    async fn keyspace_size(&self) -> CacheResult<u64>;

    /// One page of a cursor scan. A returned cursor of 0 ends the iteration.
    async fn scan(&self, cursor: u64, pattern: &str, count: usize) -> CacheResult<(u64, Vec<String>)>;

    async fn ping(&self) -> CacheResult<()>;
}

/// Redis-backed implementation over a deadpool connection pool.
#[derive(Clone)]
pub struct RedisBackend {
    pool: Pool,
}

impl RedisBackend {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    async fn get_connection(&self) -> CacheResult<Connection> {
        self.pool.get().await.map_err(|e| {
            error!("Failed to get Redis connection: {}", e);
            CacheError::from(e)
        })
    }
}

#[async_trait]
impl CacheBackend for RedisBackend {
    async fn exists(&self, key: &str) -> CacheResult<bool> {
        let mut conn = self.get_connection().await?;
        let exists: bool = redis::cmd("EXISTS").arg(key).query_async(&mut conn).await?;
        Ok(exists)
    }

    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        let mut conn = self.get_connection().await?;
        let value: Option<Vec<u8>> = redis::cmd("GET").arg(key).query_async(&mut conn).await?;
        Ok(value)
    }

    async fn set_if_absent(&self, key: &str, value: &[u8], ttl: Duration) -> CacheResult<bool> {
        let mut conn = self.get_connection().await?;
        // PX keeps sub-second TTLs exact; NX makes the write first-writer-wins.
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("PX")
            .arg(ttl.as_millis().max(1) as u64)
            .query_async(&mut conn)
            .await?;
        Ok(reply.is_some())
    }

    async fn del(&self, key: &str) -> CacheResult<u64> {
        let mut conn = self.get_connection().await?;
        let deleted: u64 = redis::cmd("DEL").arg(key).query_async(&mut conn).await?;
        Ok(deleted)
    }

    async fn keyspace_size(&self) -> CacheResult<u64> {
        let mut conn = self.get_connection().await?;
        let info: String = redis::cmd("INFO").arg("keyspace").query_async(&mut conn).await?;
        parse_keyspace_keys(&info)
            .ok_or_else(|| CacheError::Unavailable("keyspace section missing from INFO".into()))
    }

    async fn scan(&self, cursor: u64, pattern: &str, count: usize) -> CacheResult<(u64, Vec<String>)> {
        let mut conn = self.get_connection().await?;
        let page: (u64, Vec<String>) = redis::cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg(pattern)
            .arg("COUNT")
            .arg(count)
            .query_async(&mut conn)
            .await?;
        debug!(pattern = %pattern, cursor, next = page.0, matched = page.1.len(), "Redis SCAN page");
        Ok(page)
    }

    async fn ping(&self) -> CacheResult<()> {
        let mut conn = self.get_connection().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}

/// Sum the `keys=` counters of an `INFO keyspace` reply.
///
/// An empty keyspace section (no `dbN:` lines) is a valid reply meaning zero
/// keys; `None` is returned only when the section header is absent.
pub fn parse_keyspace_keys(info: &str) -> Option<u64> {
    let mut seen_section = false;
    let mut total = 0u64;

    for line in info.lines().map(str::trim) {
        if line.eq_ignore_ascii_case("# keyspace") {
            seen_section = true;
            continue;
        }
        let Some((db, stats)) = line.split_once(':') else {
            continue;
        };
        if !db.starts_with("db") {
            continue;
        }
        seen_section = true;
        let keys = stats
            .split(',')
            .filter_map(|field| field.strip_prefix("keys="))
            .find_map(|n| n.parse::<u64>().ok());
        total += keys?;
    }

    seen_section.then_some(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sums_keys_across_databases() {
        let info = "# Keyspace\r\ndb0:keys=12,expires=10,avg_ttl=3000\r\ndb3:keys=5,expires=0,avg_ttl=0\r\n";
        assert_eq!(parse_keyspace_keys(info), Some(17));
    }

    #[test]
    fn empty_keyspace_section_is_zero() {
        assert_eq!(parse_keyspace_keys("# Keyspace\r\n"), Some(0));
    }

    #[test]
    fn missing_section_is_unknown() {
        assert_eq!(parse_keyspace_keys(""), None);
        assert_eq!(parse_keyspace_keys("# Server\r\nredis_version:7.2.0\r\n"), None);
    }

    #[test]
    fn malformed_counter_is_unknown() {
        assert_eq!(parse_keyspace_keys("# Keyspace\r\ndb0:keys=many\r\n"), None);
    }
}
