use shared::Config;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::cache::{CacheBackend, CacheInvalidator, CacheStore, RedisBackend};
use crate::identity::{IdentityResolver, PgIdentityResolver};
use crate::middleware::{JwtKeys, ResponseCache};

/// Estado compartido de la aplicación.
/// Every process-wide dependency is created here once and injected.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db_pool: PgPool,
    pub cache_backend: Arc<dyn CacheBackend>,
    pub identity_resolver: Arc<dyn IdentityResolver>,
    pub response_cache: Arc<ResponseCache>,
    pub invalidator: CacheInvalidator,
    pub jwt_keys: Arc<JwtKeys>,
}

impl AppState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let db_pool = PgPoolOptions::new()
            .max_connections(config.database.max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .connect(&config.database.url)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to connect to database: {}", e))?;

        let mut redis_config = deadpool_redis::Config::from_url(&config.redis.url);
        let mut pool_config = deadpool_redis::PoolConfig::new(config.redis.pool_size);
        let connect_timeout = Duration::from_secs(config.redis.connection_timeout_seconds);
        pool_config.timeouts.wait = Some(connect_timeout);
        pool_config.timeouts.create = Some(connect_timeout);
        redis_config.pool = Some(pool_config);
        let redis_pool = redis_config
            .create_pool(Some(deadpool_redis::Runtime::Tokio1))
            .map_err(|e| anyhow::anyhow!("Failed to create Redis pool: {}", e))?;
        let backend: Arc<dyn CacheBackend> = Arc::new(RedisBackend::new(redis_pool));

        // One health check at startup; request paths fail open afterwards.
        match backend.ping().await {
            Ok(()) => info!("✅ Redis reachable at {}", config.redis.url),
            Err(e) => warn!("⚠️ Redis health check failed, responses will not be cached until it recovers: {}", e),
        }

        let resolver: Arc<dyn IdentityResolver> = Arc::new(PgIdentityResolver::new(db_pool.clone()));

        Ok(Self::from_parts(config, db_pool, backend, resolver))
    }

    pub fn from_parts(
        config: Config,
        db_pool: PgPool,
        cache_backend: Arc<dyn CacheBackend>,
        identity_resolver: Arc<dyn IdentityResolver>,
    ) -> Self {
        let response_cache = ResponseCache::new(
            CacheStore::new(cache_backend.clone()),
            identity_resolver.clone(),
            Duration::from_secs(config.cache.ttl_seconds),
        )
        .with_enabled(config.cache.enabled)
        .with_max_body_bytes(config.cache.max_body_bytes);
        let invalidator = CacheInvalidator::new(cache_backend.clone(), config.cache.scan_batch_size);
        let jwt_keys = JwtKeys::from_secret(&config.auth.jwt_secret);

        Self {
            config: Arc::new(config),
            db_pool,
            cache_backend,
            identity_resolver,
            response_cache: Arc::new(response_cache),
            invalidator,
            jwt_keys: Arc::new(jwt_keys),
        }
    }
}
