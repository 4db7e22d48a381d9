//! Configuration management for the report cache service

use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub cache: CacheConfig,
    pub auth: AuthConfig,
    pub app: AppConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    pub url: String,
    pub pool_size: usize,
    pub connection_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub enabled: bool,
    pub ttl_seconds: u64,
    pub scan_batch_size: usize,
    pub max_body_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: String,
    pub log_level: String,
    pub port: u16,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        Ok(Config {
            database: DatabaseConfig {
                url: var("DATABASE_URL", "postgresql://localhost:5432/reports"),
                max_connections: var("DATABASE_MAX_CONNECTIONS", "10").parse()?,
            },
            redis: RedisConfig {
                url: var("REDIS_URL", "redis://127.0.0.1:6379"),
                pool_size: var("REDIS_POOL_SIZE", "16").parse()?,
                connection_timeout_seconds: var("REDIS_CONNECTION_TIMEOUT_SECONDS", "5").parse()?,
            },
            cache: CacheConfig {
                enabled: var("CACHE_ENABLED", "true").parse()?,
                ttl_seconds: var("CACHE_TTL_SECONDS", "86400").parse()?,
                scan_batch_size: var("CACHE_SCAN_BATCH_SIZE", "1000").parse()?,
                max_body_bytes: var("CACHE_MAX_BODY_BYTES", "8388608").parse()?,
            },
            auth: AuthConfig {
                jwt_secret: var("JWT_SECRET", "report-cache-development-secret"),
            },
            app: AppConfig {
                environment: var("ENVIRONMENT", "development"),
                log_level: var("LOG_LEVEL", "info"),
                port: var("PORT", "8000").parse()?,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_apply_when_unset() {
        let config = Config::from_lookup(|_| None).unwrap();
        assert_eq!(config.cache.ttl_seconds, 86_400);
        assert_eq!(config.cache.scan_batch_size, 1000);
        assert_eq!(config.cache.max_body_bytes, 8 * 1024 * 1024);
        assert!(config.cache.enabled);
        assert_eq!(config.app.port, 8000);
        assert_eq!(config.app.environment, "development");
    }

    #[test]
    fn overrides_are_read() {
        let vars: HashMap<&str, &str> = [
            ("CACHE_TTL_SECONDS", "60"),
            ("CACHE_ENABLED", "false"),
            ("ENVIRONMENT", "production"),
            ("LOG_LEVEL", "report_cache_ws=debug"),
        ]
        .into_iter()
        .collect();
        let config = Config::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.cache.ttl_seconds, 60);
        assert!(!config.cache.enabled);
        assert_eq!(config.app.environment, "production");
        assert_eq!(config.app.log_level, "report_cache_ws=debug");
    }

    #[test]
    fn malformed_numbers_are_rejected() {
        let result = Config::from_lookup(|k| (k == "PORT").then(|| "eighty".to_string()));
        assert!(result.is_err());
    }
}
