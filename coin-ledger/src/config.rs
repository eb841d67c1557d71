//! Configuration for the ledger

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Backing store
    pub storage: StorageBackend,

    /// PostgreSQL settings (used when `storage = "postgres"`)
    pub database: DatabaseConfig,

    /// Read-through cache settings
    pub cache: CacheConfig,

    /// Coins granted at registration
    pub initial_balance: i64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            storage: StorageBackend::Postgres,
            database: DatabaseConfig::default(),
            cache: CacheConfig::default(),
            initial_balance: crate::INITIAL_BALANCE,
        }
    }
}

/// Where the ledger keeps its state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// PostgreSQL through sqlx
    Postgres,
    /// Process memory; state is lost on exit
    Memory,
}

/// PostgreSQL configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Connection URL
    pub url: String,

    /// Pool size
    pub max_connections: u32,

    /// Seconds to wait for a pooled connection
    pub acquire_timeout_secs: u64,

    /// Apply embedded migrations on startup
    pub run_migrations: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 10,
            acquire_timeout_secs: 5,
            run_migrations: true,
        }
    }
}

impl DatabaseConfig {
    /// Pool acquire timeout
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }
}

/// Cache implementation in front of user and inventory lookups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    /// In-process TTL map with a background sweep
    Memory,
    /// Shared Redis instance
    Redis,
    /// Caching disabled
    None,
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache implementation
    pub backend: CacheBackend,

    /// Entry lifetime (seconds)
    pub ttl_secs: u64,

    /// Expired-entry sweep period (seconds)
    pub sweep_interval_secs: u64,

    /// Redis URL (used when `backend = "redis"`)
    pub redis_url: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::Memory,
            ttl_secs: crate::cache::ttl::ENTRY,
            sweep_interval_secs: crate::cache::ttl::SWEEP_INTERVAL,
            redis_url: String::new(),
        }
    }
}

impl CacheConfig {
    /// Entry lifetime
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    /// Sweep period
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl LedgerConfig {
    /// Load from a TOML file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: LedgerConfig = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        Ok(config)
    }

    /// Reject settings the ledger cannot start with
    pub fn validate(&self) -> crate::Result<()> {
        if self.storage == StorageBackend::Postgres && self.database.url.is_empty() {
            return Err(crate::Error::Config(
                "Database URL is required for postgres storage".to_string(),
            ));
        }

        if self.cache.backend == CacheBackend::Redis && self.cache.redis_url.is_empty() {
            return Err(crate::Error::Config(
                "Redis URL is required for the redis cache".to_string(),
            ));
        }

        if self.cache.ttl_secs == 0 || self.cache.sweep_interval_secs == 0 {
            return Err(crate::Error::Config(
                "Cache TTL and sweep interval must be positive".to_string(),
            ));
        }

        if self.initial_balance < 0 {
            return Err(crate::Error::Config(
                "Initial balance cannot be negative".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = LedgerConfig::default();
        assert_eq!(config.storage, StorageBackend::Postgres);
        assert_eq!(config.initial_balance, 1000);
        assert_eq!(config.cache.ttl(), Duration::from_secs(300));
        assert_eq!(config.cache.sweep_interval(), Duration::from_secs(60));
    }

    #[test]
    fn test_postgres_requires_url() {
        let config = LedgerConfig::default();
        assert!(config.validate().is_err());

        let config = LedgerConfig {
            storage: StorageBackend::Memory,
            ..LedgerConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_file_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "storage = \"memory\"\n\n[cache]\nbackend = \"none\"\nttl_secs = 30"
        )
        .unwrap();

        let config = LedgerConfig::from_file(file.path()).unwrap();
        assert_eq!(config.storage, StorageBackend::Memory);
        assert_eq!(config.cache.backend, CacheBackend::None);
        assert_eq!(config.cache.ttl_secs, 30);
        assert_eq!(config.cache.sweep_interval_secs, 60);
        assert_eq!(config.database.max_connections, 10);
    }
}
