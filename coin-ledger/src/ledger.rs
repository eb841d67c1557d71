//! Ledger assembly
//!
//! [`Ledger::open`] builds the configured store, wraps it in the read-through
//! cache and hands the same store to the transfer and purchase engines.
//!
//! # Example
//!
//! ```no_run
//! use coin_ledger::{Ledger, LedgerConfig};
//!
//! #[tokio::main]
//! async fn main() -> coin_ledger::Result<()> {
//!     let config = LedgerConfig::from_file("ledger.toml")?;
//!     let ledger = Ledger::open(&config).await?;
//!
//!     let alice = ledger.store().find_user_by_name("alice").await?;
//!     let bob = ledger.store().find_user_by_name("bob").await?;
//!     if let (Some(alice), Some(bob)) = (alice, bob) {
//!         ledger.transfers().send_coin(alice.id, bob.id, 100).await?;
//!     }
//!
//!     ledger.close().await;
//!     Ok(())
//! }
//! ```

use crate::{
    cache::{CacheMetrics, NoopCache, RedisCache, TtlCache},
    cached_store::{CachedLedgerStore, InventoryCache, UserCache},
    config::{CacheBackend, LedgerConfig, StorageBackend},
    error::{Error, Result},
    memory::MemoryLedger,
    metrics::LedgerMetrics,
    postgres::PgLedger,
    purchase::PurchaseEngine,
    storage::LedgerStore,
    transfer::TransferEngine,
    types::{InventoryItem, User},
};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

/// Store, cache and engines wired together
pub struct Ledger {
    store: Arc<dyn LedgerStore>,
    transfers: TransferEngine,
    purchases: PurchaseEngine,
    metrics: LedgerMetrics,
    local_caches: Option<(Arc<TtlCache<User>>, Arc<TtlCache<Vec<InventoryItem>>>)>,
    sweepers: Vec<JoinHandle<()>>,
    postgres: Option<PgLedger>,
}

impl Ledger {
    /// Open the ledger described by `config`
    pub async fn open(config: &LedgerConfig) -> Result<Self> {
        config.validate()?;

        let (base, postgres): (Arc<dyn LedgerStore>, Option<PgLedger>) = match config.storage {
            StorageBackend::Postgres => {
                let pg = PgLedger::connect(&config.database)
                    .await?
                    .with_initial_balance(config.initial_balance);
                if config.database.run_migrations {
                    pg.migrate().await?;
                }
                (Arc::new(pg.clone()) as Arc<dyn LedgerStore>, Some(pg))
            }
            StorageBackend::Memory => {
                info!("Using in-memory ledger store; state is lost on exit");
                let memory = MemoryLedger::new().with_initial_balance(config.initial_balance);
                (Arc::new(memory) as Arc<dyn LedgerStore>, None)
            }
        };

        let mut local_caches = None;
        let mut sweepers = Vec::new();
        let (users, inventories): (UserCache, InventoryCache) = match config.cache.backend {
            CacheBackend::Memory => {
                let users = Arc::new(TtlCache::<User>::new(config.cache.ttl()));
                let inventories =
                    Arc::new(TtlCache::<Vec<InventoryItem>>::new(config.cache.ttl()));
                sweepers.push(users.spawn_sweeper(config.cache.sweep_interval()));
                sweepers.push(inventories.spawn_sweeper(config.cache.sweep_interval()));
                local_caches = Some((users.clone(), inventories.clone()));
                (users as UserCache, inventories as InventoryCache)
            }
            CacheBackend::Redis => {
                let users =
                    RedisCache::<User>::connect(&config.cache.redis_url, config.cache.ttl())
                        .await?;
                let inventories = RedisCache::<Vec<InventoryItem>>::connect(
                    &config.cache.redis_url,
                    config.cache.ttl(),
                )
                .await?;
                info!("Connected to Redis cache");
                (
                    Arc::new(users) as UserCache,
                    Arc::new(inventories) as InventoryCache,
                )
            }
            CacheBackend::None => (
                Arc::new(NoopCache::<User>::new()) as UserCache,
                Arc::new(NoopCache::<Vec<InventoryItem>>::new()) as InventoryCache,
            ),
        };

        let store: Arc<dyn LedgerStore> =
            Arc::new(CachedLedgerStore::new(base, users, inventories));

        let mut ledger = Self::with_store(store)?;
        ledger.local_caches = local_caches;
        ledger.sweepers = sweepers;
        ledger.postgres = postgres;

        info!(
            "Ledger opened (storage: {:?}, cache: {:?})",
            config.storage, config.cache.backend
        );
        Ok(ledger)
    }

    /// Build a ledger around an existing store
    pub fn with_store(store: Arc<dyn LedgerStore>) -> Result<Self> {
        let metrics = LedgerMetrics::new()
            .map_err(|e| Error::Internal(format!("Failed to create metrics: {}", e)))?;

        Ok(Self {
            transfers: TransferEngine::new(store.clone(), metrics.clone()),
            purchases: PurchaseEngine::new(store.clone(), metrics.clone()),
            store,
            metrics,
            local_caches: None,
            sweepers: Vec::new(),
            postgres: None,
        })
    }

    /// Store shared by the engines
    pub fn store(&self) -> &Arc<dyn LedgerStore> {
        &self.store
    }

    pub fn transfers(&self) -> &TransferEngine {
        &self.transfers
    }

    pub fn purchases(&self) -> &PurchaseEngine {
        &self.purchases
    }

    pub fn metrics(&self) -> &LedgerMetrics {
        &self.metrics
    }

    /// Combined counters of the in-process caches, if those are in use
    pub fn cache_metrics(&self) -> Option<CacheMetrics> {
        self.local_caches.as_ref().map(|(users, inventories)| {
            let users = users.metrics();
            let inventories = inventories.metrics();
            CacheMetrics {
                hits: users.hits + inventories.hits,
                misses: users.misses + inventories.misses,
                sets: users.sets + inventories.sets,
                deletes: users.deletes + inventories.deletes,
            }
        })
    }

    /// Stop the cache sweepers and close the database pool
    pub async fn close(&self) {
        for sweeper in &self.sweepers {
            sweeper.abort();
        }
        if let Some(pg) = &self.postgres {
            pg.close().await;
            info!("Database pool closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NewUser;

    fn memory_config() -> LedgerConfig {
        LedgerConfig {
            storage: StorageBackend::Memory,
            ..LedgerConfig::default()
        }
    }

    #[tokio::test]
    async fn test_open_memory_ledger() {
        let ledger = Ledger::open(&memory_config()).await.unwrap();
        let alice = ledger
            .store()
            .create_user(NewUser::new("alice", "h"))
            .await
            .unwrap();
        let bob = ledger
            .store()
            .create_user(NewUser::new("bob", "h"))
            .await
            .unwrap();

        ledger.transfers().send_coin(alice.id, bob.id, 500).await.unwrap();
        ledger.purchases().buy_item(alice.id, "cup").await.unwrap();

        assert_eq!(ledger.store().get_balance(alice.id).await.unwrap(), 480);
        assert_eq!(ledger.store().get_inventory(alice.id).await.unwrap()[0].quantity, 1);
        assert!(ledger.cache_metrics().is_some());

        ledger.close().await;
    }

    #[tokio::test]
    async fn test_open_respects_initial_balance() {
        let config = LedgerConfig {
            initial_balance: 50,
            ..memory_config()
        };
        let ledger = Ledger::open(&config).await.unwrap();

        let carol = ledger
            .store()
            .create_user(NewUser::new("carol", "h"))
            .await
            .unwrap();
        assert_eq!(ledger.store().get_balance(carol.id).await.unwrap(), 50);
    }

    #[tokio::test]
    async fn test_disabled_cache_has_no_metrics() {
        let mut config = memory_config();
        config.cache.backend = CacheBackend::None;

        let ledger = Ledger::open(&config).await.unwrap();
        assert!(ledger.cache_metrics().is_none());
    }

    #[tokio::test]
    async fn test_open_rejects_invalid_config() {
        let result = Ledger::open(&LedgerConfig::default()).await;
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
