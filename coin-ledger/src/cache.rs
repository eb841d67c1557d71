//! Read-through cache for user and inventory lookups
//!
//! Balances are never cached. A cache only ever holds committed data, and an
//! inventory entry is deleted after every committed increment (see
//! [`crate::cached_store`]).

use async_trait::async_trait;
use parking_lot::Mutex;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, warn};

/// Cache TTL constants (in seconds)
pub mod ttl {
    pub const ENTRY: u64 = 300; // 5 minutes
    pub const SWEEP_INTERVAL: u64 = 60; // 1 minute
}

/// Cache keys
pub mod keys {
    use crate::types::UserId;

    pub const USER: &str = "user";
    pub const INVENTORY: &str = "inventory";

    /// Key of the user record cached by username
    pub fn user(username: &str) -> String {
        format!("{}:{}", USER, username)
    }

    /// Key of the cached inventory of `user`
    pub fn inventory(user: UserId) -> String {
        format!("{}:{}", INVENTORY, user)
    }
}

/// Key/value cache with interchangeable backends
#[async_trait]
pub trait Cache<V>: Send + Sync {
    /// Cached value, `None` on a miss or an expired entry
    async fn get(&self, key: &str) -> Option<V>;

    /// Store `value` with a fresh expiry
    async fn set(&self, key: &str, value: V);

    /// Drop the entry immediately
    async fn delete(&self, key: &str);
}

#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct CacheMetrics {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub deletes: u64,
}

impl CacheMetrics {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64) / (total as f64) * 100.0
        }
    }
}

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

/// In-memory cache with per-entry TTL
///
/// Expired entries miss on read and are removed by [`TtlCache::sweep`], which
/// [`TtlCache::spawn_sweeper`] runs periodically.
pub struct TtlCache<V> {
    entries: Mutex<HashMap<String, Entry<V>>>,
    ttl: Duration,
    metrics: Mutex<CacheMetrics>,
}

impl<V> TtlCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
            metrics: Mutex::new(CacheMetrics::default()),
        }
    }

    /// Remove every expired entry, returning how many were dropped
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        before - entries.len()
    }

    /// Run [`TtlCache::sweep`] every `interval` until the cache is dropped
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let cache: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(cache) = cache.upgrade() else {
                    break;
                };
                let removed = cache.sweep();
                if removed > 0 {
                    debug!("Cache sweep removed {} expired entries", removed);
                }
            }
        })
    }

    /// Entries currently held, expired ones included
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn metrics(&self) -> CacheMetrics {
        self.metrics.lock().clone()
    }
}

#[async_trait]
impl<V> Cache<V> for TtlCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &str) -> Option<V> {
        let value = {
            let entries = self.entries.lock();
            entries
                .get(key)
                .filter(|entry| entry.expires_at > Instant::now())
                .map(|entry| entry.value.clone())
        };

        let mut metrics = self.metrics.lock();
        if value.is_some() {
            metrics.hits += 1;
        } else {
            metrics.misses += 1;
        }
        value
    }

    async fn set(&self, key: &str, value: V) {
        let entry = Entry {
            value,
            expires_at: Instant::now() + self.ttl,
        };
        self.entries.lock().insert(key.to_string(), entry);
        self.metrics.lock().sets += 1;
    }

    async fn delete(&self, key: &str) {
        self.entries.lock().remove(key);
        self.metrics.lock().deletes += 1;
    }
}

/// Cache that never holds anything
pub struct NoopCache<V> {
    _marker: PhantomData<fn() -> V>,
}

impl<V> NoopCache<V> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<V> Default for NoopCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<V> Cache<V> for NoopCache<V>
where
    V: Send + 'static,
{
    async fn get(&self, _key: &str) -> Option<V> {
        None
    }

    async fn set(&self, _key: &str, _value: V) {}

    async fn delete(&self, _key: &str) {}
}

/// Redis-backed cache storing JSON values with `SET EX`
///
/// Redis failures are logged and behave as misses; the store stays the source
/// of truth.
#[derive(Clone)]
pub struct RedisCache<V> {
    redis: ConnectionManager,
    ttl_secs: u64,
    _marker: PhantomData<fn() -> V>,
}

impl<V> RedisCache<V> {
    pub fn new(redis: ConnectionManager, ttl: Duration) -> Self {
        Self {
            redis,
            ttl_secs: ttl.as_secs().max(1),
            _marker: PhantomData,
        }
    }

    /// Open a managed connection to `url`
    pub async fn connect(url: &str, ttl: Duration) -> crate::Result<Self> {
        let client = redis::Client::open(url)?;
        let redis = ConnectionManager::new(client).await?;
        Ok(Self::new(redis, ttl))
    }
}

#[async_trait]
impl<V> Cache<V> for RedisCache<V>
where
    V: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn get(&self, key: &str) -> Option<V> {
        match self.redis.clone().get::<_, Option<String>>(key).await {
            Ok(Some(json)) => match serde_json::from_str(&json) {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!("Failed to deserialize cached value for {}: {}", key, e);
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                error!("Redis error getting {}: {}", key, e);
                None
            }
        }
    }

    async fn set(&self, key: &str, value: V) {
        let json = match serde_json::to_string(&value) {
            Ok(json) => json,
            Err(e) => {
                warn!("Failed to serialize value for {}: {}", key, e);
                return;
            }
        };

        let result: Result<(), redis::RedisError> =
            self.redis.clone().set_ex(key, json, self.ttl_secs).await;
        if let Err(e) = result {
            error!("Redis error setting {}: {}", key, e);
        }
    }

    async fn delete(&self, key: &str) {
        let result: Result<(), redis::RedisError> = self.redis.clone().del(key).await;
        if let Err(e) = result {
            error!("Redis error deleting {}: {}", key, e);
        }
    }
}
