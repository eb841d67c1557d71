//! Read-through caching in front of a [`LedgerStore`]
//!
//! User records are cached by username and inventories by user id. Units of
//! work opened through [`CachedLedgerStore`] remember which inventories they
//! incremented and delete those entries once the inner unit has committed.

use crate::{
    cache::{keys, Cache},
    error::Result,
    storage::{LedgerStore, UnitOfWork},
    types::{InventoryItem, NewUser, ShopItem, Transaction, User, UserId},
};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Cache of user records keyed by `user:{username}`
pub type UserCache = Arc<dyn Cache<User>>;

/// Cache of inventories keyed by `inventory:{user_id}`
pub type InventoryCache = Arc<dyn Cache<Vec<InventoryItem>>>;

/// [`LedgerStore`] decorator adding the read-through cache
pub struct CachedLedgerStore {
    inner: Arc<dyn LedgerStore>,
    users: UserCache,
    inventories: InventoryCache,
}

impl CachedLedgerStore {
    pub fn new(inner: Arc<dyn LedgerStore>, users: UserCache, inventories: InventoryCache) -> Self {
        Self {
            inner,
            users,
            inventories,
        }
    }

    /// Wrapped store
    pub fn inner(&self) -> &Arc<dyn LedgerStore> {
        &self.inner
    }
}

#[async_trait]
impl LedgerStore for CachedLedgerStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>> {
        let inner = self.inner.begin().await?;
        Ok(Box::new(CachedUnit {
            inner,
            touched: Vec::new(),
            inventories: self.inventories.clone(),
        }))
    }

    async fn create_user(&self, user: NewUser) -> Result<User> {
        self.inner.create_user(user).await
    }

    async fn find_user_by_name(&self, username: &str) -> Result<Option<User>> {
        let key = keys::user(username);
        if let Some(user) = self.users.get(&key).await {
            return Ok(Some(user));
        }

        let user = self.inner.find_user_by_name(username).await?;
        if let Some(user) = &user {
            self.users.set(&key, user.clone()).await;
        }
        Ok(user)
    }

    async fn find_username(&self, user: UserId) -> Result<Option<String>> {
        self.inner.find_username(user).await
    }

    async fn get_balance(&self, user: UserId) -> Result<i64> {
        self.inner.get_balance(user).await
    }

    async fn get_inventory(&self, user: UserId) -> Result<Vec<InventoryItem>> {
        let key = keys::inventory(user);
        if let Some(items) = self.inventories.get(&key).await {
            return Ok(items);
        }

        let items = self.inner.get_inventory(user).await?;
        self.inventories.set(&key, items.clone()).await;
        Ok(items)
    }

    async fn get_transactions(&self, user: UserId) -> Result<Vec<Transaction>> {
        self.inner.get_transactions(user).await
    }

    async fn get_item_price(&self, item_type: &str) -> Result<i64> {
        self.inner.get_item_price(item_type).await
    }

    async fn list_shop_items(&self) -> Result<Vec<ShopItem>> {
        self.inner.list_shop_items().await
    }

    async fn health_check(&self) -> Result<()> {
        self.inner.health_check().await
    }
}

struct CachedUnit {
    inner: Box<dyn UnitOfWork>,
    touched: Vec<UserId>,
    inventories: InventoryCache,
}

#[async_trait]
impl UnitOfWork for CachedUnit {
    async fn lock_balance(&mut self, user: UserId) -> Result<i64> {
        self.inner.lock_balance(user).await
    }

    async fn set_balance(&mut self, user: UserId, amount: i64) -> Result<()> {
        self.inner.set_balance(user, amount).await
    }

    async fn increment_inventory(&mut self, user: UserId, item_type: &str) -> Result<()> {
        self.inner.increment_inventory(user, item_type).await?;
        if !self.touched.contains(&user) {
            self.touched.push(user);
        }
        Ok(())
    }

    async fn append_transaction(
        &mut self,
        from: UserId,
        to: UserId,
        amount: i64,
    ) -> Result<Transaction> {
        self.inner.append_transaction(from, to, amount).await
    }

    async fn item_price(&mut self, item_type: &str) -> Result<i64> {
        self.inner.item_price(item_type).await
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let CachedUnit {
            inner,
            touched,
            inventories,
        } = *self;

        inner.commit().await?;

        for user in touched {
            inventories.delete(&keys::inventory(user)).await;
            debug!("Invalidated cached inventory of user {}", user);
        }
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.inner.rollback().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::TtlCache;
    use crate::memory::MemoryLedger;
    use std::time::Duration;

    fn cached_store() -> (CachedLedgerStore, Arc<TtlCache<User>>, Arc<TtlCache<Vec<InventoryItem>>>) {
        let users = Arc::new(TtlCache::new(Duration::from_secs(300)));
        let inventories = Arc::new(TtlCache::new(Duration::from_secs(300)));
        let store = CachedLedgerStore::new(
            Arc::new(MemoryLedger::new()),
            users.clone(),
            inventories.clone(),
        );
        (store, users, inventories)
    }

    #[tokio::test]
    async fn test_user_lookup_is_cached() {
        let (store, users, _) = cached_store();
        store.create_user(NewUser::new("alice", "hash")).await.unwrap();

        let first = store.find_user_by_name("alice").await.unwrap();
        let second = store.find_user_by_name("alice").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(users.metrics().hits, 1);
        assert_eq!(users.metrics().misses, 1);
    }

    #[tokio::test]
    async fn test_unknown_user_not_cached() {
        let (store, users, _) = cached_store();

        assert!(store.find_user_by_name("ghost").await.unwrap().is_none());
        store.create_user(NewUser::new("ghost", "hash")).await.unwrap();

        assert!(store.find_user_by_name("ghost").await.unwrap().is_some());
        assert_eq!(users.metrics().sets, 1);
    }

    #[tokio::test]
    async fn test_committed_increment_invalidates_inventory() {
        let (store, _, inventories) = cached_store();
        let alice = store.create_user(NewUser::new("alice", "hash")).await.unwrap();

        assert!(store.get_inventory(alice.id).await.unwrap().is_empty());
        assert_eq!(inventories.len(), 1);

        store.increment_inventory(alice.id, "cup").await.unwrap();
        assert!(inventories.is_empty());

        let inventory = store.get_inventory(alice.id).await.unwrap();
        assert_eq!(inventory.len(), 1);
        assert_eq!(inventory[0].quantity, 1);
    }

    #[tokio::test]
    async fn test_rolled_back_increment_keeps_cache() {
        let (store, _, inventories) = cached_store();
        let alice = store.create_user(NewUser::new("alice", "hash")).await.unwrap();
        store.get_inventory(alice.id).await.unwrap();

        let mut unit = store.begin().await.unwrap();
        unit.increment_inventory(alice.id, "cup").await.unwrap();
        unit.rollback().await.unwrap();

        assert_eq!(inventories.len(), 1);
        assert!(store.get_inventory(alice.id).await.unwrap().is_empty());
    }
}
