//! Ledger store contract
//!
//! The store is the only component that touches persistent state. Reads that
//! need no isolation go straight to [`LedgerStore`]; read-modify-write
//! sequences run inside a [`UnitOfWork`] obtained from [`LedgerStore::begin`].
//!
//! # Unit of work
//!
//! - `lock_balance` reads a balance and holds its row lock until the unit ends,
//!   so two units debiting the same account serialize instead of losing an
//!   update.
//! - Writes become visible only on `commit`. Dropping a unit without committing
//!   rolls it back, which also covers a cancelled request future.

use crate::{
    error::Result,
    types::{InventoryItem, NewUser, ShopItem, Transaction, User, UserId},
};
use async_trait::async_trait;

/// Atomic, all-or-nothing sequence of ledger reads and writes
#[async_trait]
pub trait UnitOfWork: Send {
    /// Read the balance of `user` and lock it for the rest of the unit.
    ///
    /// Returns 0 when the user has no balance row.
    async fn lock_balance(&mut self, user: UserId) -> Result<i64>;

    /// Overwrite the balance of `user`. Callers guarantee `amount >= 0`.
    async fn set_balance(&mut self, user: UserId, amount: i64) -> Result<()>;

    /// Add one unit of `item_type` to the inventory of `user`.
    async fn increment_inventory(&mut self, user: UserId, item_type: &str) -> Result<()>;

    /// Append a `send` transaction stamped with the current time.
    async fn append_transaction(
        &mut self,
        from: UserId,
        to: UserId,
        amount: i64,
    ) -> Result<Transaction>;

    /// Catalog price of `item_type`; `Error::NotFound` when unknown.
    async fn item_price(&mut self, item_type: &str) -> Result<i64>;

    /// Make every write of the unit durable and visible.
    async fn commit(self: Box<Self>) -> Result<()>;

    /// Discard every write of the unit.
    async fn rollback(self: Box<Self>) -> Result<()>;
}

/// Durable record of users, balances, inventory and transactions
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Open a unit of work.
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>>;

    /// Insert a user together with its initial balance grant.
    ///
    /// Fails with `Error::UserExists` when the username is taken.
    async fn create_user(&self, user: NewUser) -> Result<User>;

    /// Look a user up by username.
    async fn find_user_by_name(&self, username: &str) -> Result<Option<User>>;

    /// Resolve the username of `user`.
    async fn find_username(&self, user: UserId) -> Result<Option<String>>;

    /// Committed balance of `user`; 0 when no balance row exists.
    async fn get_balance(&self, user: UserId) -> Result<i64>;

    /// Overwrite the balance of `user` in its own unit of work.
    async fn set_balance(&self, user: UserId, amount: i64) -> Result<()> {
        let mut unit = self.begin().await?;
        unit.set_balance(user, amount).await?;
        unit.commit().await
    }

    /// Inventory of `user`; empty when nothing was bought.
    async fn get_inventory(&self, user: UserId) -> Result<Vec<InventoryItem>>;

    /// Add one unit of `item_type` to `user` in its own unit of work.
    async fn increment_inventory(&self, user: UserId, item_type: &str) -> Result<()> {
        let mut unit = self.begin().await?;
        unit.increment_inventory(user, item_type).await?;
        unit.commit().await
    }

    /// Append a transaction in its own unit of work.
    async fn append_transaction(
        &self,
        from: UserId,
        to: UserId,
        amount: i64,
    ) -> Result<Transaction> {
        let mut unit = self.begin().await?;
        let transaction = unit.append_transaction(from, to, amount).await?;
        unit.commit().await?;
        Ok(transaction)
    }

    /// Every transaction where `user` is sender or recipient.
    async fn get_transactions(&self, user: UserId) -> Result<Vec<Transaction>>;

    /// Catalog price of `item_type`; `Error::NotFound` when unknown.
    async fn get_item_price(&self, item_type: &str) -> Result<i64>;

    /// Full shop catalog.
    async fn list_shop_items(&self) -> Result<Vec<ShopItem>>;

    /// Cheap liveness probe of the backing storage.
    async fn health_check(&self) -> Result<()>;
}
