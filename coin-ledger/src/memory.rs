//! In-process ledger store
//!
//! A single writer at a time: every unit of work owns the state mutex from
//! `begin` until it commits or is dropped. Writes are staged inside the unit
//! and applied to the shared state only on commit, so a dropped unit leaves no
//! trace and plain reads never observe uncommitted data.

use crate::{
    error::{Error, Result},
    storage::{LedgerStore, UnitOfWork},
    types::{InventoryItem, NewUser, ShopItem, Transaction, TransactionKind, User, UserId},
    INITIAL_BALANCE,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Default)]
struct LedgerState {
    last_user_id: i64,
    last_transaction_id: i64,
    users: BTreeMap<UserId, User>,
    usernames: HashMap<String, UserId>,
    balances: HashMap<UserId, i64>,
    inventory: BTreeMap<(UserId, String), i64>,
    transactions: Vec<Transaction>,
    catalog: HashMap<String, i64>,
}

impl LedgerState {
    fn ensure_user(&self, user: UserId) -> Result<()> {
        if self.users.contains_key(&user) {
            Ok(())
        } else {
            Err(Error::NotFound(format!("user {}", user)))
        }
    }

    fn item_price(&self, item_type: &str) -> Result<i64> {
        self.catalog
            .get(item_type)
            .copied()
            .ok_or_else(|| Error::NotFound(format!("item {}", item_type)))
    }
}

/// Ledger store kept in process memory
#[derive(Clone)]
pub struct MemoryLedger {
    state: Arc<Mutex<LedgerState>>,
    initial_balance: i64,
}

impl MemoryLedger {
    /// Empty ledger with the default shop catalog
    pub fn new() -> Self {
        Self::with_catalog(ShopItem::default_catalog())
    }

    /// Empty ledger with the given catalog
    pub fn with_catalog(items: impl IntoIterator<Item = ShopItem>) -> Self {
        let state = LedgerState {
            catalog: items
                .into_iter()
                .map(|item| (item.item_type, item.price))
                .collect(),
            ..LedgerState::default()
        };

        Self {
            state: Arc::new(Mutex::new(state)),
            initial_balance: INITIAL_BALANCE,
        }
    }

    /// Override the registration grant
    pub fn with_initial_balance(mut self, amount: i64) -> Self {
        self.initial_balance = amount;
        self
    }

    /// Sum of all balances; constant under transfers
    pub async fn total_coins(&self) -> i64 {
        self.state.lock().await.balances.values().sum()
    }
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerStore for MemoryLedger {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>> {
        let state = self.state.clone().lock_owned().await;
        Ok(Box::new(MemoryUnit {
            state,
            balances: HashMap::new(),
            inventory: Vec::new(),
            transactions: Vec::new(),
        }))
    }

    async fn create_user(&self, user: NewUser) -> Result<User> {
        let mut state = self.state.lock().await;
        if state.usernames.contains_key(&user.username) {
            return Err(Error::UserExists(user.username));
        }

        state.last_user_id += 1;
        let id = UserId(state.last_user_id);
        let now = Utc::now();
        let created = User {
            id,
            username: user.username,
            password_hash: user.password_hash,
            created_at: now,
            updated_at: now,
        };

        state.usernames.insert(created.username.clone(), id);
        state.users.insert(id, created.clone());
        state.balances.insert(id, self.initial_balance);

        Ok(created)
    }

    async fn find_user_by_name(&self, username: &str) -> Result<Option<User>> {
        let state = self.state.lock().await;
        Ok(state
            .usernames
            .get(username)
            .and_then(|id| state.users.get(id))
            .cloned())
    }

    async fn find_username(&self, user: UserId) -> Result<Option<String>> {
        let state = self.state.lock().await;
        Ok(state.users.get(&user).map(|u| u.username.clone()))
    }

    async fn get_balance(&self, user: UserId) -> Result<i64> {
        let state = self.state.lock().await;
        Ok(state.balances.get(&user).copied().unwrap_or(0))
    }

    async fn get_inventory(&self, user: UserId) -> Result<Vec<InventoryItem>> {
        let state = self.state.lock().await;
        Ok(state
            .inventory
            .range((user, String::new())..)
            .take_while(|((owner, _), _)| *owner == user)
            .map(|((_, item_type), quantity)| InventoryItem {
                item_type: item_type.clone(),
                quantity: *quantity,
            })
            .collect())
    }

    async fn get_transactions(&self, user: UserId) -> Result<Vec<Transaction>> {
        let state = self.state.lock().await;
        Ok(state
            .transactions
            .iter()
            .filter(|t| t.from_user_id == user || t.to_user_id == user)
            .cloned()
            .collect())
    }

    async fn get_item_price(&self, item_type: &str) -> Result<i64> {
        self.state.lock().await.item_price(item_type)
    }

    async fn list_shop_items(&self) -> Result<Vec<ShopItem>> {
        let state = self.state.lock().await;
        let mut items: Vec<ShopItem> = state
            .catalog
            .iter()
            .map(|(item_type, price)| ShopItem::new(item_type.clone(), *price))
            .collect();
        items.sort_by(|a, b| a.item_type.cmp(&b.item_type));
        Ok(items)
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}

/// Unit of work over [`MemoryLedger`]; holds the writer lock while alive
struct MemoryUnit {
    state: OwnedMutexGuard<LedgerState>,
    balances: HashMap<UserId, i64>,
    inventory: Vec<(UserId, String)>,
    transactions: Vec<Transaction>,
}

#[async_trait]
impl UnitOfWork for MemoryUnit {
    async fn lock_balance(&mut self, user: UserId) -> Result<i64> {
        if let Some(staged) = self.balances.get(&user) {
            return Ok(*staged);
        }
        Ok(self.state.balances.get(&user).copied().unwrap_or(0))
    }

    async fn set_balance(&mut self, user: UserId, amount: i64) -> Result<()> {
        self.state.ensure_user(user)?;
        self.balances.insert(user, amount);
        Ok(())
    }

    async fn increment_inventory(&mut self, user: UserId, item_type: &str) -> Result<()> {
        self.state.ensure_user(user)?;
        self.inventory.push((user, item_type.to_string()));
        Ok(())
    }

    async fn append_transaction(
        &mut self,
        from: UserId,
        to: UserId,
        amount: i64,
    ) -> Result<Transaction> {
        self.state.ensure_user(from)?;
        self.state.ensure_user(to)?;

        let transaction = Transaction {
            id: self.state.last_transaction_id + self.transactions.len() as i64 + 1,
            from_user_id: from,
            to_user_id: to,
            amount,
            kind: TransactionKind::Send,
            created_at: Utc::now(),
        };
        self.transactions.push(transaction.clone());
        Ok(transaction)
    }

    async fn item_price(&mut self, item_type: &str) -> Result<i64> {
        self.state.item_price(item_type)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let MemoryUnit {
            mut state,
            balances,
            inventory,
            transactions,
        } = *self;

        state.balances.extend(balances);
        for key in inventory {
            *state.inventory.entry(key).or_insert(0) += 1;
        }
        state.last_transaction_id += transactions.len() as i64;
        state.transactions.extend(transactions);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}
