//! PostgreSQL ledger store
//!
//! Units of work are database transactions. `lock_balance` takes a row lock
//! with `SELECT ... FOR UPDATE`, so concurrent debits of one account queue
//! behind each other until the first unit commits or rolls back.

use crate::{
    config::DatabaseConfig,
    error::{Error, Result},
    storage::{LedgerStore, UnitOfWork},
    types::{InventoryItem, NewUser, ShopItem, Transaction, TransactionKind, User, UserId},
    INITIAL_BALANCE,
};
use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Postgres;
use tracing::info;

/// Ledger store backed by PostgreSQL
#[derive(Clone)]
pub struct PgLedger {
    pool: PgPool,
    initial_balance: i64,
}

impl PgLedger {
    /// Connect a pool using `config`
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout())
            .connect(&config.url)
            .await?;

        info!("Database connection pool created successfully");

        Ok(Self::from_pool(pool))
    }

    /// Wrap an existing pool
    pub fn from_pool(pool: PgPool) -> Self {
        Self {
            pool,
            initial_balance: INITIAL_BALANCE,
        }
    }

    /// Override the registration grant
    pub fn with_initial_balance(mut self, amount: i64) -> Self {
        self.initial_balance = amount;
        self
    }

    /// Apply the embedded schema migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Database migrations applied");
        Ok(())
    }

    /// Underlying pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Close every pooled connection
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl LedgerStore for PgLedger {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgUnit { tx }))
    }

    async fn create_user(&self, user: NewUser) -> Result<User> {
        let mut tx = self.pool.begin().await?;

        let created = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, password_hash, created_at, updated_at)
            VALUES ($1, $2, NOW(), NOW())
            RETURNING id, username, password_hash, created_at, updated_at
            "#,
        )
        .bind(&user.username)
        .bind(&user.password_hash)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                Error::UserExists(user.username.clone())
            }
            other => Error::Database(other),
        })?;

        sqlx::query("INSERT INTO coins (user_id, amount) VALUES ($1, $2)")
            .bind(created.id)
            .bind(self.initial_balance)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(
            "User {} created with {} coins in wallet",
            created.username, self.initial_balance
        );

        Ok(created)
    }

    async fn find_user_by_name(&self, username: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, password_hash, created_at, updated_at
            FROM users WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_username(&self, user: UserId) -> Result<Option<String>> {
        let username = sqlx::query_scalar::<_, String>("SELECT username FROM users WHERE id = $1")
            .bind(user)
            .fetch_optional(&self.pool)
            .await?;

        Ok(username)
    }

    async fn get_balance(&self, user: UserId) -> Result<i64> {
        let amount = sqlx::query_scalar::<_, i64>("SELECT amount FROM coins WHERE user_id = $1")
            .bind(user)
            .fetch_optional(&self.pool)
            .await?;

        Ok(amount.unwrap_or(0))
    }

    async fn get_inventory(&self, user: UserId) -> Result<Vec<InventoryItem>> {
        let items = sqlx::query_as::<_, InventoryItem>(
            r#"
            SELECT item_type, quantity FROM inventory
            WHERE user_id = $1
            ORDER BY item_type
            "#,
        )
        .bind(user)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    async fn get_transactions(&self, user: UserId) -> Result<Vec<Transaction>> {
        let transactions = sqlx::query_as::<_, Transaction>(
            r#"
            SELECT id, from_user_id, to_user_id, amount, transaction_type, created_at
            FROM coin_transactions
            WHERE from_user_id = $1 OR to_user_id = $1
            ORDER BY id
            "#,
        )
        .bind(user)
        .fetch_all(&self.pool)
        .await?;

        Ok(transactions)
    }

    async fn get_item_price(&self, item_type: &str) -> Result<i64> {
        fetch_item_price(&self.pool, item_type).await
    }

    async fn list_shop_items(&self) -> Result<Vec<ShopItem>> {
        let items =
            sqlx::query_as::<_, ShopItem>("SELECT item_type, price FROM shop ORDER BY item_type")
                .fetch_all(&self.pool)
                .await?;

        Ok(items)
    }

    async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

async fn fetch_item_price<'e, E>(executor: E, item_type: &str) -> Result<i64>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    sqlx::query_scalar::<_, i64>("SELECT price FROM shop WHERE item_type = $1")
        .bind(item_type)
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| Error::NotFound(format!("item {}", item_type)))
}

/// Unit of work over one PostgreSQL transaction; rolls back when dropped
struct PgUnit {
    tx: sqlx::Transaction<'static, Postgres>,
}

#[async_trait]
impl UnitOfWork for PgUnit {
    async fn lock_balance(&mut self, user: UserId) -> Result<i64> {
        let amount = sqlx::query_scalar::<_, i64>(
            "SELECT amount FROM coins WHERE user_id = $1 FOR UPDATE",
        )
        .bind(user)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(amount.unwrap_or(0))
    }

    async fn set_balance(&mut self, user: UserId, amount: i64) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO coins (user_id, amount) VALUES ($1, $2)
            ON CONFLICT (user_id) DO UPDATE SET amount = EXCLUDED.amount
            "#,
        )
        .bind(user)
        .bind(amount)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn increment_inventory(&mut self, user: UserId, item_type: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO inventory (user_id, item_type, quantity) VALUES ($1, $2, 1)
            ON CONFLICT (user_id, item_type)
            DO UPDATE SET quantity = inventory.quantity + 1
            "#,
        )
        .bind(user)
        .bind(item_type)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn append_transaction(
        &mut self,
        from: UserId,
        to: UserId,
        amount: i64,
    ) -> Result<Transaction> {
        let transaction = sqlx::query_as::<_, Transaction>(
            r#"
            INSERT INTO coin_transactions (from_user_id, to_user_id, amount, transaction_type, created_at)
            VALUES ($1, $2, $3, $4, NOW())
            RETURNING id, from_user_id, to_user_id, amount, transaction_type, created_at
            "#,
        )
        .bind(from)
        .bind(to)
        .bind(amount)
        .bind(TransactionKind::Send.as_str())
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(transaction)
    }

    async fn item_price(&mut self, item_type: &str) -> Result<i64> {
        fetch_item_price(&mut *self.tx, item_type).await
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
