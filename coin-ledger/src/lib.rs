//! Coin Ledger
//!
//! Balances, inventories and the transfer log of a virtual coin economy.
//!
//! # Architecture
//!
//! - **Ledger Store**: [`LedgerStore`] trait with PostgreSQL and in-memory
//!   implementations; read-modify-write runs inside a [`UnitOfWork`]
//! - **Transfer Engine**: moves coins between users under ordered row locks
//! - **Purchase Engine**: debits the buyer and increments their inventory
//! - **Read-Through Cache**: TTL cache in front of user and inventory lookups
//!
//! # Invariants
//!
//! - Balances never go negative
//! - Transfers conserve the total number of coins
//! - A unit of work is applied completely or not at all
//! - A transaction record exists iff its transfer committed

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, clippy::all)]

pub mod cache;
pub mod cached_store;
pub mod config;
pub mod error;
pub mod ledger;
pub mod memory;
pub mod metrics;
pub mod postgres;
pub mod purchase;
pub mod storage;
pub mod transfer;
pub mod types;

// Re-exports
pub use cache::{Cache, CacheMetrics, NoopCache, RedisCache, TtlCache};
pub use cached_store::CachedLedgerStore;
pub use config::{CacheBackend, LedgerConfig, StorageBackend};
pub use error::{Error, Result};
pub use ledger::Ledger;
pub use memory::MemoryLedger;
pub use metrics::LedgerMetrics;
pub use postgres::PgLedger;
pub use purchase::PurchaseEngine;
pub use storage::{LedgerStore, UnitOfWork};
pub use transfer::TransferEngine;
pub use types::{
    InventoryItem, NewUser, Purchase, ShopItem, Transaction, TransactionKind, User, UserId,
    INITIAL_BALANCE,
};
