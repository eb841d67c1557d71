//! Core types for the ledger
//!
//! Coins are whole numbers; every amount is an `i64` and balances never go
//! below zero.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;

/// Coins granted to every user at registration
pub const INITIAL_BALANCE: i64 = 1000;

/// Shop catalog seeded by the schema migration and by `MemoryLedger::new`
pub const DEFAULT_CATALOG: &[(&str, i64)] = &[
    ("t-shirt", 80),
    ("cup", 20),
    ("book", 50),
    ("pen", 10),
    ("powerbank", 200),
    ("hoody", 300),
    ("umbrella", 200),
    ("socks", 10),
    ("wallet", 50),
    ("pink-hoody", 500),
];

/// User identifier, assigned by the store at creation
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct UserId(pub i64);

impl UserId {
    /// Raw numeric id
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for UserId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Registered user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct User {
    /// Immutable id
    pub id: UserId,

    /// Unique login name
    pub username: String,

    /// Password hash (PHC string); opaque to the ledger
    pub password_hash: String,

    /// Registration time
    pub created_at: DateTime<Utc>,

    /// Last profile update
    pub updated_at: DateTime<Utc>,
}

/// User to be inserted
#[derive(Debug, Clone)]
pub struct NewUser {
    /// Unique login name
    pub username: String,

    /// Password hash (PHC string)
    pub password_hash: String,
}

impl NewUser {
    /// Create a registration record
    pub fn new(username: impl Into<String>, password_hash: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password_hash: password_hash.into(),
        }
    }
}

/// One line of a user's inventory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct InventoryItem {
    /// Shop item type
    pub item_type: String,

    /// Units owned, always >= 1
    pub quantity: i64,
}

/// Kind of a ledger transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    /// Peer-to-peer coin transfer
    Send,
}

impl TryFrom<String> for TransactionKind {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        match value.as_str() {
            "send" => Ok(TransactionKind::Send),
            other => Err(format!("unknown transaction type: {}", other)),
        }
    }
}

impl TransactionKind {
    /// Stored representation
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Send => "send",
        }
    }
}

/// Committed coin transfer; append-only
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Transaction {
    /// Store-assigned sequence id
    pub id: i64,

    /// Sender
    pub from_user_id: UserId,

    /// Recipient
    pub to_user_id: UserId,

    /// Coins moved, always > 0
    pub amount: i64,

    /// Transaction kind
    #[sqlx(rename = "transaction_type", try_from = "String")]
    pub kind: TransactionKind,

    /// Commit time
    pub created_at: DateTime<Utc>,
}

/// Catalog entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ShopItem {
    /// Item type, the catalog key
    pub item_type: String,

    /// Price in coins, always > 0
    pub price: i64,
}

impl ShopItem {
    /// Build a catalog entry
    pub fn new(item_type: impl Into<String>, price: i64) -> Self {
        Self {
            item_type: item_type.into(),
            price,
        }
    }

    /// The default catalog as owned entries
    pub fn default_catalog() -> Vec<ShopItem> {
        DEFAULT_CATALOG
            .iter()
            .map(|(item_type, price)| ShopItem::new(*item_type, *price))
            .collect()
    }
}

/// Receipt of a committed purchase
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Purchase {
    /// Buyer
    pub user_id: UserId,

    /// Item bought
    pub item_type: String,

    /// Coins debited
    pub price: i64,

    /// Buyer balance after the debit
    pub balance_after: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_catalog_prices_positive() {
        let catalog = ShopItem::default_catalog();
        assert_eq!(catalog.len(), DEFAULT_CATALOG.len());
        assert!(catalog.iter().all(|item| item.price > 0));
        assert!(catalog.iter().any(|item| item.item_type == "hoody"));
    }

    #[test]
    fn test_user_id_serializes_as_number() {
        let json = serde_json::to_string(&UserId(42)).unwrap();
        assert_eq!(json, "42");
        assert_eq!(TransactionKind::Send.as_str(), "send");
        assert_eq!(
            TransactionKind::try_from("send".to_string()),
            Ok(TransactionKind::Send)
        );
        assert!(TransactionKind::try_from("refund".to_string()).is_err());
    }
}
