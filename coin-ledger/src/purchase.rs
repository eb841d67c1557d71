//! Shop purchases
//!
//! A purchase debits the buyer and increments their inventory in one unit of
//! work. No transaction record is written for purchases.

use crate::{
    error::{Error, Result},
    metrics::LedgerMetrics,
    storage::LedgerStore,
    types::{Purchase, UserId},
};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// Sells catalog items for coins
#[derive(Clone)]
pub struct PurchaseEngine {
    store: Arc<dyn LedgerStore>,
    metrics: LedgerMetrics,
}

impl PurchaseEngine {
    pub fn new(store: Arc<dyn LedgerStore>, metrics: LedgerMetrics) -> Self {
        Self { store, metrics }
    }

    /// Buy one unit of `item_type` for `user`
    pub async fn buy_item(&self, user: UserId, item_type: &str) -> Result<Purchase> {
        let start = Instant::now();
        let result = self.purchase(user, item_type).await;
        self.metrics
            .record_unit_duration("buy_item", start.elapsed().as_secs_f64());

        match &result {
            Ok(purchase) => {
                info!(
                    "User {} bought {} for {} coins, {} left",
                    user, item_type, purchase.price, purchase.balance_after
                );
                self.metrics.record_purchase();
            }
            Err(e) if e.is_internal() => {
                error!("Purchase of {} by user {} failed: {}", item_type, user, e);
                self.metrics.record_purchase_error(e);
            }
            Err(e) => {
                warn!("Rejected purchase of {} by user {}: {}", item_type, user, e);
                self.metrics.record_purchase_error(e);
            }
        }

        result
    }

    async fn purchase(&self, user: UserId, item_type: &str) -> Result<Purchase> {
        let mut unit = self.store.begin().await?;

        let price = unit.item_price(item_type).await?;
        let balance = unit.lock_balance(user).await?;
        if balance < price {
            unit.rollback().await?;
            return Err(Error::InsufficientFunds {
                required: price,
                available: balance,
            });
        }

        let balance_after = balance - price;
        unit.set_balance(user, balance_after).await?;
        unit.increment_inventory(user, item_type).await?;
        unit.commit().await?;

        Ok(Purchase {
            user_id: user,
            item_type: item_type.to_string(),
            price,
            balance_after,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryLedger;
    use crate::types::{InventoryItem, NewUser, ShopItem};

    async fn setup() -> (Arc<MemoryLedger>, PurchaseEngine, UserId) {
        let ledger = Arc::new(MemoryLedger::with_catalog(vec![
            ShopItem::new("hoody", 100),
            ShopItem::new("pink-hoody", 500),
        ]));
        let alice = ledger.create_user(NewUser::new("alice", "h")).await.unwrap();
        let engine = PurchaseEngine::new(ledger.clone(), LedgerMetrics::new().unwrap());
        (ledger, engine, alice.id)
    }

    #[tokio::test]
    async fn test_purchase_debits_and_adds_item() {
        let (ledger, engine, alice) = setup().await;

        let purchase = engine.buy_item(alice, "hoody").await.unwrap();

        assert_eq!(purchase.price, 100);
        assert_eq!(purchase.balance_after, 900);
        assert_eq!(ledger.get_balance(alice).await.unwrap(), 900);
        assert_eq!(
            ledger.get_inventory(alice).await.unwrap(),
            vec![InventoryItem {
                item_type: "hoody".to_string(),
                quantity: 1
            }]
        );
    }

    #[tokio::test]
    async fn test_repeat_purchase_increments_quantity() {
        let (ledger, engine, alice) = setup().await;

        engine.buy_item(alice, "hoody").await.unwrap();
        engine.buy_item(alice, "hoody").await.unwrap();

        let inventory = ledger.get_inventory(alice).await.unwrap();
        assert_eq!(inventory.len(), 1);
        assert_eq!(inventory[0].quantity, 2);
        assert_eq!(ledger.get_balance(alice).await.unwrap(), 800);
    }

    #[tokio::test]
    async fn test_unknown_item_changes_nothing() {
        let (ledger, engine, alice) = setup().await;

        let result = engine.buy_item(alice, "yacht").await;

        assert!(matches!(result, Err(Error::NotFound(_))));
        assert_eq!(ledger.get_balance(alice).await.unwrap(), 1000);
        assert!(ledger.get_inventory(alice).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_insufficient_funds_changes_nothing() {
        let (ledger, engine, alice) = setup().await;
        engine.buy_item(alice, "pink-hoody").await.unwrap();
        engine.buy_item(alice, "pink-hoody").await.unwrap();

        let result = engine.buy_item(alice, "pink-hoody").await;

        assert!(matches!(
            result,
            Err(Error::InsufficientFunds {
                required: 500,
                available: 0
            })
        ));
        assert_eq!(ledger.get_inventory(alice).await.unwrap()[0].quantity, 2);
    }

    #[tokio::test]
    async fn test_purchase_writes_no_transaction() {
        let (ledger, engine, alice) = setup().await;

        engine.buy_item(alice, "hoody").await.unwrap();
        assert!(ledger.get_transactions(alice).await.unwrap().is_empty());
    }
}
