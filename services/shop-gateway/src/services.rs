use crate::errors::{GatewayError, Result};
use crate::models::{
    AuthRequest, CoinHistory, InfoResponse, InventoryEntry, ReceivedCoins, SendCoinRequest,
    SentCoins,
};
use crate::security_middleware::TokenIssuer;
use argon2::password_hash::{rand_core::OsRng, PasswordHash, SaltString};
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use coin_ledger::{Error as LedgerError, Ledger, NewUser, UserId};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};
use validator::Validate;

/// Placeholder for a counterpart whose name cannot be resolved
pub const UNKNOWN_USER: &str = "<unknown>";

pub struct ShopService {
    ledger: Arc<Ledger>,
    tokens: TokenIssuer,
}

impl ShopService {
    pub fn new(ledger: Arc<Ledger>, tokens: TokenIssuer) -> Self {
        ShopService { ledger, tokens }
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    /// Log a user in, registering them on first sight
    pub async fn authenticate(&self, request: AuthRequest) -> Result<String> {
        request.validate()?;
        let store = self.ledger.store();

        let user = match store.find_user_by_name(&request.username).await? {
            Some(user) => user,
            None => {
                let hash = hash_password(request.password.clone()).await?;
                match store
                    .create_user(NewUser::new(request.username.clone(), hash))
                    .await
                {
                    Ok(user) => {
                        info!("Registered user {} (id {})", user.username, user.id);
                        return self.tokens.issue(user.id, &user.username);
                    }
                    // Lost a registration race; check against the winner's row
                    Err(LedgerError::UserExists(_)) => store
                        .find_user_by_name(&request.username)
                        .await?
                        .ok_or_else(|| {
                            GatewayError::Internal(format!(
                                "User {} vanished after registration",
                                request.username
                            ))
                        })?,
                    Err(e) => return Err(e.into()),
                }
            }
        };

        if !verify_password(request.password, user.password_hash.clone()).await? {
            warn!("Invalid password for user {}", user.username);
            return Err(GatewayError::InvalidCredentials);
        }

        self.tokens.issue(user.id, &user.username)
    }

    /// Balance, inventory and coin history of `user`
    pub async fn get_info(&self, user: UserId) -> Result<InfoResponse> {
        let store = self.ledger.store();

        let coins = store.get_balance(user).await?;
        let inventory = store
            .get_inventory(user)
            .await?
            .into_iter()
            .map(|item| InventoryEntry {
                item_type: item.item_type,
                quantity: item.quantity,
            })
            .collect();

        let mut transactions = store.get_transactions(user).await?;
        transactions.sort_by_key(|t| t.id);

        let mut names: HashMap<UserId, String> = HashMap::new();
        let mut history = CoinHistory::default();
        for transaction in transactions {
            // A self-transfer shows up on both sides
            if transaction.to_user_id == user {
                history.received.push(ReceivedCoins {
                    from_user: self.username_of(transaction.from_user_id, &mut names).await,
                    amount: transaction.amount,
                });
            }
            if transaction.from_user_id == user {
                history.sent.push(SentCoins {
                    to_user: self.username_of(transaction.to_user_id, &mut names).await,
                    amount: transaction.amount,
                });
            }
        }

        Ok(InfoResponse {
            coins,
            inventory,
            coin_history: history,
        })
    }

    /// Transfer coins from `from` to the user named in `request`
    pub async fn send_coin(&self, from: UserId, request: SendCoinRequest) -> Result<()> {
        request.validate()?;

        let recipient = self
            .ledger
            .store()
            .find_user_by_name(&request.to_user)
            .await?
            .ok_or(GatewayError::InvalidUsername)?;

        self.ledger
            .transfers()
            .send_coin(from, recipient.id, request.amount)
            .await?;
        Ok(())
    }

    /// Buy one `item` for `user`
    pub async fn buy_item(&self, user: UserId, item: &str) -> Result<()> {
        self.ledger.purchases().buy_item(user, item).await?;
        Ok(())
    }

    async fn username_of(&self, id: UserId, names: &mut HashMap<UserId, String>) -> String {
        if let Some(name) = names.get(&id) {
            return name.clone();
        }

        let name = match self.ledger.store().find_username(id).await {
            Ok(Some(name)) => name,
            Ok(None) => UNKNOWN_USER.to_string(),
            Err(e) => {
                warn!("Failed to resolve username of user {}: {}", id, e);
                UNKNOWN_USER.to_string()
            }
        };
        names.insert(id, name.clone());
        name
    }
}

async fn hash_password(password: String) -> Result<String> {
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| GatewayError::Internal(format!("Failed to hash password: {}", e)))
    })
    .await
    .map_err(|e| GatewayError::Internal(format!("Hashing task failed: {}", e)))?
}

async fn verify_password(password: String, hash: String) -> Result<bool> {
    tokio::task::spawn_blocking(move || {
        let parsed = PasswordHash::new(&hash)
            .map_err(|e| GatewayError::Internal(format!("Stored hash is malformed: {}", e)))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    })
    .await
    .map_err(|e| GatewayError::Internal(format!("Hashing task failed: {}", e)))?
}
