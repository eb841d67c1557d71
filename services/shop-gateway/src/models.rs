use serde::{Deserialize, Serialize};
use validator::Validate;

/// Login or registration request
#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct AuthRequest {
    #[validate(length(min = 1, max = 64))]
    pub username: String,
    #[validate(length(min = 1, max = 128))]
    pub password: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct AuthResponse {
    pub token: String,
}

/// Coin transfer request
#[derive(Debug, Deserialize, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SendCoinRequest {
    #[validate(length(min = 1))]
    pub to_user: String,
    pub amount: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct InventoryEntry {
    #[serde(rename = "type")]
    pub item_type: String,
    pub quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceivedCoins {
    pub from_user: String,
    pub amount: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SentCoins {
    pub to_user: String,
    pub amount: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct CoinHistory {
    pub received: Vec<ReceivedCoins>,
    pub sent: Vec<SentCoins>,
}

/// Balance, inventory and transfer history of the caller
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InfoResponse {
    pub coins: i64,
    pub inventory: Vec<InventoryEntry>,
    pub coin_history: CoinHistory,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_send_coin_request_uses_camel_case() {
        let request: SendCoinRequest =
            serde_json::from_value(json!({"toUser": "bob", "amount": 10})).unwrap();
        assert_eq!(request.to_user, "bob");
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_empty_username_fails_validation() {
        let request = AuthRequest {
            username: String::new(),
            password: "pw".to_string(),
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_info_response_shape() {
        let info = InfoResponse {
            coins: 400,
            inventory: vec![InventoryEntry {
                item_type: "hoody".to_string(),
                quantity: 1,
            }],
            coin_history: CoinHistory {
                received: vec![],
                sent: vec![SentCoins {
                    to_user: "b".to_string(),
                    amount: 500,
                }],
            },
        };

        assert_eq!(
            serde_json::to_value(&info).unwrap(),
            json!({
                "coins": 400,
                "inventory": [{"type": "hoody", "quantity": 1}],
                "coinHistory": {
                    "received": [],
                    "sent": [{"toUser": "b", "amount": 500}]
                }
            })
        );
    }
}
