//! Error types for the ledger

use thiserror::Error;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ledger errors
#[derive(Error, Debug)]
pub enum Error {
    /// Balance is below the requested amount or price
    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds {
        /// Coins the operation needed
        required: i64,
        /// Coins the account held when the unit of work read it
        available: i64,
    },

    /// Unknown item type or user
    #[error("Not found: {0}")]
    NotFound(String),

    /// Transfer amount must be positive and must not overflow a balance
    #[error("Invalid amount: {0}")]
    InvalidAmount(i64),

    /// Username is already taken
    #[error("User already exists: {0}")]
    UserExists(String),

    /// Storage error (PostgreSQL)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Schema migration failed
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Opaque internal fault
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True for faults of the storage layer rather than business rejections.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            Error::Database(_) | Error::Migration(_) | Error::Io(_) | Error::Internal(_)
        )
    }
}

impl From<redis::RedisError> for Error {
    fn from(err: redis::RedisError) -> Self {
        Error::Internal(format!("Redis error: {}", err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Internal(format!("JSON serialization error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_business_errors_are_not_internal() {
        let err = Error::InsufficientFunds {
            required: 500,
            available: 100,
        };
        assert!(!err.is_internal());
        assert_eq!(
            err.to_string(),
            "Insufficient funds: required 500, available 100"
        );
        assert!(!Error::NotFound("item pink-hoody".to_string()).is_internal());
        assert!(Error::Internal("boom".to_string()).is_internal());
    }
}
