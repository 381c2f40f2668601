//! Error taxonomy for trade execution and ledger mutation.

use rust_decimal::Decimal;

/// Everything that can go wrong executing a single trade. An originating
/// trade surfaces these to the caller with no side effects; during fanout
/// they are caught at the per-follower boundary and recorded instead.
#[derive(Debug, thiserror::Error)]
pub enum TradeError {
    #[error("Account {0} not found")]
    AccountNotFound(i64),

    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds {
        required: Decimal,
        available: Decimal,
    },

    #[error("Insufficient shares: requested {requested}, available {available}")]
    InsufficientShares {
        requested: Decimal,
        available: Decimal,
    },

    #[error("Invalid trade: {0}")]
    InvalidTrade(String),

    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),
}
