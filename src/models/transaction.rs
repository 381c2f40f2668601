//! Trade request and transaction models.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Direction of a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Buy,
    Sell,
}

impl TradeSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeSide::Buy => "buy",
            TradeSide::Sell => "sell",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "buy" => Some(TradeSide::Buy),
            "sell" => Some(TradeSide::Sell),
            _ => None,
        }
    }
}

/// A trade order as submitted by an account: what to trade, how much, which way.
/// The execution price always comes from the oracle, never from the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRequest {
    /// Ticker symbol (1-10 ASCII alphanumeric characters)
    pub symbol: String,

    /// Number of shares, must be positive (fractional shares allowed)
    pub shares: Decimal,

    /// Trade direction
    pub side: TradeSide,
}

impl TradeRequest {
    pub fn new(symbol: impl Into<String>, shares: Decimal, side: TradeSide) -> Self {
        Self {
            symbol: symbol.into(),
            shares,
            side,
        }
    }
}

/// Immutable record of an executed trade. Append-only: never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    /// Store-generated identifier
    pub id: i64,

    /// Account the trade executed against
    pub account_id: i64,

    /// Ticker symbol
    pub symbol: String,

    /// Shares traded
    pub shares: Decimal,

    /// Execution price per share (from the oracle at execution time)
    pub price: Decimal,

    /// Trade direction
    pub side: TradeSide,

    /// When the trade committed
    pub timestamp: DateTime<Utc>,
}

impl Transaction {
    /// Total cash value of the trade.
    pub fn total(&self) -> Decimal {
        self.shares * self.price
    }
}
