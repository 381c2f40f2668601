//! Position model: an account's holdings in a single symbol.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Holdings of one symbol by one account. There is at most one position per
/// (account, symbol) pair; the record exists only while `shares > 0` and is
/// deleted by the ledger when a sell brings shares to exactly zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub id: i64,

    pub account_id: i64,

    pub symbol: String,

    /// Shares held, always positive while the record exists
    pub shares: Decimal,

    /// Average entry price per share
    pub average_price: Decimal,

    pub last_updated: DateTime<Utc>,
}

impl Position {
    /// Cost basis implied by the recorded average price.
    pub fn cost_basis(&self) -> Decimal {
        self.shares * self.average_price
    }

    /// Market value of the position at the given price.
    pub fn market_value(&self, current_price: Decimal) -> Decimal {
        self.shares * current_price
    }

    /// Unrealized P&L at the given price.
    pub fn unrealized_pnl(&self, current_price: Decimal) -> Decimal {
        self.market_value(current_price) - self.cost_basis()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_position_valuation() {
        let pos = Position {
            id: 1,
            account_id: 1,
            symbol: "AAPL".to_string(),
            shares: dec!(10),
            average_price: dec!(50.00),
            last_updated: Utc::now(),
        };

        assert_eq!(pos.cost_basis(), dec!(500.00));
        assert_eq!(pos.market_value(dec!(70.00)), dec!(700.00));
        assert_eq!(pos.unrealized_pnl(dec!(70.00)), dec!(200.00));
        assert_eq!(pos.unrealized_pnl(dec!(30.00)), dec!(-200.00));
    }
}
