//! Trading configuration.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Configuration for the brokerage and copy-trade fanout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingConfig {
    /// Cash balance granted to new accounts at signup
    pub starting_balance: Decimal,

    /// Upper bound on any single follower's copy attempt; an elapsed timeout
    /// is recorded as a failed copy and never retried
    pub fanout_timeout_secs: u64,
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            starting_balance: dec!(5000.00),
            fanout_timeout_secs: 10,
        }
    }
}
