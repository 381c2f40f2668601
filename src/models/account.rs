//! Account model: virtual cash balance plus optional trader profile.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A user account. Created at signup, never deleted. The cash balance is
/// mutated only by the ledger and is non-negative at every committed state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,

    pub username: String,

    /// Virtual cash balance in dollars, kept to cents
    pub cash_balance: Decimal,

    /// Whether this account has opted in to being followed and copy-traded
    pub is_trader: bool,

    /// Monthly fee charged to subscribers (informational; billing is external)
    pub subscription_fee: Decimal,

    /// Trader profile blurb
    pub bio: String,

    pub created_at: DateTime<Utc>,
}

impl Account {
    pub fn can_afford(&self, amount: Decimal) -> bool {
        amount <= self.cash_balance
    }
}
