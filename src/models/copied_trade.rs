//! Copied-trade outcome records: one per fanout attempt, append-only.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Lifecycle of a single fanout attempt. A record is written as `Pending`
/// before the derived trade is submitted and settles to exactly one of
/// `Executed` or `Failed`; it never transitions back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CopyStatus {
    Pending,
    Executed,
    Failed,
}

impl CopyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CopyStatus::Pending => "pending",
            CopyStatus::Executed => "executed",
            CopyStatus::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "executed" => Self::Executed,
            "failed" => Self::Failed,
            _ => Self::Pending,
        }
    }
}

/// Outcome record for one follower's copy of one original transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CopiedTrade {
    /// UUID assigned at creation
    pub id: String,

    /// The trader transaction this copy derives from
    pub original_transaction_id: i64,

    /// Account the copy executed (or failed to execute) against
    pub follower_id: i64,

    pub status: CopyStatus,

    /// Derived share quantity (6 fractional digits)
    pub copied_shares: Decimal,

    /// Price the sizing was computed at; updated to the executed price on success
    pub copied_price: Decimal,

    /// Failure cause when status is `Failed`
    pub error_message: Option<String>,

    pub created_at: DateTime<Utc>,

    /// Set when the copy executes
    pub executed_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for status in [CopyStatus::Pending, CopyStatus::Executed, CopyStatus::Failed] {
            assert_eq!(CopyStatus::from_str(status.as_str()), status);
        }
    }
}
