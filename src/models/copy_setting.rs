//! Copy-trading settings: a follower's rules for replicating one trader.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Risk appetite label attached to a copy setting. Informational today; kept
/// on the record so sizing policies can branch on it later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "low" => Self::Low,
            "high" => Self::High,
            _ => Self::Medium,
        }
    }
}

/// A follower's configuration for copying one trader's trades. Owned and
/// mutated only by the follower; the fanout controller reads it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CopySetting {
    pub id: i64,

    /// Account doing the copying
    pub follower_id: i64,

    /// Trader being copied
    pub trader_id: i64,

    /// Disabled settings are ignored by fanout
    pub enabled: bool,

    /// Cash to commit per copied trade, in dollars
    pub copy_amount: Decimal,

    /// Upper bound on cash committed to any single copied trade
    pub max_position_size: Decimal,

    pub risk_level: RiskLevel,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl CopySetting {
    /// Whether this setting makes the follower eligible to copy the given trader.
    pub fn applies_to(&self, trader_id: i64) -> bool {
        self.enabled && self.trader_id == trader_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn setting(enabled: bool, trader_id: i64) -> CopySetting {
        CopySetting {
            id: 1,
            follower_id: 10,
            trader_id,
            enabled,
            copy_amount: dec!(100),
            max_position_size: dec!(1000),
            risk_level: RiskLevel::Medium,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_applies_to() {
        assert!(setting(true, 5).applies_to(5));
        assert!(!setting(true, 5).applies_to(6));
        assert!(!setting(false, 5).applies_to(5));
    }

    #[test]
    fn test_risk_level_parsing() {
        assert_eq!(RiskLevel::from_str("LOW"), RiskLevel::Low);
        assert_eq!(RiskLevel::from_str("high"), RiskLevel::High);
        // Unknown labels fall back to medium
        assert_eq!(RiskLevel::from_str("yolo"), RiskLevel::Medium);
    }
}
