//! Copy-trade sizing: how much of a trader's trade a follower replicates.

use rust_decimal::Decimal;

use crate::models::{CopySetting, Transaction};

/// Fractional digits kept on derived share quantities.
pub const COPY_SHARE_DP: u32 = 6;

/// Cash to commit to a copy: the follower's per-trade amount, capped by
/// their position-size limit and by the original trade's own value.
pub fn copy_amount(setting: &CopySetting, original_total: Decimal) -> Decimal {
    setting
        .copy_amount
        .min(setting.max_position_size)
        .min(original_total)
}

/// Derived share quantity for a follower's copy of `original`, at the
/// original's execution price, fixed to six fractional digits.
pub fn copy_shares(setting: &CopySetting, original: &Transaction) -> Decimal {
    let amount = copy_amount(setting, original.total());
    (amount / original.price).round_dp(COPY_SHARE_DP)
}
