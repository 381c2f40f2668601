//! Data models for accounts, trades, positions, and copy-trading state.

mod transaction;
mod account;
mod position;
mod copy_setting;
mod copied_trade;
mod follow;

pub use transaction::{TradeRequest, TradeSide, Transaction};
pub use account::Account;
pub use position::Position;
pub use copy_setting::{CopySetting, RiskLevel};
pub use copied_trade::{CopiedTrade, CopyStatus};
pub use follow::FollowEdge;
