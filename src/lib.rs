//! Paper-trading brokerage engine with copy-trade fanout.
//!
//! Accounts hold a virtual cash balance and buy/sell mock-priced positions.
//! An account that opts in as a trader can be followed; when it trades, the
//! fanout controller replicates the trade (scaled by each follower's copy
//! settings) into followers' portfolios, each attempt isolated from the
//! others. The ledger keeps every account's balance and positions consistent
//! under concurrency: one atomic unit per trade, serialized per account.
//!
//! Module map:
//!   models   - accounts, trades, positions, copy settings, outcome records
//!   db       - SQLite store (schema, CRUD, append-only logs)
//!   ledger   - balance/position mutation, the only shared-state writer
//!   oracle   - injectable price source (mock band / fixed for tests)
//!   trading  - transaction engine, copy sizing, fanout controller
//!   broker   - application facade the CLI drives

pub mod broker;
pub mod db;
pub mod error;
pub mod ledger;
pub mod models;
pub mod oracle;
pub mod trading;

pub use broker::{Brokerage, LeaderboardEntry};
pub use db::Store;
pub use error::TradeError;
pub use ledger::Ledger;
pub use oracle::{FixedOracle, MockOracle, PriceOracle};
pub use trading::{FanoutReport, TradeEngine, TradingConfig};
