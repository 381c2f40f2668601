//! Brokerage facade: wires the store, oracle, ledger, engine, and fanout
//! controller together and exposes the application-level operations.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::db::Store;
use crate::error::TradeError;
use crate::ledger::Ledger;
use crate::models::{
    Account, CopiedTrade, CopySetting, Position, RiskLevel, TradeRequest, Transaction,
};
use crate::oracle::PriceOracle;
use crate::trading::{FanoutController, FanoutReport, TradeEngine, TradingConfig};

/// One row of the leaderboard: cash plus marked-to-oracle position value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub username: String,
    pub total_value: Decimal,
}

/// The application facade the CLI (or any outer surface) talks to.
pub struct Brokerage {
    store: Store,
    config: TradingConfig,
    oracle: Arc<dyn PriceOracle>,
    engine: Arc<TradeEngine>,
    fanout: FanoutController,
}

impl Brokerage {
    pub fn new(store: Store, oracle: Arc<dyn PriceOracle>, config: TradingConfig) -> Self {
        let ledger = Arc::new(Ledger::new(&store));
        let engine = Arc::new(TradeEngine::new(store.clone(), ledger, oracle.clone()));
        let fanout = FanoutController::new(
            store.clone(),
            engine.clone(),
            Duration::from_secs(config.fanout_timeout_secs),
        );

        Self {
            store,
            config,
            oracle,
            engine,
            fanout,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Create an account with the configured starting balance.
    pub async fn signup(&self, username: &str) -> Result<Account, TradeError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(TradeError::InvalidTrade(
                "username must not be empty".to_string(),
            ));
        }
        if self.store.get_account_by_username(username).await?.is_some() {
            return Err(TradeError::InvalidTrade(format!(
                "username {username} is already taken"
            )));
        }

        let account = self
            .store
            .create_account(username, self.config.starting_balance)
            .await?;
        info!(account = account.id, username = username, "account created");
        Ok(account)
    }

    /// Execute a trade and, if the acting account is a trader, fan it out to
    /// followers. The trader's own transaction commits before fanout begins,
    /// and fanout outcomes never affect it.
    pub async fn place_trade(
        &self,
        account_id: i64,
        request: &TradeRequest,
    ) -> Result<(Transaction, Option<FanoutReport>), TradeError> {
        let account = self
            .store
            .get_account(account_id)
            .await?
            .ok_or(TradeError::AccountNotFound(account_id))?;

        let transaction = self.engine.execute(account_id, request).await?;

        let report = if account.is_trader {
            Some(self.fanout.fanout(&transaction, &account).await)
        } else {
            None
        };

        Ok((transaction, report))
    }

    /// Opt an account in or out of being followed and copied.
    pub async fn update_trader_profile(
        &self,
        account_id: i64,
        is_trader: bool,
        subscription_fee: Decimal,
        bio: &str,
    ) -> Result<Account, TradeError> {
        if subscription_fee < Decimal::ZERO {
            return Err(TradeError::InvalidTrade(
                "subscription fee must not be negative".to_string(),
            ));
        }

        self.store
            .update_trader_profile(account_id, is_trader, subscription_fee, bio)
            .await?
            .ok_or(TradeError::AccountNotFound(account_id))
    }

    pub async fn traders(&self) -> Result<Vec<Account>, TradeError> {
        Ok(self.store.list_traders().await?)
    }

    pub async fn follow(&self, follower_id: i64, trader_id: i64) -> Result<(), TradeError> {
        if follower_id == trader_id {
            return Err(TradeError::InvalidTrade(
                "an account cannot follow itself".to_string(),
            ));
        }
        for id in [follower_id, trader_id] {
            if self.store.get_account(id).await?.is_none() {
                return Err(TradeError::AccountNotFound(id));
            }
        }

        self.store.follow(follower_id, trader_id).await?;
        Ok(())
    }

    pub async fn unfollow(&self, follower_id: i64, trader_id: i64) -> Result<(), TradeError> {
        self.store.unfollow(follower_id, trader_id).await?;
        Ok(())
    }

    pub async fn create_copy_setting(
        &self,
        follower_id: i64,
        trader_id: i64,
        enabled: bool,
        copy_amount: Decimal,
        max_position_size: Decimal,
        risk_level: RiskLevel,
    ) -> Result<CopySetting, TradeError> {
        if copy_amount <= Decimal::ZERO || max_position_size <= Decimal::ZERO {
            return Err(TradeError::InvalidTrade(
                "copy amount and max position size must be positive".to_string(),
            ));
        }
        for id in [follower_id, trader_id] {
            if self.store.get_account(id).await?.is_none() {
                return Err(TradeError::AccountNotFound(id));
            }
        }

        Ok(self
            .store
            .create_copy_setting(
                follower_id,
                trader_id,
                enabled,
                copy_amount,
                max_position_size,
                risk_level,
            )
            .await?)
    }

    pub async fn update_copy_setting(
        &self,
        id: i64,
        enabled: bool,
        copy_amount: Decimal,
        max_position_size: Decimal,
        risk_level: RiskLevel,
    ) -> Result<CopySetting, TradeError> {
        if copy_amount <= Decimal::ZERO || max_position_size <= Decimal::ZERO {
            return Err(TradeError::InvalidTrade(
                "copy amount and max position size must be positive".to_string(),
            ));
        }

        self.store
            .update_copy_setting(id, enabled, copy_amount, max_position_size, risk_level)
            .await?
            .ok_or_else(|| TradeError::InvalidTrade(format!("copy setting {id} not found")))
    }

    pub async fn settings_for(&self, follower_id: i64) -> Result<Vec<CopySetting>, TradeError> {
        Ok(self.store.settings_for(follower_id).await?)
    }

    pub async fn portfolio(&self, account_id: i64) -> Result<Vec<Position>, TradeError> {
        if self.store.get_account(account_id).await?.is_none() {
            return Err(TradeError::AccountNotFound(account_id));
        }
        Ok(self.store.positions_for(account_id).await?)
    }

    pub async fn transactions(&self, account_id: i64) -> Result<Vec<Transaction>, TradeError> {
        if self.store.get_account(account_id).await?.is_none() {
            return Err(TradeError::AccountNotFound(account_id));
        }
        Ok(self.store.transactions_for(account_id).await?)
    }

    pub async fn copied_trades(&self, follower_id: i64) -> Result<Vec<CopiedTrade>, TradeError> {
        if self.store.get_account(follower_id).await?.is_none() {
            return Err(TradeError::AccountNotFound(follower_id));
        }
        Ok(self.store.copied_trades_for(follower_id).await?)
    }

    /// Every account's cash plus position value at current oracle prices,
    /// best first. Positions whose symbol the oracle cannot quote are
    /// valued at their average entry price.
    pub async fn leaderboard(&self) -> Result<Vec<LeaderboardEntry>, TradeError> {
        let mut entries = Vec::new();

        for account in self.store.all_accounts().await? {
            let mut total = account.cash_balance;
            for position in self.store.positions_for(account.id).await? {
                let price = self
                    .oracle
                    .quote(&position.symbol)
                    .unwrap_or(position.average_price);
                total += position.market_value(price);
            }
            entries.push(LeaderboardEntry {
                username: account.username,
                total_value: total,
            });
        }

        entries.sort_by(|a, b| b.total_value.cmp(&a.total_value));
        Ok(entries)
    }
}
