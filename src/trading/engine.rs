//! Transaction engine: executes one trade end-to-end.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::info;

use crate::db::Store;
use crate::error::TradeError;
use crate::ledger::{to_cents, Ledger};
use crate::models::{TradeRequest, TradeSide, Transaction};
use crate::oracle::PriceOracle;

const MAX_SYMBOL_LEN: usize = 10;

/// Orchestrates a single trade: validate, quote, check funds, mutate the
/// ledger. No retries; a failed trade is reported to the caller as final.
pub struct TradeEngine {
    store: Store,
    ledger: Arc<Ledger>,
    oracle: Arc<dyn PriceOracle>,
}

impl TradeEngine {
    pub fn new(store: Store, ledger: Arc<Ledger>, oracle: Arc<dyn PriceOracle>) -> Self {
        Self {
            store,
            ledger,
            oracle,
        }
    }

    /// Execute a trade for `account_id`. On success the returned transaction
    /// has already committed together with its balance and position changes.
    pub async fn execute(
        &self,
        account_id: i64,
        request: &TradeRequest,
    ) -> Result<Transaction, TradeError> {
        let symbol = validate_request(request)?;

        let account = self
            .store
            .get_account(account_id)
            .await?
            .ok_or(TradeError::AccountNotFound(account_id))?;

        let price = self.oracle.quote(&symbol)?;
        if price <= Decimal::ZERO {
            return Err(TradeError::InvalidTrade(format!(
                "oracle returned non-positive price {price} for {symbol}"
            )));
        }

        // Early rejection before any mutation; the ledger re-checks against
        // the current balance inside its critical section.
        let total = to_cents(request.shares * price);
        if request.side == TradeSide::Buy && !account.can_afford(total) {
            return Err(TradeError::InsufficientFunds {
                required: total,
                available: account.cash_balance,
            });
        }

        let record = match request.side {
            TradeSide::Buy => {
                self.ledger
                    .apply_buy(account_id, &symbol, request.shares, price)
                    .await?
            }
            TradeSide::Sell => {
                self.ledger
                    .apply_sell(account_id, &symbol, request.shares, price)
                    .await?
            }
        };

        info!(
            account = account_id,
            symbol = %record.symbol,
            side = record.side.as_str(),
            shares = %record.shares,
            price = %record.price,
            transaction = record.id,
            "trade executed"
        );

        Ok(record)
    }
}

/// Check shares and symbol shape; returns the normalized (uppercased) symbol.
fn validate_request(request: &TradeRequest) -> Result<String, TradeError> {
    if request.shares <= Decimal::ZERO {
        return Err(TradeError::InvalidTrade(format!(
            "shares must be positive, got {}",
            request.shares
        )));
    }

    let symbol = request.symbol.trim().to_uppercase();
    if symbol.is_empty() || symbol.len() > MAX_SYMBOL_LEN {
        return Err(TradeError::InvalidTrade(format!(
            "symbol must be 1-{MAX_SYMBOL_LEN} characters"
        )));
    }
    if !symbol.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(TradeError::InvalidTrade(format!(
            "symbol {symbol} contains non-alphanumeric characters"
        )));
    }

    Ok(symbol)
}
