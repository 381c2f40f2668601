//! The ledger: authoritative cash balance and position state.
//!
//! Every mutation here is an atomic unit: balance update, position change,
//! and the appended transaction record commit together in one SQL
//! transaction or not at all. Mutations against the same account serialize
//! on a per-account async lock; different accounts proceed in parallel.
//!
//! Balances are kept to cents. Position merges use a non-weighted average
//! price, `(old_average + price) / 2` (see DESIGN.md).

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use sqlx::{SqliteConnection, SqlitePool};
use tokio::sync::Mutex;
use tracing::debug;

use crate::db::{parse_decimal, Store};
use crate::error::TradeError;
use crate::models::{TradeSide, Transaction};

/// Round a dollar amount to cents, ties away from zero.
pub fn to_cents(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Merge policy for buying into an existing position: the plain midpoint of
/// the old average and the new price, ignoring share quantities.
pub fn merged_average(old_average: Decimal, price: Decimal) -> Decimal {
    to_cents((old_average + price) / Decimal::TWO)
}

/// Cash and position bookkeeping for all accounts.
pub struct Ledger {
    pool: SqlitePool,
    locks: Mutex<HashMap<i64, Arc<Mutex<()>>>>,
}

impl Ledger {
    pub fn new(store: &Store) -> Self {
        Self {
            pool: store.pool().clone(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// The serialization point for one account's mutations.
    async fn lock_for(&self, account_id: i64) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(account_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Add cash to an account. Returns the new balance.
    pub async fn credit(&self, account_id: i64, amount: Decimal) -> Result<Decimal, TradeError> {
        if amount < Decimal::ZERO {
            return Err(TradeError::InvalidTrade(
                "credit amount must not be negative".to_string(),
            ));
        }

        let lock = self.lock_for(account_id).await;
        let _guard = lock.lock().await;

        let mut tx = self.pool.begin().await?;
        let balance = balance_of(&mut *tx, account_id).await?;
        let new_balance = to_cents(balance + amount);
        write_balance(&mut *tx, account_id, new_balance).await?;
        tx.commit().await?;

        Ok(new_balance)
    }

    /// Remove cash from an account. Fails with `InsufficientFunds` if the
    /// balance would go negative; no state changes on failure.
    pub async fn debit(&self, account_id: i64, amount: Decimal) -> Result<Decimal, TradeError> {
        if amount < Decimal::ZERO {
            return Err(TradeError::InvalidTrade(
                "debit amount must not be negative".to_string(),
            ));
        }

        let lock = self.lock_for(account_id).await;
        let _guard = lock.lock().await;

        let mut tx = self.pool.begin().await?;
        let balance = balance_of(&mut *tx, account_id).await?;
        let new_balance = to_cents(balance - amount);
        if new_balance < Decimal::ZERO {
            return Err(TradeError::InsufficientFunds {
                required: amount,
                available: balance,
            });
        }
        write_balance(&mut *tx, account_id, new_balance).await?;
        tx.commit().await?;

        Ok(new_balance)
    }

    /// Buy `shares` of `symbol` at `price`: debit the cash, create or merge
    /// the position, append the transaction record. One atomic unit.
    pub async fn apply_buy(
        &self,
        account_id: i64,
        symbol: &str,
        shares: Decimal,
        price: Decimal,
    ) -> Result<Transaction, TradeError> {
        check_trade_inputs(shares, price)?;

        let lock = self.lock_for(account_id).await;
        let _guard = lock.lock().await;

        let mut tx = self.pool.begin().await?;

        let balance = balance_of(&mut *tx, account_id).await?;
        let total = to_cents(shares * price);
        if total > balance {
            return Err(TradeError::InsufficientFunds {
                required: total,
                available: balance,
            });
        }

        match position_of(&mut *tx, account_id, symbol).await? {
            Some((old_shares, old_average)) => {
                let new_shares = old_shares + shares;
                let new_average = merged_average(old_average, price);
                sqlx::query(
                    r#"
                    UPDATE positions SET shares = ?, average_price = ?, last_updated = ?
                    WHERE account_id = ? AND symbol = ?
                    "#,
                )
                .bind(new_shares.to_string())
                .bind(new_average.to_string())
                .bind(now_text())
                .bind(account_id)
                .bind(symbol)
                .execute(&mut *tx)
                .await?;
            }
            None => {
                sqlx::query(
                    r#"
                    INSERT INTO positions (account_id, symbol, shares, average_price, last_updated)
                    VALUES (?, ?, ?, ?, ?)
                    "#,
                )
                .bind(account_id)
                .bind(symbol)
                .bind(shares.to_string())
                .bind(price.to_string())
                .bind(now_text())
                .execute(&mut *tx)
                .await?;
            }
        }

        write_balance(&mut *tx, account_id, to_cents(balance - total)).await?;
        let record =
            append_transaction(&mut *tx, account_id, symbol, shares, price, TradeSide::Buy).await?;
        tx.commit().await?;

        debug!(
            account = account_id,
            symbol = symbol,
            shares = %shares,
            price = %price,
            "buy applied"
        );
        Ok(record)
    }

    /// Sell `shares` of `symbol` at `price`: reduce or delete the position,
    /// credit the cash, append the transaction record. One atomic unit.
    /// The position row is deleted when remaining shares are exactly zero.
    pub async fn apply_sell(
        &self,
        account_id: i64,
        symbol: &str,
        shares: Decimal,
        price: Decimal,
    ) -> Result<Transaction, TradeError> {
        check_trade_inputs(shares, price)?;

        let lock = self.lock_for(account_id).await;
        let _guard = lock.lock().await;

        let mut tx = self.pool.begin().await?;

        let balance = balance_of(&mut *tx, account_id).await?;

        let (old_shares, _) = position_of(&mut *tx, account_id, symbol)
            .await?
            .ok_or(TradeError::InsufficientShares {
                requested: shares,
                available: Decimal::ZERO,
            })?;
        if old_shares < shares {
            return Err(TradeError::InsufficientShares {
                requested: shares,
                available: old_shares,
            });
        }

        let new_shares = old_shares - shares;
        if new_shares.is_zero() {
            sqlx::query("DELETE FROM positions WHERE account_id = ? AND symbol = ?")
                .bind(account_id)
                .bind(symbol)
                .execute(&mut *tx)
                .await?;
        } else {
            sqlx::query(
                r#"
                UPDATE positions SET shares = ?, last_updated = ?
                WHERE account_id = ? AND symbol = ?
                "#,
            )
            .bind(new_shares.to_string())
            .bind(now_text())
            .bind(account_id)
            .bind(symbol)
            .execute(&mut *tx)
            .await?;
        }

        let total = to_cents(shares * price);
        write_balance(&mut *tx, account_id, to_cents(balance + total)).await?;
        let record =
            append_transaction(&mut *tx, account_id, symbol, shares, price, TradeSide::Sell).await?;
        tx.commit().await?;

        debug!(
            account = account_id,
            symbol = symbol,
            shares = %shares,
            price = %price,
            "sell applied"
        );
        Ok(record)
    }
}

fn now_text() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn check_trade_inputs(shares: Decimal, price: Decimal) -> Result<(), TradeError> {
    if shares <= Decimal::ZERO {
        return Err(TradeError::InvalidTrade(format!(
            "shares must be positive, got {shares}"
        )));
    }
    if price <= Decimal::ZERO {
        return Err(TradeError::InvalidTrade(format!(
            "price must be positive, got {price}"
        )));
    }
    Ok(())
}

async fn balance_of(conn: &mut SqliteConnection, account_id: i64) -> Result<Decimal, TradeError> {
    let row: Option<(String,)> = sqlx::query_as("SELECT cash_balance FROM accounts WHERE id = ?")
        .bind(account_id)
        .fetch_optional(&mut *conn)
        .await?;

    let (text,) = row.ok_or(TradeError::AccountNotFound(account_id))?;
    Ok(parse_decimal(&text)?)
}

async fn write_balance(
    conn: &mut SqliteConnection,
    account_id: i64,
    balance: Decimal,
) -> Result<(), TradeError> {
    sqlx::query("UPDATE accounts SET cash_balance = ? WHERE id = ?")
        .bind(balance.to_string())
        .bind(account_id)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

async fn position_of(
    conn: &mut SqliteConnection,
    account_id: i64,
    symbol: &str,
) -> Result<Option<(Decimal, Decimal)>, TradeError> {
    let row: Option<(String, String)> =
        sqlx::query_as("SELECT shares, average_price FROM positions WHERE account_id = ? AND symbol = ?")
            .bind(account_id)
            .bind(symbol)
            .fetch_optional(&mut *conn)
            .await?;

    match row {
        Some((shares, average)) => Ok(Some((parse_decimal(&shares)?, parse_decimal(&average)?))),
        None => Ok(None),
    }
}

async fn append_transaction(
    conn: &mut SqliteConnection,
    account_id: i64,
    symbol: &str,
    shares: Decimal,
    price: Decimal,
    side: TradeSide,
) -> Result<Transaction, TradeError> {
    let timestamp = Utc::now();
    let id = sqlx::query(
        r#"
        INSERT INTO transactions (account_id, symbol, shares, price, side, timestamp)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(account_id)
    .bind(symbol)
    .bind(shares.to_string())
    .bind(price.to_string())
    .bind(side.as_str())
    .bind(timestamp.to_rfc3339_opts(SecondsFormat::Micros, true))
    .execute(&mut *conn)
    .await?
    .last_insert_rowid();

    Ok(Transaction {
        id,
        account_id,
        symbol: symbol.to_string(),
        shares,
        price,
        side,
        timestamp,
    })
}
