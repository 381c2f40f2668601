//! SQLite persistence for accounts, positions, and copy-trading state.
//!
//! One `Store` owns the connection pool and the schema. Decimal quantities
//! are persisted as TEXT and parsed back into `rust_decimal::Decimal` so that
//! balance conservation and exact-zero share checks never hit float drift.
//! Multi-statement atomic mutations (buy/sell) live in the ledger, which
//! opens SQL transactions on this store's pool; everything here is
//! single-statement CRUD.

use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};

use crate::models::{
    Account, CopiedTrade, CopySetting, CopyStatus, FollowEdge, Position, RiskLevel, TradeSide,
    Transaction,
};

/// Database handle. Cheap to clone; clones share the pool.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

/// Current UTC time as fixed-width RFC3339, so lexicographic TEXT ordering
/// matches chronological ordering.
fn now_text() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_decimal(text: &str) -> Result<Decimal, sqlx::Error> {
    text.parse::<Decimal>()
        .map_err(|e| sqlx::Error::Decode(Box::new(e)))
}

fn parse_timestamp(text: &str) -> Result<DateTime<Utc>, sqlx::Error> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| sqlx::Error::Decode(Box::new(e)))
}

fn account_from_row(row: &SqliteRow) -> Result<Account, sqlx::Error> {
    Ok(Account {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        cash_balance: parse_decimal(row.try_get("cash_balance")?)?,
        is_trader: row.try_get("is_trader")?,
        subscription_fee: parse_decimal(row.try_get("subscription_fee")?)?,
        bio: row.try_get("bio")?,
        created_at: parse_timestamp(row.try_get("created_at")?)?,
    })
}

fn position_from_row(row: &SqliteRow) -> Result<Position, sqlx::Error> {
    Ok(Position {
        id: row.try_get("id")?,
        account_id: row.try_get("account_id")?,
        symbol: row.try_get("symbol")?,
        shares: parse_decimal(row.try_get("shares")?)?,
        average_price: parse_decimal(row.try_get("average_price")?)?,
        last_updated: parse_timestamp(row.try_get("last_updated")?)?,
    })
}

fn transaction_from_row(row: &SqliteRow) -> Result<Transaction, sqlx::Error> {
    let side: String = row.try_get("side")?;
    Ok(Transaction {
        id: row.try_get("id")?,
        account_id: row.try_get("account_id")?,
        symbol: row.try_get("symbol")?,
        shares: parse_decimal(row.try_get("shares")?)?,
        price: parse_decimal(row.try_get("price")?)?,
        side: TradeSide::from_str(&side)
            .ok_or_else(|| sqlx::Error::Decode(format!("bad trade side: {side}").into()))?,
        timestamp: parse_timestamp(row.try_get("timestamp")?)?,
    })
}

fn setting_from_row(row: &SqliteRow) -> Result<CopySetting, sqlx::Error> {
    let risk: String = row.try_get("risk_level")?;
    Ok(CopySetting {
        id: row.try_get("id")?,
        follower_id: row.try_get("follower_id")?,
        trader_id: row.try_get("trader_id")?,
        enabled: row.try_get("enabled")?,
        copy_amount: parse_decimal(row.try_get("copy_amount")?)?,
        max_position_size: parse_decimal(row.try_get("max_position_size")?)?,
        risk_level: RiskLevel::from_str(&risk),
        created_at: parse_timestamp(row.try_get("created_at")?)?,
        updated_at: parse_timestamp(row.try_get("updated_at")?)?,
    })
}

fn copied_trade_from_row(row: &SqliteRow) -> Result<CopiedTrade, sqlx::Error> {
    let status: String = row.try_get("status")?;
    let executed_at: Option<String> = row.try_get("executed_at")?;
    Ok(CopiedTrade {
        id: row.try_get("id")?,
        original_transaction_id: row.try_get("original_transaction_id")?,
        follower_id: row.try_get("follower_id")?,
        status: CopyStatus::from_str(&status),
        copied_shares: parse_decimal(row.try_get("copied_shares")?)?,
        copied_price: parse_decimal(row.try_get("copied_price")?)?,
        error_message: row.try_get("error_message")?,
        created_at: parse_timestamp(row.try_get("created_at")?)?,
        executed_at: executed_at.as_deref().map(parse_timestamp).transpose()?,
    })
}

fn follow_from_row(row: &SqliteRow) -> Result<FollowEdge, sqlx::Error> {
    Ok(FollowEdge {
        follower_id: row.try_get("follower_id")?,
        followed_id: row.try_get("followed_id")?,
        created_at: parse_timestamp(row.try_get("created_at")?)?,
    })
}

impl Store {
    /// Open (or create) a database and bring the schema up to date.
    pub async fn new(database_url: &str) -> Result<Self, sqlx::Error> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        let store = Self { pool };
        store.run_migrations().await?;

        Ok(store)
    }

    /// In-memory database for tests. A single connection keeps every reader
    /// and writer on the same ephemeral database.
    pub async fn in_memory() -> Result<Self, sqlx::Error> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        let store = Self { pool };
        store.run_migrations().await?;

        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS accounts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT NOT NULL UNIQUE,
                cash_balance TEXT NOT NULL,
                is_trader INTEGER NOT NULL DEFAULT 0,
                subscription_fee TEXT NOT NULL DEFAULT '0',
                bio TEXT NOT NULL DEFAULT '',
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS positions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                account_id INTEGER NOT NULL,
                symbol TEXT NOT NULL,
                shares TEXT NOT NULL,
                average_price TEXT NOT NULL,
                last_updated TEXT NOT NULL,
                UNIQUE(account_id, symbol),
                FOREIGN KEY (account_id) REFERENCES accounts(id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS transactions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                account_id INTEGER NOT NULL,
                symbol TEXT NOT NULL,
                shares TEXT NOT NULL,
                price TEXT NOT NULL,
                side TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                FOREIGN KEY (account_id) REFERENCES accounts(id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS copy_settings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                follower_id INTEGER NOT NULL,
                trader_id INTEGER NOT NULL,
                enabled INTEGER NOT NULL DEFAULT 1,
                copy_amount TEXT NOT NULL,
                max_position_size TEXT NOT NULL,
                risk_level TEXT NOT NULL DEFAULT 'medium',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                FOREIGN KEY (follower_id) REFERENCES accounts(id),
                FOREIGN KEY (trader_id) REFERENCES accounts(id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS copied_trades (
                id TEXT PRIMARY KEY,
                original_transaction_id INTEGER NOT NULL,
                follower_id INTEGER NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                copied_shares TEXT NOT NULL,
                copied_price TEXT NOT NULL,
                error_message TEXT,
                created_at TEXT NOT NULL,
                executed_at TEXT,
                FOREIGN KEY (original_transaction_id) REFERENCES transactions(id),
                FOREIGN KEY (follower_id) REFERENCES accounts(id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS follows (
                follower_id INTEGER NOT NULL,
                followed_id INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                PRIMARY KEY (follower_id, followed_id),
                FOREIGN KEY (follower_id) REFERENCES accounts(id),
                FOREIGN KEY (followed_id) REFERENCES accounts(id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Indexes
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_transactions_account ON transactions(account_id)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_copied_trades_follower ON copied_trades(follower_id)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_follows_followed ON follows(followed_id)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_copy_settings_follower ON copy_settings(follower_id)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    // ==================== Accounts ====================

    /// Create an account with the given starting balance.
    pub async fn create_account(
        &self,
        username: &str,
        starting_balance: Decimal,
    ) -> Result<Account, sqlx::Error> {
        let id = sqlx::query(
            r#"
            INSERT INTO accounts (username, cash_balance, created_at)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(username)
        .bind(starting_balance.to_string())
        .bind(now_text())
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        self.get_account(id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)
    }

    pub async fn get_account(&self, id: i64) -> Result<Option<Account>, sqlx::Error> {
        sqlx::query("SELECT * FROM accounts WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(|row| account_from_row(&row))
            .transpose()
    }

    pub async fn get_account_by_username(
        &self,
        username: &str,
    ) -> Result<Option<Account>, sqlx::Error> {
        sqlx::query("SELECT * FROM accounts WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?
            .map(|row| account_from_row(&row))
            .transpose()
    }

    /// Update an account's trader profile (opt in/out of being copied).
    pub async fn update_trader_profile(
        &self,
        id: i64,
        is_trader: bool,
        subscription_fee: Decimal,
        bio: &str,
    ) -> Result<Option<Account>, sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE accounts SET is_trader = ?, subscription_fee = ?, bio = ?
            WHERE id = ?
            "#,
        )
        .bind(is_trader)
        .bind(subscription_fee.to_string())
        .bind(bio)
        .bind(id)
        .execute(&self.pool)
        .await?;

        self.get_account(id).await
    }

    /// Accounts that have opted in to being copied.
    pub async fn list_traders(&self) -> Result<Vec<Account>, sqlx::Error> {
        sqlx::query("SELECT * FROM accounts WHERE is_trader = 1 ORDER BY id")
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(account_from_row)
            .collect()
    }

    pub async fn all_accounts(&self) -> Result<Vec<Account>, sqlx::Error> {
        sqlx::query("SELECT * FROM accounts ORDER BY id")
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(account_from_row)
            .collect()
    }

    // ==================== Positions ====================

    pub async fn get_position(
        &self,
        account_id: i64,
        symbol: &str,
    ) -> Result<Option<Position>, sqlx::Error> {
        sqlx::query("SELECT * FROM positions WHERE account_id = ? AND symbol = ?")
            .bind(account_id)
            .bind(symbol)
            .fetch_optional(&self.pool)
            .await?
            .map(|row| position_from_row(&row))
            .transpose()
    }

    pub async fn positions_for(&self, account_id: i64) -> Result<Vec<Position>, sqlx::Error> {
        sqlx::query("SELECT * FROM positions WHERE account_id = ? ORDER BY symbol")
            .bind(account_id)
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(position_from_row)
            .collect()
    }

    // ==================== Transactions ====================

    pub async fn transactions_for(&self, account_id: i64) -> Result<Vec<Transaction>, sqlx::Error> {
        sqlx::query("SELECT * FROM transactions WHERE account_id = ? ORDER BY id")
            .bind(account_id)
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(transaction_from_row)
            .collect()
    }

    pub async fn get_transaction(&self, id: i64) -> Result<Option<Transaction>, sqlx::Error> {
        sqlx::query("SELECT * FROM transactions WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(|row| transaction_from_row(&row))
            .transpose()
    }

    // ==================== Copied Trades ====================

    /// Record a fanout attempt in `pending` state before submitting it.
    pub async fn append_copied_trade(
        &self,
        id: &str,
        original_transaction_id: i64,
        follower_id: i64,
        copied_shares: Decimal,
        copied_price: Decimal,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO copied_trades (
                id, original_transaction_id, follower_id, status,
                copied_shares, copied_price, created_at
            ) VALUES (?, ?, ?, 'pending', ?, ?, ?)
            "#,
        )
        .bind(id)
        .bind(original_transaction_id)
        .bind(follower_id)
        .bind(copied_shares.to_string())
        .bind(copied_price.to_string())
        .bind(now_text())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Settle a fanout attempt to `executed` or `failed`.
    pub async fn settle_copied_trade(
        &self,
        id: &str,
        status: CopyStatus,
        executed_price: Option<Decimal>,
        error: Option<&str>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE copied_trades SET
                status = ?,
                copied_price = COALESCE(?, copied_price),
                error_message = ?,
                executed_at = CASE WHEN ? = 'executed' THEN ? ELSE executed_at END
            WHERE id = ?
            "#,
        )
        .bind(status.as_str())
        .bind(executed_price.map(|p| p.to_string()))
        .bind(error)
        .bind(status.as_str())
        .bind(now_text())
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn copied_trades_for(
        &self,
        follower_id: i64,
    ) -> Result<Vec<CopiedTrade>, sqlx::Error> {
        sqlx::query("SELECT * FROM copied_trades WHERE follower_id = ? ORDER BY created_at")
            .bind(follower_id)
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(copied_trade_from_row)
            .collect()
    }

    // ==================== Social Graph ====================

    pub async fn follow(&self, follower_id: i64, followed_id: i64) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT OR IGNORE INTO follows (follower_id, followed_id, created_at) VALUES (?, ?, ?)",
        )
        .bind(follower_id)
        .bind(followed_id)
        .bind(now_text())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn unfollow(&self, follower_id: i64, followed_id: i64) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM follows WHERE follower_id = ? AND followed_id = ?")
            .bind(follower_id)
            .bind(followed_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Everyone following the given account.
    pub async fn followers_of(&self, followed_id: i64) -> Result<Vec<FollowEdge>, sqlx::Error> {
        sqlx::query("SELECT * FROM follows WHERE followed_id = ? ORDER BY created_at")
            .bind(followed_id)
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(follow_from_row)
            .collect()
    }

    // ==================== Copy Settings ====================

    pub async fn create_copy_setting(
        &self,
        follower_id: i64,
        trader_id: i64,
        enabled: bool,
        copy_amount: Decimal,
        max_position_size: Decimal,
        risk_level: RiskLevel,
    ) -> Result<CopySetting, sqlx::Error> {
        let now = now_text();
        let id = sqlx::query(
            r#"
            INSERT INTO copy_settings (
                follower_id, trader_id, enabled, copy_amount,
                max_position_size, risk_level, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(follower_id)
        .bind(trader_id)
        .bind(enabled)
        .bind(copy_amount.to_string())
        .bind(max_position_size.to_string())
        .bind(risk_level.as_str())
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        self.get_copy_setting(id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)
    }

    pub async fn update_copy_setting(
        &self,
        id: i64,
        enabled: bool,
        copy_amount: Decimal,
        max_position_size: Decimal,
        risk_level: RiskLevel,
    ) -> Result<Option<CopySetting>, sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE copy_settings SET
                enabled = ?,
                copy_amount = ?,
                max_position_size = ?,
                risk_level = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(enabled)
        .bind(copy_amount.to_string())
        .bind(max_position_size.to_string())
        .bind(risk_level.as_str())
        .bind(now_text())
        .bind(id)
        .execute(&self.pool)
        .await?;

        self.get_copy_setting(id).await
    }

    pub async fn get_copy_setting(&self, id: i64) -> Result<Option<CopySetting>, sqlx::Error> {
        sqlx::query("SELECT * FROM copy_settings WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(|row| setting_from_row(&row))
            .transpose()
    }

    /// All settings owned by a follower, most recently updated first. Fanout
    /// takes the first enabled match per trader, so the latest update wins
    /// when duplicates exist.
    pub async fn settings_for(&self, follower_id: i64) -> Result<Vec<CopySetting>, sqlx::Error> {
        sqlx::query(
            "SELECT * FROM copy_settings WHERE follower_id = ? ORDER BY updated_at DESC, id DESC",
        )
        .bind(follower_id)
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(setting_from_row)
        .collect()
    }

    /// Get the connection pool (the ledger opens its transactions here).
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
