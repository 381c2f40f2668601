//! Paper-trading brokerage CLI.
//!
//! Simulated stock trading against a mock price oracle, with social
//! follows and automatic copy-trading: when a trader trades, every
//! follower with an active copy setting gets a scaled copy of the trade.

use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use paperbroker::models::{RiskLevel, TradeRequest, TradeSide};
use paperbroker::{Brokerage, MockOracle, Store, TradingConfig};

/// Paper-trading brokerage with copy-trade fanout.
#[derive(Parser)]
#[command(name = "paperbroker")]
#[command(about = "Simulated stock trading with copy-trading", long_about = None)]
struct Cli {
    /// Database file path
    #[arg(short, long, env = "DATABASE_URL", default_value = "sqlite:./paperbroker.db?mode=rwc")]
    database: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Emit results as JSON instead of tables
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an account (starts with $5000.00 of virtual cash)
    Signup {
        username: String,
    },

    /// Execute a trade at the current oracle price
    Trade {
        /// Acting account id
        account: i64,

        /// Ticker symbol
        symbol: String,

        /// Number of shares (fractional allowed)
        shares: Decimal,

        /// buy or sell
        side: String,
    },

    /// Show an account's balance and positions
    Portfolio {
        account: i64,
    },

    /// Show an account's transaction history
    Transactions {
        account: i64,
    },

    /// Update an account's trader profile (opt in to being copied)
    Trader {
        account: i64,

        /// Monthly subscription fee in dollars
        #[arg(short, long, default_value = "0")]
        fee: Decimal,

        /// Profile blurb
        #[arg(short, long, default_value = "")]
        bio: String,

        /// Opt out instead of in
        #[arg(long)]
        disable: bool,
    },

    /// List accounts that have opted in as traders
    Traders,

    /// Follow a trader
    Follow {
        follower: i64,
        trader: i64,
    },

    /// Stop following a trader
    Unfollow {
        follower: i64,
        trader: i64,
    },

    /// Create or update copy-trading settings for a followed trader
    Copy {
        follower: i64,
        trader: i64,

        /// Cash to commit per copied trade
        #[arg(short, long)]
        amount: Decimal,

        /// Cap on cash committed to a single copied trade
        #[arg(short, long)]
        max_position: Decimal,

        /// Risk label: low, medium, high
        #[arg(short, long, default_value = "medium")]
        risk: String,

        /// Create the setting disabled
        #[arg(long)]
        disabled: bool,

        /// Update this existing setting instead of creating a new one
        #[arg(long)]
        id: Option<i64>,
    },

    /// Show a follower's copy settings
    Settings {
        follower: i64,
    },

    /// Show a follower's copied-trade outcomes
    CopiedTrades {
        account: i64,
    },

    /// Rank all accounts by cash plus market value of positions
    Leaderboard,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Setup logging
    let log_level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let store = Store::new(&cli.database).await?;
    let broker = Brokerage::new(store, Arc::new(MockOracle::new()), TradingConfig::default());

    match cli.command {
        Commands::Signup { username } => {
            let account = broker.signup(&username).await?;
            println!(
                "Created account {} ({}) with balance ${}",
                account.id, account.username, account.cash_balance
            );
        }

        Commands::Trade {
            account,
            symbol,
            shares,
            side,
        } => {
            let side = TradeSide::from_str(&side)
                .ok_or_else(|| anyhow::anyhow!("side must be 'buy' or 'sell'"))?;
            let request = TradeRequest::new(symbol, shares, side);

            let (transaction, report) = broker.place_trade(account, &request).await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&transaction)?);
            } else {
                println!(
                    "{} {} {} @ ${} (total ${})",
                    transaction.side.as_str().to_uppercase(),
                    transaction.shares,
                    transaction.symbol,
                    transaction.price,
                    transaction.total()
                );
            }
            if let Some(report) = report {
                println!("Copy fanout: {report}");
            }
        }

        Commands::Portfolio { account } => {
            let holder = broker
                .store()
                .get_account(account)
                .await?
                .ok_or_else(|| anyhow::anyhow!("Account {account} not found"))?;
            let positions = broker.portfolio(account).await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&positions)?);
                return Ok(());
            }

            println!("\nAccount {} ({})", holder.id, holder.username);
            println!("Cash balance: ${}", holder.cash_balance);

            if positions.is_empty() {
                println!("No open positions.");
            } else {
                println!("\n{:<10} {:>14} {:>12}", "SYMBOL", "SHARES", "AVG PRICE");
                println!("{}", "-".repeat(38));
                for pos in positions {
                    println!(
                        "{:<10} {:>14} {:>12}",
                        pos.symbol, pos.shares, pos.average_price
                    );
                }
            }
        }

        Commands::Transactions { account } => {
            let transactions = broker.transactions(account).await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&transactions)?);
                return Ok(());
            }

            if transactions.is_empty() {
                println!("No transactions.");
            } else {
                println!(
                    "\n{:<6} {:<6} {:<10} {:>14} {:>10} {:<24}",
                    "ID", "SIDE", "SYMBOL", "SHARES", "PRICE", "TIMESTAMP"
                );
                println!("{}", "-".repeat(74));
                for tx in transactions {
                    println!(
                        "{:<6} {:<6} {:<10} {:>14} {:>10} {:<24}",
                        tx.id,
                        tx.side.as_str(),
                        tx.symbol,
                        tx.shares,
                        tx.price,
                        tx.timestamp.format("%Y-%m-%d %H:%M:%S")
                    );
                }
            }
        }

        Commands::Trader {
            account,
            fee,
            bio,
            disable,
        } => {
            let updated = broker
                .update_trader_profile(account, !disable, fee, &bio)
                .await?;
            if updated.is_trader {
                println!(
                    "Account {} is now a trader (fee ${}/month)",
                    updated.id, updated.subscription_fee
                );
            } else {
                println!("Account {} is no longer a trader", updated.id);
            }
        }

        Commands::Traders => {
            let traders = broker.traders().await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&traders)?);
                return Ok(());
            }

            if traders.is_empty() {
                println!("No traders yet. Use 'paperbroker trader <account>' to opt in.");
            } else {
                println!("\n{:<6} {:<16} {:>10} BIO", "ID", "USERNAME", "FEE");
                println!("{}", "-".repeat(60));
                for trader in traders {
                    println!(
                        "{:<6} {:<16} {:>10} {}",
                        trader.id,
                        trader.username,
                        format!("${}", trader.subscription_fee),
                        trader.bio
                    );
                }
            }
        }

        Commands::Follow { follower, trader } => {
            broker.follow(follower, trader).await?;
            println!("Account {follower} now follows account {trader}");
        }

        Commands::Unfollow { follower, trader } => {
            broker.unfollow(follower, trader).await?;
            println!("Account {follower} no longer follows account {trader}");
        }

        Commands::Copy {
            follower,
            trader,
            amount,
            max_position,
            risk,
            disabled,
            id,
        } => {
            let risk = RiskLevel::from_str(&risk);
            let setting = match id {
                Some(id) => {
                    broker
                        .update_copy_setting(id, !disabled, amount, max_position, risk)
                        .await?
                }
                None => {
                    broker
                        .create_copy_setting(follower, trader, !disabled, amount, max_position, risk)
                        .await?
                }
            };

            println!(
                "Copy setting {}: follower {} copies trader {} with ${} per trade (cap ${}, {}, {})",
                setting.id,
                setting.follower_id,
                setting.trader_id,
                setting.copy_amount,
                setting.max_position_size,
                setting.risk_level.as_str(),
                if setting.enabled { "enabled" } else { "disabled" }
            );
        }

        Commands::Settings { follower } => {
            let settings = broker.settings_for(follower).await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&settings)?);
                return Ok(());
            }

            if settings.is_empty() {
                println!("No copy settings.");
            } else {
                println!(
                    "\n{:<6} {:<8} {:>10} {:>12} {:<8} {:<8}",
                    "ID", "TRADER", "AMOUNT", "MAX", "RISK", "STATE"
                );
                println!("{}", "-".repeat(58));
                for s in settings {
                    println!(
                        "{:<6} {:<8} {:>10} {:>12} {:<8} {:<8}",
                        s.id,
                        s.trader_id,
                        format!("${}", s.copy_amount),
                        format!("${}", s.max_position_size),
                        s.risk_level.as_str(),
                        if s.enabled { "enabled" } else { "disabled" }
                    );
                }
            }
        }

        Commands::CopiedTrades { account } => {
            let trades = broker.copied_trades(account).await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&trades)?);
                return Ok(());
            }

            if trades.is_empty() {
                println!("No copied trades.");
            } else {
                println!(
                    "\n{:<10} {:>6} {:>14} {:>10} {:<10} ERROR",
                    "STATUS", "TX", "SHARES", "PRICE", "WHEN"
                );
                println!("{}", "-".repeat(70));
                for ct in trades {
                    println!(
                        "{:<10} {:>6} {:>14} {:>10} {:<10} {}",
                        ct.status.as_str(),
                        ct.original_transaction_id,
                        ct.copied_shares,
                        ct.copied_price,
                        ct.created_at.format("%H:%M:%S"),
                        ct.error_message.as_deref().unwrap_or("-")
                    );
                }
            }
        }

        Commands::Leaderboard => {
            let entries = broker.leaderboard().await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
                return Ok(());
            }

            println!("\n{:<4} {:<16} {:>14}", "#", "USERNAME", "TOTAL VALUE");
            println!("{}", "-".repeat(36));
            for (rank, entry) in entries.iter().enumerate() {
                println!(
                    "{:<4} {:<16} {:>14}",
                    rank + 1,
                    entry.username,
                    format!("${:.2}", entry.total_value)
                );
            }
        }
    }

    Ok(())
}
