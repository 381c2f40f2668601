//! Copy-trade fanout tests.
//!
//! The central contract: a trader's own trade commits regardless of follower
//! outcomes, and each follower's copy attempt succeeds or fails entirely on
//! its own. Prices are pinned with a fixed oracle so every scenario is
//! deterministic.

use std::sync::Arc;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use paperbroker::models::{Account, CopyStatus, RiskLevel, TradeRequest, TradeSide};
use paperbroker::{Brokerage, FixedOracle, Ledger, Store, TradingConfig};

async fn broker_at_fixed_prices() -> (Brokerage, Store) {
    let store = Store::in_memory().await.unwrap();
    let oracle = FixedOracle::new()
        .with_price("AAPL", dec!(50.00))
        .with_price("MSFT", dec!(30.00));
    let broker = Brokerage::new(store.clone(), Arc::new(oracle), TradingConfig::default());
    (broker, store)
}

async fn make_trader(broker: &Brokerage, username: &str) -> Account {
    let account = broker.signup(username).await.unwrap();
    broker
        .update_trader_profile(account.id, true, dec!(10.00), "momentum trades")
        .await
        .unwrap()
}

async fn make_follower(broker: &Brokerage, username: &str, trader: &Account) -> Account {
    let account = broker.signup(username).await.unwrap();
    broker.follow(account.id, trader.id).await.unwrap();
    account
}

fn buy(symbol: &str, shares: Decimal) -> TradeRequest {
    TradeRequest::new(symbol, shares, TradeSide::Buy)
}

#[tokio::test]
async fn trader_trade_copies_to_follower() {
    let (broker, store) = broker_at_fixed_prices().await;

    let trader = make_trader(&broker, "tina").await;
    let follower = make_follower(&broker, "fred", &trader).await;
    broker
        .create_copy_setting(
            follower.id,
            trader.id,
            true,
            dec!(100),
            dec!(1000),
            RiskLevel::Medium,
        )
        .await
        .unwrap();

    let (tx, report) = broker.place_trade(trader.id, &buy("AAPL", dec!(10))).await.unwrap();
    let report = report.unwrap();

    // The trader's side of the scenario
    assert_eq!(tx.price, dec!(50.00));
    let trader = store.get_account(trader.id).await.unwrap().unwrap();
    assert_eq!(trader.cash_balance, dec!(4500.00));
    let position = store.get_position(trader.id, "AAPL").await.unwrap().unwrap();
    assert_eq!(position.shares, dec!(10));
    assert_eq!(position.average_price, dec!(50.00));

    // The follower's: min(100, 1000, 500) = $100 -> 2 shares at $50
    assert_eq!(report.attempted, 1);
    assert_eq!(report.executed, 1);

    let follower = store.get_account(follower.id).await.unwrap().unwrap();
    assert_eq!(follower.cash_balance, dec!(4900.00));
    let copy_position = store.get_position(follower.id, "AAPL").await.unwrap().unwrap();
    assert_eq!(copy_position.shares, dec!(2.000000));
    assert_eq!(copy_position.average_price, dec!(50.00));

    let copied = store.copied_trades_for(follower.id).await.unwrap();
    assert_eq!(copied.len(), 1);
    assert_eq!(copied[0].status, CopyStatus::Executed);
    assert_eq!(copied[0].copied_shares, dec!(2.000000));
    assert_eq!(copied[0].copied_price, dec!(50.00));
    assert_eq!(copied[0].original_transaction_id, tx.id);
    assert!(copied[0].executed_at.is_some());
}

#[tokio::test]
async fn broke_follower_fails_without_touching_their_ledger() {
    let (broker, store) = broker_at_fixed_prices().await;

    let trader = make_trader(&broker, "tina").await;
    let follower = make_follower(&broker, "fred", &trader).await;
    broker
        .create_copy_setting(
            follower.id,
            trader.id,
            true,
            dec!(100),
            dec!(1000),
            RiskLevel::Low,
        )
        .await
        .unwrap();

    // Drain the follower down to $50, below the $100 copy amount
    let ledger = Ledger::new(&store);
    ledger.debit(follower.id, dec!(4950.00)).await.unwrap();

    let (tx, report) = broker.place_trade(trader.id, &buy("AAPL", dec!(10))).await.unwrap();
    let report = report.unwrap();

    assert_eq!(report.failed, 1);
    assert_eq!(report.executed, 0);

    // The trader's trade stands
    let trader = store.get_account(trader.id).await.unwrap().unwrap();
    assert_eq!(trader.cash_balance, dec!(4500.00));
    assert_eq!(store.transactions_for(trader.id).await.unwrap().len(), 1);

    // The follower's state is untouched
    let follower_account = store.get_account(follower.id).await.unwrap().unwrap();
    assert_eq!(follower_account.cash_balance, dec!(50.00));
    assert!(store.get_position(follower.id, "AAPL").await.unwrap().is_none());
    assert!(store.transactions_for(follower.id).await.unwrap().is_empty());

    let copied = store.copied_trades_for(follower.id).await.unwrap();
    assert_eq!(copied.len(), 1);
    assert_eq!(copied[0].status, CopyStatus::Failed);
    assert!(copied[0]
        .error_message
        .as_deref()
        .unwrap()
        .contains("Insufficient funds"));
    assert_eq!(copied[0].original_transaction_id, tx.id);
}

#[tokio::test]
async fn one_follower_failing_does_not_abort_siblings() {
    let (broker, store) = broker_at_fixed_prices().await;

    let trader = make_trader(&broker, "tina").await;
    let broke = make_follower(&broker, "broke", &trader).await;
    let funded = make_follower(&broker, "funded", &trader).await;

    for follower in [&broke, &funded] {
        broker
            .create_copy_setting(
                follower.id,
                trader.id,
                true,
                dec!(100),
                dec!(1000),
                RiskLevel::Medium,
            )
            .await
            .unwrap();
    }

    let ledger = Ledger::new(&store);
    ledger.debit(broke.id, dec!(4950.00)).await.unwrap();

    let (_, report) = broker.place_trade(trader.id, &buy("AAPL", dec!(10))).await.unwrap();
    let report = report.unwrap();

    assert_eq!(report.attempted, 2);
    assert_eq!(report.executed, 1);
    assert_eq!(report.failed, 1);

    let broke_copies = store.copied_trades_for(broke.id).await.unwrap();
    assert_eq!(broke_copies[0].status, CopyStatus::Failed);
    let broke_account = store.get_account(broke.id).await.unwrap().unwrap();
    assert_eq!(broke_account.cash_balance, dec!(50.00));

    let funded_copies = store.copied_trades_for(funded.id).await.unwrap();
    assert_eq!(funded_copies[0].status, CopyStatus::Executed);
    let funded_account = store.get_account(funded.id).await.unwrap().unwrap();
    assert_eq!(funded_account.cash_balance, dec!(4900.00));
}

#[tokio::test]
async fn followers_without_active_settings_are_skipped() {
    let (broker, store) = broker_at_fixed_prices().await;

    let trader = make_trader(&broker, "tina").await;
    let other_trader = make_trader(&broker, "tom").await;

    // No setting at all
    let bare = make_follower(&broker, "bare", &trader).await;

    // Setting exists but is disabled
    let disabled = make_follower(&broker, "disabled", &trader).await;
    broker
        .create_copy_setting(
            disabled.id,
            trader.id,
            false,
            dec!(100),
            dec!(1000),
            RiskLevel::Medium,
        )
        .await
        .unwrap();

    // Setting targets a different trader
    let elsewhere = make_follower(&broker, "elsewhere", &trader).await;
    broker
        .create_copy_setting(
            elsewhere.id,
            other_trader.id,
            true,
            dec!(100),
            dec!(1000),
            RiskLevel::Medium,
        )
        .await
        .unwrap();

    let (_, report) = broker.place_trade(trader.id, &buy("AAPL", dec!(10))).await.unwrap();
    let report = report.unwrap();

    assert_eq!(report.attempted, 3);
    assert_eq!(report.skipped, 3);
    assert_eq!(report.executed, 0);
    assert_eq!(report.failed, 0);

    // Skipped followers get no outcome records and no ledger changes
    for follower in [&bare, &disabled, &elsewhere] {
        assert!(store.copied_trades_for(follower.id).await.unwrap().is_empty());
        let account = store.get_account(follower.id).await.unwrap().unwrap();
        assert_eq!(account.cash_balance, dec!(5000.00));
    }
}

#[tokio::test]
async fn latest_updated_setting_wins() {
    let (broker, store) = broker_at_fixed_prices().await;

    let trader = make_trader(&broker, "tina").await;
    let follower = make_follower(&broker, "fred", &trader).await;

    let first = broker
        .create_copy_setting(
            follower.id,
            trader.id,
            true,
            dec!(100),
            dec!(1000),
            RiskLevel::Medium,
        )
        .await
        .unwrap();
    broker
        .create_copy_setting(
            follower.id,
            trader.id,
            true,
            dec!(40),
            dec!(1000),
            RiskLevel::Medium,
        )
        .await
        .unwrap();

    // The second (newest) setting governs: $40 -> 0.8 shares
    broker.place_trade(trader.id, &buy("AAPL", dec!(10))).await.unwrap();
    let copied = store.copied_trades_for(follower.id).await.unwrap();
    assert_eq!(copied.len(), 1);
    assert_eq!(copied[0].copied_shares, dec!(0.800000));

    // Updating the first setting makes it the newest: $20 -> 0.4 shares
    broker
        .update_copy_setting(first.id, true, dec!(20), dec!(1000), RiskLevel::Medium)
        .await
        .unwrap();

    broker.place_trade(trader.id, &buy("AAPL", dec!(10))).await.unwrap();
    let copied = store.copied_trades_for(follower.id).await.unwrap();
    assert_eq!(copied.len(), 2);
    assert_eq!(copied[1].copied_shares, dec!(0.400000));
}

#[tokio::test]
async fn copy_amount_capped_by_original_trade_value() {
    let (broker, store) = broker_at_fixed_prices().await;

    let trader = make_trader(&broker, "tina").await;
    let follower = make_follower(&broker, "fred", &trader).await;
    broker
        .create_copy_setting(
            follower.id,
            trader.id,
            true,
            dec!(1000),
            dec!(1000),
            RiskLevel::High,
        )
        .await
        .unwrap();

    // Original trade is worth only $50; the follower copies all of it
    broker.place_trade(trader.id, &buy("AAPL", dec!(1))).await.unwrap();

    let copied = store.copied_trades_for(follower.id).await.unwrap();
    assert_eq!(copied[0].copied_shares, dec!(1.000000));

    let follower_account = store.get_account(follower.id).await.unwrap().unwrap();
    assert_eq!(follower_account.cash_balance, dec!(4950.00));
}

#[tokio::test]
async fn non_trader_trades_do_not_fan_out() {
    let (broker, store) = broker_at_fixed_prices().await;

    let plain = broker.signup("plain").await.unwrap();
    let watcher = broker.signup("watcher").await.unwrap();
    broker.follow(watcher.id, plain.id).await.unwrap();
    broker
        .create_copy_setting(
            watcher.id,
            plain.id,
            true,
            dec!(100),
            dec!(1000),
            RiskLevel::Medium,
        )
        .await
        .unwrap();

    let (_, report) = broker.place_trade(plain.id, &buy("MSFT", dec!(2))).await.unwrap();

    assert!(report.is_none());
    assert!(store.copied_trades_for(watcher.id).await.unwrap().is_empty());
    let watcher_account = store.get_account(watcher.id).await.unwrap().unwrap();
    assert_eq!(watcher_account.cash_balance, dec!(5000.00));
}

#[tokio::test]
async fn trader_trade_survives_every_follower_failing() {
    let (broker, store) = broker_at_fixed_prices().await;

    let trader = make_trader(&broker, "tina").await;
    let ledger = Ledger::new(&store);

    for name in ["f1", "f2", "f3"] {
        let follower = make_follower(&broker, name, &trader).await;
        broker
            .create_copy_setting(
                follower.id,
                trader.id,
                true,
                dec!(100),
                dec!(1000),
                RiskLevel::Medium,
            )
            .await
            .unwrap();
        ledger.debit(follower.id, dec!(4999.00)).await.unwrap();
    }

    let (tx, report) = broker.place_trade(trader.id, &buy("AAPL", dec!(10))).await.unwrap();
    let report = report.unwrap();

    assert_eq!(report.attempted, 3);
    assert_eq!(report.failed, 3);
    assert_eq!(report.executed, 0);

    // Isolation: the trader's transaction and balance update stand
    let trader = store.get_account(trader.id).await.unwrap().unwrap();
    assert_eq!(trader.cash_balance, dec!(4500.00));
    assert_eq!(store.get_transaction(tx.id).await.unwrap().unwrap().id, tx.id);
}

#[tokio::test]
async fn zero_timeout_records_failed_copies() {
    let store = Store::in_memory().await.unwrap();
    let oracle = FixedOracle::new().with_price("AAPL", dec!(50.00));
    let config = TradingConfig {
        fanout_timeout_secs: 0,
        ..Default::default()
    };
    let broker = Brokerage::new(store.clone(), Arc::new(oracle), config);

    let trader = make_trader(&broker, "tina").await;
    let follower = make_follower(&broker, "fred", &trader).await;
    broker
        .create_copy_setting(
            follower.id,
            trader.id,
            true,
            dec!(100),
            dec!(1000),
            RiskLevel::Medium,
        )
        .await
        .unwrap();

    let (_, report) = broker.place_trade(trader.id, &buy("AAPL", dec!(10))).await.unwrap();
    let report = report.unwrap();

    assert_eq!(report.failed, 1);

    let copied = store.copied_trades_for(follower.id).await.unwrap();
    assert_eq!(copied[0].status, CopyStatus::Failed);
    assert!(copied[0]
        .error_message
        .as_deref()
        .unwrap()
        .contains("timed out"));

    // The cancelled attempt rolled back: no ledger changes for the follower
    let follower_account = store.get_account(follower.id).await.unwrap().unwrap();
    assert_eq!(follower_account.cash_balance, dec!(5000.00));
}
