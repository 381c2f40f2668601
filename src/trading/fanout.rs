//! Copy-trade fanout: replicate a trader's committed trade into each
//! eligible follower's portfolio, independently.
//!
//! Every follower attempt is its own task with its own outcome record. A
//! failure (insufficient funds, storage error, timeout) settles that
//! follower's record as failed and goes no further: it never aborts sibling
//! attempts and never surfaces to the acting trader. The fanout call itself
//! always succeeds.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::db::Store;
use crate::models::{Account, CopyStatus, TradeRequest, Transaction};
use crate::trading::engine::TradeEngine;
use crate::trading::sizing;

/// Tally of one fanout pass over a trader's followers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanoutReport {
    /// Followers considered (one per follow edge)
    pub attempted: usize,
    pub executed: usize,
    pub failed: usize,
    /// Followers with no active copy setting for this trader
    pub skipped: usize,
}

impl fmt::Display for FanoutReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} followers: {} executed, {} failed, {} skipped",
            self.attempted, self.executed, self.failed, self.skipped
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttemptOutcome {
    Skipped,
    Executed,
    Failed,
}

/// Fans a committed trader transaction out to followers.
pub struct FanoutController {
    store: Store,
    engine: Arc<TradeEngine>,
    attempt_timeout: Duration,
}

impl FanoutController {
    pub fn new(store: Store, engine: Arc<TradeEngine>, attempt_timeout: Duration) -> Self {
        Self {
            store,
            engine,
            attempt_timeout,
        }
    }

    /// Replicate `original` into every eligible follower's portfolio. The
    /// original transaction must already be committed; this reads its final
    /// price and shares. Completion of the returned future means every
    /// follower attempt has settled one way or the other.
    pub async fn fanout(&self, original: &Transaction, trader: &Account) -> FanoutReport {
        if !trader.is_trader {
            return FanoutReport::default();
        }

        let followers = match self.store.followers_of(trader.id).await {
            Ok(edges) => edges,
            Err(e) => {
                warn!(trader = trader.id, error = %e, "failed to enumerate followers");
                return FanoutReport::default();
            }
        };

        if followers.is_empty() {
            debug!(trader = trader.id, "no followers, nothing to fan out");
            return FanoutReport::default();
        }

        let handles: Vec<_> = followers
            .into_iter()
            .map(|edge| {
                let store = self.store.clone();
                let engine = self.engine.clone();
                let timeout = self.attempt_timeout;
                let trader_id = trader.id;
                let original = original.clone();
                tokio::spawn(async move {
                    copy_for_follower(store, engine, timeout, trader_id, edge.follower_id, original)
                        .await
                })
            })
            .collect();

        let mut report = FanoutReport::default();
        for result in join_all(handles).await {
            report.attempted += 1;
            match result {
                Ok(AttemptOutcome::Executed) => report.executed += 1,
                Ok(AttemptOutcome::Skipped) => report.skipped += 1,
                Ok(AttemptOutcome::Failed) => report.failed += 1,
                Err(e) => {
                    warn!(error = %e, "copy task panicked");
                    report.failed += 1;
                }
            }
        }

        info!(
            trader = trader.id,
            transaction = original.id,
            %report,
            "fanout complete"
        );
        report
    }
}

/// One follower's copy attempt, fully self-contained: any failure settles
/// this follower's record and is not propagated.
async fn copy_for_follower(
    store: Store,
    engine: Arc<TradeEngine>,
    timeout: Duration,
    trader_id: i64,
    follower_id: i64,
    original: Transaction,
) -> AttemptOutcome {
    let settings = match store.settings_for(follower_id).await {
        Ok(settings) => settings,
        Err(e) => {
            warn!(follower = follower_id, error = %e, "failed to load copy settings");
            return AttemptOutcome::Failed;
        }
    };

    // settings_for orders newest-updated first, so duplicate settings for
    // the same trader resolve to the latest one.
    let Some(setting) = settings.into_iter().find(|s| s.applies_to(trader_id)) else {
        debug!(
            follower = follower_id,
            trader = trader_id,
            "no active copy setting, skipping"
        );
        return AttemptOutcome::Skipped;
    };

    let copied_shares = sizing::copy_shares(&setting, &original);
    let copied_id = Uuid::new_v4().to_string();

    if let Err(e) = store
        .append_copied_trade(
            &copied_id,
            original.id,
            follower_id,
            copied_shares,
            original.price,
        )
        .await
    {
        warn!(follower = follower_id, error = %e, "failed to record copy attempt");
        return AttemptOutcome::Failed;
    }

    let request = TradeRequest::new(original.symbol.clone(), copied_shares, original.side);
    let outcome = tokio::time::timeout(timeout, engine.execute(follower_id, &request)).await;

    match outcome {
        Ok(Ok(copy_tx)) => {
            if let Err(e) = store
                .settle_copied_trade(&copied_id, CopyStatus::Executed, Some(copy_tx.price), None)
                .await
            {
                warn!(follower = follower_id, error = %e, "failed to settle copy record");
                return AttemptOutcome::Failed;
            }
            info!(
                follower = follower_id,
                transaction = original.id,
                shares = %copied_shares,
                price = %copy_tx.price,
                "copy trade executed"
            );
            AttemptOutcome::Executed
        }
        Ok(Err(e)) => {
            warn!(
                follower = follower_id,
                transaction = original.id,
                error = %e,
                "copy trade failed"
            );
            if let Err(e) = store
                .settle_copied_trade(&copied_id, CopyStatus::Failed, None, Some(&e.to_string()))
                .await
            {
                warn!(follower = follower_id, error = %e, "failed to settle copy record");
            }
            AttemptOutcome::Failed
        }
        Err(_) => {
            warn!(
                follower = follower_id,
                transaction = original.id,
                "copy trade timed out"
            );
            if let Err(e) = store
                .settle_copied_trade(
                    &copied_id,
                    CopyStatus::Failed,
                    None,
                    Some("copy attempt timed out"),
                )
                .await
            {
                warn!(follower = follower_id, error = %e, "failed to settle copy record");
            }
            AttemptOutcome::Failed
        }
    }
}
