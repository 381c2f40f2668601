//! Price oracle abstraction.
//!
//! The engine is agnostic to where prices come from. The production stand-in
//! is a pseudo-random mock in the $10-$100 band; tests pin prices with
//! [`FixedOracle`] so every scenario is deterministic.

use std::collections::HashMap;

use rand::Rng;
use rust_decimal::Decimal;

use crate::error::TradeError;

/// Source of current trade prices. Implementations must return a positive
/// price; the engine rejects anything else.
pub trait PriceOracle: Send + Sync {
    fn quote(&self, symbol: &str) -> Result<Decimal, TradeError>;
}

/// Mock price feed: any symbol quotes at a uniform random price between
/// $10.00 and $100.00, to the cent.
#[derive(Debug, Default)]
pub struct MockOracle;

impl MockOracle {
    pub fn new() -> Self {
        Self
    }
}

impl PriceOracle for MockOracle {
    fn quote(&self, _symbol: &str) -> Result<Decimal, TradeError> {
        let cents = rand::thread_rng().gen_range(1_000..=10_000i64);
        Ok(Decimal::new(cents, 2))
    }
}

/// Deterministic oracle for tests: quotes only the symbols it was given.
#[derive(Debug, Default)]
pub struct FixedOracle {
    prices: HashMap<String, Decimal>,
}

impl FixedOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_price(mut self, symbol: &str, price: Decimal) -> Self {
        self.prices.insert(symbol.to_string(), price);
        self
    }

    pub fn set_price(&mut self, symbol: &str, price: Decimal) {
        self.prices.insert(symbol.to_string(), price);
    }
}

impl PriceOracle for FixedOracle {
    fn quote(&self, symbol: &str) -> Result<Decimal, TradeError> {
        self.prices
            .get(symbol)
            .copied()
            .ok_or_else(|| TradeError::InvalidTrade(format!("no quote for symbol {symbol}")))
    }
}
