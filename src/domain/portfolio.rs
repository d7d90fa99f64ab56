//! Portfolio state: cash plus held positions.
//!
//! The portfolio is owned by the orchestrating caller and passed explicitly
//! into the allocator; there is no process-wide instance.

use std::collections::{BTreeMap, HashMap};

use super::error::SiegfriedError;
use super::position::Position;
use super::retry::RetryPolicy;
use super::universe::normalize_symbol;
use crate::ports::market_port::MarketPort;

#[derive(Debug, Clone, PartialEq)]
pub struct Portfolio {
    pub cash: f64,
    pub positions: BTreeMap<String, Position>,
}

impl Portfolio {
    pub fn new(cash: f64) -> Self {
        Portfolio {
            cash,
            positions: BTreeMap::new(),
        }
    }

    pub fn with_positions(mut self, positions: impl IntoIterator<Item = Position>) -> Self {
        for position in positions {
            self.add_position(position);
        }
        self
    }

    /// Adds shares to an existing holding or opens a new one. Cost basis is
    /// share-weighted. Tickers are keyed in universe form (`BRK.B` -> `BRK-B`).
    pub fn add_position(&mut self, mut position: Position) {
        position.ticker = normalize_symbol(&position.ticker);
        match self.positions.get_mut(&position.ticker) {
            Some(existing) => {
                let shares = existing.shares + position.shares;
                if shares != 0 {
                    existing.cost_basis = (existing.cost() + position.cost()) / shares as f64;
                }
                existing.shares = shares;
            }
            None => {
                self.positions.insert(position.ticker.clone(), position);
            }
        }
    }

    pub fn get_position(&self, ticker: &str) -> Option<&Position> {
        self.positions.get(ticker)
    }

    pub fn position_count(&self) -> usize {
        self.positions.len()
    }

    pub fn shares_held(&self, ticker: &str) -> i64 {
        self.positions.get(ticker).map_or(0, |p| p.shares)
    }

    /// Cash plus positions valued at `price_map`. Positions without a price
    /// contribute nothing.
    pub fn total_equity(&self, price_map: &HashMap<String, f64>) -> f64 {
        let position_value: f64 = self
            .positions
            .values()
            .filter_map(|pos| {
                price_map
                    .get(&pos.ticker)
                    .map(|&price| pos.market_value(price))
            })
            .sum();
        self.cash + position_value
    }

    /// Fetches a current price for every held position. Fails on the first
    /// position that cannot be priced.
    pub fn price_positions(
        &self,
        market: &dyn MarketPort,
        retry: &RetryPolicy,
    ) -> Result<HashMap<String, f64>, SiegfriedError> {
        let mut prices = HashMap::with_capacity(self.positions.len());
        for ticker in self.positions.keys() {
            let price = retry.run(ticker, || market.current_price(ticker))?;
            if !price.is_finite() || price <= 0.0 {
                return Err(SiegfriedError::data_source(
                    ticker,
                    format!("invalid price {price}"),
                ));
            }
            prices.insert(ticker.clone(), price);
        }
        Ok(prices)
    }
}
