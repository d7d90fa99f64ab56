//! Equal-weight rebalancing.
//!
//! Every candidate receives `min(position_max_pct, 1 / n)` of total equity
//! (cash plus current market value of held positions). Target shares are
//! floored; an order is emitted only for a non-zero delta against the shares
//! already held. Orders follow the candidate ranking. Holdings that are not
//! candidates are left alone.

use crate::domain::error::SiegfriedError;
use crate::domain::portfolio::Portfolio;
use crate::domain::retry::RetryPolicy;
use crate::domain::screener::{CandidateSet, SkipReason, SkippedTicker};
use crate::ports::market_port::MarketPort;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

pub const DEFAULT_POSITION_MAX_PCT: f64 = 0.15;

#[derive(Debug, Clone, PartialEq)]
pub struct AllocationConfig {
    pub position_max_pct: f64,
    pub retry: RetryPolicy,
}

impl Default for AllocationConfig {
    fn default() -> Self {
        Self {
            position_max_pct: DEFAULT_POSITION_MAX_PCT,
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSide::Buy => f.write_str("BUY"),
            OrderSide::Sell => f.write_str("SELL"),
        }
    }
}

/// Signed share delta: positive buys, negative sells.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Order {
    pub ticker: String,
    pub quantity: i64,
    pub reference_price: f64,
}

impl Order {
    pub fn side(&self) -> OrderSide {
        if self.quantity >= 0 {
            OrderSide::Buy
        } else {
            OrderSide::Sell
        }
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<4} {:>6}  {} @ ~{:.2}",
            self.side().to_string(),
            self.quantity.unsigned_abs(),
            self.ticker,
            self.reference_price
        )
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct RebalancePlan {
    pub orders: Vec<Order>,
    /// Candidates that could not be priced.
    pub skipped: Vec<SkippedTicker>,
    pub allocation_fraction: f64,
    pub target_dollars: f64,
    pub total_equity: f64,
}

/// `min(position_max_pct, 1 / n)`; zero when there are no candidates.
pub fn allocation_fraction(candidates: usize, position_max_pct: f64) -> f64 {
    if candidates == 0 {
        return 0.0;
    }
    position_max_pct.min(1.0 / candidates as f64)
}

/// Whole shares affordable with `target_dollars` at `price`.
pub fn target_shares(target_dollars: f64, price: f64) -> i64 {
    (target_dollars / price).floor() as i64
}

/// Computes the orders that move `portfolio` to equal weight across
/// `candidates`. Stateless: nothing from earlier runs is consulted, and
/// nothing is executed.
pub fn plan_rebalance(
    candidates: &CandidateSet,
    portfolio: &Portfolio,
    market: &dyn MarketPort,
    config: &AllocationConfig,
) -> Result<RebalancePlan, SiegfriedError> {
    if candidates.is_empty() {
        tracing::info!("no candidates, no orders");
        return Ok(RebalancePlan::default());
    }

    let mut prices = portfolio.price_positions(market, &config.retry)?;
    let total_equity = portfolio.total_equity(&prices);
    let fraction = allocation_fraction(candidates.len(), config.position_max_pct);
    let target_dollars = fraction * total_equity;

    tracing::info!(
        candidates = candidates.len(),
        total_equity,
        allocation_fraction = fraction,
        target_dollars,
        "planning rebalance"
    );

    let mut orders = Vec::new();
    let mut skipped = Vec::new();

    for candidate in candidates {
        let ticker = candidate.ticker.as_str();
        let price = match price_of(ticker, &mut prices, market, &config.retry) {
            Ok(p) => p,
            Err(reason) => {
                tracing::warn!(ticker, %reason, "cannot price candidate");
                skipped.push(SkippedTicker {
                    ticker: ticker.to_string(),
                    reason,
                });
                continue;
            }
        };

        let delta = target_shares(target_dollars, price) - portfolio.shares_held(ticker);
        if delta != 0 {
            orders.push(Order {
                ticker: ticker.to_string(),
                quantity: delta,
                reference_price: price,
            });
        }
    }

    Ok(RebalancePlan {
        orders,
        skipped,
        allocation_fraction: fraction,
        target_dollars,
        total_equity,
    })
}

fn price_of(
    ticker: &str,
    prices: &mut HashMap<String, f64>,
    market: &dyn MarketPort,
    retry: &RetryPolicy,
) -> Result<f64, SkipReason> {
    if let Some(&price) = prices.get(ticker) {
        return Ok(price);
    }
    let price = retry.run(ticker, || market.current_price(ticker))?;
    if !price.is_finite() || price <= 0.0 {
        return Err(SkipReason::DataSource(format!("invalid price {price}")));
    }
    prices.insert(ticker.to_string(), price);
    Ok(price)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::position::Position;
    use crate::domain::screener::CandidateResult;

    struct Quotes(HashMap<String, f64>);

    impl Quotes {
        fn new(quotes: &[(&str, f64)]) -> Self {
            Quotes(quotes.iter().map(|(t, p)| (t.to_string(), *p)).collect())
        }
    }

    impl MarketPort for Quotes {
        fn market_cap(&self, _ticker: &str) -> Result<Option<f64>, SiegfriedError> {
            Ok(None)
        }

        fn current_price(&self, ticker: &str) -> Result<f64, SiegfriedError> {
            self.0
                .get(ticker)
                .copied()
                .ok_or_else(|| SiegfriedError::data_source(ticker, "no quote"))
        }
    }

    fn candidates(tickers: &[&str]) -> CandidateSet {
        CandidateSet::from_unsorted(
            tickers
                .iter()
                .enumerate()
                .map(|(i, t)| CandidateResult {
                    ticker: t.to_string(),
                    roic: 1.5,
                    faustmann: 0.1 * (i + 1) as f64,
                })
                .collect(),
        )
    }

    fn config() -> AllocationConfig {
        AllocationConfig {
            position_max_pct: 0.15,
            retry: RetryPolicy::none(),
        }
    }

    #[test]
    fn fraction_is_capped_by_position_max() {
        assert!((allocation_fraction(2, 0.15) - 0.15).abs() < f64::EPSILON);
        assert!((allocation_fraction(10, 0.15) - 0.1).abs() < f64::EPSILON);
        assert_eq!(allocation_fraction(0, 0.15), 0.0);
    }

    #[test]
    fn target_shares_floors() {
        assert_eq!(target_shares(15000.0, 100.0), 150);
        assert_eq!(target_shares(15000.0, 101.0), 148);
    }

    #[test]
    fn two_candidates_from_cash() {
        let portfolio = Portfolio::new(100_000.0);
        let market = Quotes::new(&[("A", 100.0), ("B", 40.0)]);
        let plan = plan_rebalance(&candidates(&["A", "B"]), &portfolio, &market, &config()).unwrap();

        assert!((plan.target_dollars - 15_000.0).abs() < 1e-9);
        assert_eq!(plan.orders.len(), 2);
        assert_eq!(plan.orders[0].ticker, "A");
        assert_eq!(plan.orders[0].quantity, 150);
        assert_eq!(plan.orders[0].side(), OrderSide::Buy);
        assert_eq!(plan.orders[1].ticker, "B");
        assert_eq!(plan.orders[1].quantity, 375);
    }

    #[test]
    fn empty_candidate_set_emits_no_orders() {
        let portfolio = Portfolio::new(100_000.0);
        let market = Quotes::new(&[]);
        let plan = plan_rebalance(&CandidateSet::default(), &portfolio, &market, &config()).unwrap();
        assert!(plan.orders.is_empty());
    }

    #[test]
    fn held_shares_reduce_order_and_can_sell() {
        // Equity = 50_000 cash + 300 * 100 = 80_000; target = 12_000 -> 120 shares
        let portfolio = Portfolio::new(50_000.0)
            .with_positions([Position::new("A", 300, 90.0)]);
        let market = Quotes::new(&[("A", 100.0), ("B", 50.0)]);
        let plan = plan_rebalance(&candidates(&["A", "B"]), &portfolio, &market, &config()).unwrap();

        assert!((plan.total_equity - 80_000.0).abs() < 1e-9);
        assert_eq!(plan.orders[0].ticker, "A");
        assert_eq!(plan.orders[0].quantity, -180);
        assert_eq!(plan.orders[0].side(), OrderSide::Sell);
        assert_eq!(plan.orders[1].quantity, 240);
    }

    #[test]
    fn no_order_when_already_on_target() {
        // Equity = 85_000 + 150 * 100 = 100_000; target 15_000 -> 150 shares
        let portfolio = Portfolio::new(85_000.0)
            .with_positions([Position::new("A", 150, 100.0)]);
        let market = Quotes::new(&[("A", 100.0), ("B", 100.0)]);
        let plan = plan_rebalance(&candidates(&["A", "B"]), &portfolio, &market, &config()).unwrap();

        assert_eq!(plan.orders.len(), 1);
        assert_eq!(plan.orders[0].ticker, "B");
    }

    #[test]
    fn unpriced_candidate_is_skipped() {
        let portfolio = Portfolio::new(100_000.0);
        let market = Quotes::new(&[("B", 50.0)]);
        let plan = plan_rebalance(&candidates(&["A", "B"]), &portfolio, &market, &config()).unwrap();

        assert_eq!(plan.orders.len(), 1);
        assert_eq!(plan.orders[0].ticker, "B");
        assert_eq!(plan.skipped.len(), 1);
        assert_eq!(plan.skipped[0].ticker, "A");
    }

    #[test]
    fn unpriced_holding_is_fatal() {
        let portfolio = Portfolio::new(100_000.0).with_positions([Position::new("Z", 10, 1.0)]);
        let market = Quotes::new(&[("A", 50.0)]);
        let result = plan_rebalance(&candidates(&["A"]), &portfolio, &market, &config());
        assert!(matches!(result, Err(SiegfriedError::DataSource { ticker, .. }) if ticker == "Z"));
    }

    #[test]
    fn order_display() {
        let order = Order {
            ticker: "KO".into(),
            quantity: -25,
            reference_price: 61.5,
        };
        assert_eq!(order.to_string(), "SELL     25  KO @ ~61.50");
    }
}
