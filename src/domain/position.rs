//! Held positions.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub ticker: String,
    pub shares: i64,
    /// Average cost per share.
    pub cost_basis: f64,
}

impl Position {
    pub fn new(ticker: &str, shares: i64, cost_basis: f64) -> Self {
        Position {
            ticker: ticker.to_string(),
            shares,
            cost_basis,
        }
    }

    pub fn market_value(&self, price: f64) -> f64 {
        self.shares as f64 * price
    }

    pub fn cost(&self) -> f64 {
        self.shares as f64 * self.cost_basis
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn market_value() {
        let pos = Position::new("KO", 100, 50.0);
        assert!((pos.market_value(60.0) - 6000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn cost() {
        let pos = Position::new("KO", 100, 50.0);
        assert!((pos.cost() - 5000.0).abs() < f64::EPSILON);
    }
}
