//! Market capitalization and price source port.

use crate::domain::error::SiegfriedError;

pub trait MarketPort: Sync {
    /// `Ok(None)` when the source has no market cap for the ticker.
    fn market_cap(&self, ticker: &str) -> Result<Option<f64>, SiegfriedError>;

    fn current_price(&self, ticker: &str) -> Result<f64, SiegfriedError>;
}
