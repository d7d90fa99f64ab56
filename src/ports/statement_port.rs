//! Fundamental statement source port.

use crate::domain::error::SiegfriedError;
use crate::domain::statement::{Period, RawStatement, StatementKind};

/// Supplies the latest available statement of a kind for a ticker.
///
/// Implementations are shared across screening workers, hence `Sync`.
pub trait StatementPort: Sync {
    fn fetch_statement(
        &self,
        ticker: &str,
        kind: StatementKind,
        period: Period,
    ) -> Result<RawStatement, SiegfriedError>;
}
