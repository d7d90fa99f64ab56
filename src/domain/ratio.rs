//! ROIC and Faustmann ratio.
//!
//! Both functions are total: missing inputs, non-finite inputs and degenerate
//! denominators yield `None` rather than a NaN or infinity.
//!
//! A denominator is degenerate when it is zero up to floating-point
//! cancellation: its magnitude is within [`CANCELLATION_TOLERANCE`] of the
//! summed magnitudes of the terms it was computed from. `0.1 + 0.2 - 0.3` is
//! zero capital, not 5.5e-17 of it.

use crate::domain::normalizer::Fundamentals;

pub const DEFAULT_TAX_RATE: f64 = 0.21;

/// Relative size below which a difference of balance-sheet figures is treated
/// as zero.
pub const CANCELLATION_TOLERANCE: f64 = 1e-12;

fn finite(v: Option<f64>) -> Option<f64> {
    v.filter(|x| x.is_finite())
}

/// `numerator / denominator`, where `scale` is the sum of the absolute terms
/// that produced `denominator`.
fn checked_div(numerator: f64, denominator: f64, scale: f64) -> Option<f64> {
    if denominator.abs() <= CANCELLATION_TOLERANCE * scale || denominator == 0.0 {
        return None;
    }
    Some(numerator / denominator).filter(|r| r.is_finite())
}

/// Net operating profit after tax.
pub fn nopat(operating_income: f64, tax_rate: f64) -> f64 {
    operating_income * (1.0 - tax_rate)
}

/// Debt + equity - cash.
pub fn invested_capital(
    total_debt: Option<f64>,
    total_equity: Option<f64>,
    cash: Option<f64>,
) -> Option<f64> {
    Some(finite(total_debt)? + finite(total_equity)? - finite(cash)?)
}

/// Assets - liabilities.
pub fn net_worth(total_assets: Option<f64>, total_liabilities: Option<f64>) -> Option<f64> {
    Some(finite(total_assets)? - finite(total_liabilities)?)
}

/// NOPAT / invested capital. `None` when any input is missing or invested
/// capital is zero.
pub fn compute_roic(
    operating_income: Option<f64>,
    total_debt: Option<f64>,
    total_equity: Option<f64>,
    cash: Option<f64>,
    tax_rate: f64,
) -> Option<f64> {
    let capital = invested_capital(total_debt, total_equity, cash)?;
    let scale = finite(total_debt)?.abs() + finite(total_equity)?.abs() + finite(cash)?.abs();
    checked_div(nopat(finite(operating_income)?, tax_rate), capital, scale)
}

/// Market cap / net worth. `None` when any input is missing or net worth is
/// zero. A negative net worth still produces a (negative) ratio; callers decide
/// what that means.
pub fn compute_faustmann_ratio(
    market_cap: Option<f64>,
    total_assets: Option<f64>,
    total_liabilities: Option<f64>,
) -> Option<f64> {
    let worth = net_worth(total_assets, total_liabilities)?;
    let scale = finite(total_assets)?.abs() + finite(total_liabilities)?.abs();
    checked_div(finite(market_cap)?, worth, scale)
}

impl Fundamentals {
    pub fn roic(&self, tax_rate: f64) -> Option<f64> {
        compute_roic(
            self.operating_income,
            self.total_debt,
            self.total_equity,
            self.cash_and_equivalents,
            tax_rate,
        )
    }

    pub fn faustmann_ratio(&self, market_cap: Option<f64>) -> Option<f64> {
        compute_faustmann_ratio(market_cap, self.total_assets, self.total_liabilities)
    }

    pub fn net_worth(&self) -> Option<f64> {
        net_worth(self.total_assets, self.total_liabilities)
    }
}
