//! Configuration validation.
//!
//! Validates every screening and portfolio setting before any data source is
//! touched. Violations are fatal to the run.

use crate::domain::error::SiegfriedError;
use crate::domain::retry::{MAX_RETRY_ATTEMPTS, MAX_RETRY_BACKOFF};
use crate::domain::statement::Period;
use crate::ports::config_port::ConfigPort;
use std::str::FromStr;

pub fn validate_screen_config(config: &dyn ConfigPort) -> Result<(), SiegfriedError> {
    validate_tax_rate(config)?;
    validate_roic_threshold(config)?;
    validate_faustmann_threshold(config)?;
    validate_period(config)?;
    validate_max_workers(config)?;
    validate_retry(config)?;
    Ok(())
}

pub fn validate_portfolio_config(config: &dyn ConfigPort) -> Result<(), SiegfriedError> {
    validate_starting_equity(config)?;
    validate_cash(config)?;
    validate_position_max_pct(config)?;
    Ok(())
}

/// A key that is present but not a number must not silently fall back to its
/// default.
fn numeric(config: &dyn ConfigPort, section: &str, key: &str) -> Result<Option<f64>, SiegfriedError> {
    match config.get_string(section, key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| SiegfriedError::invalid(section, key, format!("'{raw}' is not a number"))),
    }
}

fn validate_tax_rate(config: &dyn ConfigPort) -> Result<(), SiegfriedError> {
    if let Some(value) = numeric(config, "screen", "tax_rate")? {
        if !(0.0..1.0).contains(&value) {
            return Err(SiegfriedError::invalid(
                "screen",
                "tax_rate",
                "tax_rate must be in [0, 1)",
            ));
        }
    }
    Ok(())
}

fn validate_roic_threshold(config: &dyn ConfigPort) -> Result<(), SiegfriedError> {
    if let Some(value) = numeric(config, "screen", "roic_threshold")? {
        if !value.is_finite() {
            return Err(SiegfriedError::invalid(
                "screen",
                "roic_threshold",
                "roic_threshold must be finite",
            ));
        }
    }
    Ok(())
}

fn validate_faustmann_threshold(config: &dyn ConfigPort) -> Result<(), SiegfriedError> {
    if let Some(value) = numeric(config, "screen", "faustmann_threshold")? {
        if !value.is_finite() || value <= 0.0 {
            return Err(SiegfriedError::invalid(
                "screen",
                "faustmann_threshold",
                "faustmann_threshold must be positive",
            ));
        }
    }
    Ok(())
}

fn validate_period(config: &dyn ConfigPort) -> Result<(), SiegfriedError> {
    if let Some(value) = config.get_string("screen", "period") {
        Period::from_str(&value).map_err(|reason| SiegfriedError::invalid("screen", "period", reason))?;
    }
    Ok(())
}

fn validate_max_workers(config: &dyn ConfigPort) -> Result<(), SiegfriedError> {
    if let Some(value) = numeric(config, "screen", "max_workers")? {
        if value < 1.0 || value.fract() != 0.0 {
            return Err(SiegfriedError::invalid(
                "screen",
                "max_workers",
                "max_workers must be a whole number of at least 1",
            ));
        }
    }
    Ok(())
}

fn validate_retry(config: &dyn ConfigPort) -> Result<(), SiegfriedError> {
    if let Some(value) = numeric(config, "screen", "retry_attempts")? {
        if value < 1.0 || value > f64::from(MAX_RETRY_ATTEMPTS) || value.fract() != 0.0 {
            return Err(SiegfriedError::invalid(
                "screen",
                "retry_attempts",
                format!("retry_attempts must be a whole number from 1 to {MAX_RETRY_ATTEMPTS}"),
            ));
        }
    }
    if let Some(value) = numeric(config, "screen", "retry_backoff_ms")? {
        let max_ms = MAX_RETRY_BACKOFF.as_millis() as f64;
        if !(0.0..=max_ms).contains(&value) {
            return Err(SiegfriedError::invalid(
                "screen",
                "retry_backoff_ms",
                format!("retry_backoff_ms must be between 0 and {max_ms}"),
            ));
        }
    }
    Ok(())
}

fn validate_starting_equity(config: &dyn ConfigPort) -> Result<(), SiegfriedError> {
    if let Some(value) = numeric(config, "portfolio", "starting_equity")? {
        if !value.is_finite() || value <= 0.0 {
            return Err(SiegfriedError::invalid(
                "portfolio",
                "starting_equity",
                "starting_equity must be positive",
            ));
        }
    }
    Ok(())
}

fn validate_cash(config: &dyn ConfigPort) -> Result<(), SiegfriedError> {
    if let Some(value) = numeric(config, "portfolio", "cash")? {
        if !value.is_finite() || value < 0.0 {
            return Err(SiegfriedError::invalid(
                "portfolio",
                "cash",
                "cash must be non-negative",
            ));
        }
    }
    Ok(())
}

fn validate_position_max_pct(config: &dyn ConfigPort) -> Result<(), SiegfriedError> {
    if let Some(value) = numeric(config, "portfolio", "position_max_pct")? {
        if value <= 0.0 || value > 1.0 {
            return Err(SiegfriedError::invalid(
                "portfolio",
                "position_max_pct",
                "position_max_pct must be between 0 and 1",
            ));
        }
    }
    Ok(())
}
