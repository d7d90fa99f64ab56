//! CSV directory data adapter.
//!
//! Layout under the base path:
//!
//! ```text
//! universe.csv                              symbol
//! market.csv                                symbol,market_cap,price[,as_of]
//! statements/<TICKER>_<kind>_<period>.csv   period_end,label,value
//! ```
//!
//! Empty numeric cells are absent values. A statement file may hold several
//! periods; the latest `period_end` is served, with rows in file order. Every
//! `period_end` must be a `YYYY-MM-DD` date. Market and position symbols are
//! normalized the same way universe symbols are.

use crate::domain::error::SiegfriedError;
use crate::domain::position::Position;
use crate::domain::statement::{MarketSnapshot, Period, RawStatement, StatementKind};
use crate::domain::universe::normalize_symbol;
use crate::ports::market_port::MarketPort;
use crate::ports::statement_port::StatementPort;
use crate::ports::universe_port::UniversePort;
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
struct StatementRow {
    period_end: String,
    label: String,
    #[serde(default)]
    value: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct MarketRow {
    symbol: String,
    #[serde(default)]
    market_cap: Option<f64>,
    #[serde(default)]
    price: Option<f64>,
    #[serde(default)]
    as_of: Option<String>,
}

pub struct CsvAdapter {
    base_path: PathBuf,
    universe_file: PathBuf,
    market: HashMap<String, MarketSnapshot>,
}

impl CsvAdapter {
    /// Opens a data directory. `market.csv` is read eagerly; a missing file
    /// leaves every market lookup failing per ticker.
    pub fn open(base_path: impl Into<PathBuf>) -> Result<Self, SiegfriedError> {
        let base_path = base_path.into();
        let market_path = base_path.join("market.csv");
        let market = if market_path.exists() {
            read_market(&market_path)?
        } else {
            tracing::warn!(path = %market_path.display(), "no market data file");
            HashMap::new()
        };

        Ok(Self {
            universe_file: base_path.join("universe.csv"),
            base_path,
            market,
        })
    }

    pub fn with_universe_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.universe_file = path.into();
        self
    }

    pub fn statement_path(&self, ticker: &str, kind: StatementKind, period: Period) -> PathBuf {
        self.base_path
            .join("statements")
            .join(format!("{}_{}_{}.csv", ticker, kind, period))
    }

    pub fn snapshot(&self, ticker: &str) -> Option<&MarketSnapshot> {
        self.market.get(&normalize_symbol(ticker))
    }
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").ok()
}

fn read_market(path: &Path) -> Result<HashMap<String, MarketSnapshot>, SiegfriedError> {
    let mut rdr = csv::Reader::from_path(path)?;
    let mut market = HashMap::new();
    for row in rdr.deserialize() {
        let row: MarketRow = row?;
        let ticker = normalize_symbol(&row.symbol);
        market.insert(
            ticker.clone(),
            MarketSnapshot {
                ticker,
                market_cap: row.market_cap,
                price: row.price,
                as_of: row.as_of.as_deref().and_then(parse_date),
            },
        );
    }
    Ok(market)
}

impl StatementPort for CsvAdapter {
    fn fetch_statement(
        &self,
        ticker: &str,
        kind: StatementKind,
        period: Period,
    ) -> Result<RawStatement, SiegfriedError> {
        let path = self.statement_path(ticker, kind, period);
        let mut rdr = csv::Reader::from_path(&path).map_err(|e| {
            SiegfriedError::data_source(ticker, format!("failed to read {}: {}", path.display(), e))
        })?;

        let mut rows: Vec<(NaiveDate, StatementRow)> = Vec::new();
        for row in rdr.deserialize() {
            let row: StatementRow = row.map_err(|e| {
                SiegfriedError::data_source(ticker, format!("CSV parse error: {}", e))
            })?;
            let period_end = parse_date(&row.period_end).ok_or_else(|| {
                SiegfriedError::data_source(
                    ticker,
                    format!("invalid period_end '{}' in {}", row.period_end, path.display()),
                )
            })?;
            rows.push((period_end, row));
        }

        let latest = rows.iter().map(|(date, _)| *date).max().ok_or_else(|| {
            SiegfriedError::data_source(ticker, format!("{} statement is empty", kind))
        })?;

        let mut statement = RawStatement::new(ticker, kind, period);
        statement.period_end = Some(latest);
        for (_, row) in rows.iter().filter(|(date, _)| *date == latest) {
            statement.push(&row.label, row.value);
        }
        Ok(statement)
    }
}

impl MarketPort for CsvAdapter {
    fn market_cap(&self, ticker: &str) -> Result<Option<f64>, SiegfriedError> {
        self.market
            .get(&normalize_symbol(ticker))
            .map(|s| s.market_cap)
            .ok_or_else(|| SiegfriedError::data_source(ticker, "no market data"))
    }

    fn current_price(&self, ticker: &str) -> Result<f64, SiegfriedError> {
        self.market
            .get(&normalize_symbol(ticker))
            .and_then(|s| s.price)
            .ok_or_else(|| SiegfriedError::data_source(ticker, "no price"))
    }
}

impl UniversePort for CsvAdapter {
    fn list_universe(&self) -> Result<Vec<String>, SiegfriedError> {
        load_symbols(&self.universe_file)
    }
}

/// Reads the `symbol` (or `ticker`) column of a CSV file; falls back to the
/// first column when neither header is present.
pub fn load_symbols(path: &Path) -> Result<Vec<String>, SiegfriedError> {
    let mut rdr = csv::Reader::from_path(path)?;
    let headers = rdr.headers()?.clone();
    let column = headers
        .iter()
        .position(|h| {
            let h = h.trim().to_lowercase();
            h == "symbol" || h == "ticker"
        })
        .unwrap_or(0);

    let mut symbols = Vec::new();
    for record in rdr.records() {
        let record = record?;
        if let Some(symbol) = record.get(column) {
            symbols.push(symbol.to_string());
        }
    }
    Ok(symbols)
}

/// Reads held positions from a `ticker,shares,cost_basis` CSV file.
pub fn load_positions(path: &Path) -> Result<Vec<Position>, SiegfriedError> {
    let mut rdr = csv::Reader::from_path(path)?;
    let mut positions = Vec::new();
    for row in rdr.deserialize() {
        let mut position: Position = row?;
        position.ticker = normalize_symbol(&position.ticker);
        positions.push(position);
    }
    Ok(positions)
}
