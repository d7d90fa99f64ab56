//! Raw financial statements as delivered by a statement source.
//!
//! Labels are free text and vary between providers; values are numeric or
//! explicitly absent. Entry order is the order the source delivered them in and
//! is the enumeration order the normalizer searches.

use chrono::NaiveDate;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StatementKind {
    Income,
    Balance,
    CashFlow,
}

impl StatementKind {
    pub const ALL: [StatementKind; 3] = [
        StatementKind::Income,
        StatementKind::Balance,
        StatementKind::CashFlow,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StatementKind::Income => "income",
            StatementKind::Balance => "balance",
            StatementKind::CashFlow => "cash",
        }
    }
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StatementKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "income" => Ok(StatementKind::Income),
            "balance" => Ok(StatementKind::Balance),
            "cash" | "cashflow" | "cash_flow" => Ok(StatementKind::CashFlow),
            other => Err(format!("unknown statement kind '{other}'")),
        }
    }
}

/// Reporting period granularity requested from the statement source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Period {
    Annual,
    Quarterly,
}

impl Period {
    pub fn as_str(self) -> &'static str {
        match self {
            Period::Annual => "annual",
            Period::Quarterly => "quarter",
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Period {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "annual" | "a" | "year" | "yearly" => Ok(Period::Annual),
            "quarter" | "quarterly" | "q" => Ok(Period::Quarterly),
            other => Err(format!(
                "unknown period '{other}', expected annual or quarter"
            )),
        }
    }
}

/// One reporting period of one statement for one entity.
#[derive(Debug, Clone, PartialEq)]
pub struct RawStatement {
    pub ticker: String,
    pub kind: StatementKind,
    pub period: Period,
    pub period_end: Option<NaiveDate>,
    pub entries: Vec<(String, Option<f64>)>,
}

impl RawStatement {
    pub fn new(ticker: &str, kind: StatementKind, period: Period) -> Self {
        RawStatement {
            ticker: ticker.to_string(),
            kind,
            period,
            period_end: None,
            entries: Vec::new(),
        }
    }

    pub fn with_period_end(mut self, period_end: NaiveDate) -> Self {
        self.period_end = Some(period_end);
        self
    }

    /// Appends an entry. Non-finite values are stored as absent.
    pub fn with_entry(mut self, label: &str, value: Option<f64>) -> Self {
        self.push(label, value);
        self
    }

    pub fn push(&mut self, label: &str, value: Option<f64>) {
        let value = value.filter(|v| v.is_finite());
        self.entries.push((label.to_string(), value));
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(label, _)| label.as_str())
    }

    pub fn get(&self, label: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|(l, _)| l == label)
            .and_then(|(_, v)| *v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Market capitalization and reference price for one ticker.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketSnapshot {
    pub ticker: String,
    pub market_cap: Option<f64>,
    pub price: Option<f64>,
    pub as_of: Option<NaiveDate>,
}
