#![allow(dead_code)]

use siegfried::domain::error::SiegfriedError;
use siegfried::domain::screener::{CandidateResult, CandidateSet};
use siegfried::domain::statement::{Period, RawStatement, StatementKind};
use siegfried::ports::market_port::MarketPort;
use siegfried::ports::statement_port::StatementPort;
use siegfried::ports::universe_port::UniversePort;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// In-memory statement, market and universe source with injectable failures.
pub struct MockDataPort {
    pub statements: HashMap<(String, StatementKind), RawStatement>,
    pub caps: HashMap<String, Option<f64>>,
    pub prices: HashMap<String, f64>,
    pub universe: Vec<String>,
    pub errors: HashMap<String, String>,
    pub panics: Vec<String>,
    pub statement_fetches: AtomicUsize,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            statements: HashMap::new(),
            caps: HashMap::new(),
            prices: HashMap::new(),
            universe: Vec::new(),
            errors: HashMap::new(),
            panics: Vec::new(),
            statement_fetches: AtomicUsize::new(0),
        }
    }

    pub fn with_statement(mut self, statement: RawStatement) -> Self {
        self.statements
            .insert((statement.ticker.clone(), statement.kind), statement);
        self
    }

    /// Adds a ticker with clean income/balance labels, a market cap and a
    /// price, and appends it to the universe.
    pub fn with_company(mut self, ticker: &str, company: Company) -> Self {
        self = self
            .with_statement(company.income(ticker))
            .with_statement(company.balance(ticker));
        self.caps.insert(ticker.to_string(), company.market_cap);
        if let Some(price) = company.price {
            self.prices.insert(ticker.to_string(), price);
        }
        self.universe.push(ticker.to_string());
        self
    }

    pub fn with_price(mut self, ticker: &str, price: f64) -> Self {
        self.prices.insert(ticker.to_string(), price);
        self
    }

    pub fn with_universe(mut self, tickers: &[&str]) -> Self {
        self.universe = tickers.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn with_error(mut self, ticker: &str, reason: &str) -> Self {
        self.errors.insert(ticker.to_string(), reason.to_string());
        self.universe.push(ticker.to_string());
        self
    }

    pub fn with_panic(mut self, ticker: &str) -> Self {
        self.panics.push(ticker.to_string());
        self.universe.push(ticker.to_string());
        self
    }

    pub fn fetches(&self) -> usize {
        self.statement_fetches.load(Ordering::SeqCst)
    }
}

impl StatementPort for MockDataPort {
    fn fetch_statement(
        &self,
        ticker: &str,
        kind: StatementKind,
        _period: Period,
    ) -> Result<RawStatement, SiegfriedError> {
        self.statement_fetches.fetch_add(1, Ordering::SeqCst);
        if self.panics.iter().any(|t| t == ticker) {
            panic!("adapter bug for {ticker}");
        }
        if let Some(reason) = self.errors.get(ticker) {
            return Err(SiegfriedError::data_source(ticker, reason.clone()));
        }
        self.statements
            .get(&(ticker.to_string(), kind))
            .cloned()
            .ok_or_else(|| SiegfriedError::data_source(ticker, format!("no {kind} statement")))
    }
}

impl MarketPort for MockDataPort {
    fn market_cap(&self, ticker: &str) -> Result<Option<f64>, SiegfriedError> {
        self.caps
            .get(ticker)
            .copied()
            .ok_or_else(|| SiegfriedError::data_source(ticker, "no market data"))
    }

    fn current_price(&self, ticker: &str) -> Result<f64, SiegfriedError> {
        self.prices
            .get(ticker)
            .copied()
            .ok_or_else(|| SiegfriedError::data_source(ticker, "no price"))
    }
}

impl UniversePort for MockDataPort {
    fn list_universe(&self) -> Result<Vec<String>, SiegfriedError> {
        Ok(self.universe.clone())
    }
}

/// Fundamentals of one fictional company.
#[derive(Debug, Clone, Copy)]
pub struct Company {
    pub operating_income: f64,
    pub total_debt: f64,
    pub total_equity: f64,
    pub cash: f64,
    pub total_assets: f64,
    pub total_liabilities: f64,
    pub market_cap: Option<f64>,
    pub price: Option<f64>,
}

impl Company {
    /// ROIC 1.975 at a 21% tax rate; net worth 600.
    pub fn cheap(market_cap: f64) -> Self {
        Company {
            operating_income: 1000.0,
            total_debt: 100.0,
            total_equity: 400.0,
            cash: 100.0,
            total_assets: 1000.0,
            total_liabilities: 400.0,
            market_cap: Some(market_cap),
            price: Some(50.0),
        }
    }

    pub fn income(&self, ticker: &str) -> RawStatement {
        RawStatement::new(ticker, StatementKind::Income, Period::Annual)
            .with_entry("Total Revenue", Some(self.operating_income * 4.0))
            .with_entry("Operating Income", Some(self.operating_income))
            .with_entry("Net Income", Some(self.operating_income * 0.7))
    }

    pub fn balance(&self, ticker: &str) -> RawStatement {
        RawStatement::new(ticker, StatementKind::Balance, Period::Annual)
            .with_entry("Total Assets", Some(self.total_assets))
            .with_entry("Total Liabilities Net Minority Interest", Some(self.total_liabilities))
            .with_entry("Total Debt", Some(self.total_debt))
            .with_entry("Total Equity Gross Minority Interest", Some(self.total_equity))
            .with_entry("Cash And Cash Equivalents", Some(self.cash))
    }
}

pub fn candidate_set(tickers: &[(&str, f64)]) -> CandidateSet {
    CandidateSet::from_unsorted(
        tickers
            .iter()
            .map(|(t, fr)| CandidateResult {
                ticker: t.to_string(),
                roic: 1.5,
                faustmann: *fr,
            })
            .collect(),
    )
}
