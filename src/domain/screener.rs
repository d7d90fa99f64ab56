//! Siegfried screener.
//!
//! Evaluates every ticker of a universe independently on a bounded worker
//! pool: fetch income and balance statements, normalize, compute ROIC, fetch
//! market cap, compute the Faustmann ratio, then apply the threshold
//! predicates. Any per-ticker failure becomes a [`SkippedTicker`]; the run
//! itself only fails when the worker pool cannot be built.

use crate::domain::cache::CachedStatements;
use crate::domain::error::SiegfriedError;
use crate::domain::normalizer::{self, Fundamentals};
use crate::domain::ratio::DEFAULT_TAX_RATE;
use crate::domain::retry::RetryPolicy;
use crate::domain::statement::{Period, StatementKind};
use crate::domain::universe::Universe;
use crate::ports::market_port::MarketPort;
use crate::ports::statement_port::StatementPort;
use rayon::prelude::*;
use serde::Serialize;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

pub const DEFAULT_ROIC_THRESHOLD: f64 = 1.0;
pub const DEFAULT_FAUSTMANN_THRESHOLD: f64 = 0.75;
pub const DEFAULT_MAX_WORKERS: usize = 4;

#[derive(Debug, Clone, PartialEq)]
pub struct ScreenConfig {
    pub roic_threshold: f64,
    pub faustmann_threshold: f64,
    pub tax_rate: f64,
    pub period: Period,
    pub max_workers: usize,
    pub retry: RetryPolicy,
}

impl Default for ScreenConfig {
    fn default() -> Self {
        Self {
            roic_threshold: DEFAULT_ROIC_THRESHOLD,
            faustmann_threshold: DEFAULT_FAUSTMANN_THRESHOLD,
            tax_rate: DEFAULT_TAX_RATE,
            period: Period::Annual,
            max_workers: DEFAULT_MAX_WORKERS,
            retry: RetryPolicy::default(),
        }
    }
}

/// A ticker that passed both thresholds. Both ratios are finite.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateResult {
    pub ticker: String,
    pub roic: f64,
    pub faustmann: f64,
}

/// Candidates ordered ascending by Faustmann ratio; equal ratios keep the
/// universe order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CandidateSet {
    candidates: Vec<CandidateResult>,
}

impl CandidateSet {
    pub fn from_unsorted(mut candidates: Vec<CandidateResult>) -> Self {
        candidates.sort_by(|a, b| a.faustmann.total_cmp(&b.faustmann));
        Self { candidates }
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CandidateResult> {
        self.candidates.iter()
    }

    pub fn as_slice(&self) -> &[CandidateResult] {
        &self.candidates
    }

    pub fn tickers(&self) -> Vec<&str> {
        self.candidates.iter().map(|c| c.ticker.as_str()).collect()
    }
}

impl<'a> IntoIterator for &'a CandidateSet {
    type Item = &'a CandidateResult;
    type IntoIter = std::slice::Iter<'a, CandidateResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.candidates.iter()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    DataSource(String),
    FieldNotFound {
        field: String,
        statement: String,
        available: Vec<String>,
    },
    MissingMarketCap,
    UndefinedRoic,
    UndefinedFaustmann,
    NonPositiveNetWorth { net_worth: f64 },
}

impl SkipReason {
    /// Short machine-friendly tag used in reports.
    pub fn kind(&self) -> &'static str {
        match self {
            SkipReason::DataSource(_) => "data_source",
            SkipReason::FieldNotFound { .. } => "field_not_found",
            SkipReason::MissingMarketCap => "missing_market_cap",
            SkipReason::UndefinedRoic => "undefined_roic",
            SkipReason::UndefinedFaustmann => "undefined_faustmann",
            SkipReason::NonPositiveNetWorth { .. } => "non_positive_net_worth",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::DataSource(reason) => write!(f, "data source error: {reason}"),
            SkipReason::FieldNotFound {
                field, statement, ..
            } => write!(f, "no {statement} label for {field}"),
            SkipReason::MissingMarketCap => write!(f, "market cap unavailable"),
            SkipReason::UndefinedRoic => write!(f, "ROIC undefined (zero or missing invested capital)"),
            SkipReason::UndefinedFaustmann => {
                write!(f, "Faustmann ratio undefined (zero or missing net worth)")
            }
            SkipReason::NonPositiveNetWorth { net_worth } => {
                write!(f, "negative net worth {net_worth:.0}")
            }
        }
    }
}

impl From<SiegfriedError> for SkipReason {
    fn from(err: SiegfriedError) -> Self {
        match err {
            SiegfriedError::FieldNotFound {
                field,
                statement,
                available,
                ..
            } => SkipReason::FieldNotFound {
                field,
                statement,
                available,
            },
            SiegfriedError::DataSource { reason, .. } => SkipReason::DataSource(reason),
            other => SkipReason::DataSource(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedTicker {
    pub ticker: String,
    pub reason: SkipReason,
}

/// Outcome of screening a single ticker.
#[derive(Debug, Clone, PartialEq)]
pub enum Evaluation {
    Candidate(CandidateResult),
    /// Both ratios computed, at least one threshold missed.
    Rejected {
        ticker: String,
        roic: f64,
        faustmann: f64,
    },
    Skipped(SkippedTicker),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScreenReport {
    pub candidates: CandidateSet,
    pub skipped: Vec<SkippedTicker>,
    pub rejected: usize,
    pub universe_size: usize,
}

impl ScreenReport {
    pub fn from_evaluations(evaluations: Vec<Evaluation>) -> Self {
        let universe_size = evaluations.len();
        let mut candidates = Vec::new();
        let mut skipped = Vec::new();
        let mut rejected = 0;

        for evaluation in evaluations {
            match evaluation {
                Evaluation::Candidate(c) => candidates.push(c),
                Evaluation::Rejected { .. } => rejected += 1,
                Evaluation::Skipped(s) => skipped.push(s),
            }
        }

        ScreenReport {
            candidates: CandidateSet::from_unsorted(candidates),
            skipped,
            rejected,
            universe_size,
        }
    }

    pub fn evaluated(&self) -> usize {
        self.universe_size - self.skipped.len()
    }
}

pub struct Screener<'a> {
    statements: CachedStatements<'a>,
    market: &'a dyn MarketPort,
    config: ScreenConfig,
}

impl<'a> Screener<'a> {
    pub fn new(
        statements: &'a dyn StatementPort,
        market: &'a dyn MarketPort,
        config: ScreenConfig,
    ) -> Self {
        Self {
            statements: CachedStatements::new(statements),
            market,
            config,
        }
    }

    pub fn config(&self) -> &ScreenConfig {
        &self.config
    }

    /// Screens every ticker of `universe`. Per-ticker failures are reported in
    /// [`ScreenReport::skipped`] and never abort the run.
    pub fn run(&self, universe: &Universe) -> Result<ScreenReport, SiegfriedError> {
        self.statements.invalidate();

        tracing::info!(
            tickers = universe.count(),
            workers = self.config.max_workers,
            period = %self.config.period,
            "screening universe"
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.max_workers.max(1))
            .thread_name(|i| format!("screen-{i}"))
            .build()
            .map_err(|e| SiegfriedError::invalid("screen", "max_workers", e.to_string()))?;

        // Indexed parallel collect keeps universe order, which the stable sort
        // below relies on for tie-breaking.
        let evaluations: Vec<Evaluation> = pool.install(|| {
            universe
                .tickers
                .par_iter()
                .map(|ticker| self.evaluate_isolated(ticker))
                .collect()
        });

        for evaluation in &evaluations {
            if let Evaluation::Skipped(s) = evaluation {
                tracing::warn!(ticker = %s.ticker, reason = %s.reason, "skipping ticker");
            }
        }

        let report = ScreenReport::from_evaluations(evaluations);
        tracing::info!(
            candidates = report.candidates.len(),
            rejected = report.rejected,
            skipped = report.skipped.len(),
            "screen complete"
        );
        Ok(report)
    }

    fn evaluate_isolated(&self, ticker: &str) -> Evaluation {
        // A misbehaving adapter must not take the whole run down with it.
        panic::catch_unwind(AssertUnwindSafe(|| self.evaluate(ticker))).unwrap_or_else(|payload| {
            let msg = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            skipped(ticker, SkipReason::DataSource(format!("panicked: {msg}")))
        })
    }

    fn fundamentals(&self, ticker: &str) -> Result<Fundamentals, SiegfriedError> {
        let period = self.config.period;
        let income = self.config.retry.run(ticker, || {
            self.statements
                .fetch_statement(ticker, StatementKind::Income, period)
        })?;
        let balance = self.config.retry.run(ticker, || {
            self.statements
                .fetch_statement(ticker, StatementKind::Balance, period)
        })?;
        normalizer::normalize(&income, &balance)
    }

    pub fn evaluate(&self, ticker: &str) -> Evaluation {
        let fundamentals = match self.fundamentals(ticker) {
            Ok(f) => f,
            Err(e) => return skipped(ticker, e.into()),
        };

        let Some(roic) = fundamentals.roic(self.config.tax_rate) else {
            return skipped(ticker, SkipReason::UndefinedRoic);
        };

        let market_cap = match self
            .config
            .retry
            .run(ticker, || self.market.market_cap(ticker))
        {
            // A zero cap is how several providers spell "unknown".
            Ok(Some(cap)) if cap.is_finite() && cap > 0.0 => cap,
            Ok(_) => return skipped(ticker, SkipReason::MissingMarketCap),
            Err(e) => return skipped(ticker, e.into()),
        };

        if let Some(worth) = fundamentals.net_worth().filter(|w| *w < 0.0) {
            return skipped(ticker, SkipReason::NonPositiveNetWorth { net_worth: worth });
        }

        let Some(faustmann) = fundamentals.faustmann_ratio(Some(market_cap)) else {
            return skipped(ticker, SkipReason::UndefinedFaustmann);
        };

        tracing::debug!(ticker, roic, faustmann, "ratios computed");

        if roic > self.config.roic_threshold && faustmann < self.config.faustmann_threshold {
            Evaluation::Candidate(CandidateResult {
                ticker: ticker.to_string(),
                roic,
                faustmann,
            })
        } else {
            Evaluation::Rejected {
                ticker: ticker.to_string(),
                roic,
                faustmann,
            }
        }
    }
}

fn skipped(ticker: &str, reason: SkipReason) -> Evaluation {
    Evaluation::Skipped(SkippedTicker {
        ticker: ticker.to_string(),
        reason,
    })
}
