//! Canonical field resolution over loosely-labeled statements.
//!
//! Each canonical field carries a keyword set. A label matches when its
//! lowercased text contains every keyword. Labels are searched in the
//! statement's source order and the first match wins, so resolution is
//! reproducible even when several labels satisfy a loose keyword set.

use crate::domain::error::SiegfriedError;
use crate::domain::statement::{RawStatement, StatementKind};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CanonicalField {
    OperatingIncome,
    TotalDebt,
    TotalEquity,
    CashAndEquivalents,
    TotalAssets,
    TotalLiabilities,
}

impl CanonicalField {
    /// Resolution order.
    pub const ALL: [CanonicalField; 6] = [
        CanonicalField::OperatingIncome,
        CanonicalField::TotalDebt,
        CanonicalField::TotalEquity,
        CanonicalField::CashAndEquivalents,
        CanonicalField::TotalAssets,
        CanonicalField::TotalLiabilities,
    ];

    pub fn name(self) -> &'static str {
        match self {
            CanonicalField::OperatingIncome => "operating_income",
            CanonicalField::TotalDebt => "total_debt",
            CanonicalField::TotalEquity => "total_equity",
            CanonicalField::CashAndEquivalents => "cash_and_equivalents",
            CanonicalField::TotalAssets => "total_assets",
            CanonicalField::TotalLiabilities => "total_liabilities",
        }
    }

    pub fn keywords(self) -> &'static [&'static str] {
        match self {
            CanonicalField::OperatingIncome => &["operating", "income"],
            CanonicalField::TotalDebt => &["total", "debt"],
            CanonicalField::TotalEquity => &["total", "equity"],
            CanonicalField::CashAndEquivalents => &["cash", "equivalents"],
            CanonicalField::TotalAssets => &["total", "asset"],
            // "liabil" catches both singular and plural spellings
            CanonicalField::TotalLiabilities => &["total", "liabil"],
        }
    }

    pub fn statement(self) -> StatementKind {
        match self {
            CanonicalField::OperatingIncome => StatementKind::Income,
            _ => StatementKind::Balance,
        }
    }
}

impl fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// True when the lowercased label contains every keyword.
pub fn label_matches(label: &str, keywords: &[&str]) -> bool {
    let low = label.to_lowercase();
    keywords.iter().all(|k| low.contains(&k.to_lowercase()))
}

/// First label, in source order, that contains all `keywords`.
pub fn find_label<'a>(statement: &'a RawStatement, keywords: &[&str]) -> Option<&'a str> {
    statement.labels().find(|label| label_matches(label, keywords))
}

/// A canonical field resolved against a concrete statement label.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedField {
    pub field: CanonicalField,
    pub label: String,
    pub value: Option<f64>,
}

pub fn resolve(
    statement: &RawStatement,
    field: CanonicalField,
) -> Result<ResolvedField, SiegfriedError> {
    let (label, value) = statement
        .entries
        .iter()
        .find(|(label, _)| label_matches(label, field.keywords()))
        .ok_or_else(|| SiegfriedError::FieldNotFound {
            ticker: statement.ticker.clone(),
            field: field.name().to_string(),
            statement: statement.kind.to_string(),
            available: statement.labels().map(str::to_string).collect(),
        })?;

    tracing::debug!(
        ticker = %statement.ticker,
        field = field.name(),
        label = %label,
        "resolved canonical field"
    );

    Ok(ResolvedField {
        field,
        label: label.clone(),
        value: *value,
    })
}

/// Canonical inputs of the ratio engine for one ticker and period.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Fundamentals {
    pub operating_income: Option<f64>,
    pub total_debt: Option<f64>,
    pub total_equity: Option<f64>,
    pub cash_and_equivalents: Option<f64>,
    pub total_assets: Option<f64>,
    pub total_liabilities: Option<f64>,
}

impl Fundamentals {
    pub fn get(&self, field: CanonicalField) -> Option<f64> {
        match field {
            CanonicalField::OperatingIncome => self.operating_income,
            CanonicalField::TotalDebt => self.total_debt,
            CanonicalField::TotalEquity => self.total_equity,
            CanonicalField::CashAndEquivalents => self.cash_and_equivalents,
            CanonicalField::TotalAssets => self.total_assets,
            CanonicalField::TotalLiabilities => self.total_liabilities,
        }
    }

    fn set(&mut self, field: CanonicalField, value: Option<f64>) {
        let slot = match field {
            CanonicalField::OperatingIncome => &mut self.operating_income,
            CanonicalField::TotalDebt => &mut self.total_debt,
            CanonicalField::TotalEquity => &mut self.total_equity,
            CanonicalField::CashAndEquivalents => &mut self.cash_and_equivalents,
            CanonicalField::TotalAssets => &mut self.total_assets,
            CanonicalField::TotalLiabilities => &mut self.total_liabilities,
        };
        *slot = value;
    }
}

/// Resolves every canonical field, returning the values together with the
/// labels they were read from.
pub fn normalize_detailed(
    income: &RawStatement,
    balance: &RawStatement,
) -> Result<(Fundamentals, Vec<ResolvedField>), SiegfriedError> {
    let mut fundamentals = Fundamentals::default();
    let mut resolved = Vec::with_capacity(CanonicalField::ALL.len());

    for field in CanonicalField::ALL {
        let source = match field.statement() {
            StatementKind::Income => income,
            _ => balance,
        };
        let r = resolve(source, field)?;
        fundamentals.set(field, r.value);
        resolved.push(r);
    }

    Ok((fundamentals, resolved))
}

pub fn normalize(
    income: &RawStatement,
    balance: &RawStatement,
) -> Result<Fundamentals, SiegfriedError> {
    normalize_detailed(income, balance).map(|(fundamentals, _)| fundamentals)
}
