//! Ticker universe handling.
//!
//! Symbols are normalized (trimmed, uppercased, share-class dots turned into
//! dashes) and de-duplicated keeping the first occurrence, so a universe is an
//! ordered set.

use crate::domain::error::SiegfriedError;
use crate::ports::universe_port::UniversePort;
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Universe {
    pub tickers: Vec<String>,
}

impl Universe {
    pub fn from_symbols<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let mut tickers = Vec::new();
        for symbol in symbols {
            let ticker = normalize_symbol(symbol.as_ref());
            if ticker.is_empty() {
                continue;
            }
            if seen.insert(ticker.clone()) {
                tickers.push(ticker);
            } else {
                tracing::debug!(ticker = %ticker, "dropping duplicate universe entry");
            }
        }
        Universe { tickers }
    }

    pub fn count(&self) -> usize {
        self.tickers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tickers.is_empty()
    }
}

/// `brk.b` -> `BRK-B`
pub fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_uppercase().replace('.', "-")
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum UniverseError {
    #[error("empty token in ticker list")]
    EmptyToken,

    #[error("duplicate ticker: {0}")]
    DuplicateTicker(String),
}

/// Parses a comma-separated ticker list given on the command line or in config.
/// Unlike [`Universe::from_symbols`], duplicates and empty tokens are rejected.
pub fn parse_symbols(input: &str) -> Result<Vec<String>, UniverseError> {
    let mut tickers = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let ticker = normalize_symbol(token);
        if ticker.is_empty() {
            return Err(UniverseError::EmptyToken);
        }
        if !seen.insert(ticker.clone()) {
            return Err(UniverseError::DuplicateTicker(ticker));
        }
        tickers.push(ticker);
    }

    Ok(tickers)
}

/// Loads the universe from its source. A source failure is fatal to the run;
/// an empty list is not.
pub fn load_universe(port: &dyn UniversePort) -> Result<Universe, SiegfriedError> {
    let symbols = port
        .list_universe()
        .map_err(|e| SiegfriedError::UniverseUnavailable {
            reason: e.to_string(),
        })?;
    let universe = Universe::from_symbols(symbols);
    tracing::info!(tickers = universe.count(), "loaded universe");
    Ok(universe)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedUniverse(Result<Vec<String>, String>);

    impl UniversePort for FixedUniverse {
        fn list_universe(&self) -> Result<Vec<String>, SiegfriedError> {
            self.0.clone().map_err(|reason| SiegfriedError::Io(std::io::Error::other(reason)))
        }
    }

    #[test]
    fn parse_symbols_basic() {
        let result = parse_symbols("AAPL,MSFT,KO").unwrap();
        assert_eq!(result, vec!["AAPL", "MSFT", "KO"]);
    }

    #[test]
    fn parse_symbols_with_whitespace_and_case() {
        let result = parse_symbols("  aapl , msft ,Ko").unwrap();
        assert_eq!(result, vec!["AAPL", "MSFT", "KO"]);
    }

    #[test]
    fn parse_symbols_normalizes_share_class() {
        let result = parse_symbols("brk.b,BF.B").unwrap();
        assert_eq!(result, vec!["BRK-B", "BF-B"]);
    }

    #[test]
    fn parse_symbols_empty_token() {
        let result = parse_symbols("AAPL,,MSFT");
        assert!(matches!(result, Err(UniverseError::EmptyToken)));
    }

    #[test]
    fn parse_symbols_duplicate() {
        let result = parse_symbols("AAPL,MSFT,aapl");
        assert!(matches!(result, Err(UniverseError::DuplicateTicker(s)) if s == "AAPL"));
    }

    #[test]
    fn from_symbols_dedupes_keeping_first_occurrence() {
        let universe = Universe::from_symbols(["MSFT", "aapl", "KO", "AAPL", " msft", ""]);
        assert_eq!(universe.tickers, vec!["MSFT", "AAPL", "KO"]);
        assert_eq!(universe.count(), 3);
    }

    #[test]
    fn load_universe_maps_source_failure() {
        let port = FixedUniverse(Err("page not found".into()));
        let err = load_universe(&port).unwrap_err();
        assert!(
            matches!(err, SiegfriedError::UniverseUnavailable { reason } if reason.contains("page not found"))
        );
    }

    #[test]
    fn load_universe_accepts_empty_list() {
        let port = FixedUniverse(Ok(vec![]));
        let universe = load_universe(&port).unwrap();
        assert!(universe.is_empty());
    }
}
