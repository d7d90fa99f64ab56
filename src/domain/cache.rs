//! Run-scoped statement cache.
//!
//! Statement data for a ticker does not change within one screening run, so
//! repeated fetches are served from memory. Entries are keyed by
//! (ticker, kind, period) and must be invalidated before every run; nothing is
//! carried across runs implicitly.

use crate::domain::error::SiegfriedError;
use crate::domain::statement::{Period, RawStatement, StatementKind};
use crate::ports::statement_port::StatementPort;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub ticker: String,
    pub kind: StatementKind,
    pub period: Period,
}

pub struct CachedStatements<'a> {
    inner: &'a dyn StatementPort,
    entries: Mutex<HashMap<CacheKey, RawStatement>>,
}

impl<'a> CachedStatements<'a> {
    pub fn new(inner: &'a dyn StatementPort) -> Self {
        Self {
            inner,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<CacheKey, RawStatement>> {
        // A poisoned map still holds complete entries; inserts are atomic.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Drops every cached statement. Called at the start of each run.
    pub fn invalidate(&self) {
        let mut entries = self.lock();
        if !entries.is_empty() {
            tracing::debug!(entries = entries.len(), "invalidating statement cache");
        }
        entries.clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl StatementPort for CachedStatements<'_> {
    fn fetch_statement(
        &self,
        ticker: &str,
        kind: StatementKind,
        period: Period,
    ) -> Result<RawStatement, SiegfriedError> {
        let key = CacheKey {
            ticker: ticker.to_string(),
            kind,
            period,
        };

        if let Some(hit) = self.lock().get(&key) {
            tracing::debug!(ticker, %kind, %period, "statement cache hit");
            return Ok(hit.clone());
        }

        // Fetch outside the lock so workers do not serialize on the source.
        let statement = self.inner.fetch_statement(ticker, kind, period)?;
        self.lock().insert(key, statement.clone());
        Ok(statement)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource {
        calls: AtomicUsize,
        fail: bool,
    }

    impl StatementPort for CountingSource {
        fn fetch_statement(
            &self,
            ticker: &str,
            kind: StatementKind,
            period: Period,
        ) -> Result<RawStatement, SiegfriedError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(SiegfriedError::data_source(ticker, "offline"));
            }
            Ok(RawStatement::new(ticker, kind, period).with_entry("TotalAssets", Some(1.0)))
        }
    }

    fn source(fail: bool) -> CountingSource {
        CountingSource {
            calls: AtomicUsize::new(0),
            fail,
        }
    }

    #[test]
    fn second_fetch_is_served_from_cache() {
        let src = source(false);
        let cache = CachedStatements::new(&src);
        let a = cache
            .fetch_statement("AAPL", StatementKind::Balance, Period::Annual)
            .unwrap();
        let b = cache
            .fetch_statement("AAPL", StatementKind::Balance, Period::Annual)
            .unwrap();
        assert_eq!(a, b);
        assert_eq!(src.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn key_includes_kind_and_period() {
        let src = source(false);
        let cache = CachedStatements::new(&src);
        cache
            .fetch_statement("AAPL", StatementKind::Balance, Period::Annual)
            .unwrap();
        cache
            .fetch_statement("AAPL", StatementKind::Income, Period::Annual)
            .unwrap();
        cache
            .fetch_statement("AAPL", StatementKind::Balance, Period::Quarterly)
            .unwrap();
        assert_eq!(src.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn invalidate_forces_refetch() {
        let src = source(false);
        let cache = CachedStatements::new(&src);
        cache
            .fetch_statement("AAPL", StatementKind::Balance, Period::Annual)
            .unwrap();
        cache.invalidate();
        assert!(cache.is_empty());
        cache
            .fetch_statement("AAPL", StatementKind::Balance, Period::Annual)
            .unwrap();
        assert_eq!(src.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn errors_are_not_cached() {
        let src = source(true);
        let cache = CachedStatements::new(&src);
        assert!(cache
            .fetch_statement("AAPL", StatementKind::Balance, Period::Annual)
            .is_err());
        assert!(cache
            .fetch_statement("AAPL", StatementKind::Balance, Period::Annual)
            .is_err());
        assert_eq!(src.calls.load(Ordering::SeqCst), 2);
        assert!(cache.is_empty());
    }
}
