//! SQLite data adapter.
//!
//! Serves the universe, market snapshots and statement line items from a
//! single database file. Statement items keep their source order in a
//! `position` column so label resolution stays reproducible. Symbols are
//! stored and looked up in normalized form, so `BRK.B` and `BRK-B` are the
//! same row.

use crate::domain::error::SiegfriedError;
use crate::domain::statement::{MarketSnapshot, Period, RawStatement, StatementKind};
use crate::domain::universe::normalize_symbol;
use crate::ports::config_port::ConfigPort;
use crate::ports::market_port::MarketPort;
use crate::ports::statement_port::StatementPort;
use crate::ports::universe_port::UniversePort;
use chrono::NaiveDate;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{OptionalExtension, params};

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

fn db_err(e: impl std::fmt::Display) -> SiegfriedError {
    SiegfriedError::Database {
        reason: e.to_string(),
    }
}

impl SqliteAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, SiegfriedError> {
        let db_path =
            config
                .get_string("sqlite", "path")
                .ok_or_else(|| SiegfriedError::ConfigMissing {
                    section: "sqlite".into(),
                    key: "path".into(),
                })?;

        let pool_size = config.get_int("sqlite", "pool_size", 4).clamp(1, 64) as u32;

        let manager = SqliteConnectionManager::file(&db_path);
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(db_err)?;

        Ok(Self { pool })
    }

    pub fn in_memory() -> Result<Self, SiegfriedError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder().max_size(1).build(manager).map_err(db_err)?;
        Ok(Self { pool })
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, SiegfriedError> {
        self.pool.get().map_err(db_err)
    }

    pub fn initialize_schema(&self) -> Result<(), SiegfriedError> {
        self.conn()?
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS universe (
                    symbol TEXT PRIMARY KEY,
                    position INTEGER NOT NULL
                );
                CREATE TABLE IF NOT EXISTS market (
                    symbol TEXT PRIMARY KEY,
                    market_cap REAL,
                    price REAL,
                    as_of TEXT
                );
                CREATE TABLE IF NOT EXISTS statement_items (
                    symbol TEXT NOT NULL,
                    kind TEXT NOT NULL,
                    period TEXT NOT NULL,
                    period_end TEXT NOT NULL,
                    position INTEGER NOT NULL,
                    label TEXT NOT NULL,
                    value REAL,
                    PRIMARY KEY (symbol, kind, period, period_end, position)
                );
                CREATE INDEX IF NOT EXISTS idx_statement_lookup
                    ON statement_items(symbol, kind, period, period_end);",
            )
            .map_err(db_err)
    }

    pub fn insert_universe(&self, symbols: &[&str]) -> Result<(), SiegfriedError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(db_err)?;
        for (i, symbol) in symbols.iter().enumerate() {
            tx.execute(
                "INSERT OR REPLACE INTO universe (symbol, position) VALUES (?1, ?2)",
                params![normalize_symbol(symbol), i as i64],
            )
            .map_err(db_err)?;
        }
        tx.commit().map_err(db_err)
    }

    pub fn insert_market(&self, snapshot: &MarketSnapshot) -> Result<(), SiegfriedError> {
        self.conn()?
            .execute(
                "INSERT OR REPLACE INTO market (symbol, market_cap, price, as_of)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    normalize_symbol(&snapshot.ticker),
                    snapshot.market_cap,
                    snapshot.price,
                    snapshot.as_of.map(|d| d.format("%Y-%m-%d").to_string())
                ],
            )
            .map_err(db_err)?;
        Ok(())
    }

    /// Stores a statement; `period_end` is required to tell periods apart.
    pub fn insert_statement(&self, statement: &RawStatement) -> Result<(), SiegfriedError> {
        let period_end = statement.period_end.ok_or_else(|| SiegfriedError::Database {
            reason: format!("{} {} statement has no period end", statement.ticker, statement.kind),
        })?;
        let period_end = period_end.format("%Y-%m-%d").to_string();
        let symbol = normalize_symbol(&statement.ticker);

        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(db_err)?;
        for (i, (label, value)) in statement.entries.iter().enumerate() {
            tx.execute(
                "INSERT OR REPLACE INTO statement_items
                 (symbol, kind, period, period_end, position, label, value)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    symbol,
                    statement.kind.as_str(),
                    statement.period.as_str(),
                    period_end,
                    i as i64,
                    label,
                    value
                ],
            )
            .map_err(db_err)?;
        }
        tx.commit().map_err(db_err)
    }
}

impl StatementPort for SqliteAdapter {
    fn fetch_statement(
        &self,
        ticker: &str,
        kind: StatementKind,
        period: Period,
    ) -> Result<RawStatement, SiegfriedError> {
        let source_err = |e: SiegfriedError| SiegfriedError::data_source(ticker, e.to_string());
        let conn = self.conn().map_err(source_err)?;
        let symbol = normalize_symbol(ticker);

        let latest: Option<String> = conn
            .query_row(
                "SELECT MAX(period_end) FROM statement_items
                 WHERE symbol = ?1 AND kind = ?2 AND period = ?3",
                params![symbol, kind.as_str(), period.as_str()],
                |row| row.get(0),
            )
            .map_err(|e| source_err(db_err(e)))?;

        let latest = latest.ok_or_else(|| {
            SiegfriedError::data_source(ticker, format!("no {} {} statement", period, kind))
        })?;

        let mut stmt = conn
            .prepare(
                "SELECT label, value FROM statement_items
                 WHERE symbol = ?1 AND kind = ?2 AND period = ?3 AND period_end = ?4
                 ORDER BY position ASC",
            )
            .map_err(|e| source_err(db_err(e)))?;

        let rows = stmt
            .query_map(
                params![symbol, kind.as_str(), period.as_str(), latest],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, Option<f64>>(1)?)),
            )
            .map_err(|e| source_err(db_err(e)))?;

        let mut statement = RawStatement::new(ticker, kind, period);
        statement.period_end = NaiveDate::parse_from_str(&latest, "%Y-%m-%d").ok();
        for row in rows {
            let (label, value) = row.map_err(|e| source_err(db_err(e)))?;
            statement.push(&label, value);
        }
        Ok(statement)
    }
}

impl MarketPort for SqliteAdapter {
    fn market_cap(&self, ticker: &str) -> Result<Option<f64>, SiegfriedError> {
        let conn = self
            .conn()
            .map_err(|e| SiegfriedError::data_source(ticker, e.to_string()))?;
        let row: Option<Option<f64>> = conn
            .query_row(
                "SELECT market_cap FROM market WHERE symbol = ?1",
                params![normalize_symbol(ticker)],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| SiegfriedError::data_source(ticker, e.to_string()))?;
        row.ok_or_else(|| SiegfriedError::data_source(ticker, "no market data"))
    }

    fn current_price(&self, ticker: &str) -> Result<f64, SiegfriedError> {
        let conn = self
            .conn()
            .map_err(|e| SiegfriedError::data_source(ticker, e.to_string()))?;
        let row: Option<Option<f64>> = conn
            .query_row(
                "SELECT price FROM market WHERE symbol = ?1",
                params![normalize_symbol(ticker)],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| SiegfriedError::data_source(ticker, e.to_string()))?;
        row.flatten()
            .ok_or_else(|| SiegfriedError::data_source(ticker, "no price"))
    }
}

impl UniversePort for SqliteAdapter {
    fn list_universe(&self) -> Result<Vec<String>, SiegfriedError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT symbol FROM universe ORDER BY position ASC")
            .map_err(db_err)?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(db_err)?;

        let mut symbols = Vec::new();
        for row in rows {
            symbols.push(row.map_err(db_err)?);
        }
        Ok(symbols)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> SqliteAdapter {
        let adapter = SqliteAdapter::in_memory().unwrap();
        adapter.initialize_schema().unwrap();
        adapter.insert_universe(&["MSFT", "AAPL"]).unwrap();
        adapter
            .insert_market(&MarketSnapshot {
                ticker: "AAPL".into(),
                market_cap: Some(3.0e12),
                price: Some(190.0),
                as_of: NaiveDate::from_ymd_opt(2024, 6, 28),
            })
            .unwrap();
        for (end, assets) in [((2022, 9, 24), 352755.0), ((2023, 9, 30), 352583.0)] {
            let stmt = RawStatement::new("AAPL", StatementKind::Balance, Period::Annual)
                .with_period_end(NaiveDate::from_ymd_opt(end.0, end.1, end.2).unwrap())
                .with_entry("TotalAssets", Some(assets))
                .with_entry("TotalDebt", None);
            adapter.insert_statement(&stmt).unwrap();
        }
        adapter
    }

    #[test]
    fn universe_keeps_insertion_order() {
        assert_eq!(seeded().list_universe().unwrap(), vec!["MSFT", "AAPL"]);
    }

    #[test]
    fn fetch_statement_returns_latest_period() {
        let stmt = seeded()
            .fetch_statement("AAPL", StatementKind::Balance, Period::Annual)
            .unwrap();
        assert_eq!(stmt.period_end, NaiveDate::from_ymd_opt(2023, 9, 30));
        assert_eq!(stmt.get("TotalAssets"), Some(352583.0));
        assert_eq!(stmt.labels().collect::<Vec<_>>(), vec!["TotalAssets", "TotalDebt"]);
    }

    #[test]
    fn fetch_statement_missing_is_data_source_error() {
        let err = seeded()
            .fetch_statement("AAPL", StatementKind::Income, Period::Annual)
            .unwrap_err();
        assert!(matches!(err, SiegfriedError::DataSource { .. }));
    }

    #[test]
    fn market_lookups() {
        let adapter = seeded();
        assert_eq!(adapter.market_cap("AAPL").unwrap(), Some(3.0e12));
        assert_eq!(adapter.current_price("AAPL").unwrap(), 190.0);
        assert!(adapter.market_cap("MSFT").is_err());
    }

    #[test]
    fn dotted_share_classes_share_one_key() {
        let adapter = SqliteAdapter::in_memory().unwrap();
        adapter.initialize_schema().unwrap();
        adapter.insert_universe(&["brk.b"]).unwrap();
        adapter
            .insert_market(&MarketSnapshot {
                ticker: "BRK.B".into(),
                market_cap: Some(9.0e11),
                price: Some(410.0),
                as_of: None,
            })
            .unwrap();
        let stmt = RawStatement::new("BRK.B", StatementKind::Income, Period::Annual)
            .with_period_end(NaiveDate::from_ymd_opt(2023, 12, 31).unwrap())
            .with_entry("OperatingIncome", Some(37.0));
        adapter.insert_statement(&stmt).unwrap();

        assert_eq!(adapter.list_universe().unwrap(), vec!["BRK-B"]);
        assert_eq!(adapter.market_cap("BRK-B").unwrap(), Some(9.0e11));
        assert_eq!(adapter.current_price("brk.b").unwrap(), 410.0);
        let fetched = adapter
            .fetch_statement("BRK-B", StatementKind::Income, Period::Annual)
            .unwrap();
        assert_eq!(fetched.get("OperatingIncome"), Some(37.0));
    }

    #[test]
    fn statement_without_period_end_is_rejected() {
        let adapter = seeded();
        let stmt = RawStatement::new("KO", StatementKind::Income, Period::Annual)
            .with_entry("OperatingIncome", Some(1.0));
        assert!(adapter.insert_statement(&stmt).is_err());
    }
}
