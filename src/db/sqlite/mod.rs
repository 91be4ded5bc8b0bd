//! SQLite database module (application state)

pub mod models;
mod market;
mod migrations;
mod settings;
mod symbol;

use crate::error::Result;
use chrono::NaiveDate;
use parking_lot::Mutex;
use rusqlite::Connection;
use std::path::Path;

pub use models::{
    BackfillSettings, CreateClosureRequest, MarketClosure, TrackedSymbol, UpdateBackfillSettings,
};

/// SQLite database wrapper
pub struct SqliteDb {
    conn: Mutex<Connection>,
}

impl SqliteDb {
    /// Create new SQLite database connection
    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        // Enable WAL mode for better concurrent access
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        Self::from_connection(conn)
    }

    /// Open a transient in-memory database
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        let db = Self {
            conn: Mutex::new(conn),
        };

        // Run migrations
        db.run_migrations()?;

        Ok(db)
    }

    /// Run database migrations
    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn.lock();
        migrations::run_migrations(&conn)
    }

    // ========== Settings Methods ==========

    /// Get backfill settings
    pub fn get_backfill_settings(&self) -> Result<BackfillSettings> {
        let conn = self.conn.lock();
        settings::get_settings(&conn)
    }

    /// Update backfill settings
    pub fn update_backfill_settings(&self, req: &UpdateBackfillSettings) -> Result<BackfillSettings> {
        let conn = self.conn.lock();
        settings::update_settings(&conn, req)
    }

    // ========== Market Closure Methods ==========

    /// Record an ad-hoc market closure
    pub fn create_market_closure(&self, req: &CreateClosureRequest) -> Result<MarketClosure> {
        let conn = self.conn.lock();
        market::create_closure(&conn, req)
    }

    /// List market closures
    pub fn get_market_closures(&self, year: Option<i32>) -> Result<Vec<MarketClosure>> {
        let conn = self.conn.lock();
        market::get_closures(&conn, year)
    }

    /// All closure dates
    pub fn get_market_closure_dates(&self) -> Result<Vec<NaiveDate>> {
        let conn = self.conn.lock();
        market::get_closure_dates(&conn)
    }

    /// Delete a market closure
    pub fn delete_market_closure(&self, id: i64) -> Result<bool> {
        let conn = self.conn.lock();
        market::delete_closure(&conn, id)
    }

    // ========== Tracked Symbol Methods ==========

    /// Track a symbol (or update its name / first trade date)
    pub fn upsert_tracked_symbol(&self, symbol: &TrackedSymbol) -> Result<()> {
        let conn = self.conn.lock();
        symbol::upsert_symbol(&conn, symbol)
    }

    /// All tracked symbols, alphabetical
    pub fn list_tracked_symbols(&self) -> Result<Vec<TrackedSymbol>> {
        let conn = self.conn.lock();
        symbol::list_symbols(&conn)
    }

    /// Look up a tracked symbol
    pub fn get_tracked_symbol(&self, symbol: &str) -> Result<Option<TrackedSymbol>> {
        let conn = self.conn.lock();
        symbol::get_symbol(&conn, symbol)
    }

    /// Stop tracking a symbol
    pub fn remove_tracked_symbol(&self, symbol: &str) -> Result<bool> {
        let conn = self.conn.lock();
        symbol::remove_symbol(&conn, symbol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_settings() {
        let db = SqliteDb::open_in_memory().unwrap();
        assert_eq!(db.get_backfill_settings().unwrap(), BackfillSettings::default());
    }

    #[test]
    fn test_partial_settings_update() {
        let db = SqliteDb::open_in_memory().unwrap();

        let updated = db
            .update_backfill_settings(&UpdateBackfillSettings {
                daily_call_budget: Some(500),
                include_good_friday: Some(true),
                ..Default::default()
            })
            .unwrap();

        assert_eq!(updated.daily_call_budget, 500);
        assert!(updated.include_good_friday);
        assert_eq!(updated.inter_call_delay_ms, 1000);
        assert_eq!(updated.fallback_window_days, 90);
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let db = SqliteDb::open_in_memory().unwrap();

        let result = db.update_backfill_settings(&UpdateBackfillSettings {
            daily_call_budget: Some(0),
            ..Default::default()
        });
        assert!(result.is_err());
        assert_eq!(db.get_backfill_settings().unwrap().daily_call_budget, 25);
    }

    #[test]
    fn test_fallback_window_bounded() {
        let db = SqliteDb::open_in_memory().unwrap();

        let err = db
            .update_backfill_settings(&UpdateBackfillSettings {
                fallback_window_days: Some(4_000_000_000),
                ..Default::default()
            })
            .unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
        assert_eq!(db.get_backfill_settings().unwrap().fallback_window_days, 90);

        let updated = db
            .update_backfill_settings(&UpdateBackfillSettings {
                fallback_window_days: Some(settings::MAX_FALLBACK_WINDOW_DAYS),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(updated.fallback_window_days, settings::MAX_FALLBACK_WINDOW_DAYS);
    }

    #[test]
    fn test_market_closures() {
        let db = SqliteDb::open_in_memory().unwrap();

        let closure = db
            .create_market_closure(&CreateClosureRequest {
                date: "2025-01-09".to_string(),
                description: Some("National Day of Mourning".to_string()),
            })
            .unwrap();
        assert_eq!(closure.year, 2025);

        // Duplicate dates are rejected by the unique index
        assert!(db
            .create_market_closure(&CreateClosureRequest {
                date: "2025-01-09".to_string(),
                description: None,
            })
            .is_err());

        // Malformed dates never reach the table
        assert!(db
            .create_market_closure(&CreateClosureRequest {
                date: "2025-13-01".to_string(),
                description: None,
            })
            .is_err());

        assert_eq!(db.get_market_closures(Some(2025)).unwrap().len(), 1);
        assert!(db.get_market_closures(Some(2024)).unwrap().is_empty());
        assert_eq!(
            db.get_market_closure_dates().unwrap(),
            vec![NaiveDate::from_ymd_opt(2025, 1, 9).unwrap()]
        );

        assert!(db.delete_market_closure(closure.id).unwrap());
        assert!(!db.delete_market_closure(closure.id).unwrap());
    }

    #[test]
    fn test_tracked_symbols_persist() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("historify.db");

        {
            let db = SqliteDb::new(&path).unwrap();
            db.upsert_tracked_symbol(&TrackedSymbol {
                symbol: "MSFT".to_string(),
                name: "Microsoft".to_string(),
                first_trade_date: Some("2023-06-01".to_string()),
            })
            .unwrap();
            db.upsert_tracked_symbol(&TrackedSymbol {
                symbol: "AAPL".to_string(),
                name: "Apple".to_string(),
                first_trade_date: None,
            })
            .unwrap();
        }

        let db = SqliteDb::new(&path).unwrap();
        let symbols = db.list_tracked_symbols().unwrap();
        assert_eq!(symbols.len(), 2);
        assert_eq!(symbols[0].symbol, "AAPL");

        let msft = db.get_tracked_symbol("MSFT").unwrap().unwrap();
        assert_eq!(msft.first_trade_date.as_deref(), Some("2023-06-01"));

        assert!(db.remove_tracked_symbol("MSFT").unwrap());
        assert!(db.get_tracked_symbol("MSFT").unwrap().is_none());
    }
}
