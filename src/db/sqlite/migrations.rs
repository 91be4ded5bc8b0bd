//! SQLite database migrations

use crate::error::Result;
use rusqlite::Connection;

/// Run all database migrations
pub fn run_migrations(conn: &Connection) -> Result<()> {
    // Create migrations table
    conn.execute(
        "CREATE TABLE IF NOT EXISTS migrations (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        [],
    )?;

    run_migration(conn, "001_settings", CREATE_SETTINGS_TABLE)?;
    run_migration(conn, "002_market_closures", CREATE_MARKET_CLOSURES_TABLE)?;
    run_migration(conn, "003_tracked_symbols", CREATE_TRACKED_SYMBOLS_TABLE)?;

    tracing::info!("Database migrations completed");
    Ok(())
}

fn run_migration(conn: &Connection, name: &str, sql: &str) -> Result<()> {
    // Check if migration already applied
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM migrations WHERE name = ?)",
        [name],
        |row| row.get(0),
    )?;

    if !exists {
        tracing::info!("Running migration: {}", name);
        conn.execute_batch(sql)?;
        conn.execute(
            "INSERT INTO migrations (name) VALUES (?)",
            [name],
        )?;
    }

    Ok(())
}

const CREATE_SETTINGS_TABLE: &str = r#"
CREATE TABLE settings (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    daily_call_budget INTEGER NOT NULL DEFAULT 25,
    inter_call_delay_ms INTEGER NOT NULL DEFAULT 1000,
    fallback_window_days INTEGER NOT NULL DEFAULT 90,
    include_good_friday INTEGER NOT NULL DEFAULT 0,
    keep_expected_gaps_when_filtering INTEGER NOT NULL DEFAULT 0,
    default_provider TEXT NOT NULL DEFAULT 'alpha_vantage',
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
INSERT OR IGNORE INTO settings (id) VALUES (1);
"#;

const CREATE_MARKET_CLOSURES_TABLE: &str = r#"
CREATE TABLE market_closures (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    date TEXT NOT NULL UNIQUE,
    description TEXT,
    year INTEGER NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);
CREATE INDEX idx_market_closures_year ON market_closures(year);
"#;

const CREATE_TRACKED_SYMBOLS_TABLE: &str = r#"
CREATE TABLE tracked_symbols (
    symbol TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    first_trade_date TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;
