//! Tracked symbol management

use crate::db::sqlite::models::TrackedSymbol;
use crate::error::Result;
use rusqlite::{params, Connection, OptionalExtension};

/// Insert or update a tracked symbol
pub fn upsert_symbol(conn: &Connection, symbol: &TrackedSymbol) -> Result<()> {
    conn.execute(
        "INSERT INTO tracked_symbols (symbol, name, first_trade_date) VALUES (?1, ?2, ?3)
         ON CONFLICT(symbol) DO UPDATE SET
           name = excluded.name,
           first_trade_date = excluded.first_trade_date,
           updated_at = datetime('now')",
        params![symbol.symbol, symbol.name, symbol.first_trade_date],
    )?;

    tracing::info!("Tracking symbol {}", symbol.symbol);
    Ok(())
}

/// Load all tracked symbols
pub fn list_symbols(conn: &Connection) -> Result<Vec<TrackedSymbol>> {
    let mut stmt = conn.prepare(
        "SELECT symbol, name, first_trade_date FROM tracked_symbols ORDER BY symbol",
    )?;

    let symbols = stmt
        .query_map([], |row| {
            Ok(TrackedSymbol {
                symbol: row.get(0)?,
                name: row.get(1)?,
                first_trade_date: row.get(2)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(symbols)
}

/// Look up one tracked symbol
pub fn get_symbol(conn: &Connection, symbol: &str) -> Result<Option<TrackedSymbol>> {
    let found = conn
        .query_row(
            "SELECT symbol, name, first_trade_date FROM tracked_symbols WHERE symbol = ?1",
            params![symbol],
            |row| {
                Ok(TrackedSymbol {
                    symbol: row.get(0)?,
                    name: row.get(1)?,
                    first_trade_date: row.get(2)?,
                })
            },
        )
        .optional()?;

    Ok(found)
}

/// Stop tracking a symbol (stored history is kept)
pub fn remove_symbol(conn: &Connection, symbol: &str) -> Result<bool> {
    let rows = conn.execute("DELETE FROM tracked_symbols WHERE symbol = ?1", params![symbol])?;
    Ok(rows > 0)
}
