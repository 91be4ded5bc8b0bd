//! Ad-hoc market closures
//!
//! Rule-based holidays live in `crate::calendar`; this table records the
//! one-off closures the rules cannot know about.

use crate::db::sqlite::models::{CreateClosureRequest, MarketClosure};
use crate::error::{AppError, Result};
use chrono::{Datelike, NaiveDate};
use rusqlite::{params, Connection};

/// Create a new market closure
pub fn create_closure(conn: &Connection, req: &CreateClosureRequest) -> Result<MarketClosure> {
    let date = NaiveDate::parse_from_str(&req.date, "%Y-%m-%d")
        .map_err(|e| AppError::Validation(format!("Invalid closure date '{}': {}", req.date, e)))?;
    let date_str = date.format("%Y-%m-%d").to_string();
    let year = date.year();

    conn.execute(
        "INSERT INTO market_closures (date, description, year) VALUES (?1, ?2, ?3)",
        params![date_str, req.description, year],
    )?;

    let id = conn.last_insert_rowid();
    tracing::info!("Created market closure: {} ({})", date_str, id);

    Ok(MarketClosure {
        id,
        date: date_str,
        description: req.description.clone(),
        year,
    })
}

/// Get closures, optionally restricted to one year
pub fn get_closures(conn: &Connection, year: Option<i32>) -> Result<Vec<MarketClosure>> {
    let map_row = |row: &rusqlite::Row<'_>| {
        Ok(MarketClosure {
            id: row.get(0)?,
            date: row.get(1)?,
            description: row.get(2)?,
            year: row.get(3)?,
        })
    };

    let closures = match year {
        Some(y) => {
            let mut stmt = conn.prepare(
                "SELECT id, date, description, year FROM market_closures WHERE year = ?1 ORDER BY date",
            )?;
            let rows = stmt
                .query_map(params![y], map_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows
        }
        None => {
            let mut stmt = conn.prepare(
                "SELECT id, date, description, year FROM market_closures ORDER BY date",
            )?;
            let rows = stmt
                .query_map([], map_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows
        }
    };

    Ok(closures)
}

/// All closure dates, for building the market calendar
pub fn get_closure_dates(conn: &Connection) -> Result<Vec<NaiveDate>> {
    get_closures(conn, None)?
        .into_iter()
        .map(|c| {
            NaiveDate::parse_from_str(&c.date, "%Y-%m-%d")
                .map_err(|e| AppError::Internal(format!("Bad closure date '{}': {}", c.date, e)))
        })
        .collect()
}

/// Delete a market closure
pub fn delete_closure(conn: &Connection, id: i64) -> Result<bool> {
    let rows = conn.execute("DELETE FROM market_closures WHERE id = ?1", params![id])?;
    Ok(rows > 0)
}
