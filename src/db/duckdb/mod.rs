//! DuckDB database module for price history (Historify)

pub mod models;
mod migrations;

use super::{CatalogEntry, Observation, ObservationStore, UpsertSummary};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use duckdb::Connection;
use models::{CatalogRow, ObservationRow};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::path::Path;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// DuckDB database wrapper
pub struct DuckDb {
    conn: Mutex<Connection>,
}

impl DuckDb {
    /// Create new DuckDB connection
    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Open a transient in-memory database
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
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

    /// Query stored closes for a symbol
    pub fn query_observations(
        &self,
        symbol: &str,
        from_date: NaiveDate,
        to_date: NaiveDate,
    ) -> Result<Vec<ObservationRow>> {
        let conn = self.conn.lock();

        let mut stmt = conn.prepare(
            "SELECT strftime(date, '%Y-%m-%d'), close, source
             FROM price_observations
             WHERE symbol = ? AND date >= CAST(? AS DATE) AND date <= CAST(? AS DATE)
             ORDER BY date ASC",
        )?;

        let rows = stmt
            .query_map(
                duckdb::params![
                    symbol,
                    from_date.format(DATE_FORMAT).to_string(),
                    to_date.format(DATE_FORMAT).to_string()
                ],
                |row| {
                    Ok(ObservationRow {
                        date: row.get(0)?,
                        close: row.get(1)?,
                        source: row.get(2)?,
                    })
                },
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    /// Upsert closes for a symbol inside one transaction
    pub fn upsert_observations(
        &self,
        symbol: &str,
        data: &[ObservationRow],
    ) -> Result<UpsertSummary> {
        if data.is_empty() {
            return Ok(UpsertSummary::default());
        }

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        let existing: HashSet<String> = {
            let mut stmt = tx.prepare(
                "SELECT strftime(date, '%Y-%m-%d') FROM price_observations WHERE symbol = ?",
            )?;
            let dates = stmt
                .query_map(duckdb::params![symbol], |row| row.get::<_, String>(0))?
                .collect::<std::result::Result<HashSet<_>, _>>()?;
            dates
        };

        let mut stmt = tx.prepare(
            "INSERT INTO price_observations (symbol, date, close, source)
             VALUES (?, CAST(? AS DATE), ?, ?)
             ON CONFLICT (symbol, date) DO UPDATE SET
               close = excluded.close, source = excluded.source, fetched_at = now()",
        )?;

        let mut summary = UpsertSummary::default();
        for row in data {
            stmt.execute(duckdb::params![symbol, row.date, row.close, row.source])?;
            if existing.contains(&row.date) {
                summary.updated += 1;
            } else {
                summary.inserted += 1;
            }
        }

        drop(stmt);
        tx.commit()?;

        tracing::debug!(
            "Upserted {} closes for {} ({} new)",
            data.len(),
            symbol,
            summary.inserted
        );
        Ok(summary)
    }

    /// Stored history extent per symbol
    pub fn catalog_rows(&self) -> Result<Vec<CatalogRow>> {
        let conn = self.conn.lock();

        let mut stmt = conn.prepare(
            "SELECT symbol, strftime(MIN(date), '%Y-%m-%d'), strftime(MAX(date), '%Y-%m-%d'), COUNT(*)
             FROM price_observations
             GROUP BY symbol
             ORDER BY symbol",
        )?;

        let rows = stmt
            .query_map(duckdb::params![], |row| {
                Ok(CatalogRow {
                    symbol: row.get(0)?,
                    first_date: row.get(1)?,
                    last_date: row.get(2)?,
                    row_count: row.get(3)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(rows)
    }
}

fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map_err(|e| AppError::Internal(format!("Bad stored date '{}': {}", value, e)))
}

#[async_trait]
impl ObservationStore for DuckDb {
    async fn query(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> Result<Vec<Observation>> {
        self.query_observations(symbol, start, end)?
            .into_iter()
            .map(|row| {
                Ok(Observation {
                    date: parse_date(&row.date)?,
                    close: row.close,
                    source: row.source,
                })
            })
            .collect()
    }

    async fn upsert(&self, symbol: &str, observations: &[Observation]) -> Result<UpsertSummary> {
        let rows: Vec<ObservationRow> = observations
            .iter()
            .map(|o| ObservationRow {
                date: o.date.format(DATE_FORMAT).to_string(),
                close: o.close,
                source: o.source.clone(),
            })
            .collect();
        self.upsert_observations(symbol, &rows)
    }

    async fn catalog(&self) -> Result<Vec<CatalogEntry>> {
        self.catalog_rows()?
            .into_iter()
            .map(|row| {
                Ok(CatalogEntry {
                    first_date: parse_date(&row.first_date)?,
                    last_date: parse_date(&row.last_date)?,
                    row_count: usize::try_from(row.row_count).unwrap_or(0),
                    symbol: row.symbol,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn obs(d: NaiveDate, close: f64) -> Observation {
        Observation {
            date: d,
            close,
            source: Some("alpha_vantage".to_string()),
        }
    }

    #[tokio::test]
    async fn test_upsert_and_query() {
        let db = DuckDb::open_in_memory().unwrap();

        let summary = db
            .upsert("AAPL", &[obs(date(2024, 1, 2), 185.64), obs(date(2024, 1, 3), 184.25)])
            .await
            .unwrap();
        assert_eq!(summary, UpsertSummary { inserted: 2, updated: 0 });

        let rows = db.query("AAPL", date(2024, 1, 1), date(2024, 1, 31)).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].date, date(2024, 1, 2));
        assert_eq!(rows[1].close, 184.25);

        // Other symbols are isolated
        assert!(db.query("MSFT", date(2024, 1, 1), date(2024, 1, 31)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        let db = DuckDb::open_in_memory().unwrap();
        let batch = [obs(date(2024, 1, 2), 185.64)];

        db.upsert("AAPL", &batch).await.unwrap();
        let again = db.upsert("AAPL", &batch).await.unwrap();
        assert_eq!(again, UpsertSummary { inserted: 0, updated: 1 });

        let corrected = [Observation {
            date: date(2024, 1, 2),
            close: 185.70,
            source: Some("manual".to_string()),
        }];
        db.upsert("AAPL", &corrected).await.unwrap();

        let rows = db.query("AAPL", date(2024, 1, 2), date(2024, 1, 2)).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].close, 185.70);
        assert_eq!(rows[0].source.as_deref(), Some("manual"));
    }

    #[tokio::test]
    async fn test_catalog_and_file_persistence() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("historify.duckdb");

        {
            let db = DuckDb::new(&path).unwrap();
            db.upsert("MSFT", &[obs(date(2024, 2, 1), 400.0), obs(date(2024, 2, 5), 405.0)])
                .await
                .unwrap();
        }

        let db = DuckDb::new(&path).unwrap();
        let catalog = db.catalog().await.unwrap();
        assert_eq!(
            catalog,
            vec![CatalogEntry {
                symbol: "MSFT".to_string(),
                first_date: date(2024, 2, 1),
                last_date: date(2024, 2, 5),
                row_count: 2,
            }]
        );
    }
}
