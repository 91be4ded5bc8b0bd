//! Storage layer
//!
//! - DuckDB holds price history (the observation store)
//! - SQLite holds application state (settings, closures, tracked symbols)
//! - [`memory::MemoryStore`] is an in-process observation store

pub mod duckdb;
pub mod memory;
pub mod sqlite;

use crate::error::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One stored daily close
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub date: NaiveDate,
    pub close: f64,
    pub source: Option<String>,
}

/// Result of an upsert
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpsertSummary {
    /// Dates that had no observation before
    pub inserted: usize,
    /// Dates that were already stored and got overwritten
    pub updated: usize,
}

/// Stored history extent of one symbol
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub symbol: String,
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
    pub row_count: usize,
}

/// Read/write store of daily observations
///
/// Writes must be visible to the next `query` for the same symbol, and
/// `upsert` must be idempotent per (symbol, date).
#[async_trait]
pub trait ObservationStore: Send + Sync {
    /// Observations of `symbol` within `[start, end]`, ascending by date
    async fn query(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> Result<Vec<Observation>>;

    /// Insert or overwrite observations keyed by (symbol, date)
    async fn upsert(&self, symbol: &str, observations: &[Observation]) -> Result<UpsertSummary>;

    /// Per-symbol extent of stored history
    async fn catalog(&self) -> Result<Vec<CatalogEntry>>;
}
