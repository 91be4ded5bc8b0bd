//! DuckDB data models

use serde::{Deserialize, Serialize};

/// Daily close row as stored (date as `YYYY-MM-DD`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservationRow {
    pub date: String,
    pub close: f64,
    pub source: Option<String>,
}

/// Per-symbol history extent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogRow {
    pub symbol: String,
    pub first_date: String,
    pub last_date: String,
    pub row_count: i64,
}
