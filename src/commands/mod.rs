//! Command layer
//!
//! Request/response DTOs wrapping the services. This is the boundary a
//! presentation layer (or the CLI) calls; dates travel as `YYYY-MM-DD`
//! strings and errors serialize as `{ code, message }`.

pub mod backfill;
pub mod coverage;
pub mod market;
pub mod settings;
pub mod symbols;

use crate::error::{AppError, Result};
use chrono::NaiveDate;

/// Parse a `YYYY-MM-DD` date from a request
pub fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|e| AppError::Validation(format!("Invalid date '{}': {}", value, e)))
}

/// Parse an optional date, `None` when absent or blank
pub fn parse_optional_date(value: Option<&str>) -> Result<Option<NaiveDate>> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(v) => parse_date(v).map(Some),
        None => Ok(None),
    }
}
