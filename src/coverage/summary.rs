//! Per-symbol coverage statistics

use super::quality::QualityMap;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Coverage of one symbol over its analysis window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolCoverage {
    pub symbol: String,
    pub name: String,
    pub coverage_percent: f64,
    pub days_of_data: usize,
    pub expected_days: usize,
    pub missing_days: usize,
    pub earliest_date: NaiveDate,
    pub latest_date: NaiveDate,
}

/// Counts produced elsewhere (e.g. a diagnostics feed) for one symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageDiagnostics {
    pub symbol: String,
    pub name: String,
    pub days_of_data: usize,
    pub expected_days: usize,
    pub missing_days: usize,
    pub earliest_date: NaiveDate,
    pub latest_date: NaiveDate,
}

/// Ordering of a coverage listing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoverageSort {
    /// Worst-covered symbols first
    #[default]
    Coverage,
    /// Alphabetical by symbol
    Symbol,
}

/// `days_of_data / expected_days * 100`, clamped to `[0, 100]`, 0 when nothing is expected
pub fn coverage_percent(days_of_data: usize, expected_days: usize) -> f64 {
    if expected_days == 0 {
        return 0.0;
    }
    (days_of_data as f64 / expected_days as f64 * 100.0).clamp(0.0, 100.0)
}

/// Summarize a quality map
///
/// Only business days count: an observation stored on a weekend is still
/// quality 1.0 in the map but does not add to `days_of_data`.
pub fn summarize(name: &str, map: &QualityMap) -> SymbolCoverage {
    let mut days_of_data = 0;
    let mut missing_days = 0;
    let mut expected_days = 0;

    for q in map.days.values().filter(|q| q.is_business_day()) {
        expected_days += 1;
        if q.is_observed() {
            days_of_data += 1;
        } else if q.is_missing() {
            missing_days += 1;
        }
    }

    SymbolCoverage {
        symbol: map.symbol.clone(),
        name: name.to_string(),
        coverage_percent: coverage_percent(days_of_data, expected_days),
        days_of_data,
        expected_days,
        missing_days,
        earliest_date: map.start,
        latest_date: map.end,
    }
}

impl From<CoverageDiagnostics> for SymbolCoverage {
    fn from(diag: CoverageDiagnostics) -> Self {
        let days_of_data = diag.days_of_data.min(diag.expected_days);
        SymbolCoverage {
            coverage_percent: coverage_percent(days_of_data, diag.expected_days),
            symbol: diag.symbol,
            name: diag.name,
            days_of_data,
            expected_days: diag.expected_days,
            missing_days: diag.missing_days,
            earliest_date: diag.earliest_date,
            latest_date: diag.latest_date,
        }
    }
}

/// Sort a coverage listing in place (ties broken by symbol)
pub fn sort_coverage(rows: &mut [SymbolCoverage], order: CoverageSort) {
    match order {
        CoverageSort::Coverage => rows.sort_by(|a, b| {
            a.coverage_percent
                .partial_cmp(&b.coverage_percent)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.symbol.cmp(&b.symbol))
        }),
        CoverageSort::Symbol => rows.sort_by(|a, b| a.symbol.cmp(&b.symbol)),
    }
}
