//! Coverage Service
//!
//! Builds quality maps and coverage listings from the observation store.
//! Nothing here is persisted; every call re-reads the store.

use crate::coverage::{
    build_quality_map, filter_by_source, sort_coverage, summarize, CoverageSort, GapVisibility,
    QualityMap, SymbolCoverage,
};
use crate::error::{ensure_range, AppError, Result};
use crate::state::AppState;
use chrono::{Duration, NaiveDate, Utc};
use chrono_tz::America::New_York;
use std::collections::BTreeSet;
use tracing::{debug, info};

/// Today's date on the U.S. market clock
pub fn today() -> NaiveDate {
    Utc::now().with_timezone(&New_York).date_naive()
}

/// Coverage service for business logic
pub struct CoverageService;

impl CoverageService {
    /// Analysis window of `symbol` as of `today`
    ///
    /// Starts at the tracked first trade date, or `fallback_window_days`
    /// before today when there is none. Ends today.
    pub fn analysis_window_as_of(
        state: &AppState,
        symbol: &str,
        today: NaiveDate,
    ) -> Result<(NaiveDate, NaiveDate)> {
        let first_trade = match state.sqlite.get_tracked_symbol(symbol)? {
            Some(tracked) => tracked
                .first_trade_date
                .map(|d| {
                    NaiveDate::parse_from_str(&d, "%Y-%m-%d").map_err(|e| {
                        AppError::Validation(format!("Bad first trade date '{}' for {}: {}", d, symbol, e))
                    })
                })
                .transpose()?,
            None => None,
        };

        let start = match first_trade {
            Some(date) => date.min(today),
            None => {
                let days = state.settings().fallback_window_days;
                today
                    .checked_sub_signed(Duration::days(i64::from(days)))
                    .ok_or_else(|| {
                        AppError::Validation(format!(
                            "fallback window of {} days reaches before the supported calendar",
                            days
                        ))
                    })?
            }
        };

        Ok((start, today))
    }

    pub fn analysis_window(state: &AppState, symbol: &str) -> Result<(NaiveDate, NaiveDate)> {
        Self::analysis_window_as_of(state, symbol, today())
    }

    /// Quality map of `symbol` over `[start, end]`
    pub async fn get_quality_map(
        state: &AppState,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<QualityMap> {
        ensure_range(start, end)?;
        debug!("CoverageService::get_quality_map - {} {} to {}", symbol, start, end);

        let observations = state.store.query(symbol, start, end).await?;
        build_quality_map(symbol, start, end, &observations, &state.calendar())
    }

    /// Quality map of `symbol` over its analysis window
    pub async fn get_symbol_quality_map(state: &AppState, symbol: &str) -> Result<QualityMap> {
        let (start, end) = Self::analysis_window(state, symbol)?;
        Self::get_quality_map(state, symbol, start, end).await
    }

    /// Coverage of one symbol over its analysis window
    pub async fn symbol_coverage(state: &AppState, symbol: &str) -> Result<SymbolCoverage> {
        let map = Self::get_symbol_quality_map(state, symbol).await?;
        Self::symbol_coverage_of(state, symbol, &map)
    }

    /// Summarize an already built map under the symbol's display name
    pub fn symbol_coverage_of(state: &AppState, symbol: &str, map: &QualityMap) -> Result<SymbolCoverage> {
        Ok(summarize(&Self::display_name(state, symbol)?, map))
    }

    /// Coverage of the selected symbols (all tracked symbols when empty)
    pub async fn list_symbol_coverage(
        state: &AppState,
        selection: &[String],
        sort: CoverageSort,
    ) -> Result<Vec<SymbolCoverage>> {
        let symbols: Vec<String> = if selection.is_empty() {
            state
                .sqlite
                .list_tracked_symbols()?
                .into_iter()
                .map(|t| t.symbol)
                .collect()
        } else {
            let mut seen = BTreeSet::new();
            selection
                .iter()
                .filter(|s| seen.insert(s.as_str()))
                .cloned()
                .collect()
        };

        info!("CoverageService::list_symbol_coverage - {} symbol(s)", symbols.len());

        let mut rows = Vec::with_capacity(symbols.len());
        for symbol in &symbols {
            rows.push(Self::symbol_coverage(state, symbol).await?);
        }
        sort_coverage(&mut rows, sort);

        Ok(rows)
    }

    /// Narrow a quality map to the selected sources
    ///
    /// Expected gaps stay visible only when the
    /// `keep_expected_gaps_when_filtering` setting is on.
    pub fn filter_by_issue(
        state: &AppState,
        map: &QualityMap,
        sources: &BTreeSet<String>,
    ) -> QualityMap {
        let visibility = if state.settings().keep_expected_gaps_when_filtering {
            GapVisibility::KeepExpected
        } else {
            GapVisibility::Hide
        };
        filter_by_source(map, sources, visibility)
    }

    fn display_name(state: &AppState, symbol: &str) -> Result<String> {
        Ok(state
            .sqlite
            .get_tracked_symbol(symbol)?
            .map(|t| t.name)
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| symbol.to_string()))
    }
}
