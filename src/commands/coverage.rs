//! Coverage and quality map commands

use crate::commands::parse_optional_date;
use crate::coverage::{CoverageSort, DateQuality, SymbolCoverage};
use crate::error::Result;
use crate::services::{normalize_symbol, CoverageService};
use crate::state::AppState;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Default, Deserialize)]
pub struct CoverageListRequest {
    /// Empty means every tracked symbol
    #[serde(default)]
    pub symbols: Vec<String>,
    #[serde(default)]
    pub sort: CoverageSort,
}

/// Coverage of the selected symbols, worst first by default
pub async fn list_symbol_coverage(
    state: &AppState,
    request: CoverageListRequest,
) -> Result<Vec<SymbolCoverage>> {
    let symbols = request
        .symbols
        .iter()
        .map(|s| normalize_symbol(s))
        .collect::<Result<Vec<_>>>()?;

    CoverageService::list_symbol_coverage(state, &symbols, request.sort).await
}

#[derive(Debug, Deserialize)]
pub struct QualityMapRequest {
    pub symbol: String,
    /// Defaults to the start of the analysis window
    pub from_date: Option<String>,
    /// Defaults to today
    pub to_date: Option<String>,
    /// Source filter; empty shows everything
    #[serde(default)]
    pub sources: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct DateQualityEntry {
    pub date: String,
    pub has_data: bool,
    pub quality: f64,
    pub price: Option<f64>,
    pub source: Option<String>,
}

impl DateQualityEntry {
    fn new(date: String, q: &DateQuality) -> Self {
        Self {
            date,
            has_data: q.has_data(),
            quality: q.quality(),
            price: q.price(),
            source: q.source().map(str::to_string),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DateRangeEntry {
    pub from_date: String,
    pub to_date: String,
}

#[derive(Debug, Serialize)]
pub struct QualityMapResponse {
    pub symbol: String,
    pub from_date: String,
    pub to_date: String,
    /// Filtered by `sources`
    pub days: Vec<DateQualityEntry>,
    /// Coverage of the unfiltered map
    pub coverage: SymbolCoverage,
    pub missing_ranges: Vec<DateRangeEntry>,
    pub source_breakdown: BTreeMap<String, usize>,
}

/// Quality map of one symbol, optionally filtered by source
pub async fn get_quality_map(state: &AppState, request: QualityMapRequest) -> Result<QualityMapResponse> {
    let symbol = normalize_symbol(&request.symbol)?;
    let (window_start, window_end) = CoverageService::analysis_window(state, &symbol)?;
    let start = parse_optional_date(request.from_date.as_deref())?.unwrap_or(window_start);
    let end = parse_optional_date(request.to_date.as_deref())?.unwrap_or(window_end);

    let map = CoverageService::get_quality_map(state, &symbol, start, end).await?;
    let coverage = CoverageService::symbol_coverage_of(state, &symbol, &map)?;

    let sources: BTreeSet<String> = request
        .sources
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    let filtered = CoverageService::filter_by_issue(state, &map, &sources);

    Ok(QualityMapResponse {
        symbol,
        from_date: start.to_string(),
        to_date: end.to_string(),
        days: filtered
            .iter()
            .map(|(date, q)| DateQualityEntry::new(date.to_string(), q))
            .collect(),
        coverage,
        missing_ranges: map
            .missing_ranges()
            .into_iter()
            .map(|(from, to)| DateRangeEntry {
                from_date: from.to_string(),
                to_date: to.to_string(),
            })
            .collect(),
        source_breakdown: map.source_breakdown(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Observation;
    use crate::services::testing::{date, test_state, FakeProvider};

    #[tokio::test]
    async fn test_quality_map_response() {
        let state = test_state(FakeProvider::new());
        state
            .store
            .upsert(
                "IBM",
                &[
                    Observation { date: date(2024, 7, 1), close: 175.1, source: Some("fake".into()) },
                    Observation { date: date(2024, 7, 2), close: 176.0, source: None },
                ],
            )
            .await
            .unwrap();

        let response = get_quality_map(
            &state,
            QualityMapRequest {
                symbol: "ibm".to_string(),
                from_date: Some("2024-07-01".to_string()),
                to_date: Some("2024-07-05".to_string()),
                sources: vec![],
            },
        )
        .await
        .unwrap();

        assert_eq!(response.symbol, "IBM");
        assert_eq!(response.days.len(), 5);
        // July 4th is an expected gap
        assert_eq!(response.days[3].quality, 0.7);
        assert_eq!(response.coverage.expected_days, 4);
        assert_eq!(response.coverage.days_of_data, 2);
        assert_eq!(response.missing_ranges.len(), 1);
        assert_eq!(response.missing_ranges[0].from_date, "2024-07-03");
        assert_eq!(response.missing_ranges[0].to_date, "2024-07-05");
        assert_eq!(response.source_breakdown.get("Unknown"), Some(&1));

        let filtered = get_quality_map(
            &state,
            QualityMapRequest {
                symbol: "IBM".to_string(),
                from_date: Some("2024-07-01".to_string()),
                to_date: Some("2024-07-05".to_string()),
                sources: vec!["Unknown".to_string()],
            },
        )
        .await
        .unwrap();
        assert_eq!(filtered.days.len(), 1);
        assert_eq!(filtered.days[0].date, "2024-07-02");
        assert_eq!(filtered.coverage.days_of_data, 2);
    }

    #[tokio::test]
    async fn test_inverted_range_is_an_error() {
        let state = test_state(FakeProvider::new());
        let err = get_quality_map(
            &state,
            QualityMapRequest {
                symbol: "IBM".to_string(),
                from_date: Some("2024-07-05".to_string()),
                to_date: Some("2024-07-01".to_string()),
                sources: vec![],
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.code(), "INVALID_RANGE");
    }
}
