//! Backfill Service
//!
//! Remediates missing dates: single date, date range, all gaps of a symbol,
//! and bulk runs over many symbols. Provider errors are recorded per unit of
//! work; only invalid input or store failures are returned as `Err`.

use crate::backfill::{BulkBackfillHandle, BulkBackfillSummary, ProgressTracker};
use crate::coverage::{QualityMap, SymbolCoverage};
use crate::error::{ensure_range, AppError, ErrorResponse, Result};
use crate::services::coverage_service::CoverageService;
use crate::services::history_service::HistoryService;
use crate::services::normalize_symbol;
use crate::state::AppState;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Result of a single-symbol backfill
#[derive(Debug, Clone, Serialize)]
pub struct BackfillOutcome {
    pub symbol: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// The provider call succeeded
    pub success: bool,
    pub prices_added: usize,
    pub prices_updated: usize,
    pub errors: Vec<String>,
    pub error: Option<ErrorResponse>,
    /// Refreshed quality map over the symbol's analysis window, absent if the refresh failed
    pub quality_map: Option<QualityMap>,
    pub coverage: Option<SymbolCoverage>,
}

impl BackfillOutcome {
    /// Some prices landed but gaps remain
    pub fn is_partial(&self) -> bool {
        self.success && !self.errors.is_empty()
    }
}

/// Bulk backfill request
#[derive(Debug, Clone, Deserialize)]
pub struct BulkBackfillRequest {
    pub symbols: Vec<String>,
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Symbol shown in detail; its quality map is refreshed when processed
    pub selected: Option<String>,
}

/// Backfill service for business logic
pub struct BackfillService;

impl BackfillService {
    /// Backfill one date
    pub async fn backfill_date(state: &AppState, symbol: &str, date: NaiveDate) -> Result<BackfillOutcome> {
        Self::backfill_range(state, symbol, date, date).await
    }

    /// Backfill `[start, end]` for one symbol, then refresh its quality map and coverage
    pub async fn backfill_range(
        state: &AppState,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<BackfillOutcome> {
        ensure_range(start, end)?;
        let symbol = normalize_symbol(symbol)?;
        info!("BackfillService::backfill_range - {} {} to {}", symbol, start, end);

        let fetched = HistoryService::fetch_symbol(state, &symbol, start, end).await;

        let mut outcome = match fetched {
            Ok(fetch) => BackfillOutcome {
                symbol: symbol.clone(),
                start,
                end,
                success: true,
                prices_added: fetch.prices_added,
                prices_updated: fetch.prices_updated,
                errors: fetch.partial_error().into_iter().collect(),
                error: None,
                quality_map: None,
                coverage: None,
            },
            Err(e) if matches!(e, AppError::Database(_) | AppError::DuckDb(_)) => return Err(e),
            Err(e) => {
                warn!("Backfill of {} failed: {}", symbol, e);
                BackfillOutcome {
                    symbol: symbol.clone(),
                    start,
                    end,
                    success: false,
                    prices_added: 0,
                    prices_updated: 0,
                    errors: vec![format!("{}: {}", symbol, e)],
                    error: Some(ErrorResponse::from(&e)),
                    quality_map: None,
                    coverage: None,
                }
            }
        };

        // Prices already written stay counted even if the views cannot be rebuilt
        match Self::refresh(state, &symbol).await {
            Ok((map, coverage)) => {
                outcome.quality_map = Some(map);
                outcome.coverage = Some(coverage);
            }
            Err(e) => {
                error!("Failed to refresh views for {}: {}", symbol, e);
                outcome.errors.push(format!("{}: refresh failed: {}", symbol, e));
            }
        }

        Ok(outcome)
    }

    /// Backfill the span covering every missing date in the analysis window
    ///
    /// Makes no provider call when nothing is missing.
    pub async fn backfill_gaps(state: &AppState, symbol: &str) -> Result<BackfillOutcome> {
        let symbol = normalize_symbol(symbol)?;
        let map = CoverageService::get_symbol_quality_map(state, &symbol).await?;
        let ranges = map.missing_ranges();

        match (ranges.first(), ranges.last()) {
            (Some((start, _)), Some((_, end))) => {
                info!(
                    "{} has {} gap run(s), backfilling {} to {}",
                    symbol,
                    ranges.len(),
                    start,
                    end
                );
                Self::backfill_range(state, &symbol, *start, *end).await
            }
            _ => {
                info!("{} has no missing dates", symbol);
                let coverage = CoverageService::symbol_coverage_of(state, &symbol, &map)?;
                Ok(BackfillOutcome {
                    symbol,
                    start: map.start,
                    end: map.end,
                    success: true,
                    prices_added: 0,
                    prices_updated: 0,
                    errors: Vec::new(),
                    error: None,
                    quality_map: Some(map),
                    coverage: Some(coverage),
                })
            }
        }
    }

    /// Start a bulk backfill and return its handle
    ///
    /// Symbols are normalized and de-duplicated in order. The run continues
    /// even if the handle is dropped.
    pub fn bulk_backfill(state: Arc<AppState>, request: BulkBackfillRequest) -> Result<BulkBackfillHandle> {
        ensure_range(request.start, request.end)?;

        let mut seen = HashSet::new();
        let mut symbols = Vec::with_capacity(request.symbols.len());
        for raw in &request.symbols {
            let symbol = normalize_symbol(raw)?;
            if seen.insert(symbol.clone()) {
                symbols.push(symbol);
            }
        }
        if symbols.is_empty() {
            return Err(AppError::Validation("Bulk backfill needs at least one symbol".to_string()));
        }

        let selected = request.selected.as_deref().map(normalize_symbol).transpose()?;
        let (tracker, progress) = ProgressTracker::new(&symbols);

        info!(
            "Starting bulk backfill of {} symbol(s) {} to {}",
            symbols.len(),
            request.start,
            request.end
        );

        let task = tokio::spawn(Self::run_bulk(
            state,
            symbols,
            request.start,
            request.end,
            selected,
            tracker,
        ));

        Ok(BulkBackfillHandle::new(progress, task))
    }

    /// Process symbols strictly in order, one provider call at a time
    pub async fn run_bulk(
        state: Arc<AppState>,
        symbols: Vec<String>,
        start: NaiveDate,
        end: NaiveDate,
        selected: Option<String>,
        tracker: ProgressTracker,
    ) -> BulkBackfillSummary {
        for symbol in &symbols {
            tracker.start(symbol);

            match HistoryService::fetch_symbol(&state, symbol, start, end).await {
                Ok(outcome) => {
                    if let Some(note) = outcome.partial_error() {
                        warn!("{}", note);
                    }
                    tracker.complete(symbol, outcome.prices_added);
                }
                Err(e) => {
                    if e.is_transient() {
                        warn!("Bulk backfill of {} failed, retry later: {}", symbol, e);
                    } else {
                        error!("Bulk backfill of {} failed: {}", symbol, e);
                    }
                    tracker.fail(symbol, &e);
                }
            }

            match Self::refresh(&state, symbol).await {
                Ok((map, coverage)) => {
                    tracker.set_coverage(coverage);
                    if selected.as_deref() == Some(symbol.as_str()) {
                        tracker.set_selected_quality_map(map);
                    }
                }
                Err(e) => error!("Failed to refresh coverage for {}: {}", symbol, e),
            }
        }

        let summary = tracker.finish();
        info!("Bulk backfill finished: {}", summary.message());
        summary
    }

    async fn refresh(state: &AppState, symbol: &str) -> Result<(QualityMap, SymbolCoverage)> {
        let map = CoverageService::get_symbol_quality_map(state, symbol).await?;
        let coverage = CoverageService::symbol_coverage_of(state, symbol, &map)?;
        Ok((map, coverage))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backfill::BackfillStatus;
    use crate::services::coverage_service::today;
    use crate::db::sqlite::UpdateBackfillSettings;
    use crate::db::Observation;
    use crate::services::testing::{date, test_state, test_state_with_delay, FakeProvider};
    use chrono::Duration;

    fn bulk(symbols: &[&str], start: NaiveDate, end: NaiveDate) -> BulkBackfillRequest {
        BulkBackfillRequest {
            symbols: symbols.iter().map(|s| s.to_string()).collect(),
            start,
            end,
            selected: None,
        }
    }

    #[tokio::test]
    async fn test_backfill_range_refreshes_views() {
        let state = test_state(FakeProvider::new());
        let end = today();
        let start = end - Duration::days(14);

        let before = CoverageService::symbol_coverage(&state, "SPY").await.unwrap();
        assert_eq!(before.days_of_data, 0);

        let outcome = BackfillService::backfill_range(&state, "spy", start, end).await.unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.symbol, "SPY");
        assert!(outcome.prices_added > 0);
        assert_eq!(outcome.coverage.unwrap().days_of_data, outcome.prices_added);
        assert!(outcome
            .quality_map
            .unwrap()
            .iter()
            .filter(|(d, _)| **d >= start)
            .all(|(_, q)| !q.is_missing()));
    }

    #[tokio::test]
    async fn test_backfill_date_provider_error_recorded() {
        let state = test_state(FakeProvider::new().failing("NOPE"));

        let outcome = BackfillService::backfill_date(&state, "NOPE", date(2024, 3, 4)).await.unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.prices_added, 0);
        assert_eq!(outcome.error.unwrap().code, "PROVIDER_ERROR");
        assert!(outcome.errors[0].starts_with("NOPE:"));
    }

    #[tokio::test]
    async fn test_backfill_range_partial() {
        let state = test_state(FakeProvider::new().skipping(date(2024, 3, 6)));

        let outcome = BackfillService::backfill_range(&state, "SPY", date(2024, 3, 4), date(2024, 3, 8))
            .await
            .unwrap();
        assert!(outcome.is_partial());
        assert_eq!(outcome.prices_added, 4);
    }

    #[tokio::test]
    async fn test_refresh_failure_keeps_fetch_counts() {
        let state = test_state(FakeProvider::new());
        let mut settings = state.settings();
        settings.fallback_window_days = u32::MAX;
        state.apply_settings(settings).unwrap();

        let outcome = BackfillService::backfill_range(&state, "SPY", date(2024, 3, 4), date(2024, 3, 8))
            .await
            .unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.prices_added, 5);
        assert!(outcome.coverage.is_none());
        assert_eq!(outcome.errors.len(), 1);
        assert!(outcome.errors[0].starts_with("SPY: refresh failed"));

        let stored = state.store.query("SPY", date(2024, 3, 4), date(2024, 3, 8)).await.unwrap();
        assert_eq!(stored.len(), 5);
    }

    #[tokio::test]
    async fn test_backfill_gaps() {
        let provider = FakeProvider::new();
        let calls = provider.call_log();
        let state = test_state(provider);

        let first = BackfillService::backfill_gaps(&state, "QQQ").await.unwrap();
        assert!(first.success);
        assert_eq!(first.coverage.unwrap().missing_days, 0);
        assert_eq!(calls.lock().len(), 1);

        // Nothing missing any more: no provider call
        let second = BackfillService::backfill_gaps(&state, "QQQ").await.unwrap();
        assert_eq!(second.prices_added, 0);
        assert_eq!(calls.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_bulk_error_does_not_stop_batch() {
        let provider = FakeProvider::new().failing("AAA");
        let calls = provider.call_log();
        let state = test_state(provider);

        let handle = BackfillService::bulk_backfill(
            state.clone(),
            bulk(&["AAA", "BBB"], date(2024, 3, 4), date(2024, 3, 8)),
        )
        .unwrap();
        let progress = handle.subscribe();
        let summary = handle.finish().await.unwrap();

        assert_eq!(*calls.lock(), vec!["AAA".to_string(), "BBB".to_string()]);
        assert_eq!(summary.completed, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.prices_added, 5);

        let snapshot = progress.borrow().clone();
        assert!(snapshot.finished);
        let rows: Vec<(String, BackfillStatus)> =
            snapshot.rows.iter().map(|r| (r.symbol.clone(), r.status)).collect();
        assert_eq!(
            rows,
            vec![
                ("AAA".to_string(), BackfillStatus::Error),
                ("BBB".to_string(), BackfillStatus::Completed),
            ]
        );
        assert!(snapshot.row("AAA").unwrap().error.as_deref().unwrap().contains("unknown symbol"));
        assert_eq!(snapshot.coverage.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bulk_waits_between_symbols() {
        let provider = FakeProvider::new().with_latency(std::time::Duration::from_millis(250));
        let spans = provider.span_log();
        let state = test_state_with_delay(provider, 1000);
        assert_eq!(state.settings().inter_call_delay_ms, 1000);

        let started = tokio::time::Instant::now();
        let handle = BackfillService::bulk_backfill(
            state,
            bulk(&["AAA", "BBB", "CCC"], date(2024, 3, 4), date(2024, 3, 8)),
        )
        .unwrap();
        let summary = handle.finish().await.unwrap();

        assert_eq!(summary.completed, 3);
        assert!(started.elapsed() >= std::time::Duration::from_secs(2));

        let spans = spans.lock().clone();
        let order: Vec<&str> = spans.iter().map(|s| s.symbol.as_str()).collect();
        assert_eq!(order, vec!["AAA", "BBB", "CCC"]);
        for pair in spans.windows(2) {
            assert!(pair[1].started >= pair[0].finished + std::time::Duration::from_millis(1000));
        }
    }

    #[tokio::test]
    async fn test_bulk_dedupes_and_refreshes_selected() {
        let provider = FakeProvider::new();
        let calls = provider.call_log();
        let state = test_state(provider);
        let end = today();

        let mut request = bulk(&["msft", "MSFT", " aapl"], end - Duration::days(7), end);
        request.selected = Some("aapl".to_string());

        let handle = BackfillService::bulk_backfill(state, request).unwrap();
        let progress = handle.subscribe();
        let summary = handle.finish().await.unwrap();

        assert_eq!(summary.total, 2);
        assert_eq!(*calls.lock(), vec!["MSFT".to_string(), "AAPL".to_string()]);
        let selected = progress.borrow().selected_quality_map.clone().unwrap();
        assert_eq!(selected.symbol, "AAPL");
    }

    #[tokio::test]
    async fn test_bulk_rejects_bad_requests() {
        let state = test_state(FakeProvider::new());

        let err = BackfillService::bulk_backfill(state.clone(), bulk(&[], date(2024, 3, 4), date(2024, 3, 8)))
            .err()
            .unwrap();
        assert_eq!(err.code(), "VALIDATION_ERROR");

        let err = BackfillService::bulk_backfill(state, bulk(&["AAA"], date(2024, 3, 8), date(2024, 3, 4)))
            .err()
            .unwrap();
        assert_eq!(err.code(), "INVALID_RANGE");
    }

    #[tokio::test]
    async fn test_bulk_budget_shared_and_exhausted() {
        let state = test_state(FakeProvider::new());
        let settings = state
            .sqlite
            .update_backfill_settings(&UpdateBackfillSettings {
                daily_call_budget: Some(2),
                ..Default::default()
            })
            .unwrap();
        state.apply_settings(settings).unwrap();

        // A single-symbol backfill uses part of the same budget
        BackfillService::backfill_date(&state, "SPY", date(2024, 3, 4)).await.unwrap();

        let handle = BackfillService::bulk_backfill(
            state.clone(),
            bulk(&["AAA", "BBB", "CCC"], date(2024, 3, 4), date(2024, 3, 8)),
        )
        .unwrap();
        let summary = handle.finish().await.unwrap();

        assert_eq!(summary.completed, 1);
        assert_eq!(summary.failed, 2);
        assert_eq!(
            summary.message(),
            "2 of 3 symbols failed: RATE_LIMIT for BBB, RATE_LIMIT for CCC"
        );
    }

    #[tokio::test]
    async fn test_backfill_is_idempotent() {
        let state = test_state(FakeProvider::new());
        state
            .store
            .upsert(
                "SPY",
                &[Observation {
                    date: date(2024, 3, 5),
                    close: 1.0,
                    source: Some("manual".to_string()),
                }],
            )
            .await
            .unwrap();

        let first = BackfillService::backfill_range(&state, "SPY", date(2024, 3, 4), date(2024, 3, 8))
            .await
            .unwrap();
        assert_eq!(first.prices_added, 4);
        assert_eq!(first.prices_updated, 1);

        let again = BackfillService::backfill_range(&state, "SPY", date(2024, 3, 4), date(2024, 3, 8))
            .await
            .unwrap();
        assert_eq!(again.prices_added, 0);
        assert_eq!(again.prices_updated, 5);

        let stored = state.store.query("SPY", date(2024, 3, 4), date(2024, 3, 8)).await.unwrap();
        assert_eq!(stored.len(), 5);
    }
}
