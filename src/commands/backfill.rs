//! Backfill commands

use crate::backfill::BulkBackfillHandle;
use crate::commands::parse_date;
use crate::coverage::SymbolCoverage;
use crate::error::{ErrorResponse, Result};
use crate::services::{
    normalize_symbol, BackfillOutcome, BackfillService, BulkBackfillRequest, FetchReport,
    HistoryService,
};
use crate::state::AppState;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct BackfillDateRequest {
    pub symbol: String,
    pub date: String,
}

#[derive(Debug, Deserialize)]
pub struct BackfillRangeRequest {
    pub symbol: String,
    pub from_date: String,
    pub to_date: String,
}

#[derive(Debug, Deserialize)]
pub struct BulkBackfillCommand {
    pub symbols: Vec<String>,
    pub from_date: String,
    pub to_date: String,
    /// Symbol currently shown in detail
    pub selected: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FetchHistoryRequest {
    pub symbols: Vec<String>,
    pub from_date: String,
    pub to_date: String,
}

#[derive(Debug, Deserialize)]
pub struct ManualCloseRequest {
    pub symbol: String,
    pub date: String,
    pub close: f64,
}

#[derive(Debug, Serialize)]
pub struct ManualCloseResponse {
    pub symbol: String,
    pub date: String,
    pub close: f64,
    /// False when an existing close was overwritten
    pub inserted: bool,
}

#[derive(Debug, Serialize)]
pub struct BackfillResponse {
    pub success: bool,
    pub symbol: String,
    pub from_date: String,
    pub to_date: String,
    pub prices_added: usize,
    pub prices_updated: usize,
    pub errors: Vec<String>,
    pub error: Option<ErrorResponse>,
    pub coverage: Option<SymbolCoverage>,
    pub message: String,
}

impl From<BackfillOutcome> for BackfillResponse {
    fn from(outcome: BackfillOutcome) -> Self {
        let message = if !outcome.success {
            format!("Backfill of {} failed", outcome.symbol)
        } else if outcome.coverage.is_none() {
            format!(
                "Added {} prices for {}, coverage could not be refreshed",
                outcome.prices_added, outcome.symbol
            )
        } else if outcome.is_partial() {
            format!(
                "Added {} prices for {}, some dates are still missing",
                outcome.prices_added, outcome.symbol
            )
        } else {
            format!("Added {} prices for {}", outcome.prices_added, outcome.symbol)
        };

        Self {
            success: outcome.success,
            from_date: outcome.start.to_string(),
            to_date: outcome.end.to_string(),
            symbol: outcome.symbol,
            prices_added: outcome.prices_added,
            prices_updated: outcome.prices_updated,
            errors: outcome.errors,
            error: outcome.error,
            coverage: outcome.coverage,
            message,
        }
    }
}

/// Backfill a single date
pub async fn backfill_date(state: &AppState, request: BackfillDateRequest) -> Result<BackfillResponse> {
    let date = parse_date(&request.date)?;
    tracing::info!("Backfill date requested: {} {}", request.symbol, date);
    BackfillService::backfill_date(state, &request.symbol, date)
        .await
        .map(BackfillResponse::from)
}

/// Backfill a date range
pub async fn backfill_range(state: &AppState, request: BackfillRangeRequest) -> Result<BackfillResponse> {
    let start = parse_date(&request.from_date)?;
    let end = parse_date(&request.to_date)?;
    tracing::info!("Backfill range requested: {} {} to {}", request.symbol, start, end);
    BackfillService::backfill_range(state, &request.symbol, start, end)
        .await
        .map(BackfillResponse::from)
}

/// Backfill every gap in the symbol's analysis window
pub async fn backfill_gaps(state: &AppState, symbol: String) -> Result<BackfillResponse> {
    BackfillService::backfill_gaps(state, &symbol)
        .await
        .map(BackfillResponse::from)
}

/// Start a bulk backfill; progress is observed through the returned handle
pub fn start_bulk_backfill(state: Arc<AppState>, request: BulkBackfillCommand) -> Result<BulkBackfillHandle> {
    let start = parse_date(&request.from_date)?;
    let end = parse_date(&request.to_date)?;

    BackfillService::bulk_backfill(
        state,
        BulkBackfillRequest {
            symbols: request.symbols,
            start,
            end,
            selected: request.selected,
        },
    )
}

/// Fetch closes for several symbols without refreshing views
pub async fn fetch_history(state: &AppState, request: FetchHistoryRequest) -> Result<FetchReport> {
    let start = parse_date(&request.from_date)?;
    let end = parse_date(&request.to_date)?;
    let symbols = request
        .symbols
        .iter()
        .map(|s| normalize_symbol(s))
        .collect::<Result<Vec<_>>>()?;

    HistoryService::fetch_range(state, &symbols, start, end).await
}

/// Store a close entered by hand, tagged with the `manual` source
pub async fn record_manual_close(state: &AppState, request: ManualCloseRequest) -> Result<ManualCloseResponse> {
    let date = parse_date(&request.date)?;
    let symbol = normalize_symbol(&request.symbol)?;
    let inserted = HistoryService::record_manual_close(state, &symbol, date, request.close).await?;

    Ok(ManualCloseResponse {
        symbol,
        date: date.to_string(),
        close: request.close,
        inserted,
    })
}
